//! Named session directory with a default-session shortcut.

use std::collections::HashMap;
use std::sync::Arc;

use chaincontract_core::{RpcTransport, SessionError};
use parking_lot::RwLock;
use tracing::info;

use crate::config::{ConfigError, SessionConfig, DEFAULT_SESSION};
use crate::handle::SessionHandle;

/// Session name → handle. Handles are cloned out, so the lock is never held
/// across a request.
#[derive(Debug, Default)]
pub struct Sessions {
    inner: RwLock<HashMap<String, SessionHandle>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a session under `config.name`, replacing any session of that name.
    pub fn start(&self, config: SessionConfig, transport: Arc<dyn RpcTransport>) -> SessionHandle {
        let name = config.name.clone();
        let handle = SessionHandle::spawn(config, transport);
        if self.inner.write().insert(name.clone(), handle.clone()).is_some() {
            info!(session = %name, "replaced running session");
        }
        handle
    }

    /// [`Sessions::start`] over HTTP JSON-RPC at `config.rpc_url`.
    pub fn connect(&self, config: SessionConfig) -> Result<SessionHandle, ConfigError> {
        let transport = config.http_transport()?;
        Ok(self.start(config, transport))
    }

    pub fn get(&self, name: &str) -> Option<SessionHandle> {
        self.inner.read().get(name).cloned()
    }

    /// The session named `"default"`.
    pub fn default_session(&self) -> Option<SessionHandle> {
        self.get(DEFAULT_SESSION)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a session from the directory and shut its task down.
    pub async fn stop(&self, name: &str) -> Result<bool, SessionError> {
        let removed = self.inner.write().remove(name);
        match removed {
            Some(handle) => {
                handle.shutdown().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
