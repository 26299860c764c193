//! Session configuration.

use std::path::Path;
use std::sync::Arc;

use chaincontract_core::{RpcTransport, TransportError, TransportOptions};
use chaincontract_http::HttpRpcClient;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a [`SessionConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Session '{session}' has no rpc_url")]
    MissingRpcUrl { session: String },

    #[error("Cannot build transport: {0}")]
    Transport(#[from] TransportError),
}

/// Configuration for one named session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session name, used by the [`crate::Sessions`] directory.
    #[serde(default = "default_name")]
    pub name: String,
    /// JSON-RPC endpoint, e.g. "http://127.0.0.1:8545"
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Sender used when a transaction supplies none.
    #[serde(default)]
    pub default_from: Option<String>,
    /// Caller-side timeout for every request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Request queue depth
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub transport: TransportOptions,
}

pub const DEFAULT_SESSION: &str = "default";

fn default_name() -> String { DEFAULT_SESSION.into() }
fn default_request_timeout_ms() -> u64 { 120_000 }
fn default_queue_capacity() -> usize { 256 }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            rpc_url: None,
            default_from: None,
            request_timeout_ms: default_request_timeout_ms(),
            queue_capacity: default_queue_capacity(),
            transport: TransportOptions::default(),
        }
    }
}

impl SessionConfig {
    /// Create a config for a named session with every other field defaulted.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_default_from(mut self, from: impl Into<String>) -> Self {
        self.default_from = Some(from.into());
        self
    }

    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    pub fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    pub fn with_transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// HTTP JSON-RPC transport for `rpc_url`, with the client's default retry policy.
    pub fn http_transport(&self) -> Result<Arc<dyn RpcTransport>, ConfigError> {
        let url = self
            .rpc_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingRpcUrl { session: self.name.clone() })?;
        Ok(Arc::new(HttpRpcClient::default_for(url)?))
    }

    /// Load from a file; `.yaml`/`.yml` files are read as YAML, anything else
    /// as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            _ => Self::from_json_str(&text),
        }
    }
}
