//! Caller-side handle to a running session.

use std::sync::Arc;
use std::time::Duration;

use chaincontract_core::{Interface, RpcTransport, SessionError, TxOptions};
use chaincontract_evm::{value::decode_hex, EventSchema};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};

use crate::actor::{Command, Deployment, Session};
use crate::config::{ConfigError, SessionConfig};
use crate::filter::FilterParams;

/// Cheap, cloneable handle to one session task.
///
/// Every request waits at most the handle's timeout. On expiry the caller gets
/// [`SessionError::Timeout`]; the session skips the request if it has not
/// started it yet, and otherwise discards the result.
#[derive(Clone)]
pub struct SessionHandle {
    name: Arc<str>,
    tx: mpsc::Sender<Command>,
    timeout: Duration,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SessionHandle {
    /// Spawn a session task on the current tokio runtime.
    pub fn spawn(config: SessionConfig, transport: Arc<dyn RpcTransport>) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let session = Session::new(&config, transport);
        tokio::spawn(session.run(rx));
        Self {
            name: Arc::from(config.name.as_str()),
            tx,
            timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    /// Spawn a session over HTTP JSON-RPC at the config's `rpc_url`.
    pub fn connect(config: SessionConfig) -> Result<Self, ConfigError> {
        let transport = config.http_transport()?;
        Ok(Self::spawn(config, transport))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A handle to the same session with a different request timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `true` once the session task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        let exchange = async {
            self.tx.send(make(reply)).await.map_err(|_| self.closed())?;
            rx.await.map_err(|_| self.closed())
        };
        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    fn closed(&self) -> SessionError {
        SessionError::Closed {
            session: self.name.to_string(),
        }
    }

    // ── Registry ──────────────────────────────────────────────────────────────

    /// Register (or replace) a contract. `bytecode` is `0x` hex.
    pub async fn register(
        &self,
        contract: impl Into<String>,
        interface: Interface,
        bytecode: Option<&str>,
    ) -> Result<(), SessionError> {
        let bytecode = bytecode.map(decode_hex).transpose()?;
        let contract = contract.into();
        self.request(|reply| Command::Register {
            contract,
            interface: Some(interface),
            bytecode,
            reply,
        })
        .await?
    }

    /// Register from a compiler artifact `{"abi": [...], "bytecode": "0x..."}`.
    /// `bin` is accepted in place of `bytecode`; an artifact with no `abi`
    /// fails with `missing_interface`.
    pub async fn register_artifact(&self, contract: impl Into<String>, artifact: &Value) -> Result<(), SessionError> {
        let interface = artifact.get("abi").cloned().map(Interface::from_value).transpose()?;
        let bytecode = artifact
            .get("bytecode")
            .or_else(|| artifact.get("bin"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty() && *s != "0x")
            .map(decode_hex)
            .transpose()?;
        let contract = contract.into();
        self.request(|reply| Command::Register {
            contract,
            interface,
            bytecode,
            reply,
        })
        .await?
    }

    /// Bind a deployed address. A no-op for unknown contracts.
    pub async fn bind_address(&self, contract: impl Into<String>, address: impl Into<String>) -> Result<(), SessionError> {
        let (contract, address) = (contract.into(), address.into());
        self.request(|reply| Command::BindAddress { contract, address, reply }).await
    }

    /// Merge keys into the contract's info bag. A no-op for unknown contracts.
    pub async fn update_info(&self, contract: impl Into<String>, info: Map<String, Value>) -> Result<(), SessionError> {
        let contract = contract.into();
        self.request(|reply| Command::UpdateInfo { contract, info, reply }).await
    }

    pub async fn address(&self, contract: impl Into<String>) -> Result<Option<String>, SessionError> {
        let contract = contract.into();
        self.request(|reply| Command::Address { contract, reply }).await
    }

    pub async fn abi(&self, contract: impl Into<String>) -> Result<Option<Interface>, SessionError> {
        let contract = contract.into();
        self.request(|reply| Command::Abi { contract, reply }).await
    }

    pub async fn info(&self, contract: impl Into<String>) -> Result<Option<Map<String, Value>>, SessionError> {
        let contract = contract.into();
        self.request(|reply| Command::Info { contract, reply }).await
    }

    pub async fn contracts(&self) -> Result<Vec<String>, SessionError> {
        self.request(|reply| Command::Contracts { reply }).await
    }

    /// Event schemas of a contract, ordered by signature.
    pub async fn event_schemas(&self, contract: impl Into<String>) -> Result<Option<Vec<EventSchema>>, SessionError> {
        let contract = contract.into();
        self.request(|reply| Command::EventSchemas { contract, reply }).await
    }

    // ── Transactions ──────────────────────────────────────────────────────────

    /// Deploy using the registered bytecode and wait for the receipt.
    ///
    /// With `args` of `None` the bytecode is sent as-is; supplied arguments are
    /// checked against the declared constructor and appended.
    pub async fn deploy(
        &self,
        contract: impl Into<String>,
        args: Option<Vec<Value>>,
        opts: TxOptions,
    ) -> Result<Deployment, SessionError> {
        self.deploy_inner(contract.into(), args, opts, None).await
    }

    /// Deploy with call-site bytecode, which takes priority over the registered one.
    pub async fn deploy_bytecode(
        &self,
        contract: impl Into<String>,
        bytecode: &str,
        args: Option<Vec<Value>>,
        opts: TxOptions,
    ) -> Result<Deployment, SessionError> {
        let bytecode = decode_hex(bytecode)?;
        self.deploy_inner(contract.into(), args, opts, Some(bytecode)).await
    }

    async fn deploy_inner(
        &self,
        contract: String,
        args: Option<Vec<Value>>,
        opts: TxOptions,
        bytecode: Option<Vec<u8>>,
    ) -> Result<Deployment, SessionError> {
        self.request(|reply| Command::Deploy {
            contract,
            args,
            opts,
            bytecode,
            reply,
        })
        .await?
    }

    /// Read-only call; returns the decoded outputs.
    pub async fn call(
        &self,
        contract: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
        opts: TxOptions,
    ) -> Result<Vec<Value>, SessionError> {
        let (contract, method) = (contract.into(), method.into());
        self.request(|reply| Command::Call {
            contract,
            method,
            args,
            opts,
            reply,
        })
        .await?
    }

    /// State-changing call; returns the transaction hash.
    pub async fn send(
        &self,
        contract: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
        opts: TxOptions,
    ) -> Result<String, SessionError> {
        let (contract, method) = (contract.into(), method.into());
        self.request(|reply| Command::Send {
            contract,
            method,
            args,
            opts,
            reply,
        })
        .await?
    }

    /// Fetch a receipt with its logs augment-decoded; `None` while pending.
    pub async fn tx_receipt(&self, tx_hash: impl Into<String>) -> Result<Option<Value>, SessionError> {
        let tx_hash = tx_hash.into();
        self.request(|reply| Command::TxReceipt { tx_hash, reply }).await?
    }

    /// Augment-decode receipt logs against every registered contract.
    pub async fn decode_tx_logs(&self, logs: Vec<Value>) -> Result<Vec<Value>, SessionError> {
        self.request(|reply| Command::DecodeTxLogs { logs, reply }).await
    }

    // ── Events ────────────────────────────────────────────────────────────────

    /// Install a remote filter for `contract`'s `event`; returns the filter id.
    pub async fn filter(
        &self,
        contract: impl Into<String>,
        event: impl Into<String>,
        params: FilterParams,
    ) -> Result<String, SessionError> {
        let (contract, event) = (contract.into(), event.into());
        self.request(|reply| Command::Filter {
            contract,
            event,
            params,
            reply,
        })
        .await?
    }

    /// Poll a filter; each log's `data` is replaced by its decoded record.
    pub async fn get_filter_changes(&self, filter_id: impl Into<String>) -> Result<Vec<Value>, SessionError> {
        let filter_id = filter_id.into();
        self.request(|reply| Command::GetFilterChanges { filter_id, reply }).await?
    }

    /// `eth_getLogs` with a caller-built filter, decoded against `contract`.
    pub async fn get_logs(&self, contract: impl Into<String>, filter: Value) -> Result<Vec<Value>, SessionError> {
        let contract = contract.into();
        self.request(|reply| Command::GetLogs { contract, filter, reply }).await?
    }

    pub async fn uninstall_filter(&self, filter_id: impl Into<String>) -> Result<bool, SessionError> {
        let filter_id = filter_id.into();
        self.request(|reply| Command::UninstallFilter { filter_id, reply }).await?
    }

    /// Stop the session task. Later requests fail with `Closed`.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}
