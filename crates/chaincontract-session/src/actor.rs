//! The session task: sole owner of contract and filter state.
//!
//! Requests arrive on an mpsc queue and are handled one at a time, so no
//! request observes another half-applied. Network operations hold the queue for
//! their whole round trip.

use std::sync::Arc;
use std::time::Duration;

use chaincontract_core::{
    validate::resolve, CodecError, EthClient, Interface, RpcTransport, SessionError, TransportOptions, TxOptions,
};
use chaincontract_evm::{
    augment_logs, augment_receipt, build_call, build_constructor, build_topics, replace_by_topic,
    replace_with_schema, value::hex_string, EventIndex, EventSchema,
};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::contract::{ContractEntry, ContractRegistry};
use crate::filter::{FilterContext, FilterParams, FilterRegistry};

type Reply<T> = oneshot::Sender<T>;

/// Result of a successful deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    /// `contractAddress` from the receipt.
    pub address: Option<String>,
    pub tx_hash: String,
    pub receipt: Value,
}

pub(crate) enum Command {
    Register {
        contract: String,
        interface: Option<Interface>,
        bytecode: Option<Vec<u8>>,
        reply: Reply<Result<(), SessionError>>,
    },
    BindAddress {
        contract: String,
        address: String,
        reply: Reply<()>,
    },
    UpdateInfo {
        contract: String,
        info: Map<String, Value>,
        reply: Reply<()>,
    },
    Address {
        contract: String,
        reply: Reply<Option<String>>,
    },
    Abi {
        contract: String,
        reply: Reply<Option<Interface>>,
    },
    Info {
        contract: String,
        reply: Reply<Option<Map<String, Value>>>,
    },
    Contracts {
        reply: Reply<Vec<String>>,
    },
    EventSchemas {
        contract: String,
        reply: Reply<Option<Vec<EventSchema>>>,
    },
    Deploy {
        contract: String,
        args: Option<Vec<Value>>,
        opts: TxOptions,
        bytecode: Option<Vec<u8>>,
        reply: Reply<Result<Deployment, SessionError>>,
    },
    Call {
        contract: String,
        method: String,
        args: Vec<Value>,
        opts: TxOptions,
        reply: Reply<Result<Vec<Value>, SessionError>>,
    },
    Send {
        contract: String,
        method: String,
        args: Vec<Value>,
        opts: TxOptions,
        reply: Reply<Result<String, SessionError>>,
    },
    TxReceipt {
        tx_hash: String,
        reply: Reply<Result<Option<Value>, SessionError>>,
    },
    DecodeTxLogs {
        logs: Vec<Value>,
        reply: Reply<Vec<Value>>,
    },
    Filter {
        contract: String,
        event: String,
        params: FilterParams,
        reply: Reply<Result<String, SessionError>>,
    },
    GetFilterChanges {
        filter_id: String,
        reply: Reply<Result<Vec<Value>, SessionError>>,
    },
    GetLogs {
        contract: String,
        filter: Value,
        reply: Reply<Result<Vec<Value>, SessionError>>,
    },
    UninstallFilter {
        filter_id: String,
        reply: Reply<Result<bool, SessionError>>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

impl Command {
    /// `true` once the caller stopped waiting (timed out or dropped).
    fn abandoned(&self) -> bool {
        match self {
            Command::Register { reply, .. } => reply.is_closed(),
            Command::BindAddress { reply, .. } | Command::UpdateInfo { reply, .. } => reply.is_closed(),
            Command::Address { reply, .. } => reply.is_closed(),
            Command::Abi { reply, .. } => reply.is_closed(),
            Command::Info { reply, .. } => reply.is_closed(),
            Command::Contracts { reply } => reply.is_closed(),
            Command::EventSchemas { reply, .. } => reply.is_closed(),
            Command::Deploy { reply, .. } => reply.is_closed(),
            Command::Call { reply, .. } => reply.is_closed(),
            Command::Send { reply, .. } => reply.is_closed(),
            Command::TxReceipt { reply, .. } => reply.is_closed(),
            Command::DecodeTxLogs { reply, .. } => reply.is_closed(),
            Command::Filter { reply, .. } => reply.is_closed(),
            Command::GetFilterChanges { reply, .. } | Command::GetLogs { reply, .. } => reply.is_closed(),
            Command::UninstallFilter { reply, .. } => reply.is_closed(),
            Command::Shutdown { .. } => false,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Command::Register { .. } => "register",
            Command::BindAddress { .. } => "bind_address",
            Command::UpdateInfo { .. } => "update_info",
            Command::Address { .. } => "address",
            Command::Abi { .. } => "abi",
            Command::Info { .. } => "info",
            Command::Contracts { .. } => "contracts",
            Command::EventSchemas { .. } => "event_schemas",
            Command::Deploy { .. } => "deploy",
            Command::Call { .. } => "call",
            Command::Send { .. } => "send",
            Command::TxReceipt { .. } => "tx_receipt",
            Command::DecodeTxLogs { .. } => "decode_tx_logs",
            Command::Filter { .. } => "filter",
            Command::GetFilterChanges { .. } => "get_filter_changes",
            Command::GetLogs { .. } => "get_logs",
            Command::UninstallFilter { .. } => "uninstall_filter",
            Command::Shutdown { .. } => "shutdown",
        }
    }
}

/// State owned by one session task.
pub(crate) struct Session {
    name: String,
    default_from: Option<String>,
    options: TransportOptions,
    eth: EthClient,
    contracts: ContractRegistry,
    filters: FilterRegistry,
}

impl Session {
    pub(crate) fn new(config: &SessionConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            name: config.name.clone(),
            default_from: config.default_from.clone(),
            options: config.transport.clone(),
            eth: EthClient::new(transport),
            contracts: ContractRegistry::default(),
            filters: FilterRegistry::default(),
        }
    }

    /// Serve requests until shutdown or until every handle is dropped.
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        info!(session = %self.name, url = %self.eth.url(), "session started");
        while let Some(cmd) = rx.recv().await {
            if cmd.abandoned() {
                warn!(session = %self.name, op = cmd.name(), "caller gone, request skipped");
                continue;
            }
            debug!(session = %self.name, op = cmd.name(), "handling request");
            match cmd {
                Command::Shutdown { reply } => {
                    let _ = reply.send(());
                    break;
                }
                cmd => self.handle(cmd).await,
            }
        }
        info!(session = %self.name, contracts = self.contracts.len(), "session stopped");
    }

    async fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Register { contract, interface, bytecode, reply } => {
                let _ = reply.send(self.register(contract, interface, bytecode));
            }
            Command::BindAddress { contract, address, reply } => {
                match self.contracts.get_mut(&contract) {
                    Some(entry) => entry.address = Some(address),
                    None => debug!(session = %self.name, %contract, "bind on unknown contract ignored"),
                }
                let _ = reply.send(());
            }
            Command::UpdateInfo { contract, info, reply } => {
                match self.contracts.get_mut(&contract) {
                    Some(entry) => entry.merge_info(info),
                    None => debug!(session = %self.name, %contract, "info update on unknown contract ignored"),
                }
                let _ = reply.send(());
            }
            Command::Address { contract, reply } => {
                let _ = reply.send(self.contracts.get(&contract).and_then(|c| c.address.clone()));
            }
            Command::Abi { contract, reply } => {
                let _ = reply.send(self.contracts.get(&contract).map(|c| c.interface.clone()));
            }
            Command::Info { contract, reply } => {
                let _ = reply.send(self.contracts.get(&contract).map(|c| c.info.clone()));
            }
            Command::Contracts { reply } => {
                let _ = reply.send(self.contracts.names());
            }
            Command::EventSchemas { contract, reply } => {
                let schemas = self.contracts.get(&contract).map(|c| {
                    let mut all: Vec<EventSchema> = c.events.events().cloned().collect();
                    all.sort_by(|a, b| a.signature.cmp(&b.signature));
                    all
                });
                let _ = reply.send(schemas);
            }
            Command::Deploy { contract, args, opts, bytecode, reply } => {
                let _ = reply.send(self.deploy(&contract, args.as_deref(), opts, bytecode).await);
            }
            Command::Call { contract, method, args, opts, reply } => {
                let _ = reply.send(self.call(&contract, &method, &args, opts).await);
            }
            Command::Send { contract, method, args, opts, reply } => {
                let _ = reply.send(self.send(&contract, &method, &args, opts).await);
            }
            Command::TxReceipt { tx_hash, reply } => {
                let _ = reply.send(self.tx_receipt(&tx_hash).await);
            }
            Command::DecodeTxLogs { logs, reply } => {
                let _ = reply.send(augment_logs(logs, &self.contracts));
            }
            Command::Filter { contract, event, params, reply } => {
                let result = self.install_filter(&contract, &event, &params).await;
                match result {
                    Ok(id) if reply.is_closed() => self.discard_filter(&id).await,
                    Ok(id) => {
                        self.filters.insert(id.clone(), FilterContext { contract, event });
                        let _ = reply.send(Ok(id));
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
            Command::GetFilterChanges { filter_id, reply } => {
                let _ = reply.send(self.filter_changes(&filter_id).await);
            }
            Command::GetLogs { contract, filter, reply } => {
                let _ = reply.send(self.get_logs(&contract, filter).await);
            }
            Command::UninstallFilter { filter_id, reply } => {
                self.filters.remove(&filter_id);
                let result = self
                    .eth
                    .eth_uninstall_filter(&filter_id, &self.options)
                    .await
                    .map_err(SessionError::from);
                let _ = reply.send(result);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn register(
        &mut self,
        contract: String,
        interface: Option<Interface>,
        bytecode: Option<Vec<u8>>,
    ) -> Result<(), SessionError> {
        let interface = resolve([interface], SessionError::MissingInterface { contract: contract.clone() })?;
        let entry = ContractEntry::new(interface, bytecode)?;
        info!(
            session = %self.name,
            %contract,
            events = entry.events.len(),
            has_bytecode = entry.bytecode.is_some(),
            "contract registered"
        );
        self.contracts.insert(contract, entry);
        Ok(())
    }

    fn entry(&self, contract: &str) -> Result<&ContractEntry, SessionError> {
        self.contracts
            .get(contract)
            .ok_or_else(|| SessionError::UnknownContract { contract: contract.into() })
    }

    fn sender(&self, opts: &TxOptions) -> Result<String, SessionError> {
        resolve([opts.sender(), self.default_from.clone()], SessionError::MissingSender)
    }

    async fn deploy(
        &self,
        contract: &str,
        args: Option<&[Value]>,
        opts: TxOptions,
        bytecode: Option<Vec<u8>>,
    ) -> Result<Deployment, SessionError> {
        let entry = self.entry(contract)?;
        let from = self.sender(&opts)?;
        let gas = resolve([opts.gas_limit()], SessionError::MissingGas)?;
        let code = resolve([bytecode.as_ref(), entry.bytecode.as_ref()], SessionError::MissingBinary)?;

        let payload = build_constructor(code, &entry.interface, args).map_err(|e| match e {
            CodecError::ArgumentCount { expected, got, .. } => SessionError::ConstructorArity { expected, got },
            other => SessionError::Codec(other),
        })?;

        let mut tx = Map::new();
        tx.insert("from".into(), Value::from(from));
        tx.insert("gas".into(), gas);
        tx.insert("data".into(), Value::from(hex_string(&payload)));
        merge_options(&mut tx, &opts);

        let tx_hash = self.eth.eth_send_transaction(tx, &self.options).await?;
        info!(session = %self.name, %contract, %tx_hash, "deployment submitted");
        let receipt = self.await_receipt(&tx_hash).await?;

        if receipt.get("status").and_then(Value::as_str) == Some("0x0") {
            return Err(SessionError::DeployReverted { tx_hash });
        }
        let address = receipt
            .get("contractAddress")
            .and_then(Value::as_str)
            .map(str::to_string);
        info!(session = %self.name, %contract, address = ?address, "deployment mined");
        Ok(Deployment { address, tx_hash, receipt })
    }

    async fn await_receipt(&self, tx_hash: &str) -> Result<Value, SessionError> {
        let attempts = self.options.receipt_poll_attempts.max(1);
        let interval = Duration::from_millis(self.options.receipt_poll_interval_ms);
        for attempt in 1..=attempts {
            if let Some(receipt) = self.eth.eth_get_transaction_receipt(tx_hash, &self.options).await? {
                return Ok(receipt);
            }
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Err(SessionError::ReceiptUnavailable {
            tx_hash: tx_hash.into(),
            attempts,
        })
    }

    async fn call(
        &self,
        contract: &str,
        method: &str,
        args: &[Value],
        opts: TxOptions,
    ) -> Result<Vec<Value>, SessionError> {
        let entry = self.entry(contract)?;
        let to = resolve([entry.address.clone()], SessionError::MissingAddress)?;
        let call = build_call(&entry.interface, method, args)?;

        let mut req = Map::new();
        req.insert("to".into(), Value::from(to));
        req.insert("data".into(), Value::from(hex_string(&call.calldata)));
        if let Some(from) = opts.sender().or_else(|| self.default_from.clone()) {
            req.insert("from".into(), Value::from(from));
        }
        merge_options(&mut req, &opts);

        let output = self.eth.eth_call(req, &self.options).await?;
        Ok(call.decode_return(&output)?)
    }

    async fn send(
        &self,
        contract: &str,
        method: &str,
        args: &[Value],
        opts: TxOptions,
    ) -> Result<String, SessionError> {
        let entry = self.entry(contract)?;
        let to = resolve([entry.address.clone()], SessionError::MissingAddress)?;
        let from = self.sender(&opts)?;
        let gas = resolve([opts.gas_limit()], SessionError::MissingGas)?;
        let calldata = build_call(&entry.interface, method, args)?.calldata;

        let mut tx = Map::new();
        tx.insert("to".into(), Value::from(to));
        tx.insert("from".into(), Value::from(from));
        tx.insert("gas".into(), gas);
        tx.insert("data".into(), Value::from(hex_string(&calldata)));
        merge_options(&mut tx, &opts);

        let tx_hash = self.eth.eth_send_transaction(tx, &self.options).await?;
        debug!(session = %self.name, %contract, %method, %tx_hash, "transaction sent");
        Ok(tx_hash)
    }

    async fn tx_receipt(&self, tx_hash: &str) -> Result<Option<Value>, SessionError> {
        let receipt = self.eth.eth_get_transaction_receipt(tx_hash, &self.options).await?;
        Ok(receipt.map(|mut r| {
            augment_receipt(&mut r, &self.contracts);
            r
        }))
    }

    async fn install_filter(
        &self,
        contract: &str,
        event: &str,
        params: &FilterParams,
    ) -> Result<String, SessionError> {
        let entry = self.entry(contract)?;
        let schema = entry.events.by_name(event);
        if schema.is_none() {
            warn!(session = %self.name, %contract, %event, "filter on unknown event: no topic constraint");
        }
        let topics = build_topics(schema, &params.topics)?;
        let payload = params.payload(entry.address.as_deref(), topics);
        let id = self.eth.eth_new_filter(payload, &self.options).await?;
        debug!(session = %self.name, %contract, %event, filter_id = %id, "filter installed");
        Ok(id)
    }

    /// Remove a remote filter whose installer stopped waiting.
    async fn discard_filter(&self, id: &str) {
        warn!(session = %self.name, filter_id = %id, "caller gone, filter not recorded");
        if let Err(e) = self.eth.eth_uninstall_filter(id, &self.options).await {
            warn!(session = %self.name, filter_id = %id, error = %e, "could not remove abandoned filter");
        }
    }

    async fn filter_changes(&self, filter_id: &str) -> Result<Vec<Value>, SessionError> {
        let logs = self.eth.eth_get_filter_changes(filter_id, &self.options).await?;
        let schema = self.filters.get(filter_id).and_then(|ctx| {
            self.contracts
                .get(&ctx.contract)
                .and_then(|c| c.events.by_name(&ctx.event))
        });
        Ok(replace_with_schema(logs, schema))
    }

    async fn get_logs(&self, contract: &str, filter: Value) -> Result<Vec<Value>, SessionError> {
        let logs = self.eth.eth_get_logs(filter, &self.options).await?;
        let empty = EventIndex::default();
        let events = self.contracts.get(contract).map(|c| &c.events).unwrap_or(&empty);
        Ok(replace_by_topic(logs, events))
    }
}

/// Merge caller options over a request object; caller keys win.
fn merge_options(target: &mut Map<String, Value>, opts: &TxOptions) {
    for (k, v) in opts.to_wire() {
        target.insert(k, v);
    }
}
