//! Typed `eth_*` calls over any [`RpcTransport`].
//!
//! `EthClient` is the only place a session talks to the node. Every method
//! takes the session's [`TransportOptions`] so per-session settings travel with
//! the request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::TransportError;
use crate::request::JsonRpcRequest;
use crate::transport::RpcTransport;

/// Per-session options threaded through every RPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportOptions {
    /// Block tag or number used for `eth_call`.
    #[serde(default = "default_block")]
    pub block: String,
    /// Delay between receipt polls while waiting for a deployment.
    #[serde(default = "default_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    /// Number of receipt polls before a deployment is reported as unmined.
    #[serde(default = "default_poll_attempts")]
    pub receipt_poll_attempts: u32,
}

fn default_block() -> String {
    "latest".into()
}
fn default_poll_interval_ms() -> u64 {
    1_000
}
fn default_poll_attempts() -> u32 {
    60
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            block: default_block(),
            receipt_poll_interval_ms: default_poll_interval_ms(),
            receipt_poll_attempts: default_poll_attempts(),
        }
    }
}

/// Ethereum JSON-RPC client over a shared transport.
#[derive(Clone)]
pub struct EthClient {
    transport: Arc<dyn RpcTransport>,
    next_id: Arc<AtomicU64>,
}

impl EthClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    /// Issue one request and return its `result`, passing node errors through.
    pub async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(id, method, url = %self.transport.url(), "rpc request");
        let resp = self
            .transport
            .send(JsonRpcRequest::new(id, method, params))
            .await?;
        resp.into_result().map_err(TransportError::Rpc)
    }

    /// `eth_call`: returns the raw return data.
    pub async fn eth_call(
        &self,
        call: Map<String, Value>,
        opts: &TransportOptions,
    ) -> Result<Vec<u8>, TransportError> {
        let result = self
            .request("eth_call", vec![Value::Object(call), Value::from(opts.block.clone())])
            .await?;
        decode_hex_result("eth_call", &result)
    }

    /// `eth_sendTransaction`: returns the transaction hash.
    pub async fn eth_send_transaction(
        &self,
        tx: Map<String, Value>,
        _opts: &TransportOptions,
    ) -> Result<String, TransportError> {
        let result = self
            .request("eth_sendTransaction", vec![Value::Object(tx)])
            .await?;
        expect_string("eth_sendTransaction", result)
    }

    /// `eth_getTransactionReceipt`: `None` while the transaction is pending.
    pub async fn eth_get_transaction_receipt(
        &self,
        tx_hash: &str,
        _opts: &TransportOptions,
    ) -> Result<Option<Value>, TransportError> {
        let result = self
            .request("eth_getTransactionReceipt", vec![Value::from(tx_hash)])
            .await?;
        Ok(match result {
            Value::Null => None,
            receipt => Some(receipt),
        })
    }

    /// `eth_newFilter`: returns the node's opaque filter id.
    pub async fn eth_new_filter(
        &self,
        filter: Map<String, Value>,
        _opts: &TransportOptions,
    ) -> Result<String, TransportError> {
        let result = self
            .request("eth_newFilter", vec![Value::Object(filter)])
            .await?;
        expect_string("eth_newFilter", result)
    }

    /// `eth_getFilterChanges`: raw logs since the previous poll.
    pub async fn eth_get_filter_changes(
        &self,
        filter_id: &str,
        _opts: &TransportOptions,
    ) -> Result<Vec<Value>, TransportError> {
        let result = self
            .request("eth_getFilterChanges", vec![Value::from(filter_id)])
            .await?;
        expect_array("eth_getFilterChanges", result)
    }

    /// `eth_getLogs`: raw logs matching `query`.
    pub async fn eth_get_logs(
        &self,
        query: Value,
        _opts: &TransportOptions,
    ) -> Result<Vec<Value>, TransportError> {
        let result = self.request("eth_getLogs", vec![query]).await?;
        expect_array("eth_getLogs", result)
    }

    /// `eth_uninstallFilter`: `true` if the node removed the filter.
    pub async fn eth_uninstall_filter(
        &self,
        filter_id: &str,
        _opts: &TransportOptions,
    ) -> Result<bool, TransportError> {
        let result = self
            .request("eth_uninstallFilter", vec![Value::from(filter_id)])
            .await?;
        result.as_bool().ok_or_else(|| unexpected("eth_uninstallFilter", "expected a boolean"))
    }
}

fn unexpected(method: &str, reason: &str) -> TransportError {
    TransportError::UnexpectedResponse {
        method: method.into(),
        reason: reason.into(),
    }
}

fn expect_string(method: &str, value: Value) -> Result<String, TransportError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(unexpected(method, "expected a string")),
    }
}

fn expect_array(method: &str, value: Value) -> Result<Vec<Value>, TransportError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(vec![]),
        _ => Err(unexpected(method, "expected an array")),
    }
}

fn decode_hex_result(method: &str, value: &Value) -> Result<Vec<u8>, TransportError> {
    let s = value
        .as_str()
        .ok_or_else(|| unexpected(method, "expected a hex string"))?;
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| unexpected(method, &format!("invalid hex: {e}")))
}
