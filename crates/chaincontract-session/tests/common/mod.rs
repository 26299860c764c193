//! Shared helpers: a scripted in-memory transport and fixture loading.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chaincontract_core::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcTransport, TransportError};
use chaincontract_session::{SessionConfig, SessionHandle};
use serde_json::Value;

pub const SENDER: &str = "0x00000000000000000000000000000000000000aa";
pub const DEPLOYED: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

/// Answers from per-method queues first, then per-method defaults, and
/// records every request it sees.
#[derive(Default)]
pub struct MockTransport {
    queued: Mutex<HashMap<String, VecDeque<Result<Value, JsonRpcError>>>>,
    defaults: Mutex<HashMap<String, Value>>,
    delays: Mutex<HashMap<String, Duration>>,
    seen: Mutex<Vec<JsonRpcRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue one answer for `method`.
    pub fn answer(&self, method: &str, value: Value) {
        self.queued
            .lock()
            .unwrap()
            .entry(method.into())
            .or_default()
            .push_back(Ok(value));
    }

    /// Queue one JSON-RPC error for `method`.
    pub fn fail(&self, method: &str, code: i64, message: &str) {
        self.queued
            .lock()
            .unwrap()
            .entry(method.into())
            .or_default()
            .push_back(Err(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }));
    }

    /// Answer used once the queue for `method` is empty.
    pub fn always(&self, method: &str, value: Value) {
        self.defaults.lock().unwrap().insert(method.into(), value);
    }

    pub fn delay(&self, method: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(method.into(), delay);
    }

    pub fn clear_delay(&self, method: &str) {
        self.delays.lock().unwrap().remove(method);
    }

    pub fn requests(&self, method: &str) -> Vec<JsonRpcRequest> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let delay = self.delays.lock().unwrap().get(&req.method).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let id = req.id.clone();
        let method = req.method.clone();
        self.seen.lock().unwrap().push(req);

        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&method)
            .and_then(VecDeque::pop_front);
        let answer = match queued {
            Some(answer) => answer,
            None => match self.defaults.lock().unwrap().get(&method) {
                Some(v) => Ok(v.clone()),
                None => Err(JsonRpcError {
                    code: -32601,
                    message: format!("the method {method} does not exist/is not available"),
                    data: None,
                }),
            },
        };
        Ok(match answer {
            Ok(v) => JsonRpcResponse::success(id, v),
            Err(e) => JsonRpcResponse::failure(id, e),
        })
    }

    fn url(&self) -> &str {
        "mock://node"
    }
}

pub fn fixture(name: &str) -> Value {
    let mut p = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.pop();
    p.pop();
    p.push("fixtures");
    p.push("abi");
    p.push(name);
    let text = std::fs::read_to_string(&p).unwrap_or_else(|e| panic!("cannot read {}: {e}", p.display()));
    serde_json::from_str(&text).unwrap()
}

pub fn config() -> SessionConfig {
    let mut cfg = SessionConfig::named("test");
    cfg.transport.receipt_poll_interval_ms = 1;
    cfg.transport.receipt_poll_attempts = 3;
    cfg
}

pub fn spawn(transport: &Arc<MockTransport>) -> SessionHandle {
    SessionHandle::spawn(config(), transport.clone())
}

/// 32-byte big-endian word as bare hex.
pub fn word(n: u64) -> String {
    format!("{n:064x}")
}

/// `bytes32` hex of a short ASCII string, right-padded.
pub fn bytes32_text(text: &str) -> String {
    let mut hex = hex::encode(text);
    hex.push_str(&"0".repeat(64 - hex.len()));
    format!("0x{hex}")
}
