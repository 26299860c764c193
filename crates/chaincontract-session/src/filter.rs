//! Installed log filters and the decode context each one needs.

use std::collections::HashMap;

use chaincontract_core::{BlockRef, CodecError};
use chaincontract_evm::EventQuery;
use serde_json::{Map, Value};

/// Which contract and event a remote filter was installed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterContext {
    pub contract: String,
    pub event: String,
}

/// Caller-side filter parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterParams {
    pub topics: EventQuery,
    pub from_block: Option<BlockRef>,
    pub to_block: Option<BlockRef>,
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topics(mut self, query: EventQuery) -> Self {
        self.topics = query;
        self
    }

    pub fn from_block(mut self, block: BlockRef) -> Self {
        self.from_block = Some(block);
        self
    }

    pub fn to_block(mut self, block: BlockRef) -> Self {
        self.to_block = Some(block);
        self
    }

    /// Read `{"topics": ..., "fromBlock": ..., "toBlock": ...}`; every key is
    /// optional.
    pub fn from_value(value: &Value) -> Result<Self, CodecError> {
        let block = |key: &str| {
            value
                .get(key)
                .filter(|v| !v.is_null())
                .map(BlockRef::from_value)
                .transpose()
        };
        Ok(Self {
            topics: value.get("topics").map(EventQuery::from_value).unwrap_or_default(),
            from_block: block("fromBlock")?,
            to_block: block("toBlock")?,
        })
    }

    /// The `eth_newFilter` payload for already-encoded `topics`.
    pub fn payload(&self, address: Option<&str>, topics: Vec<Value>) -> Map<String, Value> {
        let mut out = Map::new();
        if let Some(address) = address {
            out.insert("address".into(), Value::from(address));
        }
        if !topics.is_empty() {
            out.insert("topics".into(), Value::Array(topics));
        }
        if let Some(b) = self.from_block {
            out.insert("fromBlock".into(), b.to_wire());
        }
        if let Some(b) = self.to_block {
            out.insert("toBlock".into(), b.to_wire());
        }
        out
    }
}

/// Remote filter id → decode context.
#[derive(Debug, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterContext>,
}

impl FilterRegistry {
    pub fn insert(&mut self, id: impl Into<String>, ctx: FilterContext) {
        self.filters.insert(id.into(), ctx);
    }

    pub fn get(&self, id: &str) -> Option<&FilterContext> {
        self.filters.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<FilterContext> {
        self.filters.remove(id)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
