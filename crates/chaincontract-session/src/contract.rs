//! Per-contract state held by a session.

use std::collections::BTreeMap;

use chaincontract_core::{CodecError, Interface};
use chaincontract_evm::{EventIndex, EventSchema, SchemaLookup};
use serde_json::{Map, Value};

/// One registered contract.
#[derive(Debug, Clone)]
pub struct ContractEntry {
    pub interface: Interface,
    pub address: Option<String>,
    pub bytecode: Option<Vec<u8>>,
    pub events: EventIndex,
    /// Free-form annotations; updates merge key by key.
    pub info: Map<String, Value>,
}

impl ContractEntry {
    /// Build an entry, deriving the event schemas once.
    pub fn new(interface: Interface, bytecode: Option<Vec<u8>>) -> Result<Self, CodecError> {
        let events = EventIndex::build(&interface)?;
        Ok(Self {
            interface,
            address: None,
            bytecode,
            events,
            info: Map::new(),
        })
    }

    pub fn merge_info(&mut self, info: Map<String, Value>) {
        for (k, v) in info {
            self.info.insert(k, v);
        }
    }
}

/// Contract identifier → entry. Ordered so listings are stable.
#[derive(Debug, Default)]
pub struct ContractRegistry {
    contracts: BTreeMap<String, ContractEntry>,
}

impl ContractRegistry {
    pub fn insert(&mut self, name: impl Into<String>, entry: ContractEntry) {
        self.contracts.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&ContractEntry> {
        self.contracts.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ContractEntry> {
        self.contracts.get_mut(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.contracts.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

impl SchemaLookup for ContractRegistry {
    /// Prefer the contract bound at the emitting address; otherwise the first
    /// contract (by name) that knows the topic.
    fn schema_for(&self, address: Option<&str>, topic: &str) -> Option<&EventSchema> {
        let bound_here = address.and_then(|addr| {
            self.contracts.values().find(|c| {
                c.address
                    .as_deref()
                    .is_some_and(|own| own.eq_ignore_ascii_case(addr))
            })
        });
        bound_here
            .and_then(|c| c.events.by_topic(topic))
            .or_else(|| self.contracts.values().find_map(|c| c.events.by_topic(topic)))
    }
}
