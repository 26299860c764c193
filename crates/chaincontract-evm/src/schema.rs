//! Event schemas derived from an interface description.
//!
//! Each `event` entry yields one [`EventSchema`]. Topic 0 is the keccak256 of
//! the FULL signature over every parameter in declared order; the indexed ones
//! are then split off into topic slots and the rest form the data signature.

use std::collections::HashMap;

use alloy_dyn_abi::DynSolType;
use alloy_json_abi::Event;
use chaincontract_core::{abi::resolve_event_param, CodecError, Interface};

use crate::fingerprint;

/// Decoding layout for one event.
#[derive(Debug, Clone)]
pub struct EventSchema {
    pub name: String,
    /// `Name(type1,...,typeN)` over all parameters.
    pub signature: String,
    /// keccak256 of `signature`, lowercase `0x` hex.
    pub topic: String,
    /// `Name(nonIndexedType1,...)`, the layout of the data blob.
    pub data_signature: String,
    pub non_indexed_names: Vec<String>,
    pub data_types: Vec<DynSolType>,
    /// `(type)` single-element tuples, one per indexed parameter.
    pub topic_types: Vec<DynSolType>,
    pub topic_names: Vec<String>,
    pub anonymous: bool,
    data_layout: DynSolType,
}

impl EventSchema {
    /// Build the schema for one event definition.
    pub fn from_event(event: &Event) -> Result<Self, CodecError> {
        let mut data_types = Vec::new();
        let mut non_indexed_names = Vec::new();
        let mut topic_types = Vec::new();
        let mut topic_names = Vec::new();

        for (i, param) in event.inputs.iter().enumerate() {
            let ty = resolve_event_param(param)?;
            let name = if param.name.is_empty() {
                format!("arg{i}")
            } else {
                param.name.clone()
            };
            if param.indexed {
                topic_types.push(DynSolType::Tuple(vec![ty]));
                topic_names.push(name);
            } else {
                data_types.push(ty);
                non_indexed_names.push(name);
            }
        }

        let signature = event.signature();
        let data_layout = DynSolType::Tuple(data_types.clone());
        // a tuple's Display is its canonical `(t1,...,tn)` form
        let data_signature = format!("{}{}", event.name, data_layout);

        Ok(Self {
            name: event.name.clone(),
            topic: fingerprint::event_topic(&signature),
            signature,
            data_signature,
            non_indexed_names,
            data_types,
            topic_types,
            topic_names,
            anonymous: event.anonymous,
            data_layout,
        })
    }

    /// Tuple layout of the non-indexed parameters.
    pub fn data_layout(&self) -> &DynSolType {
        &self.data_layout
    }

    /// Single-element tuple layouts of the indexed parameters.
    pub fn topic_layouts(&self) -> &[DynSolType] {
        &self.topic_types
    }

    /// The declared (unwrapped) type of the `i`-th indexed parameter.
    pub fn indexed_type(&self, i: usize) -> Option<&DynSolType> {
        match self.topic_types.get(i)? {
            DynSolType::Tuple(items) => items.first(),
            other => Some(other),
        }
    }
}

/// All event schemas of one contract, keyed by topic hash, plus the
/// name → topic inverse index.
#[derive(Debug, Clone, Default)]
pub struct EventIndex {
    events: HashMap<String, EventSchema>,
    event_names: HashMap<String, String>,
}

impl EventIndex {
    /// Build schemas for every event. When two events share a name
    /// (overloads), the name index points at the last one declared.
    pub fn build(interface: &Interface) -> Result<Self, CodecError> {
        let mut index = Self::default();
        for event in interface.events() {
            let schema = EventSchema::from_event(event)?;
            index
                .event_names
                .insert(schema.name.clone(), schema.topic.clone());
            index.events.insert(schema.topic.clone(), schema);
        }
        Ok(index)
    }

    /// Schema for a topic hash (any hex case).
    pub fn by_topic(&self, topic: &str) -> Option<&EventSchema> {
        let key = fingerprint::normalize_topic(topic)?;
        self.events.get(&key)
    }

    pub fn by_name(&self, name: &str) -> Option<&EventSchema> {
        self.event_names.get(name).and_then(|t| self.events.get(t))
    }

    pub fn topic_for(&self, name: &str) -> Option<&str> {
        self.event_names.get(name).map(String::as_str)
    }

    pub fn events(&self) -> impl Iterator<Item = &EventSchema> {
        self.events.values()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABI: &str = r#"[
        {"type": "event", "name": "Transfer", "inputs": [
            {"name": "from", "type": "address", "indexed": true},
            {"name": "to", "type": "address", "indexed": true},
            {"name": "value", "type": "uint256", "indexed": false}
        ]},
        {"type": "event", "name": "Mixed", "inputs": [
            {"name": "amount", "type": "uint256", "indexed": false},
            {"name": "who", "type": "address", "indexed": true},
            {"name": "", "type": "string", "indexed": false},
            {"name": "tag", "type": "bytes32", "indexed": true}
        ]},
        {"type": "function", "name": "noop", "inputs": []}
    ]"#;

    fn index() -> EventIndex {
        EventIndex::build(&Interface::from_json(ABI).unwrap()).unwrap()
    }

    #[test]
    fn topic_uses_full_signature() {
        let idx = index();
        let transfer = idx.by_name("Transfer").unwrap();
        assert_eq!(transfer.signature, "Transfer(address,address,uint256)");
        assert_eq!(
            transfer.topic,
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
        assert_eq!(transfer.data_signature, "Transfer(uint256)");
    }

    #[test]
    fn partitions_preserve_declared_order() {
        let idx = index();
        let mixed = idx.by_name("Mixed").unwrap();
        assert_eq!(mixed.signature, "Mixed(uint256,address,string,bytes32)");
        assert_eq!(mixed.topic, fingerprint::event_topic("Mixed(uint256,address,string,bytes32)"));
        assert_eq!(mixed.data_signature, "Mixed(uint256,string)");
        assert_eq!(mixed.non_indexed_names, vec!["amount", "arg2"]);
        assert_eq!(mixed.topic_names, vec!["who", "tag"]);
        let topic_sigs: Vec<String> = mixed.topic_types.iter().map(|t| t.to_string()).collect();
        assert_eq!(topic_sigs, vec!["(address)", "(bytes32)"]);
        assert_eq!(mixed.indexed_type(1), Some(&DynSolType::FixedBytes(32)));
    }

    #[test]
    fn only_events_are_indexed() {
        let idx = index();
        assert_eq!(idx.len(), 2);
        assert!(idx.by_name("noop").is_none());
    }

    #[test]
    fn lookup_by_topic_ignores_case() {
        let idx = index();
        let upper = "0xDDF252AD1BE2C89B69C2B068FC378DAA952BA7F163C4A11628F55A4DF523B3EF";
        assert_eq!(idx.by_topic(upper).unwrap().name, "Transfer");
        assert_eq!(
            idx.topic_for("Transfer"),
            Some("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef")
        );
    }

    #[test]
    fn unresolvable_type_fails_the_build() {
        let bad = r#"[{"type": "event", "name": "Bad", "inputs": [{"name": "x", "type": "uint7"}]}]"#;
        assert!(EventIndex::build(&Interface::from_json(bad).unwrap()).is_err());
    }

    #[test]
    fn tuple_parameters_use_canonical_signature() {
        let abi = Interface::from_value(serde_json::json!([{
            "type": "event",
            "name": "Filled",
            "inputs": [
                {"name": "id", "type": "uint64", "indexed": true},
                {"name": "order", "type": "tuple", "indexed": false, "components": [
                    {"name": "maker", "type": "address"},
                    {"name": "amount", "type": "uint256"}
                ]}
            ]
        }]))
        .unwrap();
        let idx = EventIndex::build(&abi).unwrap();
        let filled = idx.by_name("Filled").unwrap();
        assert_eq!(filled.signature, "Filled(uint64,(address,uint256))");
        assert_eq!(filled.data_signature, "Filled((address,uint256))");
    }
}
