//! Topic filters for indexed event parameters.
//!
//! A filter's `topics` list is `[topic0, t1, ..., tk]` where each position is
//! `null` (wildcard), a single 32-byte hex word, or a list of words matched as
//! an OR-set by the node.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use chaincontract_core::CodecError;
use serde_json::{Map, Value};

use crate::fingerprint::keccak256;
use crate::schema::EventSchema;
use crate::value::{hex_string, is_word, to_dyn_value};

/// Constraint on one indexed parameter position.
#[derive(Debug, Clone, PartialEq)]
pub enum TopicQuery {
    Any,
    One(Value),
    AnyOf(Vec<Value>),
}

impl From<&Value> for TopicQuery {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => TopicQuery::Any,
            Value::Array(items) => TopicQuery::AnyOf(items.clone()),
            other => TopicQuery::One(other.clone()),
        }
    }
}

/// Indexed-parameter constraints, positional or keyed by parameter name.
#[derive(Debug, Clone, PartialEq)]
pub enum EventQuery {
    Positional(Vec<TopicQuery>),
    Named(Map<String, Value>),
}

impl Default for EventQuery {
    fn default() -> Self {
        EventQuery::Positional(vec![])
    }
}

impl EventQuery {
    /// Read a query from JSON: an array is positional, an object is named,
    /// `null` matches everything, and a bare scalar constrains position 1.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => EventQuery::default(),
            Value::Array(items) => EventQuery::Positional(items.iter().map(TopicQuery::from).collect()),
            Value::Object(map) => EventQuery::Named(map.clone()),
            other => EventQuery::Positional(vec![TopicQuery::One(other.clone())]),
        }
    }

    /// Resolve to positional form following `topic_names` order.
    pub fn positional(&self, topic_names: &[String]) -> Result<Vec<TopicQuery>, CodecError> {
        match self {
            EventQuery::Positional(items) => Ok(items.clone()),
            EventQuery::Named(map) => {
                if let Some(unknown) = map.keys().find(|k| !topic_names.contains(k)) {
                    return Err(CodecError::Encode {
                        ty: "topic".into(),
                        reason: format!("'{unknown}' is not an indexed parameter"),
                    });
                }
                Ok(topic_names
                    .iter()
                    .map(|name| map.get(name).map(TopicQuery::from).unwrap_or(TopicQuery::Any))
                    .collect())
            }
        }
    }
}

/// Encode one indexed value the way the EVM stores it in a topic.
///
/// Word-sized types are ABI-encoded in place. `string` and `bytes` are stored
/// as keccak256 of their contents, and arrays/tuples as keccak256 of their
/// padded packed encoding.
pub fn encode_topic(value: &Value, ty: &DynSolType) -> Result<String, CodecError> {
    let dyn_value = to_dyn_value(value, ty)?;
    let word = match (&dyn_value, is_word(ty)) {
        (_, true) => dyn_value.abi_encode(),
        (DynSolValue::String(s), _) => keccak256(s.as_bytes()).to_vec(),
        (DynSolValue::Bytes(b), _) => keccak256(b).to_vec(),
        _ => keccak256(&dyn_value.abi_encode_packed()).to_vec(),
    };
    Ok(hex_string(&word))
}

/// Build the `topics` list of a filter for `schema`.
///
/// With no schema (event unknown to the contract) the list places no
/// constraint on topic 0. Trailing wildcards are dropped.
pub fn build_topics(schema: Option<&EventSchema>, query: &EventQuery) -> Result<Vec<Value>, CodecError> {
    let Some(schema) = schema else {
        return Ok(vec![]);
    };

    let positions = query.positional(&schema.topic_names)?;
    if positions.len() > schema.topic_types.len() {
        return Err(CodecError::Encode {
            ty: schema.signature.clone(),
            reason: format!(
                "{} topic constraints for {} indexed parameters",
                positions.len(),
                schema.topic_types.len()
            ),
        });
    }

    let mut topics = vec![Value::from(schema.topic.clone())];
    for (i, position) in positions.iter().enumerate() {
        // indexed_type is Some for every i < topic_types.len()
        let ty = schema.indexed_type(i).ok_or_else(|| CodecError::Encode {
            ty: schema.signature.clone(),
            reason: format!("no indexed parameter at position {}", i + 1),
        })?;
        let encoded = match position {
            TopicQuery::Any => Value::Null,
            TopicQuery::One(v) => Value::from(encode_topic(v, ty)?),
            TopicQuery::AnyOf(vs) => Value::Array(
                vs.iter()
                    .map(|v| encode_topic(v, ty).map(Value::from))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };
        topics.push(encoded);
    }

    while topics.len() > 1 && topics.last().is_some_and(Value::is_null) {
        topics.pop();
    }
    Ok(topics)
}
