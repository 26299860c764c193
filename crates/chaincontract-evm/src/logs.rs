//! Event-log reconstruction.
//!
//! Two modes:
//! - *replace*: the decoded record overwrites the log's `data` field; logs that
//!   match no schema get an empty record. Used for filter polling and `eth_getLogs`.
//! - *augment*: every log keeps its wire fields as-is (hex quantities included),
//!   and those whose topic 0 matches a known schema gain a `decoded` object.
//!   Used for transaction receipts.

use chaincontract_core::{parse_quantity, CodecError};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::codec::decode_layout;
use crate::schema::{EventIndex, EventSchema};
use crate::value::{decode_hex, hex_string, is_word};

/// Wire fields carried as hex quantities that are returned as integers.
const INTEGER_FIELDS: [&str; 3] = ["blockNumber", "logIndex", "transactionIndex"];

/// Source of event schemas for a log, by emitting address and topic hash.
pub trait SchemaLookup {
    fn schema_for(&self, address: Option<&str>, topic: &str) -> Option<&EventSchema>;
}

impl SchemaLookup for EventIndex {
    fn schema_for(&self, _address: Option<&str>, topic: &str) -> Option<&EventSchema> {
        self.by_topic(topic)
    }
}

/// Rewrite `blockNumber`, `logIndex` and `transactionIndex` as JSON integers.
pub fn normalize_log_integers(log: &mut Map<String, Value>) {
    for field in INTEGER_FIELDS {
        if let Some(v) = log.get_mut(field) {
            if let Some(n) = parse_quantity(v).and_then(|n| u64::try_from(n).ok()) {
                *v = Value::from(n);
            }
        }
    }
}

fn topics_of(log: &Map<String, Value>) -> Vec<&str> {
    log.get("topics")
        .and_then(Value::as_array)
        .map(|ts| ts.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// Decode one log's `data` and indexed topics against `schema` into a single
/// name → value record.
pub fn reconstruct(log: &Map<String, Value>, schema: &EventSchema) -> Result<Map<String, Value>, CodecError> {
    let data = match log.get("data").and_then(Value::as_str) {
        Some(hex) => decode_hex(hex)?,
        None => vec![],
    };
    let values = decode_layout(schema.data_layout(), &data)?;

    let mut record: Map<String, Value> = schema.non_indexed_names.iter().cloned().zip(values).collect();

    let topics = topics_of(log);
    if topics.len() > 1 {
        for (i, (topic, name)) in topics[1..].iter().zip(&schema.topic_names).enumerate() {
            let word = decode_hex(topic)?;
            let value = match schema.indexed_type(i) {
                // reference types are stored as their hash
                Some(ty) if !is_word(ty) => Value::from(hex_string(&word)),
                _ => {
                    let layout = &schema.topic_layouts()[i];
                    decode_layout(layout, &word)?.into_iter().next().unwrap_or(Value::Null)
                }
            };
            record.insert(name.clone(), value);
        }
    }
    Ok(record)
}

fn decode_or_empty(log: &Map<String, Value>, schema: Option<&EventSchema>) -> Map<String, Value> {
    let Some(schema) = schema else {
        return Map::new();
    };
    reconstruct(log, schema).unwrap_or_else(|e| {
        warn!(event = %schema.signature, error = %e, "log does not decode against its schema");
        Map::new()
    })
}

/// Replace-mode decode with a known (or absent) schema: the filter-polling path,
/// where the event was fixed when the filter was installed.
pub fn replace_with_schema(logs: Vec<Value>, schema: Option<&EventSchema>) -> Vec<Value> {
    logs.into_iter()
        .map(|log| match log {
            Value::Object(mut log) => {
                let record = decode_or_empty(&log, schema);
                log.insert("data".into(), Value::Object(record));
                normalize_log_integers(&mut log);
                Value::Object(log)
            }
            other => other,
        })
        .collect()
}

/// Replace-mode decode where each log picks its own schema: the first topic in
/// its list that the lookup recognizes.
pub fn replace_by_topic(logs: Vec<Value>, lookup: &impl SchemaLookup) -> Vec<Value> {
    logs.into_iter()
        .map(|log| match log {
            Value::Object(mut log) => {
                let address = log.get("address").and_then(Value::as_str);
                let schema = topics_of(&log)
                    .into_iter()
                    .find_map(|t| lookup.schema_for(address, t));
                let record = decode_or_empty(&log, schema);
                log.insert("data".into(), Value::Object(record));
                normalize_log_integers(&mut log);
                Value::Object(log)
            }
            other => other,
        })
        .collect()
}

/// Augment-mode decode: logs whose topic 0 is recognized gain
/// `decoded: {event, signature, args}`. No other field of any log changes.
pub fn augment_logs(logs: Vec<Value>, lookup: &impl SchemaLookup) -> Vec<Value> {
    logs.into_iter()
        .map(|log| {
            let Value::Object(mut log) = log else {
                return log;
            };
            let address = log.get("address").and_then(Value::as_str);
            let Some(schema) = topics_of(&log).first().and_then(|t| lookup.schema_for(address, t)) else {
                return Value::Object(log);
            };
            match reconstruct(&log, schema) {
                Ok(args) => {
                    let decoded = json!({
                        "event": schema.name,
                        "signature": schema.signature,
                        "args": args,
                    });
                    log.insert("decoded".into(), decoded);
                }
                Err(e) => warn!(event = %schema.signature, error = %e, "receipt log left undecoded"),
            }
            Value::Object(log)
        })
        .collect()
}

/// Augment every log of a receipt in place.
pub fn augment_receipt(receipt: &mut Value, lookup: &impl SchemaLookup) {
    if let Some(logs) = receipt.get_mut("logs") {
        let taken = std::mem::take(logs);
        *logs = match taken {
            Value::Array(items) => Value::Array(augment_logs(items, lookup)),
            other => other,
        };
    }
}
