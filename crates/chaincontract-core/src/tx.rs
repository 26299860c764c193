//! Transaction options and block references, with their wire encodings.
//!
//! Numeric fields go on the wire as JSON-RPC quantities: `0x`-prefixed,
//! lowercase hex, no leading zeros (`0x0` for zero).

use serde_json::{Map, Value};

use crate::error::CodecError;

/// Encode an integer as a JSON-RPC hex quantity.
pub fn hex_quantity(n: impl Into<u128>) -> String {
    format!("{:#x}", n.into())
}

/// Read a quantity from a JSON number, a decimal string or a `0x` hex string.
pub fn parse_quantity(value: &Value) -> Option<u128> {
    match value {
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::String(s) => match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) if !hex.is_empty() => u128::from_str_radix(hex, 16).ok(),
            Some(_) => None,
            None => s.parse::<u128>().ok(),
        },
        _ => None,
    }
}

/// A block bound for filters and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRef {
    Earliest,
    Latest,
    Pending,
    Number(u64),
}

impl BlockRef {
    /// Parse a caller-supplied bound. The three literal tags pass through;
    /// anything numeric (number, decimal or hex string) becomes `Number`.
    pub fn from_value(value: &Value) -> Result<Self, CodecError> {
        if let Value::String(s) = value {
            match s.as_str() {
                "earliest" => return Ok(Self::Earliest),
                "latest" => return Ok(Self::Latest),
                "pending" => return Ok(Self::Pending),
                _ => {}
            }
        }
        parse_quantity(value)
            .and_then(|n| u64::try_from(n).ok())
            .map(Self::Number)
            .ok_or_else(|| CodecError::Encode {
                ty: "block".into(),
                reason: format!("not a block tag or number: {value}"),
            })
    }

    pub fn to_wire(self) -> Value {
        match self {
            Self::Earliest => Value::from("earliest"),
            Self::Latest => Value::from("latest"),
            Self::Pending => Value::from("pending"),
            Self::Number(n) => Value::from(hex_quantity(n)),
        }
    }
}

/// Options for an outgoing transaction or call.
///
/// Field precedence when building the wire object: raw `extra` keys win over
/// the typed fields, which are hex-encoded first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxOptions {
    pub from: Option<String>,
    pub gas: Option<u64>,
    pub gas_price: Option<u128>,
    pub value: Option<u128>,
    pub nonce: Option<u64>,
    /// Raw wire fields, copied verbatim (`"data"`, `"maxFeePerGas"`, ...).
    pub extra: Map<String, Value>,
}

impl TxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    pub fn gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn gas_price(mut self, price: u128) -> Self {
        self.gas_price = Some(price);
        self
    }

    pub fn value(mut self, wei: u128) -> Self {
        self.value = Some(wei);
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Set a raw wire field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Build options from a flat JSON map using wire key names. Numeric
    /// `gas`/`gasPrice`/`value`/`nonce` and a string `from` become typed
    /// fields; everything else is kept in `extra`.
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut opts = Self::default();
        for (key, value) in map {
            let typed = match key.as_str() {
                "from" => value.as_str().map(|s| opts.from = Some(s.to_string())).is_some(),
                "gas" => set_u64(&mut opts.gas, &value),
                "nonce" => set_u64(&mut opts.nonce, &value),
                "gasPrice" => parse_quantity(&value).map(|n| opts.gas_price = Some(n)).is_some(),
                "value" => parse_quantity(&value).map(|n| opts.value = Some(n)).is_some(),
                _ => false,
            };
            if !typed {
                opts.extra.insert(key, value);
            }
        }
        opts
    }

    /// Sender as it will appear on the wire, if any.
    pub fn sender(&self) -> Option<String> {
        match self.extra.get("from") {
            Some(Value::String(s)) => Some(s.clone()),
            _ => self.from.clone(),
        }
    }

    /// Gas limit as it will appear on the wire, if any.
    pub fn gas_limit(&self) -> Option<Value> {
        match self.extra.get("gas") {
            Some(v) if !v.is_null() => Some(v.clone()),
            _ => self.gas.map(|g| Value::from(hex_quantity(g))),
        }
    }

    /// Wire object: hex-encoded typed fields, then `extra` merged over them.
    pub fn to_wire(&self) -> Map<String, Value> {
        let mut out = Map::new();
        if let Some(from) = &self.from {
            out.insert("from".into(), Value::from(from.clone()));
        }
        if let Some(gas) = self.gas {
            out.insert("gas".into(), Value::from(hex_quantity(gas)));
        }
        if let Some(price) = self.gas_price {
            out.insert("gasPrice".into(), Value::from(hex_quantity(price)));
        }
        if let Some(value) = self.value {
            out.insert("value".into(), Value::from(hex_quantity(value)));
        }
        if let Some(nonce) = self.nonce {
            out.insert("nonce".into(), Value::from(hex_quantity(nonce)));
        }
        for (k, v) in &self.extra {
            out.insert(k.clone(), v.clone());
        }
        out
    }
}

fn set_u64(slot: &mut Option<u64>, value: &Value) -> bool {
    match parse_quantity(value).and_then(|n| u64::try_from(n).ok()) {
        Some(n) => {
            *slot = Some(n);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quantities() {
        assert_eq!(hex_quantity(0u64), "0x0");
        assert_eq!(hex_quantity(300_000u64), "0x493e0");
        assert_eq!(parse_quantity(&json!("0x493e0")), Some(300_000));
        assert_eq!(parse_quantity(&json!("300000")), Some(300_000));
        assert_eq!(parse_quantity(&json!(300000)), Some(300_000));
        assert_eq!(parse_quantity(&json!("0x")), None);
        assert_eq!(parse_quantity(&json!(true)), None);
    }

    #[test]
    fn block_refs() {
        assert_eq!(BlockRef::from_value(&json!("latest")).unwrap(), BlockRef::Latest);
        assert_eq!(BlockRef::from_value(&json!(16)).unwrap().to_wire(), json!("0x10"));
        assert_eq!(BlockRef::from_value(&json!("0x10")).unwrap(), BlockRef::Number(16));
        assert!(BlockRef::from_value(&json!("finalised")).is_err());
    }

    #[test]
    fn extra_fields_win_on_collision() {
        let opts = TxOptions::new()
            .from("0xaaaa")
            .gas(21_000)
            .value(1)
            .with("gas", "0x1");
        let wire = opts.to_wire();
        assert_eq!(wire["gas"], json!("0x1"));
        assert_eq!(wire["value"], json!("0x1"));
        assert_eq!(wire["from"], json!("0xaaaa"));
        assert_eq!(opts.gas_limit(), Some(json!("0x1")));
    }

    #[test]
    fn from_map_splits_typed_and_raw() {
        let map = json!({"from": "0xbbbb", "gas": 300000, "gasPrice": "0x3b9aca00", "maxFeePerGas": "0x1"});
        let opts = TxOptions::from_map(map.as_object().unwrap().clone());
        assert_eq!(opts.sender().as_deref(), Some("0xbbbb"));
        assert_eq!(opts.gas, Some(300_000));
        assert_eq!(opts.gas_price, Some(1_000_000_000));
        assert_eq!(opts.extra.len(), 1);
        assert!(opts.extra.contains_key("maxFeePerGas"));
    }

    #[test]
    fn absent_fields_stay_absent() {
        let opts = TxOptions::new().gas(300_000);
        assert!(opts.sender().is_none());
        assert!(!opts.to_wire().contains_key("from"));
    }
}
