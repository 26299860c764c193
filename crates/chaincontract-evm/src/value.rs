//! Conversions between JSON values and alloy's dynamic ABI values.
//!
//! Input conventions:
//! - integers: JSON number, decimal string, or `0x` hex string
//! - `bytes` / `bytesN`: `0x` hex string, or plain text taken as UTF-8
//! - arrays and tuples: JSON arrays
//!
//! Output conventions: integers that fit 64 bits become JSON numbers, larger
//! ones decimal strings; addresses are EIP-55 checksummed. Byte values become
//! `0x` hex, except a `bytes32` holding printable UTF-8 text followed by zero
//! padding, which becomes that text.

use std::str::FromStr;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, Function, B256, I256, U256};
use chaincontract_core::CodecError;
use serde_json::Value;

/// Returns `true` for types an event stores verbatim in a topic word.
/// Everything else is stored as the keccak256 of its encoding.
pub fn is_word(ty: &DynSolType) -> bool {
    matches!(
        ty,
        DynSolType::Uint(_)
            | DynSolType::Int(_)
            | DynSolType::Bool
            | DynSolType::Address
            | DynSolType::FixedBytes(_)
            | DynSolType::Function
    )
}

fn encode_err(ty: &DynSolType, reason: impl Into<String>) -> CodecError {
    CodecError::Encode {
        ty: ty.to_string(),
        reason: reason.into(),
    }
}

/// Convert a JSON value into a `DynSolValue` of the given type.
pub fn to_dyn_value(value: &Value, ty: &DynSolType) -> Result<DynSolValue, CodecError> {
    match ty {
        DynSolType::Bool => value
            .as_bool()
            .map(DynSolValue::Bool)
            .ok_or_else(|| encode_err(ty, format!("expected boolean, got {value}"))),

        DynSolType::Uint(bits) => {
            let u = parse_uint(value).ok_or_else(|| encode_err(ty, format!("not an unsigned integer: {value}")))?;
            if u.bit_len() > *bits {
                return Err(encode_err(ty, format!("{u} does not fit in {bits} bits")));
            }
            Ok(DynSolValue::Uint(u, *bits))
        }

        DynSolType::Int(bits) => {
            let i = parse_int(value).ok_or_else(|| encode_err(ty, format!("not a signed integer: {value}")))?;
            if *bits < 256 {
                let limit = I256::ONE << (*bits - 1);
                if i >= limit || i < -limit {
                    return Err(encode_err(ty, format!("{i} does not fit in {bits} bits")));
                }
            }
            Ok(DynSolValue::Int(i, *bits))
        }

        DynSolType::Address => {
            let s = value
                .as_str()
                .ok_or_else(|| encode_err(ty, format!("expected address string, got {value}")))?;
            let addr = Address::from_str(s).map_err(|e| encode_err(ty, e.to_string()))?;
            Ok(DynSolValue::Address(addr))
        }

        DynSolType::FixedBytes(n) => {
            let bytes = bytes_from(value, ty)?;
            if bytes.len() > *n {
                return Err(encode_err(ty, format!("{} bytes exceed bytes{n}", bytes.len())));
            }
            Ok(DynSolValue::FixedBytes(B256::right_padding_from(&bytes), *n))
        }

        DynSolType::Bytes => Ok(DynSolValue::Bytes(bytes_from(value, ty)?)),

        DynSolType::String => value
            .as_str()
            .map(|s| DynSolValue::String(s.to_string()))
            .ok_or_else(|| encode_err(ty, format!("expected string, got {value}"))),

        DynSolType::Function => {
            let bytes = bytes_from(value, ty)?;
            if bytes.len() != 24 {
                return Err(encode_err(ty, "function reference must be 24 bytes"));
            }
            Ok(DynSolValue::Function(Function::from_slice(&bytes)))
        }

        DynSolType::Array(inner) => {
            let items = array_items(value, ty)?;
            let converted = items
                .iter()
                .map(|item| to_dyn_value(item, inner))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DynSolValue::Array(converted))
        }

        DynSolType::FixedArray(inner, len) => {
            let items = array_items(value, ty)?;
            if items.len() != *len {
                return Err(encode_err(ty, format!("expected {len} elements, got {}", items.len())));
            }
            let converted = items
                .iter()
                .map(|item| to_dyn_value(item, inner))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DynSolValue::FixedArray(converted))
        }

        DynSolType::Tuple(types) => {
            let items = array_items(value, ty)?;
            if items.len() != types.len() {
                return Err(encode_err(ty, format!("expected {} members, got {}", types.len(), items.len())));
            }
            let converted = items
                .iter()
                .zip(types)
                .map(|(item, t)| to_dyn_value(item, t))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(DynSolValue::Tuple(converted))
        }
    }
}

/// Convert a decoded `DynSolValue` into its JSON form.
pub fn to_json(value: DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(b),
        DynSolValue::Uint(u, _) => match u64::try_from(u) {
            Ok(small) => Value::from(small),
            Err(_) => Value::from(u.to_string()),
        },
        DynSolValue::Int(i, _) => match i64::try_from(i) {
            Ok(small) => Value::from(small),
            Err(_) => Value::from(i.to_string()),
        },
        DynSolValue::FixedBytes(word, 32) => match padded_text(&word[..]) {
            Some(text) => Value::from(text),
            None => Value::from(hex_string(&word[..])),
        },
        DynSolValue::FixedBytes(word, size) => Value::from(hex_string(&word[..size])),
        DynSolValue::Address(a) => Value::from(a.to_checksum(None)),
        DynSolValue::Function(f) => Value::from(hex_string(f.as_slice())),
        DynSolValue::Bytes(b) => Value::from(hex_string(&b)),
        DynSolValue::String(s) => Value::from(s),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.into_iter().map(to_json).collect())
        }
    }
}

/// Text of a right-padded word: printable UTF-8 followed only by zero bytes.
fn padded_text(word: &[u8]) -> Option<&str> {
    let end = word.iter().rposition(|b| *b != 0)? + 1;
    let text = std::str::from_utf8(&word[..end]).ok()?;
    (!text.chars().any(char::is_control)).then_some(text)
}

pub fn hex_string(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a `0x`-prefixed (or bare) hex string.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, CodecError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    Ok(hex::decode(digits)?)
}

fn parse_uint(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => n.as_u64().map(U256::from),
        // ruint parses decimal, and hex with a 0x prefix
        Value::String(s) => U256::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn parse_int(value: &Value) -> Option<I256> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|i| I256::try_from(i).ok()),
        Value::String(s) => {
            let s = s.trim();
            if s.starts_with("0x") || s.starts_with("-0x") {
                I256::from_hex_str(s).ok()
            } else {
                I256::from_dec_str(s).ok()
            }
        }
        _ => None,
    }
}

fn bytes_from(value: &Value, ty: &DynSolType) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::String(s) if s.starts_with("0x") => decode_hex(s),
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Array(items) => items
            .iter()
            .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| encode_err(ty, "byte arrays must hold integers 0..=255")),
        other => Err(encode_err(ty, format!("expected hex string, got {other}"))),
    }
}

fn array_items<'a>(value: &'a Value, ty: &DynSolType) -> Result<&'a Vec<Value>, CodecError> {
    value
        .as_array()
        .ok_or_else(|| encode_err(ty, format!("expected JSON array, got {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn roundtrip(value: Value, ty: &str) -> Value {
        let ty: DynSolType = ty.parse().unwrap();
        let encoded = DynSolValue::Tuple(vec![to_dyn_value(&value, &ty).unwrap()]).abi_encode_params();
        let decoded = DynSolType::Tuple(vec![ty])
            .abi_decode_params(&encoded)
            .unwrap();
        match to_json(decoded) {
            Value::Array(mut items) => items.remove(0),
            other => panic!("expected tuple, got {other}"),
        }
    }

    #[test]
    fn uint_roundtrip() {
        assert_eq!(roundtrip(json!(42), "uint256"), json!(42));
        assert_eq!(roundtrip(json!("0x2a"), "uint8"), json!(42));
        let big = "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        assert_eq!(roundtrip(json!(big), "uint256"), json!(big));
    }

    #[test]
    fn int_roundtrip() {
        assert_eq!(roundtrip(json!(-5), "int24"), json!(-5));
        assert_eq!(roundtrip(json!("-170141183460469231731687303715884105728"), "int256"),
            json!("-170141183460469231731687303715884105728"));
    }

    #[test]
    fn bytes32_roundtrip() {
        let word = format!("0x{}", "ab".repeat(32));
        assert_eq!(roundtrip(json!(word.clone()), "bytes32"), json!(word));
        // Text input is right-padded and comes back as text.
        assert_eq!(roundtrip(json!("Hello"), "bytes32"), json!("Hello"));
        let padded_hex = format!("0x48656c6c6f{}", "00".repeat(27));
        assert_eq!(roundtrip(json!(padded_hex), "bytes32"), json!("Hello"));
    }

    #[test]
    fn bytes32_without_text_stays_hex() {
        let zero = format!("0x{}", "00".repeat(32));
        assert_eq!(roundtrip(json!(zero.clone()), "bytes32"), json!(zero));
        let control = format!("0x0148{}", "00".repeat(30));
        assert_eq!(roundtrip(json!(control.clone()), "bytes32"), json!(control));
        // shorter fixed sizes are always hex
        assert_eq!(roundtrip(json!("0x4869"), "bytes2"), json!("0x4869"));
    }

    #[test]
    fn word_types() {
        assert!(is_word(&DynSolType::Address));
        assert!(is_word(&DynSolType::FixedBytes(32)));
        assert!(!is_word(&DynSolType::String));
        assert!(!is_word(&DynSolType::Array(Box::new(DynSolType::Bool))));
    }

    #[test]
    fn dynamic_bytes_and_string_roundtrip() {
        assert_eq!(roundtrip(json!("0xdeadbeef"), "bytes"), json!("0xdeadbeef"));
        assert_eq!(roundtrip(json!("hello world"), "string"), json!("hello world"));
    }

    #[test]
    fn address_roundtrip_is_checksummed() {
        let lower = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";
        assert_eq!(
            roundtrip(json!(lower), "address"),
            json!("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045")
        );
    }

    #[test]
    fn arrays_and_tuples_roundtrip() {
        assert_eq!(roundtrip(json!([1, 2, 3]), "uint16[]"), json!([1, 2, 3]));
        assert_eq!(roundtrip(json!([true, false]), "bool[2]"), json!([true, false]));
        assert_eq!(
            roundtrip(json!([7, "gm", ["0x01", "0x0203"]]), "(uint8,string,bytes[])"),
            json!([7, "gm", ["0x01", "0x0203"]])
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let ty: DynSolType = "uint8".parse().unwrap();
        assert!(to_dyn_value(&json!(256), &ty).is_err());
        let ty: DynSolType = "int8".parse().unwrap();
        assert!(to_dyn_value(&json!(-129), &ty).is_err());
        assert!(to_dyn_value(&json!(-128), &ty).is_ok());
        let ty: DynSolType = "bytes2".parse().unwrap();
        assert!(to_dyn_value(&json!("0x010203"), &ty).is_err());
    }

    #[test]
    fn fixed_array_length_is_checked() {
        let ty: DynSolType = "uint8[2]".parse().unwrap();
        assert!(to_dyn_value(&json!([1, 2, 3]), &ty).is_err());
    }
}
