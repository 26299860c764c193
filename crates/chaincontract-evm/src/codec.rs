//! Method-call and constructor payloads, and return-data decoding.
//!
//! Calldata is `selector ++ abi_encode_params(args)`; constructor payloads are
//! `bytecode ++ abi_encode_params(args)` with no selector.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use chaincontract_core::{CodecError, Interface, Method};
use serde_json::Value;
use tracing::warn;

use crate::value::{to_dyn_value, to_json};

/// ABI-encode `args` as a parameter tuple of `types`.
pub fn encode_params(types: &[DynSolType], args: &[Value]) -> Result<Vec<u8>, CodecError> {
    let values = types
        .iter()
        .zip(args)
        .map(|(ty, arg)| to_dyn_value(arg, ty))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DynSolValue::Tuple(values).abi_encode_params())
}

/// Decode a parameter tuple of `types` into JSON values, in order.
pub fn decode_params(types: &[DynSolType], data: &[u8]) -> Result<Vec<Value>, CodecError> {
    if types.is_empty() {
        return Ok(vec![]);
    }
    decode_layout(&DynSolType::Tuple(types.to_vec()), data)
}

/// Decode data against a pre-built tuple layout.
pub(crate) fn decode_layout(layout: &DynSolType, data: &[u8]) -> Result<Vec<Value>, CodecError> {
    if matches!(layout, DynSolType::Tuple(items) if items.is_empty()) {
        return Ok(vec![]);
    }
    let decoded = layout
        .abi_decode_params(data)
        .map_err(|e| CodecError::Decode { reason: e.to_string() })?;
    Ok(match decoded {
        DynSolValue::Tuple(values) => values.into_iter().map(to_json).collect(),
        other => vec![to_json(other)],
    })
}

/// Calldata for one method call, with the overload it was encoded against.
#[derive(Debug, Clone)]
pub struct Call<'a> {
    pub method: &'a Method,
    pub calldata: Vec<u8>,
}

impl Call<'_> {
    /// Decode return data by this overload's declared outputs.
    pub fn decode_return(&self, data: &[u8]) -> Result<Vec<Value>, CodecError> {
        decode_params(&self.method.outputs, data)
    }
}

/// Build calldata for `method(args...)`.
///
/// Overloads are resolved by argument count.
pub fn build_call<'a>(interface: &'a Interface, method: &str, args: &[Value]) -> Result<Call<'a>, CodecError> {
    let func = interface
        .function(method, Some(args.len()))
        .ok_or_else(|| CodecError::UnknownFunction { name: method.into() })?;
    if func.inputs.len() != args.len() {
        return Err(CodecError::ArgumentCount {
            name: method.into(),
            expected: func.inputs.len(),
            got: args.len(),
        });
    }
    let mut calldata = func.selector().to_vec();
    calldata.extend_from_slice(&encode_params(&func.inputs, args)?);
    Ok(Call { method: func, calldata })
}

/// Build a deployment payload: bytecode followed by encoded constructor args.
///
/// `None` means no arguments were supplied and the bytecode is used as-is.
/// Supplied arguments must match a declared constructor's inputs exactly.
/// Without a declared constructor the bytecode is returned unchanged.
pub fn build_constructor(
    bytecode: &[u8],
    interface: &Interface,
    args: Option<&[Value]>,
) -> Result<Vec<u8>, CodecError> {
    let Some(args) = args else {
        return Ok(bytecode.to_vec());
    };
    let Some(types) = interface.constructor() else {
        if !args.is_empty() {
            warn!(args = args.len(), "constructor arguments ignored: interface declares no constructor");
        }
        return Ok(bytecode.to_vec());
    };
    if types.len() != args.len() {
        return Err(CodecError::ArgumentCount {
            name: "constructor".into(),
            expected: types.len(),
            got: args.len(),
        });
    }
    let mut payload = bytecode.to_vec();
    payload.extend_from_slice(&encode_params(types, args)?);
    Ok(payload)
}

/// Decode a method's return data by its declared outputs. `arity` picks the
/// overload the same way [`build_call`] does.
pub fn decode_return(
    interface: &Interface,
    method: &str,
    arity: usize,
    data: &[u8],
) -> Result<Vec<Value>, CodecError> {
    let func = interface
        .function(method, Some(arity))
        .ok_or_else(|| CodecError::UnknownFunction { name: method.into() })?;
    decode_params(&func.outputs, data)
}
