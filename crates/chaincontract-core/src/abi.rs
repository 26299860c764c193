//! Parsed contract interface descriptions (standard Ethereum ABI JSON).
//!
//! The JSON model is alloy's [`JsonAbi`]. Function and constructor parameters
//! are resolved to [`DynSolType`]s once, when the interface is parsed; event
//! parameters are resolved when the event index is built. Both a bare ABI array
//! and a compiler artifact object with an `"abi"` key are accepted.

use std::collections::BTreeMap;

use alloy_dyn_abi::{DynSolType, Specifier};
use alloy_json_abi::{Event, EventParam, Function, JsonAbi, Param};
use serde_json::Value;

use crate::error::CodecError;

/// One function overload with its parameter types resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub function: Function,
    pub inputs: Vec<DynSolType>,
    pub outputs: Vec<DynSolType>,
}

impl Method {
    fn resolve(function: &Function) -> Result<Self, CodecError> {
        Ok(Self {
            inputs: resolve_params(&function.inputs)?,
            outputs: resolve_params(&function.outputs)?,
            function: function.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Canonical `name(type1,...,typeN)`.
    pub fn signature(&self) -> String {
        self.function.signature()
    }

    pub fn selector(&self) -> [u8; 4] {
        self.function.selector().0
    }
}

fn invalid_type(ty: &str, err: alloy_dyn_abi::Error) -> CodecError {
    CodecError::InvalidType {
        ty: ty.to_string(),
        reason: err.to_string(),
    }
}

/// Resolve function or constructor parameters, in declaration order.
pub fn resolve_params(params: &[Param]) -> Result<Vec<DynSolType>, CodecError> {
    params
        .iter()
        .map(|p| p.resolve().map_err(|e| invalid_type(&p.ty, e)))
        .collect()
}

/// Resolve one event parameter.
pub fn resolve_event_param(param: &EventParam) -> Result<DynSolType, CodecError> {
    param.resolve().map_err(|e| invalid_type(&param.ty, e))
}

/// A parsed interface description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interface {
    abi: JsonAbi,
    methods: BTreeMap<String, Vec<Method>>,
    constructor: Option<Vec<DynSolType>>,
}

impl Interface {
    /// Resolve every function and constructor of `abi`. Fails on the first
    /// parameter type that does not resolve.
    pub fn new(abi: JsonAbi) -> Result<Self, CodecError> {
        let mut methods: BTreeMap<String, Vec<Method>> = BTreeMap::new();
        for function in abi.functions() {
            methods
                .entry(function.name.clone())
                .or_default()
                .push(Method::resolve(function)?);
        }
        let constructor = abi
            .constructor
            .as_ref()
            .map(|c| resolve_params(&c.inputs))
            .transpose()?;
        Ok(Self { abi, methods, constructor })
    }

    /// Parse ABI JSON: either `[...]` or an artifact `{"abi": [...], ...}`.
    pub fn from_json(json: &str) -> Result<Self, CodecError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| CodecError::InvalidInterface(e.to_string()))?;
        Self::from_value(value)
    }

    /// Same as [`Interface::from_json`] for an already-parsed value.
    pub fn from_value(value: Value) -> Result<Self, CodecError> {
        let entries = match value {
            Value::Object(mut obj) => obj
                .remove("abi")
                .ok_or_else(|| CodecError::InvalidInterface("object without \"abi\" key".into()))?,
            other => other,
        };
        let Value::Array(entries) = entries else {
            return Err(CodecError::InvalidInterface(format!("expected an array of entries, got {entries}")));
        };
        let entries = entries.into_iter().map(with_legacy_defaults).collect();
        let abi: JsonAbi = serde_json::from_value(Value::Array(entries))
            .map_err(|e| CodecError::InvalidInterface(e.to_string()))?;
        Self::new(abi)
    }

    pub fn json_abi(&self) -> &JsonAbi {
        &self.abi
    }

    pub fn is_empty(&self) -> bool {
        self.abi.is_empty()
    }

    /// All function overloads, grouped by name.
    pub fn functions(&self) -> impl Iterator<Item = &Method> {
        self.methods.values().flatten()
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.abi.events()
    }

    /// Resolved constructor inputs, when a constructor is declared.
    pub fn constructor(&self) -> Option<&[DynSolType]> {
        self.constructor.as_deref()
    }

    /// Look up a function by name. With overloads, the one whose input count
    /// equals `arity` wins; otherwise the first declared.
    pub fn function(&self, name: &str, arity: Option<usize>) -> Option<&Method> {
        let overloads = self.methods.get(name)?;
        let first = overloads.first()?;
        match arity {
            Some(n) => overloads.iter().find(|m| m.inputs.len() == n).or(Some(first)),
            None => Some(first),
        }
    }
}

/// Fill the fields older compilers leave out: `type` defaults to function,
/// and empty `inputs`/`outputs`/`anonymous` may be omitted.
fn with_legacy_defaults(entry: Value) -> Value {
    let Value::Object(mut obj) = entry else {
        return entry;
    };
    let kind = obj
        .entry("type")
        .or_insert_with(|| Value::from("function"))
        .as_str()
        .map(str::to_owned)
        .unwrap_or_default();
    let mut default = |key: &str, value: Value| {
        obj.entry(key).or_insert(value);
    };
    match kind.as_str() {
        "function" => {
            default("inputs", Value::Array(vec![]));
            default("outputs", Value::Array(vec![]));
        }
        "event" => {
            default("inputs", Value::Array(vec![]));
            default("anonymous", Value::Bool(false));
        }
        "constructor" | "error" => default("inputs", Value::Array(vec![])),
        _ => {}
    }
    Value::Object(obj)
}
