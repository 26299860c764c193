//! Error types for the ChainContract session pipeline.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors raised while resolving ABI types or converting values to and from
/// their ABI encoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid ABI type '{ty}': {reason}")]
    InvalidType { ty: String, reason: String },

    #[error("Invalid ABI JSON: {0}")]
    InvalidInterface(String),

    #[error("Cannot encode value for '{ty}': {reason}")]
    Encode { ty: String, reason: String },

    #[error("ABI decode failed: {reason}")]
    Decode { reason: String },

    #[error("Function '{name}' not found in interface")]
    UnknownFunction { name: String },

    #[error("Argument count mismatch for '{name}': declared {expected}, got {got}")]
    ArgumentCount {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, bad status, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The node answered with a shape this client does not understand.
    #[error("Unexpected response to {method}: {reason}")]
    UnexpectedResponse { method: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }

    /// Returns `true` if this is a node-side execution error.
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}

/// Errors returned by session operations.
///
/// The four `Missing*` variants are local precondition failures; they are
/// checked before any network I/O and carry a stable tag (see [`SessionError::tag`]).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("missing_sender: no `from` address supplied or configured")]
    MissingSender,

    #[error("missing_gas: no gas limit supplied")]
    MissingGas,

    #[error("missing_binary: no bytecode supplied or registered")]
    MissingBinary,

    #[error("missing_address: contract has no bound address")]
    MissingAddress,

    #[error("missing_interface: no ABI supplied for contract '{contract}'")]
    MissingInterface { contract: String },

    #[error("Constructor expects {expected} argument(s), got {got}")]
    ConstructorArity { expected: usize, got: usize },

    #[error("Contract '{contract}' is not registered")]
    UnknownContract { contract: String },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("No receipt for transaction {tx_hash} after {attempts} attempt(s)")]
    ReceiptUnavailable { tx_hash: String, attempts: u32 },

    #[error("Deployment transaction {tx_hash} reverted")]
    DeployReverted { tx_hash: String },

    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Session '{session}' is closed")]
    Closed { session: String },
}

impl SessionError {
    /// Short machine-readable tag for the error.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MissingSender => "missing_sender",
            Self::MissingGas => "missing_gas",
            Self::MissingBinary => "missing_binary",
            Self::MissingAddress => "missing_address",
            Self::MissingInterface { .. } => "missing_interface",
            Self::ConstructorArity { .. } => "constructor_arity",
            Self::UnknownContract { .. } => "unknown_contract",
            Self::Codec(_) => "codec",
            Self::Transport(_) => "transport",
            Self::ReceiptUnavailable { .. } => "receipt_unavailable",
            Self::DeployReverted { .. } => "deploy_reverted",
            Self::Timeout { .. } => "timeout",
            Self::Closed { .. } => "closed",
        }
    }

    /// Returns `true` for failures detected locally, before any RPC was issued.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingSender
                | Self::MissingGas
                | Self::MissingBinary
                | Self::MissingAddress
                | Self::MissingInterface { .. }
                | Self::ConstructorArity { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_stable() {
        assert_eq!(SessionError::MissingSender.tag(), "missing_sender");
        assert_eq!(SessionError::MissingGas.tag(), "missing_gas");
        assert_eq!(SessionError::MissingBinary.tag(), "missing_binary");
        assert_eq!(SessionError::MissingAddress.tag(), "missing_address");
        assert_eq!(SessionError::Timeout { ms: 10 }.tag(), "timeout");
    }

    #[test]
    fn transport_errors_pass_through() {
        let err: SessionError = TransportError::Rpc(JsonRpcError {
            code: -32000,
            message: "execution reverted".into(),
            data: None,
        })
        .into();
        assert_eq!(err.tag(), "transport");
        assert!(!err.is_precondition());
        assert!(err.to_string().contains("execution reverted"));
    }

    #[test]
    fn http_errors_are_retryable() {
        assert!(TransportError::Http("connection reset".into()).is_retryable());
        assert!(!TransportError::Other("boom".into()).is_retryable());
    }
}
