//! # chaincontract-core
//!
//! Shared building blocks for ChainContract: the parsed ABI interface model
//! over alloy's JSON ABI, transaction options, the JSON-RPC transport trait
//! with its typed `eth_*` client, and the error taxonomy every other crate
//! reports through.

pub mod abi;
pub mod error;
pub mod eth;
pub mod request;
pub mod transport;
pub mod tx;
pub mod validate;

pub use abi::{Interface, Method};
pub use error::{CodecError, SessionError, TransportError};
pub use eth::{EthClient, TransportOptions};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::RpcTransport;
pub use tx::{hex_quantity, parse_quantity, BlockRef, TxOptions};
