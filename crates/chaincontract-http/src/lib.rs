//! # chaincontract-http
//!
//! `reqwest`-based [`RpcTransport`](chaincontract_core::RpcTransport) with
//! retry and JSON-RPC batching.

pub mod client;
pub mod retry;

pub use client::{HttpClientConfig, HttpRpcClient};
pub use retry::{RetryConfig, RetryPolicy};
