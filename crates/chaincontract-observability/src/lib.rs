//! # chaincontract-observability
//!
//! Structured logging for ChainContract sessions and transports, built on
//! `tracing-subscriber`.
//!
//! ```no_run
//! use chaincontract_observability::{init_tracing, LogConfig};
//!
//! init_tracing(&LogConfig::default().with_component("chaincontract-session", "debug"));
//! ```

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, try_init_tracing, LogConfig};
