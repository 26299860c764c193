//! # chaincontract-session
//!
//! Contract sessions: a registry of ABI-described contracts bound to addresses,
//! plus deploy / call / send, remote log filters and event decoding, all served
//! by one tokio task per session.
//!
//! ## Quick start
//! ```no_run
//! # async fn example(transport: std::sync::Arc<dyn chaincontract_core::RpcTransport>) -> Result<(), chaincontract_core::SessionError> {
//! use chaincontract_core::{Interface, TxOptions};
//! use chaincontract_session::{SessionConfig, SessionHandle};
//!
//! let session = SessionHandle::spawn(SessionConfig::named("devnet"), transport);
//! let abi = Interface::from_json(r#"[{"type":"function","name":"get","inputs":[],"outputs":[{"name":"","type":"uint256"}]}]"#)?;
//! session.register("store", abi, None).await?;
//! session.bind_address("store", "0x5FbDB2315678afecb367f032d93F642f64180aa3").await?;
//! let out = session.call("store", "get", vec![], TxOptions::new()).await?;
//! assert_eq!(out.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod config;
pub mod contract;
pub mod directory;
pub mod filter;
pub mod handle;

pub use actor::Deployment;
pub use config::{ConfigError, SessionConfig, DEFAULT_SESSION};
pub use contract::{ContractEntry, ContractRegistry};
pub use directory::Sessions;
pub use filter::{FilterContext, FilterParams, FilterRegistry};
pub use handle::SessionHandle;
