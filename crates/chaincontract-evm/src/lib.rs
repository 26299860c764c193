//! # chaincontract-evm
//!
//! EVM-side codec for ChainContract sessions.
//!
//! ## Implementation notes
//! - Uses `alloy-dyn-abi` for the scalar ABI encode/decode, over parameter
//!   types resolved from `alloy-json-abi` at registration
//! - Topics[0] → keccak256 of the full event signature
//! - Topics[1..] → indexed parameters, each a 32-byte word (reference types hashed)
//! - `data` → non-indexed parameters as one ABI-encoded tuple

pub mod codec;
pub mod fingerprint;
pub mod logs;
pub mod schema;
pub mod topics;
pub mod value;

pub use codec::{build_call, Call, build_constructor, decode_params, decode_return, encode_params};
pub use logs::{augment_logs, augment_receipt, normalize_log_integers, replace_by_topic, replace_with_schema, SchemaLookup};
pub use schema::{EventIndex, EventSchema};
pub use topics::{build_topics, encode_topic, EventQuery, TopicQuery};
