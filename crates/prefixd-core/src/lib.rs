//! Core types, constants, and published-value formats for prefixd.
//!
//! This crate defines the prefix and client-type model, the deterministic
//! per-prefix key naming used in the distributed KV store, and the value that
//! is published under each key.

pub mod codec;
pub mod constants;
pub mod database;
pub mod entry;
pub mod error;
pub mod key;
pub mod types;

pub use database::{PerfEvent, PerfEvents, PrefixDatabase};
pub use entry::{ForwardingAlgorithm, ForwardingType, PrefixEntry, PrefixType};
pub use error::{CodecError, KeyError, PrefixError};
pub use key::{KeyScope, PrefixKey};
pub use types::IpPrefix;
