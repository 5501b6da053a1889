//! Sans-IO state machines for the prefix manager.
//!
//! [`table`] holds the multi-client prefix table and its command semantics.
//! [`publish`] decides when and with which version each winner reaches the
//! KV store. Nothing here performs I/O or reads a clock; callers pass `now`.

pub mod error;
pub mod publish;
pub mod table;

pub use error::TableError;
pub use publish::{ExternalUpdate, Observed, Publication, PublishedKeys, Throttle};
pub use table::{ChangeSet, ClientSet, PrefixTable};
