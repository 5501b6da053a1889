//! Multi-client prefix table.
//!
//! Each prefix maps to the set of client entries claiming it; the entry of
//! the highest-ranked client type is the winner and the only state visible
//! outside the manager.

pub mod prefix_table;
pub mod types;

pub use prefix_table::PrefixTable;
pub use types::{ChangeSet, ClientSet};
