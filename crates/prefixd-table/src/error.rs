//! Table error types.

use prefixd_core::{IpPrefix, PrefixType};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("no {prefix_type} entry for {prefix}")]
    NotFound {
        prefix: IpPrefix,
        prefix_type: PrefixType,
    },
}
