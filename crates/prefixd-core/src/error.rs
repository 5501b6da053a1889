//! Error types for the prefixd-core crate.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrefixError {
    #[error("prefix length {len} exceeds maximum {max}")]
    InvalidLength { len: u8, max: u8 },

    #[error("missing '/' in prefix: {0}")]
    MissingLength(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid prefix length: {0}")]
    InvalidLengthStr(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("key does not start with the prefix marker")]
    MissingMarker,

    #[error("malformed prefix key: {0}")]
    Malformed(String),

    #[error("invalid node name: {0}")]
    InvalidNodeName(String),

    #[error("prefix error: {0}")]
    Prefix(#[from] PrefixError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}
