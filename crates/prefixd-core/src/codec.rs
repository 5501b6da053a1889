//! Byte encoding of values stored in the KV store and the Durable Store.
//!
//! Both use postcard. The functions are generic so the node crate can reuse
//! them for its persistent snapshot without another dependency.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::database::PrefixDatabase;
use crate::error::CodecError;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(value).map_err(|e| CodecError::Serialize(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Deserialize(e.to_string()))
}

/// Encode a published per-prefix value.
pub fn encode_prefix_db(db: &PrefixDatabase) -> Result<Vec<u8>, CodecError> {
    encode(db)
}

/// Decode a published per-prefix value.
pub fn decode_prefix_db(bytes: &[u8]) -> Result<PrefixDatabase, CodecError> {
    decode(bytes)
}
