//! Protocol constants shared by every prefixd crate.

/// Marker every prefix-advertisement key starts with.
///
/// Consumers enumerate all prefix keys in the KV store by this marker, which
/// keeps them distinct from adjacency and other key classes.
pub const PREFIX_DB_MARKER: &str = "prefix:";

/// Separator between the fields of a prefix key.
pub const KEY_SEPARATOR: char = ':';

/// Area used when none is configured.
pub const DEFAULT_AREA: &str = "0";

/// Well-known Durable Store key holding the persistent prefix snapshot.
pub const PERSISTENT_STORE_KEY: &str = "prefix-manager-config";

/// Maximum prefix length of an IPv4 network.
pub const IPV4_MAX_PREFIX_LEN: u8 = 32;

/// Maximum prefix length of an IPv6 network.
pub const IPV6_MAX_PREFIX_LEN: u8 = 128;

/// Trace milestone recorded when a command mutates the prefix table.
pub const EVENT_PREFIX_DB_UPDATED: &str = "PREFIX_DB_UPDATED";

/// Trace milestone recorded when a throttled flush publishes a key.
pub const EVENT_UPDATE_KVSTORE_THROTTLED: &str = "UPDATE_KVSTORE_THROTTLED";
