//! Deterministic per-prefix KV store key naming.
//!
//! Format: `prefix:<node>:<area>:[<cidr>]`. The CIDR is bracketed because
//! IPv6 addresses contain the field separator.

use core::fmt;
use core::str::FromStr;

use crate::constants::{KEY_SEPARATOR, PREFIX_DB_MARKER};
use crate::error::KeyError;
use crate::types::IpPrefix;

/// Validated `(node, area)` pair that names every key this node owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyScope {
    node: String,
    area: String,
}

impl KeyScope {
    /// Node and area names must be non-empty and free of `:`.
    pub fn new(node: impl Into<String>, area: impl Into<String>) -> Result<Self, KeyError> {
        let node = node.into();
        let area = area.into();
        validate_component(&node)?;
        validate_component(&area)?;
        Ok(Self { node, area })
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn area(&self) -> &str {
        &self.area
    }

    /// Key of `prefix` within this scope.
    pub fn key(&self, prefix: IpPrefix) -> PrefixKey {
        PrefixKey {
            scope: self.clone(),
            prefix,
        }
    }

    /// Key prefix shared by every key this node publishes, in any area.
    pub fn node_marker(&self) -> String {
        format!("{PREFIX_DB_MARKER}{}{KEY_SEPARATOR}", self.node)
    }

    /// Prefix named by `key` if the key belongs to this node and area.
    pub fn owned_prefix(&self, key: &str) -> Option<IpPrefix> {
        if !key.starts_with(&self.node_marker()) {
            return None;
        }
        PrefixKey::parse(key)
            .ok()
            .filter(|k| k.scope == *self)
            .map(|k| k.prefix)
    }
}

/// Address of one prefix advertisement in the KV store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrefixKey {
    scope: KeyScope,
    prefix: IpPrefix,
}

impl PrefixKey {
    pub fn new(
        node: impl Into<String>,
        area: impl Into<String>,
        prefix: IpPrefix,
    ) -> Result<Self, KeyError> {
        Ok(KeyScope::new(node, area)?.key(prefix))
    }

    pub fn node(&self) -> &str {
        self.scope.node()
    }

    pub fn area(&self) -> &str {
        self.scope.area()
    }

    pub fn scope(&self) -> &KeyScope {
        &self.scope
    }

    pub fn prefix(&self) -> IpPrefix {
        self.prefix
    }

    /// Parse a key string back into its components.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let rest = key
            .strip_prefix(PREFIX_DB_MARKER)
            .ok_or(KeyError::MissingMarker)?;
        let (node, rest) = rest
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| KeyError::Malformed(format!("missing area in {key}")))?;
        let (area, rest) = rest
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| KeyError::Malformed(format!("missing prefix in {key}")))?;
        let cidr = rest
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .ok_or_else(|| KeyError::Malformed(format!("unbracketed prefix in {key}")))?;
        let prefix: IpPrefix = cidr.parse()?;
        Self::new(node, area, prefix)
    }
}

fn validate_component(s: &str) -> Result<(), KeyError> {
    if s.is_empty() || s.contains(KEY_SEPARATOR) {
        return Err(KeyError::InvalidNodeName(s.to_string()));
    }
    Ok(())
}

impl fmt::Display for PrefixKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX_DB_MARKER}{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}[{}]",
            self.scope.node, self.scope.area, self.prefix
        )
    }
}

impl FromStr for PrefixKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    #[test]
    fn key_format_ipv4() {
        let key = PrefixKey::new("node-1", "0", prefix("10.1.1.1/32")).unwrap();
        assert_eq!(key.to_string(), "prefix:node-1:0:[10.1.1.1/32]");
    }

    #[test]
    fn key_format_ipv6() {
        let key = PrefixKey::new("node-1", "0", prefix("ffff:10:1:5::/64")).unwrap();
        assert_eq!(key.to_string(), "prefix:node-1:0:[ffff:10:1:5::/64]");
        let parsed = PrefixKey::parse(&key.to_string()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn key_starts_with_node_marker() {
        let scope = KeyScope::new("node-1", "spine").unwrap();
        let key = scope.key(prefix("10.0.0.0/8"));
        assert!(key.to_string().starts_with(&scope.node_marker()));
        let other = KeyScope::new("node-10", "spine").unwrap();
        assert!(!key.to_string().starts_with(&other.node_marker()));
    }

    #[test]
    fn owned_prefix_filters_node_and_area() {
        let scope = KeyScope::new("node-1", "0").unwrap();
        let p = prefix("10.1.0.0/16");
        assert_eq!(scope.owned_prefix(&scope.key(p).to_string()), Some(p));
        assert_eq!(scope.owned_prefix("prefix:node-2:0:[10.1.0.0/16]"), None);
        assert_eq!(scope.owned_prefix("prefix:node-1:1:[10.1.0.0/16]"), None);
        assert_eq!(scope.owned_prefix("prefix:node-1:0:garbage"), None);
        assert_eq!(scope.owned_prefix("adj:node-1"), None);
    }

    #[test]
    fn distinct_prefixes_distinct_keys() {
        let a = PrefixKey::new("n", "0", prefix("10.0.0.0/8")).unwrap();
        let b = PrefixKey::new("n", "0", prefix("10.0.0.0/16")).unwrap();
        let c = PrefixKey::new("n", "1", prefix("10.0.0.0/8")).unwrap();
        assert_ne!(a.to_string(), b.to_string());
        assert_ne!(a.to_string(), c.to_string());
    }

    #[test]
    fn rejects_invalid_components() {
        assert!(matches!(
            PrefixKey::new("", "0", prefix("10.0.0.0/8")),
            Err(KeyError::InvalidNodeName(_))
        ));
        assert!(PrefixKey::new("a:b", "0", prefix("10.0.0.0/8")).is_err());
        assert!(PrefixKey::new("node", "", prefix("10.0.0.0/8")).is_err());
    }

    #[test]
    fn parse_failures() {
        assert_eq!(PrefixKey::parse("adj:node-1"), Err(KeyError::MissingMarker));
        assert!(matches!(
            PrefixKey::parse("prefix:node-1"),
            Err(KeyError::Malformed(_))
        ));
        assert!(matches!(
            PrefixKey::parse("prefix:node-1:0:10.0.0.0/8"),
            Err(KeyError::Malformed(_))
        ));
        assert!(matches!(
            PrefixKey::parse("prefix:node-1:0:[10.0.0.0]"),
            Err(KeyError::Prefix(_))
        ));
    }
}
