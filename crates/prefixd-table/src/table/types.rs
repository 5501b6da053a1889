//! Client sets and change sets.

use std::collections::{BTreeMap, BTreeSet};

use prefixd_core::{IpPrefix, PrefixEntry, PrefixType};

/// Competing client entries for one prefix, at most one per client type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSet {
    members: BTreeMap<PrefixType, PrefixEntry>,
}

impl ClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The member whose client type ranks highest.
    #[must_use]
    pub fn winner(&self) -> Option<&PrefixEntry> {
        self.members.values().max_by_key(|e| e.prefix_type.rank())
    }

    #[must_use]
    pub fn get(&self, prefix_type: PrefixType) -> Option<&PrefixEntry> {
        self.members.get(&prefix_type)
    }

    pub fn contains(&self, prefix_type: PrefixType) -> bool {
        self.members.contains_key(&prefix_type)
    }

    /// Insert or replace the member for the entry's type.
    pub fn insert(&mut self, entry: PrefixEntry) -> Option<PrefixEntry> {
        self.members.insert(entry.prefix_type, entry)
    }

    pub fn remove(&mut self, prefix_type: PrefixType) -> Option<PrefixEntry> {
        self.members.remove(&prefix_type)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PrefixEntry> {
        self.members.values()
    }
}

/// Prefixes touched by one committed command.
///
/// `persistent` is set when any touched member, before or after the change,
/// was non-ephemeral; only then must the Durable Store be rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    prefixes: BTreeSet<IpPrefix>,
    persistent: bool,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, prefix: IpPrefix, persistent: bool) {
        self.prefixes.insert(prefix);
        self.persistent |= persistent;
    }

    pub fn merge(&mut self, other: ChangeSet) {
        self.prefixes.extend(other.prefixes);
        self.persistent |= other.persistent;
    }

    /// Whether the command changed anything at all.
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn touches_persistent(&self) -> bool {
        self.persistent
    }

    pub fn prefixes(&self) -> impl Iterator<Item = IpPrefix> + '_ {
        self.prefixes.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(p: &str, t: PrefixType) -> PrefixEntry {
        PrefixEntry::new(p.parse().unwrap(), t)
    }

    #[test]
    fn winner_is_highest_rank() {
        let mut set = ClientSet::new();
        assert!(set.winner().is_none());
        set.insert(entry("10.0.0.0/8", PrefixType::Bgp));
        set.insert(entry("10.0.0.0/8", PrefixType::Loopback));
        set.insert(entry("10.0.0.0/8", PrefixType::Default));
        assert_eq!(set.len(), 3);
        assert_eq!(set.winner().unwrap().prefix_type, PrefixType::Loopback);

        set.remove(PrefixType::Loopback);
        assert_eq!(set.winner().unwrap().prefix_type, PrefixType::Default);
    }

    #[test]
    fn insert_replaces_same_type() {
        let mut set = ClientSet::new();
        assert!(set.insert(entry("10.0.0.0/8", PrefixType::Bgp)).is_none());
        let old = set.insert(entry("10.0.0.0/8", PrefixType::Bgp).with_ephemeral(true));
        assert!(old.is_some());
        assert_eq!(set.len(), 1);
        assert!(set.get(PrefixType::Bgp).unwrap().ephemeral);
    }

    #[test]
    fn change_set_accumulates_persistence() {
        let mut cs = ChangeSet::new();
        assert!(cs.is_empty());
        cs.record("10.0.0.0/8".parse().unwrap(), false);
        assert!(!cs.touches_persistent());
        let mut other = ChangeSet::new();
        other.record("10.0.0.0/8".parse().unwrap(), true);
        other.record("10.1.0.0/16".parse().unwrap(), false);
        cs.merge(other);
        assert!(cs.touches_persistent());
        assert_eq!(cs.len(), 2);
    }
}
