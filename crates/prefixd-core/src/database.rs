//! The value published under each prefix key, and its latency trace.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::entry::PrefixEntry;

/// One timestamped milestone in a command's journey to the KV store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfEvent {
    pub node_name: String,
    pub event_descr: String,
    /// Milliseconds since the Unix epoch.
    pub unix_ts: u64,
}

/// Ordered list of perf milestones carried with an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfEvents {
    pub events: Vec<PerfEvent>,
}

impl PerfEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a milestone stamped with the current wall-clock time.
    pub fn push(&mut self, node_name: &str, event_descr: &str) {
        self.push_at(node_name, event_descr, unix_millis());
    }

    pub fn push_at(&mut self, node_name: &str, event_descr: &str, unix_ts: u64) {
        self.events.push(PerfEvent {
            node_name: node_name.to_string(),
            event_descr: event_descr.to_string(),
            unix_ts,
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Descriptions in order, mostly for assertions and logging.
    pub fn descriptions(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.event_descr.as_str()).collect()
    }

    /// Milliseconds between the first and the last milestone.
    pub fn total_duration_ms(&self) -> u64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last.unix_ts.saturating_sub(first.unix_ts),
            _ => 0,
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Published value of a per-prefix key.
///
/// A withdrawal is a terminal value with `delete_prefix` set and no entries;
/// readers treat the flag as removal whatever else the value holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixDatabase {
    pub this_node_name: String,
    pub area: String,
    pub prefix_entries: Vec<PrefixEntry>,
    pub delete_prefix: bool,
    pub perf_events: Option<PerfEvents>,
}

impl PrefixDatabase {
    /// Value advertising `entry` as the winner for its prefix.
    pub fn advertisement(node: &str, area: &str, entry: PrefixEntry) -> Self {
        Self {
            this_node_name: node.to_string(),
            area: area.to_string(),
            prefix_entries: vec![entry],
            delete_prefix: false,
            perf_events: None,
        }
    }

    /// Delete marker for a prefix this node no longer holds.
    pub fn withdrawal(node: &str, area: &str) -> Self {
        Self {
            this_node_name: node.to_string(),
            area: area.to_string(),
            prefix_entries: Vec::new(),
            delete_prefix: true,
            perf_events: None,
        }
    }

    #[must_use]
    pub fn with_perf_events(mut self, perf_events: Option<PerfEvents>) -> Self {
        self.perf_events = perf_events;
        self
    }

    /// The advertised entry, if this is not a delete marker.
    pub fn entry(&self) -> Option<&PrefixEntry> {
        if self.delete_prefix {
            return None;
        }
        self.prefix_entries.first()
    }

    /// Equality that ignores the perf trace.
    ///
    /// Two values with the same routing content are the same assertion even
    /// if they were produced by different commands.
    pub fn same_content(&self, other: &Self) -> bool {
        self.this_node_name == other.this_node_name
            && self.area == other.area
            && self.delete_prefix == other.delete_prefix
            && self.prefix_entries == other.prefix_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::PrefixType;

    fn entry(s: &str) -> PrefixEntry {
        PrefixEntry::new(s.parse().unwrap(), PrefixType::Loopback)
    }

    #[test]
    fn withdrawal_has_no_entries() {
        let db = PrefixDatabase::withdrawal("node-1", "0");
        assert!(db.delete_prefix);
        assert!(db.prefix_entries.is_empty());
        assert!(db.entry().is_none());
    }

    #[test]
    fn advertisement_exposes_entry() {
        let e = entry("10.1.1.1/32");
        let db = PrefixDatabase::advertisement("node-1", "0", e.clone());
        assert_eq!(db.entry(), Some(&e));
    }

    #[test]
    fn delete_flag_wins_over_payload() {
        let mut db = PrefixDatabase::advertisement("node-1", "0", entry("10.1.1.1/32"));
        db.delete_prefix = true;
        assert!(db.entry().is_none());
    }

    #[test]
    fn same_content_ignores_trace() {
        let mut trace = PerfEvents::new();
        trace.push_at("node-1", "PREFIX_DB_UPDATED", 10);
        let a = PrefixDatabase::advertisement("node-1", "0", entry("10.1.1.1/32"));
        let b = a.clone().with_perf_events(Some(trace));
        assert_ne!(a, b);
        assert!(a.same_content(&b));
        assert!(!a.same_content(&PrefixDatabase::withdrawal("node-1", "0")));
    }

    #[test]
    fn perf_events_ordering_and_duration() {
        let mut trace = PerfEvents::new();
        assert!(trace.is_empty());
        assert_eq!(trace.total_duration_ms(), 0);
        trace.push_at("n", "A", 100);
        trace.push_at("n", "B", 175);
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.descriptions(), vec!["A", "B"]);
        assert_eq!(trace.total_duration_ms(), 75);
    }

    #[test]
    fn push_stamps_wall_clock() {
        let mut trace = PerfEvents::new();
        trace.push("n", "A");
        assert!(trace.events[0].unix_ts > 0);
    }
}
