//! Data models for the network statistics pipeline.
//!
//! This module contains the node categories read from each daily snapshot
//! and the per-date records the aggregator produces and the chart consumes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category of a node-list file within a daily snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Middle relays
    Relay,
    /// Exit relays
    Exit,
    /// Guard (entry) relays
    Guard,
}

impl NodeCategory {
    /// Every category, in the order the snapshot files are read.
    pub const ALL: [NodeCategory; 3] = [
        NodeCategory::Relay,
        NodeCategory::Exit,
        NodeCategory::Guard,
    ];

    /// Name of the node-list file holding this category.
    pub fn file_name(&self) -> &'static str {
        match self {
            NodeCategory::Relay => "relay-nodes.txt",
            NodeCategory::Exit => "exit-nodes.txt",
            NodeCategory::Guard => "guard-nodes.txt",
        }
    }
}

/// Address family of a node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Classify an identifier. Anything containing a colon is IPv6; the
    /// identifier is not validated as an address.
    pub fn classify(node: &str) -> Self {
        if node.contains(':') {
            IpVersion::V6
        } else {
            IpVersion::V4
        }
    }
}

/// Node counts per category for a single day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    pub relay: usize,
    pub exit: usize,
    pub guard: usize,
    /// Sum of the three categories.
    pub all: usize,
}

impl TypeCounts {
    pub fn new(relay: usize, exit: usize, guard: usize) -> Self {
        Self {
            relay,
            exit,
            guard,
            all: relay + exit + guard,
        }
    }
}

/// Unique node counts split by address family for a single day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpVersionCounts {
    pub ipv4: usize,
    pub ipv6: usize,
}

impl IpVersionCounts {
    /// Tally already-deduplicated identifiers.
    pub fn from_nodes<'a, I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut counts = Self::default();

        for node in nodes {
            match IpVersion::classify(node) {
                IpVersion::V4 => counts.ipv4 += 1,
                IpVersion::V6 => counts.ipv6 += 1,
            }
        }

        counts
    }

    pub fn total(&self) -> usize {
        self.ipv4 + self.ipv6
    }
}

/// Date-ordered records, one per snapshot day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyHistory<T> {
    entries: BTreeMap<NaiveDate, T>,
}

impl<T> Default for DailyHistory<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> DailyHistory<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the metrics for a date, replacing any earlier record.
    pub fn insert(&mut self, date: NaiveDate, record: T) {
        self.entries.insert(date, record);
    }

    #[allow(dead_code)] // Lookup without a default, used by tests
    pub fn get(&self, date: &NaiveDate) -> Option<&T> {
        self.entries.get(date)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dates in ascending order.
    #[allow(dead_code)] // Utility for date-only iteration
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &T)> {
        self.entries.iter()
    }
}

impl<T: Copy + Default> DailyHistory<T> {
    /// Record for a date, or the all-zero record when the date is absent.
    pub fn get_or_default(&self, date: &NaiveDate) -> T {
        self.entries.get(date).copied().unwrap_or_default()
    }
}

/// Node counts by category, keyed by snapshot date.
pub type TypeHistory = DailyHistory<TypeCounts>;

/// Node counts by address family, keyed by snapshot date.
pub type IpHistory = DailyHistory<IpVersionCounts>;

/// Both aggregated histories, as dumped to JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkHistory {
    pub node_types: TypeHistory,
    pub ip_versions: IpHistory,
}
