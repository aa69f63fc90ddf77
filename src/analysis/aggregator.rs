//! Daily metric aggregation.
//!
//! This module turns the snapshot directories of a history tree into
//! date-keyed node counts, both by category and by address family.

use crate::history::{self, HistoryScanner, SnapshotDir};
use crate::models::{
    IpHistory, IpVersionCounts, NetworkHistory, NodeCategory, TypeCounts, TypeHistory,
};
use anyhow::Result;
use std::collections::HashSet;
use tracing::info;

/// Count the nodes of each category for every snapshot.
///
/// Prints one progress line per processed date.
pub fn collect_type_counts(scanner: &HistoryScanner) -> Result<TypeHistory> {
    let mut history = TypeHistory::new();

    for snapshot in scanner.snapshots() {
        let counts = snapshot_type_counts(&snapshot)?;

        println!(
            "{}: Relay={}, Exit={}, Guard={}, All={}",
            snapshot.name(),
            counts.relay,
            counts.exit,
            counts.guard,
            counts.all
        );

        history.insert(snapshot.date, counts);
    }

    Ok(history)
}

/// Count unique nodes by address family for every snapshot.
///
/// Prints one progress line per processed date.
pub fn collect_ip_version_counts(scanner: &HistoryScanner) -> Result<IpHistory> {
    let mut history = IpHistory::new();

    for snapshot in scanner.snapshots() {
        let counts = snapshot_ip_version_counts(&snapshot)?;

        println!(
            "{}: IPv4={}, IPv6={}, Total={}",
            snapshot.name(),
            counts.ipv4,
            counts.ipv6,
            counts.total()
        );

        history.insert(snapshot.date, counts);
    }

    Ok(history)
}

/// Run both aggregation passes over a history tree.
pub fn collect_history(scanner: &HistoryScanner) -> Result<NetworkHistory> {
    info!("Reading snapshots from {}", scanner.root().display());

    println!("Collecting Tor network data...\n");
    let node_types = collect_type_counts(scanner)?;
    println!("\nTotal days tracked: {}", node_types.len());

    println!("\nCollecting IPv4/IPv6 data...\n");
    let ip_versions = collect_ip_version_counts(scanner)?;
    println!("\nTotal days tracked for IPv4/IPv6: {}", ip_versions.len());

    Ok(NetworkHistory {
        node_types,
        ip_versions,
    })
}

/// Per-category line counts for one snapshot.
pub fn snapshot_type_counts(snapshot: &SnapshotDir) -> Result<TypeCounts> {
    let relay = history::count_nodes(&snapshot.node_file(NodeCategory::Relay))?;
    let exit = history::count_nodes(&snapshot.node_file(NodeCategory::Exit))?;
    let guard = history::count_nodes(&snapshot.node_file(NodeCategory::Guard))?;

    Ok(TypeCounts::new(relay, exit, guard))
}

/// Address-family split of the union of all categories for one snapshot.
pub fn snapshot_ip_version_counts(snapshot: &SnapshotDir) -> Result<IpVersionCounts> {
    let mut nodes: HashSet<String> = HashSet::new();

    for category in NodeCategory::ALL {
        nodes.extend(history::read_node_set(&snapshot.node_file(category))?);
    }

    Ok(IpVersionCounts::from_nodes(&nodes))
}
