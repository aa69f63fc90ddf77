//! Analysis modules.
//!
//! Aggregation of daily snapshots into per-date node counts.

pub mod aggregator;

pub use aggregator::*;
