//! Chart rendering.
//!
//! This module draws the network history charts from aggregated
//! daily counts.

pub mod chart;

pub use chart::*;
