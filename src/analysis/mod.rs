//! Analysis modules.
//!
//! Averages per-run Lighthouse reports into summary records.

pub mod aggregator;

pub use aggregator::*;
