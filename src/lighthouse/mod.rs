//! Lighthouse CLI integration.
//!
//! This module finds the Lighthouse executable and drives it over a batch
//! of sites.

pub mod locator;
pub mod runner;

pub use locator::{LighthouseCli, LighthouseLocator};
pub use runner::{BatchRunner, RunnerConfig};
