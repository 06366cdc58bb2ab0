//! Data models for the batch runner.
//!
//! This module contains the core data structures shared by the runner,
//! the aggregator and the report generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix Lighthouse gives JSON reports.
pub const JSON_EXT: &str = ".report.json";

/// Suffix Lighthouse gives HTML reports.
pub const HTML_EXT: &str = ".report.html";

/// A site to audit, normalized from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    /// Normalized URL passed to Lighthouse.
    pub url: String,
    /// Filesystem-safe name derived from the URL.
    pub name: String,
    /// JSON report filename (`<name>.report.json`).
    pub json_file: String,
    /// HTML report filename, when HTML output was requested.
    pub html_file: Option<String>,
}

/// How averaged values are scaled before they are written.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ScalePolicy {
    /// Scores as percentages (x100), timings in seconds (/1000).
    #[default]
    Percent,
    /// Values exactly as Lighthouse reports them.
    Raw,
}

impl ScalePolicy {
    /// Scale a 0-1 category score.
    pub fn score(&self, value: f64) -> f64 {
        match self {
            ScalePolicy::Percent => value * 100.0,
            ScalePolicy::Raw => value,
        }
    }

    /// Scale a timing in milliseconds.
    pub fn timing(&self, value: f64) -> f64 {
        match self {
            ScalePolicy::Percent => value / 1000.0,
            ScalePolicy::Raw => value,
        }
    }
}

impl fmt::Display for ScalePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalePolicy::Percent => write!(f, "percent"),
            ScalePolicy::Raw => write!(f, "raw"),
        }
    }
}

/// Which report field supplies the summary URL.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum UrlField {
    /// `finalUrl`, falling back to `finalDisplayedUrl`.
    #[default]
    Final,
    /// `requestedUrl`.
    Requested,
}

/// Tracked values pulled out of a single Lighthouse report.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetrics {
    pub url: String,
    pub performance: f64,
    pub accessibility: f64,
    pub best_practices: f64,
    pub seo: f64,
    pub first_meaningful_paint: f64,
    pub time_to_interactive: f64,
}

/// Averaged metrics for one site across all runs.
///
/// Averages serialize as strings with two decimals (`"50.00"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub url: String,
    #[serde(with = "fixed2")]
    pub performance_avg: f64,
    #[serde(with = "fixed2")]
    pub accessibility_avg: f64,
    #[serde(with = "fixed2")]
    pub best_practices_avg: f64,
    #[serde(with = "fixed2")]
    pub seo_avg: f64,
    #[serde(with = "fixed2")]
    pub first_meaningful_paint_avg: f64,
    #[serde(with = "fixed2")]
    pub time_to_interactive_avg: f64,
}

/// Context rendered above the Markdown summary table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryMetadata {
    /// Batch identifier.
    pub batch_name: String,
    /// Number of runs averaged.
    pub runs: usize,
    /// Number of sites audited.
    pub sites: usize,
    /// Scaling applied to the averages.
    pub scale: ScalePolicy,
    /// When the summary was generated.
    pub generated_at: DateTime<Utc>,
}

/// Counters describing how a batch went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Lighthouse invocations attempted.
    pub invocations: usize,
    /// Invocations that failed to spawn or exited non-zero.
    pub failed_invocations: usize,
    /// Summary records written.
    pub records: usize,
    /// Sites whose summary record was dropped.
    pub dropped: usize,
}

impl BatchOutcome {
    /// Whether every invocation and every aggregation succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed_invocations == 0 && self.dropped == 0
    }
}

mod fixed2 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:.2}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
