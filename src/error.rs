//! Errors raised while reading Lighthouse reports.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to read report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse report {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Report {path} has no numeric value at {field}")]
    MissingField { path: PathBuf, field: String },

    #[error("No runs to aggregate")]
    NoRuns,
}

pub type Result<T> = std::result::Result<T, ReportError>;
