//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Settings left unset here fall back to the
//! config file and then to built-in defaults.

use crate::models::{ScalePolicy, UrlField};
use clap::Parser;
use std::path::PathBuf;

/// Lighthouse Batch - run Lighthouse over many sites, many times
///
/// Audits every site once per run, stores each report under
/// report/lighthouse/<name>/<run>/ and writes per-site averages to
/// report/lighthouse/<name>/summary.json.
///
/// Examples:
///   lighthouse-batch -s example.com,rust-lang.org
///   lighthouse-batch -f sites.txt --runs 5 --name nightly
///   lighthouse-batch -s example.com -p "--preset=desktop" --html
///   lighthouse-batch -f sites.txt --dry-run
///   lighthouse-batch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Sites to audit (comma-separated, repeatable)
    ///
    /// A missing scheme defaults to https.
    #[arg(short, long, value_name = "URL", value_delimiter = ',')]
    pub sites: Vec<String>,

    /// File with one site per line, audited before --sites
    #[arg(short, long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Batch name, used as the output subdirectory
    #[arg(short, long, value_name = "NAME", env = "LIGHTHOUSE_BATCH_NAME")]
    pub name: Option<String>,

    /// Number of times to audit every site
    #[arg(short, long, value_name = "COUNT")]
    pub runs: Option<usize>,

    /// Also generate an HTML report per audit
    #[arg(long)]
    pub html: bool,

    /// Extra parameters passed through to Lighthouse
    ///
    /// Example: -p "--preset=desktop --only-categories=performance"
    #[arg(short, long, value_name = "PARAMS", allow_hyphen_values = true)]
    pub params: Option<String>,

    /// Prefer a globally installed Lighthouse over a local one
    #[arg(short = 'g', long)]
    pub use_global: bool,

    /// Path to the Lighthouse executable or its index.js
    #[arg(long, value_name = "FILE", env = "LIGHTHOUSE_PATH")]
    pub lighthouse_path: Option<PathBuf>,

    /// Output root directory
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// How averages are scaled (percent: scores x100, timings in seconds)
    #[arg(long, value_name = "POLICY")]
    pub scale: Option<ScalePolicy>,

    /// Report field used for the summary URL
    #[arg(long, value_name = "FIELD")]
    pub url_field: Option<UrlField>,

    /// Also write summary.md next to summary.json
    #[arg(long)]
    pub markdown: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .lighthouse-batch.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the Lighthouse commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 if any audit failed or any site was left out of the summary
    #[arg(long)]
    pub strict: bool,

    /// Generate a default .lighthouse-batch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.runs == Some(0) {
            return Err("Runs must be at least 1".to_string());
        }

        if let Some(ref name) = self.name {
            if name.trim().is_empty() {
                return Err("Batch name must not be empty".to_string());
            }
            if !crate::config::is_single_segment(name) {
                return Err(format!("Batch name must be a single path segment: {}", name));
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `verbose_default` comes from the config file.
    pub fn log_level(&self, verbose_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            sites: vec!["example.com".to_string()],
            file: None,
            name: None,
            runs: None,
            html: false,
            params: None,
            use_global: false,
            lighthouse_path: None,
            out: None,
            scale: None,
            url_field: None,
            markdown: false,
            config: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            strict: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_sites_and_params() {
        let args = Args::try_parse_from([
            "lighthouse-batch",
            "-s",
            "a.com,b.com",
            "--sites",
            "c.com",
            "-p",
            "--preset=desktop --quiet",
            "--runs",
            "3",
            "--scale",
            "raw",
        ])
        .unwrap();

        assert_eq!(args.sites, vec!["a.com", "b.com", "c.com"]);
        assert_eq!(args.params.as_deref(), Some("--preset=desktop --quiet"));
        assert_eq!(args.runs, Some(3));
        assert_eq!(args.scale, Some(ScalePolicy::Raw));
    }

    #[test]
    fn test_validation_zero_runs() {
        let mut args = make_args();
        args.runs = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_name_with_separator() {
        let mut args = make_args();
        args.name = Some("../elsewhere".to_string());
        assert!(args.validate().is_err());

        args.name = Some("nightly".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
