//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.lighthouse-batch.toml` files.

use crate::analysis::AggregateOptions;
use crate::lighthouse::runner::DEFAULT_CHROME_FLAGS;
use crate::lighthouse::RunnerConfig;
use crate::models::{ScalePolicy, UrlField};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Component, Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".lighthouse-batch.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Lighthouse invocation settings.
    #[serde(default)]
    pub lighthouse: LighthouseConfig,

    /// Summary settings.
    #[serde(default)]
    pub summary: SummaryConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Batch name, used as the output subdirectory.
    #[serde(default = "default_name")]
    pub name: String,

    /// Output root directory.
    #[serde(default = "default_out")]
    pub out: PathBuf,

    /// Number of runs per site.
    #[serde(default = "default_runs")]
    pub runs: usize,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            out: default_out(),
            runs: default_runs(),
            verbose: false,
        }
    }
}

fn default_name() -> String {
    "default".to_string()
}

fn default_out() -> PathBuf {
    PathBuf::from("./report/lighthouse")
}

fn default_runs() -> usize {
    1
}

/// Lighthouse settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LighthouseConfig {
    /// Sites audited in addition to any given on the command line.
    #[serde(default)]
    pub sites: Vec<String>,

    /// Newline-delimited site list.
    #[serde(
        default,
        deserialize_with = "non_empty_path",
        skip_serializing_if = "Option::is_none"
    )]
    pub file: Option<PathBuf>,

    /// Also generate HTML reports.
    #[serde(default)]
    pub html: bool,

    /// Raw parameters passed through to Lighthouse.
    #[serde(default)]
    pub params: String,

    /// Prefer a global Lighthouse install.
    #[serde(default)]
    pub use_global: bool,

    /// Explicit Lighthouse executable or script.
    #[serde(
        default,
        deserialize_with = "non_empty_path",
        skip_serializing_if = "Option::is_none"
    )]
    pub binary: Option<PathBuf>,

    /// Chrome flags used unless `params` sets `--chrome-flags=`.
    #[serde(default = "default_chrome_flags")]
    pub chrome_flags: String,
}

impl Default for LighthouseConfig {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            file: None,
            html: false,
            params: String::new(),
            use_global: false,
            binary: None,
            chrome_flags: default_chrome_flags(),
        }
    }
}

fn default_chrome_flags() -> String {
    DEFAULT_CHROME_FLAGS.to_string()
}

/// An empty path string means "not set".
fn non_empty_path<'de, D>(deserializer: D) -> std::result::Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let path = Option::<PathBuf>::deserialize(deserializer)?;
    Ok(path.filter(|p| !p.as_os_str().is_empty()))
}

/// True when `name` is exactly one normal path component.
pub fn is_single_segment(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Summary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Scaling applied to averages.
    #[serde(default)]
    pub scale: ScalePolicy,

    /// Report field used for the summary URL.
    #[serde(default)]
    pub url_field: UrlField,

    /// Also write summary.md.
    #[serde(default)]
    pub markdown: bool,

    /// Sites whose reports may be read at once.
    #[serde(default = "default_read_concurrency")]
    pub read_concurrency: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            scale: ScalePolicy::default(),
            url_field: UrlField::default(),
            markdown: false,
            read_concurrency: default_read_concurrency(),
        }
    }
}

fn default_read_concurrency() -> usize {
    4
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values the CLI actually provides override the config.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref name) = args.name {
            self.general.name = name.clone();
        }
        if let Some(ref out) = args.out {
            self.general.out = out.clone();
        }
        if let Some(runs) = args.runs {
            self.general.runs = runs;
        }
        if args.verbose {
            self.general.verbose = true;
        }

        // Sites accumulate: config entries first, then the command line.
        self.lighthouse.sites.extend(args.sites.iter().cloned());
        if let Some(ref file) = args.file {
            self.lighthouse.file = Some(file.clone());
        }
        if let Some(ref params) = args.params {
            self.lighthouse.params = params.clone();
        }
        if let Some(ref binary) = args.lighthouse_path {
            if !binary.as_os_str().is_empty() {
                self.lighthouse.binary = Some(binary.clone());
            }
        }
        if args.html {
            self.lighthouse.html = true;
        }
        if args.use_global {
            self.lighthouse.use_global = true;
        }

        if let Some(scale) = args.scale {
            self.summary.scale = scale;
        }
        if let Some(url_field) = args.url_field {
            self.summary.url_field = url_field;
        }
        if args.markdown {
            self.summary.markdown = true;
        }
    }

    /// Check values a config file could have set out of range.
    pub fn validate(&self) -> Result<()> {
        if self.general.runs == 0 {
            anyhow::bail!("Runs must be at least 1");
        }
        let name = &self.general.name;
        if name.trim().is_empty() {
            anyhow::bail!("Batch name must not be empty");
        }
        // The batch directory is removed recursively before each run.
        if !is_single_segment(name) {
            anyhow::bail!("Batch name must be a single path segment: {}", name);
        }
        Ok(())
    }

    /// Directory holding this batch's reports and summary.
    pub fn batch_dir(&self) -> PathBuf {
        self.general.out.join(&self.general.name)
    }

    /// Runner settings derived from this config.
    pub fn runner_config(&self, show_progress: bool) -> RunnerConfig {
        RunnerConfig {
            html: self.lighthouse.html,
            params: self.lighthouse.params.clone(),
            chrome_flags: self.lighthouse.chrome_flags.clone(),
            show_progress,
        }
    }

    /// Aggregation settings derived from this config.
    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            scale: self.summary.scale,
            url_field: self.summary.url_field,
            read_concurrency: self.summary.read_concurrency,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
