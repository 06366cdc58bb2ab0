//! Lighthouse executable discovery.
//!
//! Resolution order: an explicit path, then a global install on `PATH`
//! (only when asked for), then a local node install.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Local install locations, relative to the search root.
const LOCAL_SCRIPTS: [&str; 3] = [
    "node_modules/lighthouse/cli/index.js",
    "node_modules/lighthouse/lighthouse-cli/index.js",
    "../lighthouse/lighthouse-cli/index.js",
];

/// A runnable Lighthouse CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LighthouseCli {
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments placed before the audit arguments (the script for `node`).
    pub leading_args: Vec<String>,
}

impl LighthouseCli {
    /// Run an executable directly.
    pub fn direct(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Run a JavaScript entry point through `node`.
    pub fn node_script(script: &Path) -> Self {
        Self {
            program: PathBuf::from("node"),
            leading_args: vec![script.display().to_string()],
        }
    }

    /// Build a command with the leading arguments already applied.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args);
        cmd
    }

    /// Human-readable form for logs and dry runs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.leading_args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Locates the Lighthouse CLI to run.
pub struct LighthouseLocator {
    custom_path: Option<PathBuf>,
    use_global: bool,
    search_root: PathBuf,
}

impl LighthouseLocator {
    /// Create a locator searching relative to the working directory.
    pub fn new(custom_path: Option<PathBuf>, use_global: bool) -> Self {
        Self {
            custom_path,
            use_global,
            search_root: PathBuf::from("."),
        }
    }

    /// Search for local installs under a different root.
    #[cfg(test)]
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_root = root.into();
        self
    }

    /// Find the Lighthouse CLI.
    pub async fn locate(&self) -> Result<LighthouseCli> {
        if let Some(ref path) = self.custom_path {
            return Self::validate_custom_path(path);
        }

        if self.use_global {
            if let Some(cli) = Self::find_global().await {
                info!("Targeting global install of Lighthouse cli");
                return Ok(cli);
            }
            warn!("Global Lighthouse install not found, falling back to local one");
        }

        for candidate in LOCAL_SCRIPTS {
            let path = self.search_root.join(candidate);
            debug!("Checking for Lighthouse at {}", path.display());
            if path.is_file() {
                info!("Targeting local Lighthouse cli at '{}'", path.display());
                return Ok(LighthouseCli::node_script(&path));
            }
        }

        bail!(
            "Failed to find Lighthouse CLI. Checked: {}. Use --lighthouse-path or --use-global.",
            LOCAL_SCRIPTS
                .iter()
                .map(|p| self.search_root.join(p).display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    fn validate_custom_path(path: &Path) -> Result<LighthouseCli> {
        if !path.exists() {
            bail!("Lighthouse not found at: {}", path.display());
        }

        if path.extension().and_then(|e| e.to_str()) == Some("js") {
            Ok(LighthouseCli::node_script(path))
        } else {
            Ok(LighthouseCli::direct(path))
        }
    }

    async fn find_global() -> Option<LighthouseCli> {
        let path = which::which("lighthouse").ok()?;

        let status = Command::new(&path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .ok()?;

        status.success().then(|| LighthouseCli::direct(path))
    }
}
