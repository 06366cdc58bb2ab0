//! Sequential Lighthouse batch execution.
//!
//! Every (run, site) pair gets exactly one Lighthouse invocation. Invocations
//! are awaited one after another so only a single browser is ever live.

use crate::lighthouse::locator::LighthouseCli;
use crate::models::{BatchOutcome, Site};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{debug, info, warn};

/// Chrome flags used when the custom params set none.
pub const DEFAULT_CHROME_FLAGS: &str = "--no-sandbox --headless --disable-gpu";

/// Settings shared by every invocation in a batch.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Also request the HTML report.
    pub html: bool,
    /// Raw pass-through params.
    pub params: String,
    /// Chrome flags applied unless `params` already carries `--chrome-flags=`.
    pub chrome_flags: String,
    /// Show a progress bar.
    pub show_progress: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            html: false,
            params: String::new(),
            chrome_flags: DEFAULT_CHROME_FLAGS.to_string(),
            show_progress: false,
        }
    }
}

/// A single planned Lighthouse invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub run: usize,
    pub url: String,
    /// Directory the report lands in.
    pub run_dir: PathBuf,
    /// Report files Lighthouse is expected to write.
    pub reports: Vec<PathBuf>,
    /// Audit arguments, without the program or its leading arguments.
    pub args: Vec<String>,
}

/// Exit information for one invocation.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub url: String,
    pub run: usize,
    /// Exit code, `None` when the process failed to spawn or was killed.
    pub exit_code: Option<i32>,
    pub success: bool,
}

/// Runs Lighthouse over every site for every run.
pub struct BatchRunner {
    cli: LighthouseCli,
    config: RunnerConfig,
}

impl BatchRunner {
    pub fn new(cli: LighthouseCli, config: RunnerConfig) -> Self {
        Self { cli, config }
    }

    /// Build the invocation for one site in one run.
    pub fn invocation(&self, batch_dir: &Path, run: usize, site: &Site) -> Invocation {
        let run_dir = batch_dir.join(run.to_string());
        let reports = std::iter::once(&site.json_file)
            .chain(site.html_file.as_ref())
            .map(|file| run_dir.join(file))
            .collect();

        Invocation {
            run,
            url: site.url.clone(),
            args: build_args(site, &run_dir, &self.config),
            run_dir,
            reports,
        }
    }

    /// Every invocation the batch would perform, runs outermost.
    pub fn plan(&self, batch_dir: &Path, sites: &[Site], runs: usize) -> Vec<Invocation> {
        (0..runs)
            .flat_map(|run| sites.iter().map(move |site| (run, site)))
            .map(|(run, site)| self.invocation(batch_dir, run, site))
            .collect()
    }

    /// Full command line for an invocation, for logging.
    pub fn command_line(&self, invocation: &Invocation) -> String {
        std::iter::once(self.cli.display())
            .chain(invocation.args.iter().map(|a| quote_arg(a)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the whole batch. Per-site failures are counted, never fatal.
    pub async fn run(&self, batch_dir: &Path, sites: &[Site], runs: usize) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        let count = sites.len();
        let progress = self.progress_bar((runs * count) as u64);

        for run in 0..runs {
            info!(
                "Lighthouse batch run begin for {} site{} current run is: {}",
                count,
                if count == 1 { "" } else { "s" },
                run
            );

            for (i, site) in sites.iter().enumerate() {
                let invocation = self.invocation(batch_dir, run, site);
                std::fs::create_dir_all(&invocation.run_dir).with_context(|| {
                    format!(
                        "Failed to create run directory {}",
                        invocation.run_dir.display()
                    )
                })?;

                debug!("{}/{}: Lighthouse analyzing '{}'", i + 1, count, site.url);
                debug!("{}", self.command_line(&invocation));
                progress.set_message(site.url.clone());

                let result = self.execute(&invocation).await;
                outcome.invocations += 1;
                if !result.success {
                    outcome.failed_invocations += 1;
                    debug!(
                        "Continuing after failed audit of '{}' in run {} (exit {:?})",
                        result.url, result.run, result.exit_code
                    );
                }
                progress.inc(1);
            }
        }

        progress.finish_and_clear();
        info!("Lighthouse batch run end");

        Ok(outcome)
    }

    /// Run one invocation to completion.
    pub async fn execute(&self, invocation: &Invocation) -> InvocationResult {
        let output = self
            .cli
            .command()
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let success = output.status.success();
                let exit_code = output.status.code();
                if success {
                    debug!("Lighthouse finished for '{}'", invocation.url);
                    for report in invocation.reports.iter().filter(|p| !p.exists()) {
                        warn!(
                            "Lighthouse exited cleanly but {} was not written",
                            report.display()
                        );
                    }
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(
                        "Lighthouse exited with {:?} for '{}' (run {}): {}",
                        exit_code,
                        invocation.url,
                        invocation.run,
                        stderr.lines().last().unwrap_or("")
                    );
                }
                InvocationResult {
                    url: invocation.url.clone(),
                    run: invocation.run,
                    exit_code,
                    success,
                }
            }
            Err(e) => {
                warn!(
                    "Failed to start Lighthouse ({}) for '{}': {}",
                    self.cli.display(),
                    invocation.url,
                    e
                );
                InvocationResult {
                    url: invocation.url.clone(),
                    run: invocation.run,
                    exit_code: None,
                    success: false,
                }
            }
        }
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}

/// Audit arguments for one site writing into `run_dir`.
pub fn build_args(site: &Site, run_dir: &Path, config: &RunnerConfig) -> Vec<String> {
    let mut args = vec![site.url.clone(), "--output".to_string(), "json".to_string()];

    // With several outputs Lighthouse appends `.report.<ext>` to the path itself.
    let output_path = if config.html {
        args.push("--output".to_string());
        args.push("html".to_string());
        run_dir.join(&site.name)
    } else {
        run_dir.join(&site.json_file)
    };

    args.push("--output-path".to_string());
    args.push(output_path.display().to_string());

    if !config.params.contains("--chrome-flags=") && !config.chrome_flags.is_empty() {
        args.push(format!("--chrome-flags={}", config.chrome_flags));
    }

    args.extend(split_params(&config.params));
    args
}

/// Split pass-through params the way a POSIX shell would split words.
///
/// Handles single quotes, double quotes and backslash escapes; no expansion.
pub fn split_params(params: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut unclosed = None;
    let mut chars = params.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                unclosed = Some(c);
                for q in chars.by_ref() {
                    if q == '\'' {
                        unclosed = None;
                        break;
                    }
                    current.push(q);
                }
            }
            '"' => {
                in_word = true;
                unclosed = Some(c);
                while let Some(q) = chars.next() {
                    match q {
                        '"' => {
                            unclosed = None;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some(e @ ('"' | '\\' | '$' | '`')) => current.push(e),
                            Some(e) => {
                                current.push('\\');
                                current.push(e);
                            }
                            None => current.push('\\'),
                        },
                        _ => current.push(q),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(e) = chars.next() {
                    current.push(e);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            _ => {
                in_word = true;
                current.push(c);
            }
        }
    }

    if let Some(quote) = unclosed {
        warn!(
            "Unclosed {} in params, treating the rest as one argument: {}",
            quote, params
        );
    }

    if in_word {
        words.push(current);
    }

    words
}

fn quote_arg(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"') {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}
