//! Lighthouse Batch - run Lighthouse over many sites, many times
//!
//! A CLI tool that audits a list of sites with the Lighthouse CLI once per
//! run, then averages each site's scores and timings across all runs.
//!
//! Exit codes:
//!   0 - Success (or failures tolerated without --strict)
//!   1 - Fatal error (config, unreadable site file, Lighthouse not found, etc.)
//!   2 - --strict and at least one audit failed or one site was dropped

mod analysis;
mod cli;
mod config;
mod error;
mod lighthouse;
mod models;
mod report;
mod sites;

use analysis::Aggregator;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE};
use lighthouse::{BatchRunner, LighthouseCli, LighthouseLocator};
use models::{Site, SummaryMetadata, SummaryRecord};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Configuration errors are fatal before anything runs
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(args.log_level(config.general.verbose));

    info!("Lighthouse Batch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run_batch(&args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Batch failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .lighthouse-batch.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set sites, runs, Lighthouse params and summary options.");
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load the config file (explicit or default) and apply CLI overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => Config::load(path)?,
        None => Config::load_default()?.unwrap_or_default(),
    };

    config.merge_with_args(args);
    config.validate()?;

    Ok(config)
}

/// Run the complete batch workflow. Returns the exit code (0 or 2).
async fn run_batch(args: &Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let sites = sites::load_sites(
        config.lighthouse.file.as_deref(),
        &config.lighthouse.sites,
        config.lighthouse.html,
    )?;
    if sites.is_empty() {
        bail!("No sites to audit. Use --sites, --file or the [lighthouse] sites setting.");
    }

    let runs = config.general.runs;
    let batch_dir = config.batch_dir();
    let locator = LighthouseLocator::new(
        config.lighthouse.binary.clone(),
        config.lighthouse.use_global,
    );

    if args.dry_run {
        return handle_dry_run(&config, &locator, &sites).await;
    }

    // Step 1: Find Lighthouse
    let cli = locator.locate().await?;

    // Step 2: Start from an empty batch directory
    prepare_batch_dir(&batch_dir)?;

    if !args.quiet {
        println!(
            "🔦 Auditing {} site{} x {} run{} with {}",
            sites.len(),
            plural(sites.len()),
            runs,
            plural(runs),
            cli.display()
        );
        println!("   Output: {}", batch_dir.display());
    }

    // Step 3: Run Lighthouse, one audit at a time
    let runner = BatchRunner::new(cli, config.runner_config(!args.quiet));
    let mut outcome = runner.run(&batch_dir, &sites, runs).await?;

    // Step 4: Average the reports
    let summary_path = batch_dir.join("summary.json");
    let aggregated = Aggregator::new(&batch_dir, runs, config.aggregate_options())
        .run(&summary_path)
        .await?;
    outcome.records = aggregated.records.len();
    outcome.dropped = aggregated.dropped.len();

    if config.summary.markdown {
        let metadata = SummaryMetadata {
            batch_name: config.general.name.clone(),
            runs,
            sites: sites.len(),
            scale: config.summary.scale,
            generated_at: Utc::now(),
        };
        report::write_markdown_summary(
            &metadata,
            &aggregated.records,
            &batch_dir.join("summary.md"),
        )?;
    }

    if !args.quiet {
        print_summary(&aggregated.records);
        println!("\n📊 Batch Summary:");
        println!(
            "   Audits: {} ({} failed)",
            outcome.invocations, outcome.failed_invocations
        );
        println!(
            "   Sites summarized: {} ({} dropped)",
            outcome.records, outcome.dropped
        );
        println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
        println!("\n✅ Batch complete! Summary saved to: {}", summary_path.display());
    }

    if args.strict && !outcome.is_clean() {
        eprintln!(
            "\n⛔ {} failed audit(s) and {} dropped site(s). Failing (exit code 2).",
            outcome.failed_invocations, outcome.dropped
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: print every Lighthouse command, run nothing.
async fn handle_dry_run(
    config: &Config,
    locator: &LighthouseLocator,
    sites: &[Site],
) -> Result<i32> {
    let cli = match locator.locate().await {
        Ok(cli) => cli,
        Err(e) => {
            debug!("Lighthouse not resolved for dry run: {:#}", e);
            LighthouseCli::direct("lighthouse")
        }
    };

    let runner = BatchRunner::new(cli, config.runner_config(false));
    let plan = runner.plan(&config.batch_dir(), sites, config.general.runs);

    println!("\n🔍 Dry run: {} Lighthouse invocation(s)\n", plan.len());
    for invocation in &plan {
        println!("   [run {}] {}", invocation.run, runner.command_line(invocation));
    }

    println!("\n✅ Dry run complete. Nothing was executed.");
    Ok(0)
}

/// Remove any previous output for this batch and recreate the directory.
fn prepare_batch_dir(batch_dir: &Path) -> Result<()> {
    if batch_dir.exists() {
        info!("Removing previous output at {}", batch_dir.display());
        std::fs::remove_dir_all(batch_dir)
            .with_context(|| format!("Failed to remove {}", batch_dir.display()))?;
    }

    std::fs::create_dir_all(batch_dir)
        .with_context(|| format!("Failed to create {}", batch_dir.display()))
}

/// Print one line per summary record.
fn print_summary(records: &[SummaryRecord]) {
    if records.is_empty() {
        println!("\n   No summary records were produced.");
        return;
    }

    println!("\n📈 Averages:");
    for record in records {
        println!(
            "   {} | perf {:.2} | a11y {:.2} | best {:.2} | seo {:.2} | fmp {:.2} | tti {:.2}",
            record.url,
            record.performance_avg,
            record.accessibility_avg,
            record.best_practices_avg,
            record.seo_avg,
            record.first_meaningful_paint_avg,
            record.time_to_interactive_avg
        );
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
