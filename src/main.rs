//! Device-Catalog main entry point
//!
//! This is the command-line interface for the Device-Catalog harvester.

use anyhow::Context;
use clap::Parser;
use device_catalog::config::{
    load_config_with_hash, load_targets, stamp_output_dir, Config, ConfigStamp, ExtractionPolicy,
    TargetList,
};
use device_catalog::crawler::crawl;
use device_catalog::output::{load_output_summary, print_output_summary, print_statistics};
use device_catalog::DedupIndex;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Device-Catalog: an incremental device specification harvester
///
/// Device-Catalog walks a device listing site for the brands in a target list,
/// extracts each new device's specification table, and appends it to one CSV
/// file per brand. Devices already in the output are never fetched twice.
#[derive(Parser, Debug)]
#[command(name = "device-catalog")]
#[command(version = "1.0.0")]
#[command(about = "An incremental device specification harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and target list and show what would be crawled
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show per-brand counts of the output directory and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Override the extraction policy (full or narrow)
    #[arg(long, value_name = "POLICY")]
    policy: Option<ExtractionPolicy>,

    /// Override the target list path
    #[arg(long, value_name = "PATH")]
    targets: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(policy) = cli.policy {
        config.extraction.policy = policy;
    }
    if let Some(targets) = &cli.targets {
        config.input.targets_path = targets.display().to_string();
    }

    if cli.stats {
        return handle_stats(&config);
    }

    // The target list is validated before any network activity
    let targets_path = PathBuf::from(&config.input.targets_path);
    let targets = load_targets(&targets_path)
        .with_context(|| format!("Failed to load target list from {}", targets_path.display()))?;
    tracing::info!("Loaded {} target brands", targets.len());

    if cli.dry_run {
        handle_dry_run(&config, &targets);
        return Ok(());
    }

    // A policy override changes new files' columns as much as an edit would
    let run_hash = match cli.policy {
        Some(policy) => format!("{}-{:?}", config_hash, policy).to_lowercase(),
        None => config_hash,
    };

    handle_crawl(config, targets, &run_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("device_catalog=info,warn"),
            1 => EnvFilter::new("device_catalog=debug,info"),
            2 => EnvFilter::new("device_catalog=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows configuration, targets and known devices
fn handle_dry_run(config: &Config, targets: &TargetList) {
    println!("=== Device-Catalog Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Brand index: {}", config.site.brand_index_path);

    println!("\nFetcher:");
    println!("  Transport: {:?}", config.fetcher.transport);
    if let Some(dir) = &config.fetcher.mirror_dir {
        println!("  Mirror directory: {}", dir);
    }
    println!("  Request delay: {}ms", config.fetcher.request_delay_ms);
    println!("  Timeout: {}s", config.fetcher.timeout_secs);
    println!(
        "  Rate-limit cooldown: {}ms (x{} per retry, {} retries)",
        config.fetcher.rate_limit_cooldown_ms,
        config.fetcher.backoff_factor,
        config.fetcher.max_rate_limit_retries
    );

    println!("\nExtraction policy: {:?}", config.extraction.policy);

    let output_dir = Path::new(&config.output.directory);
    let dedup = DedupIndex::seed(output_dir);
    println!("\nOutput: {}", output_dir.display());
    println!(
        "  Known devices: {} across {} brands",
        dedup.len(),
        dedup.brand_count()
    );
    // Keyed by file stem; the site's brand id is only known after resolution
    for (stem, known) in dedup.brand_counts() {
        println!("    {}: {} known", stem, known);
    }

    println!("\nTarget Brands ({}):", targets.len());
    for spec in targets.specs() {
        if spec.models.is_empty() {
            println!("  - {} (all new models)", spec.brand);
        } else {
            println!("  - {} ({} models)", spec.brand, spec.models.len());
            for model in &spec.models {
                println!("    * {}", model);
            }
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} brands", targets.len());
}

/// Handles the --stats mode: summarises the output directory
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let output_dir = Path::new(&config.output.directory);
    let summaries = load_output_summary(output_dir)
        .with_context(|| format!("Failed to read output directory {}", output_dir.display()))?;
    print_output_summary(output_dir, &summaries);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, targets: TargetList, config_hash: &str) -> anyhow::Result<()> {
    tracing::info!(
        "Crawling {} brands into {}",
        targets.len(),
        config.output.directory
    );

    let output_dir = Path::new(&config.output.directory);
    let stamp = stamp_output_dir(output_dir, config_hash)
        .with_context(|| format!("Failed to stamp output directory {}", output_dir.display()))?;
    if let ConfigStamp::Changed { previous } = stamp {
        tracing::warn!(
            "Configuration changed since the last run into {} (was {}); existing files keep their headers",
            output_dir.display(),
            previous
        );
    }

    // Rows are flushed one at a time, so dropping the run on Ctrl-C leaves
    // every output file complete
    tokio::select! {
        result = crawl(config, targets) => {
            match result {
                Ok(stats) => {
                    tracing::info!("Crawl completed successfully");
                    print_statistics(&stats);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("Crawl failed: {}", e);
                    Err(e.into())
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; output written so far is kept");
            Ok(())
        }
    }
}
