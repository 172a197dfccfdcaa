//! arxiv-harvest main entry point
//!
//! This is the command-line interface for the resumable abstract harvester.

use anyhow::Context;
use arxiv_harvest::config::{
    ensure_harvest_allowed, load_config_with_hash, validate, Config, HARVEST_ENABLE_VALUE,
    HARVEST_ENABLE_VAR,
};
use arxiv_harvest::crawler::{crawl, tier_for};
use arxiv_harvest::output::{load_statistics, print_report, print_statistics};
use arxiv_harvest::storage::{CsvStore, RecordStore};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// arxiv-harvest: a resumable, rate-adaptive abstract harvester
///
/// Collects paper abstracts from arXiv listing pages into a CSV store,
/// skipping every paper already present so interrupted runs can resume.
#[derive(Parser, Debug)]
#[command(name = "arxiv-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, rate-adaptive abstract harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output store path, overriding the config file
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Target record count, overriding the config file
    #[arg(short, long, value_name = "N")]
    target: Option<u64>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the scan plan without harvesting
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics for the output store and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = resolve_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }
    if cli.stats {
        return handle_stats(&config);
    }

    if let Err(e) = ensure_harvest_allowed() {
        println!("{}", e);
        println!(
            "Harvesting is off by default. Run with {}={} to collect records.",
            HARVEST_ENABLE_VAR, HARVEST_ENABLE_VALUE
        );
        return Ok(());
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("arxiv_harvest=info,warn"),
            1 => EnvFilter::new("arxiv_harvest=debug,info"),
            _ => EnvFilter::new("arxiv_harvest=trace,debug"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file, if any, and applies command-line overrides
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(output) = &cli.output {
        config.output.path = output.display().to_string();
    }
    if let Some(target) = cli.target {
        config.crawler.target = target;
    }

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Handles the --dry-run mode: shows the resolved config and the opening tier
fn handle_dry_run(config: &Config) {
    println!("=== arxiv-harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Base URL: {}", config.crawler.base_url);
    println!("  Target: {}", config.crawler.target);
    println!("  Delay scale: {}", config.crawler.delay_scale);
    println!(
        "  Session rebuild every: {} records",
        config.crawler.rotate_session_every
    );
    println!(
        "  Max requests per category: {}",
        config.crawler.max_requests_per_category
    );

    println!("\nFetch:");
    println!("  Timeout: {}s", config.fetch.timeout_secs);
    println!("  Max attempts: {}", config.fetch.max_attempts);

    println!("\nOutput:");
    println!("  Path: {}", config.output.path);
    println!("  Batch size: {}", config.output.batch_size);
    println!("  Save interval: {}s", config.output.save_interval_secs);
    println!("  License: {}", config.output.license);

    println!("\nCategories ({}):", config.crawler.categories.len());
    for category in &config.crawler.categories {
        println!("  - {}", category);
    }

    let existing = CsvStore::new(&config.output.path).load_existing_ids().len() as u64;
    let remaining = config.crawler.target.saturating_sub(existing);
    println!("\n✓ Configuration is valid");
    println!(
        "✓ Store holds {} records; {} still needed",
        existing, remaining
    );

    if remaining > 0 {
        let tier = tier_for(remaining);
        println!(
            "✓ Would start in the {} tier: step {}, tolerance {}, delay {:.2}-{:.2}s",
            tier.kind,
            tier.step_size,
            tier.empty_page_tolerance,
            tier.delay.min.as_secs_f64(),
            tier.delay.max.as_secs_f64()
        );
        for range in &tier.offset_ranges {
            println!("    * {}", range);
        }
    }
}

/// Handles the --stats mode: shows statistics for the output store
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = Path::new(&config.output.path);
    println!("Store: {}\n", path.display());

    let stats = load_statistics(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    print_statistics(&stats, config.crawler.target);

    Ok(())
}

/// Handles the main harvest
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Harvesting into {} (target {}, {} categories)",
        config.output.path,
        config.crawler.target,
        config.crawler.categories.len()
    );

    let report = crawl(config).await.context("Harvest failed")?;
    print_report(&report);

    Ok(())
}
