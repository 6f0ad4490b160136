//! Offer-Harvest main entry point
//!
//! Command-line front end: submits one job to an in-process pipeline, logs its
//! progress, and prints the final status as JSON.

use anyhow::{bail, Context};
use clap::Parser;
use offer_harvest::config::{load_config_with_hash, Config};
use offer_harvest::output::{job_statistics, render_statistics, status_json, write_status_json};
use offer_harvest::{JobKind, JobPhase, Pipeline};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Offer-Harvest: product and offer ingestion for retail sites
///
/// Scans store pages for products or reads product URLs directly, fetches
/// every page through the rendering service, and reports structured product
/// and pricing records.
#[derive(Parser, Debug)]
#[command(name = "offer-harvest")]
#[command(version)]
#[command(about = "Concurrent product and offer ingestion", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Job kind: product, store, price_check, repricing or listing_price
    #[arg(short, long)]
    kind: JobKind,

    /// Listing pages to scan per store URL
    #[arg(long, default_value_t = 1)]
    pages: u32,

    /// Input URL (repeatable)
    #[arg(long = "url", value_name = "URL")]
    urls: Vec<String>,

    /// File with one input URL per line; `#` starts a comment
    #[arg(long, value_name = "FILE")]
    urls_file: Option<PathBuf>,

    /// Write the final status JSON to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the work units without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let mut urls = cli.urls.clone();
    if let Some(path) = &cli.urls_file {
        urls.extend(read_urls_file(path)?);
    }

    if cli.dry_run {
        return handle_dry_run(&config, cli.kind, &urls, cli.pages);
    }

    handle_job(config, &cli, urls).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("offer_harvest=info,warn"),
            1 => EnvFilter::new("offer_harvest=debug,info"),
            2 => EnvFilter::new("offer_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Reads input URLs, skipping blank lines and `#` comments
fn read_urls_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL file {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Handles the --dry-run mode: validates the request and lists the work units
fn handle_dry_run(config: &Config, kind: JobKind, urls: &[String], pages: u32) -> anyhow::Result<()> {
    println!("=== Offer-Harvest Dry Run ===\n");

    println!("Fetch Service:");
    println!("  Endpoint: {}", config.fetch_service.endpoint);
    println!(
        "  Timeouts: connect {}ms, request {}ms",
        config.fetch_service.connect_timeout_ms, config.fetch_service.request_timeout_ms
    );
    println!(
        "  Retries: {} attempts, backoff {}ms + up to {}ms jitter",
        config.fetch_service.max_retries,
        config.fetch_service.backoff_base_ms,
        config.fetch_service.backoff_jitter_ms
    );

    match &config.proxy {
        Some(proxy) => println!(
            "\nProxy: {}:{} ({}-{} requests per session)",
            proxy.host, proxy.port, proxy.min_session_requests, proxy.max_session_requests
        ),
        None => println!("\nProxy: none"),
    }

    println!("\nWorkers:");
    println!("  Workers: {}", config.workers.worker_count);
    println!(
        "  Concurrency per worker: {}",
        config.workers.per_worker_concurrency
    );

    println!("\nSite:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Default seller: {}", config.site.default_seller);
    match &config.images {
        Some(images) => println!("  Image host: {}", images.canonical_host),
        None => println!("  Image host: none (source URLs kept)"),
    }

    let units = Pipeline::plan_units(kind, urls, pages)?;
    println!("\n{} job, {} work units:", kind, units.len());
    for unit in &units {
        println!("  - {}", unit);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Runs one job to completion and reports it
async fn handle_job(config: Config, cli: &Cli, urls: Vec<String>) -> anyhow::Result<()> {
    let progress_interval = config.workers.progress_interval();
    let pipeline = Pipeline::new(config)?;
    let job_id = pipeline.submit(cli.kind, urls, cli.pages)?;

    let mut ticker = tokio::time::interval(progress_interval);
    let status = loop {
        ticker.tick().await;
        let Some(status) = pipeline.status(job_id) else {
            bail!("Job {} disappeared from the tracker", job_id);
        };
        if status.phase.is_terminal() {
            break status;
        }
        tracing::info!(
            "Job {}: {} {}/{} ({} errors)",
            job_id,
            status.phase,
            status.processed,
            status.total,
            status.error_count
        );
    };

    if !cli.quiet {
        eprintln!("{}\n", render_statistics(&status, &job_statistics(&status)));
    }

    match &cli.output {
        Some(path) => write_status_json(&status, path)?,
        None => println!("{}", status_json(&status)?),
    }

    if status.phase == JobPhase::Failed {
        bail!(
            "Job {} failed: {}",
            job_id,
            status.message.as_deref().unwrap_or("no reason recorded")
        );
    }

    Ok(())
}
