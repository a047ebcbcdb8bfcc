//! Registry-Crawl main entry point
//!
//! This is the command-line interface for the company register harvester.

use anyhow::Context;
use clap::{CommandFactory, Parser};
use registry_crawl::api::Gateway;
use registry_crawl::config::{load_config_with_hash, validate, ApiEnvironment, Config};
use registry_crawl::crawler::{
    scrape_by_query, scrape_company, CheckpointStore, CrawlControl, CrawlController,
    OutcomeStatus, ResumePointer, SharedControl,
};
use registry_crawl::monitor::{print_resource_report, ResourceMonitor, SystemMonitor};
use registry_crawl::output::{export_to_csv, load_statistics, print_statistics};
use registry_crawl::storage::open_repository;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const API_KEY_ENV: &str = "COMPANIES_HOUSE_API_KEY";
const API_ENV_ENV: &str = "COMPANIES_HOUSE_API_ENV";

/// Registry-Crawl: a resumable company register harvester
///
/// Fetches company profiles, officers and filing histories from the
/// Companies House REST API, stores them as JSON documents and exports them
/// to CSV. A full crawl walks the register alphabetically and can be
/// interrupted and resumed.
#[derive(Parser, Debug)]
#[command(name = "registry-crawl")]
#[command(version)]
#[command(about = "A resumable company register harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Enable debug logging (same as -v)
    #[arg(long)]
    debug: bool,

    /// Search query for companies
    #[arg(long)]
    query: Option<String>,

    /// Maximum number of search pages to retrieve in query mode
    #[arg(long, default_value_t = 10)]
    max_pages: u32,

    /// Scrape a specific company by number
    #[arg(long)]
    company_number: Option<String>,

    /// Scrape the whole register alphabetically
    #[arg(long)]
    scrape_all: bool,

    /// Maximum number of companies to scrape in a full crawl
    #[arg(long)]
    max_companies: Option<u64>,

    /// Resume the full crawl from this index within the starting bucket
    #[arg(long)]
    resume_from_index: Option<u64>,

    /// Resume the full crawl from this company name (with an index, only its bucket is used)
    #[arg(long)]
    resume_from_company: Option<String>,

    /// Save progress after processing this many companies
    #[arg(long)]
    save_interval: Option<u64>,

    /// Start the full crawl from the beginning, ignoring the saved checkpoint
    #[arg(long, conflicts_with_all = ["resume_from_index", "resume_from_company"])]
    fresh: bool,

    /// Export collected data to CSV
    #[arg(long)]
    export: bool,

    /// Show statistics about the data directory and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Validate and print the resolved configuration, then exit
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// API key (overrides the config file and the environment variable)
    #[arg(long)]
    api_key: Option<String>,

    /// API environment (overrides the config file and the environment variable)
    #[arg(long, value_parser = ["live", "test"])]
    env: Option<String>,

    /// Data directory (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

impl Cli {
    fn wants_network(&self) -> bool {
        self.scrape_all || self.query.is_some() || self.company_number.is_some()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose.saturating_add(u8::from(cli.debug)), cli.quiet);

    let config = load_configuration(&cli)?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }
    if cli.stats {
        return handle_stats(&config).await;
    }
    if !cli.wants_network() && !cli.export {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    if cli.wants_network() {
        let control = CrawlControl::shared();
        let gateway = Gateway::new(&config.api)?.with_control(Arc::clone(&control));
        if let Err(e) = gateway.validate_api_key().await {
            tracing::error!("API key validation failed. Please check your API key and try again.");
            return Err(e.into());
        }

        spawn_signal_handlers(Arc::clone(&control));

        if cli.scrape_all {
            handle_scrape_all(&config, &cli, gateway, Arc::clone(&control)).await?;
        }
        if let Some(query) = &cli.query {
            handle_query(&config, query, cli.max_pages, &control).await?;
        }
        if let Some(company_number) = &cli.company_number {
            handle_company(&config, company_number, &control).await?;
        }
    }

    if cli.export {
        handle_export(&config)?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("registry_crawl=info,warn"),
            1 => EnvFilter::new("registry_crawl=debug,info"),
            2 => EnvFilter::new("registry_crawl=trace,debug"),
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

/// Loads the config file (if any) and applies environment and flag overrides
fn load_configuration(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(key) = &cli.api_key {
        tracing::info!("Using API key from command line argument");
        config.api.api_key = key.clone();
    } else if let Ok(key) = std::env::var(API_KEY_ENV) {
        tracing::info!("Using API key from environment variable");
        config.api.api_key = key;
    } else {
        tracing::info!("Using API key from config file");
    }

    let env_value = cli.env.clone().or_else(|| std::env::var(API_ENV_ENV).ok());
    if let Some(value) = env_value {
        let environment = ApiEnvironment::parse(&value)
            .with_context(|| format!("Unknown API environment '{}'", value))?;
        tracing::info!("Using {:?} environment", environment);
        config.api.environment = environment;
    }

    if let Some(save_interval) = cli.save_interval {
        config.crawl.save_interval = save_interval;
    }
    if let Some(max) = cli.max_companies {
        config.crawl.max_entities = Some(max);
    }
    if let Some(data_dir) = &cli.data_dir {
        config.output.data_dir = data_dir.clone();
    }

    validate(&config).context("Invalid configuration")?;
    tracing::debug!("API key being used: {}", config.api.masked_api_key());
    Ok(config)
}

/// Maps Ctrl-C to an interrupt and, on Unix, SIGUSR1 to a resume
///
/// A second Ctrl-C exits at once without waiting for the checkpoint.
fn spawn_signal_handlers(control: SharedControl) {
    tokio::spawn({
        let control = Arc::clone(&control);
        async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            tracing::warn!("Ctrl+C received - saving progress...");
            control.interrupt();

            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::error!("Second Ctrl+C received - exiting without saving");
                std::process::exit(130);
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut resume = match signal(SignalKind::user_defined1()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Cannot listen for SIGUSR1, low-disk pauses need Ctrl+C: {}", e);
                return;
            }
        };
        while resume.recv().await.is_some() {
            tracing::info!("Resume signal received");
            control.resume();
        }
    });

    #[cfg(not(unix))]
    drop(control);
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Registry-Crawl Dry Run ===\n");

    println!("API:");
    println!("  Base URL: {}", config.api.resolved_base_url());
    println!("  Environment: {:?}", config.api.environment);
    println!("  API key: {}", config.api.masked_api_key());
    println!(
        "  Minimum request interval: {}ms",
        config.api.min_request_interval_ms
    );
    println!(
        "  Rate limit back-off: {}s",
        config.api.rate_limit_backoff_secs
    );

    println!("\nCrawl:");
    println!("  Page size: {}", config.crawl.page_size);
    println!("  Save interval: {}", config.crawl.save_interval);
    println!(
        "  Resource check interval: {}",
        config.crawl.resource_check_interval
    );
    println!("  Minimum free disk: {} GB", config.crawl.min_free_disk_gb);
    println!(
        "  Max companies: {}",
        config
            .crawl
            .max_entities
            .map(|m| m.to_string())
            .unwrap_or_else(|| "unlimited".to_string())
    );
    println!(
        "  Buckets ({}): {}",
        config.crawl.buckets.len(),
        config.crawl.buckets.join(" ")
    );

    println!("\nOutput:");
    println!("  Data directory: {}", config.output.data_dir.display());
    println!("  Checkpoint: {}", config.output.checkpoint_path().display());
    println!("  Export directory: {}", config.output.export_dir().display());

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: counts documents and summarises the checkpoint
async fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Data directory: {}\n", config.output.data_dir.display());

    let repository = open_repository(&config.output.data_dir)?;
    let checkpoints = CheckpointStore::new(config.output.checkpoint_path());
    let stats = load_statistics(&repository, &checkpoints)?;
    print_statistics(&stats);

    match SystemMonitor::new().report(&config.output.data_dir).await {
        Ok(report) => print_resource_report(&report),
        Err(e) => tracing::warn!("Resource report unavailable: {}", e),
    }
    Ok(())
}

/// Handles --scrape-all: the resumable full-register crawl
async fn handle_scrape_all(
    config: &Config,
    cli: &Cli,
    gateway: Gateway,
    control: SharedControl,
) -> anyhow::Result<()> {
    let repository = open_repository(&config.output.data_dir)?;
    let checkpoints = CheckpointStore::new(config.output.checkpoint_path());

    let checkpoint = if cli.fresh {
        tracing::info!("Starting fresh crawl (ignoring saved progress)");
        None
    } else {
        match checkpoints.load() {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::error!("Error loading progress file: {}", e);
                None
            }
        }
    };

    let resume = ResumePointer::resolve(
        checkpoint.as_ref(),
        cli.resume_from_index,
        cli.resume_from_company.as_deref(),
        cli.fresh,
        &config.crawl.buckets,
    );

    let monitor = SystemMonitor::new();
    if let Ok(report) = monitor.report(&config.output.data_dir).await {
        print_resource_report(&report);
    }

    let mut controller = CrawlController::new(config, gateway, repository, monitor, control);

    match controller.run(resume).await {
        Ok(outcome) => {
            let how = match outcome.status {
                OutcomeStatus::Completed => "Crawl completed",
                OutcomeStatus::LimitReached => "Crawl stopped at the company limit",
            };
            tracing::info!(
                "{}: {} processed this run ({} total), {} already on disk, {} not found",
                how,
                outcome.processed_this_run,
                outcome.total_processed,
                outcome.skipped_existing,
                outcome.not_found
            );
            Ok(())
        }
        Err(e) if e.is_interrupted() => {
            tracing::warn!("Scraping process interrupted by user");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Error during comprehensive scraping: {}", e);
            Err(e.into())
        }
    }
}

/// Handles --query: search and save every match
async fn handle_query(
    config: &Config,
    query: &str,
    max_pages: u32,
    control: &SharedControl,
) -> anyhow::Result<()> {
    let gateway = Gateway::new(&config.api)?.with_control(Arc::clone(control));
    let mut repository = open_repository(&config.output.data_dir)?;

    tracing::info!("Starting search for companies with query: {}", query);
    let summary = scrape_by_query(
        &gateway,
        &mut repository,
        query,
        max_pages,
        config.crawl.page_size,
    )
    .await
    .with_context(|| format!("Search for '{}' failed", query))?;

    tracing::info!(
        "Completed scraping. Found {} companies, saved {}, {} already on disk, {} failed.",
        summary.found,
        summary.saved,
        summary.skipped_existing,
        summary.failed
    );
    Ok(())
}

/// Handles --company-number: fetch and save one company
async fn handle_company(
    config: &Config,
    company_number: &str,
    control: &SharedControl,
) -> anyhow::Result<()> {
    let gateway = Gateway::new(&config.api)?.with_control(Arc::clone(control));
    let mut repository = open_repository(&config.output.data_dir)?;

    scrape_company(
        &gateway,
        &mut repository,
        company_number,
        config.crawl.page_size,
    )
    .await
    .with_context(|| format!("Error scraping company {}", company_number))?;
    Ok(())
}

/// Handles --export: flatten stored documents to CSV
fn handle_export(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Exporting data to CSV...");
    let repository = open_repository(&config.output.data_dir)?;
    let summary = export_to_csv(&repository, &config.output.export_dir())
        .context("Error exporting data")?;

    tracing::info!(
        "Export complete: {} companies, {} officers, {} filings",
        summary.companies,
        summary.officers,
        summary.filings
    );
    Ok(())
}
