//! Recipe-Harvest main entry point
//!
//! This is the command-line interface for the Recipe-Harvest crawler.

use anyhow::Context;
use clap::Parser;
use recipe_harvest::config::{load_config_with_hash, Config};
use recipe_harvest::crawler::{Coordinator, TaskReport};
use recipe_harvest::sitemap::ReplayOrder;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Recipe-Harvest: a polite recipe crawler
///
/// Crawls recipe sites one paced request at a time, either by enumerating
/// numeric recipe IDs or by replaying previously downloaded sitemaps, and
/// writes extracted recipes to rotating JSON shards.
#[derive(Parser, Debug)]
#[command(name = "recipe-harvest")]
#[command(version)]
#[command(about = "A polite recipe crawler", long_about = None)]
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

    /// Download every site's sitemap tree and exit
    #[arg(long, conflicts_with_all = ["sitemaps", "recover_ids", "dry_run"])]
    download_sitemaps: bool,

    /// Crawl links from downloaded sitemaps instead of numeric IDs
    #[arg(long, conflicts_with_all = ["download_sitemaps", "recover_ids", "dry_run"])]
    sitemaps: bool,

    /// Replay sitemap files in descending name order
    #[arg(long, requires = "sitemaps")]
    reverse: bool,

    /// Print each site's resume ID recovered from the progress log and exit
    #[arg(long, conflicts_with_all = ["download_sitemaps", "sitemaps", "dry_run"])]
    recover_ids: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["download_sitemaps", "sitemaps", "recover_ids"])]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let coordinator = Coordinator::new(config).context("Failed to build HTTP client")?;

    if cli.download_sitemaps {
        handle_download(&coordinator).await
    } else if cli.recover_ids {
        handle_recover(&coordinator).await
    } else if cli.sitemaps {
        let order = if cli.reverse {
            ReplayOrder::Descending
        } else {
            ReplayOrder::Ascending
        };
        let reports = coordinator
            .crawl_sitemaps(order)
            .await
            .context("Sitemap crawl failed")?;
        print_reports(&reports);
        Ok(())
    } else {
        let reports = coordinator.crawl_ids().await.context("ID crawl failed")?;
        print_reports(&reports);
        Ok(())
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("recipe_harvest=info,warn"),
            1 => EnvFilter::new("recipe_harvest=debug,info"),
            2 => EnvFilter::new("recipe_harvest=trace,debug"),
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

/// Handles the --dry-run mode: shows what each mode would crawl
fn handle_dry_run(config: &Config) {
    println!("=== Recipe-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Request delay: {}ms", config.crawler.request_delay);
    println!("  Request timeout: {}s", config.crawler.request_timeout);
    println!(
        "  Max consecutive failures: {}",
        config.crawler.max_consecutive_failures
    );
    println!("  Batch size: {}", config.crawler.batch_size);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Data directory: {}", config.output.data_dir.display());
    println!("  Shard size cap: {} bytes", config.output.max_shard_bytes);
    println!("  Shards per day: {}", config.output.max_daily_shards);
    println!("  Progress log: {}", config.output.progress_log.display());
    println!("  Sitemap directory: {}", config.output.sitemap_dir.display());

    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        println!("  - {} ({:?})", site.name, site.extractor);
        match (&site.url_template, site.start_id) {
            (Some(template), Some(start)) => println!("    IDs: {} from {}", template, start),
            (Some(template), None) => println!("    IDs: {} (missing start-id)", template),
            (None, Some(start)) => println!("    IDs: from {} (missing url-template)", start),
            (None, None) => {}
        }
        if !site.sitemaps.is_empty() {
            println!("    Seed sitemaps: {}", site.sitemaps.len());
        } else if let Some(robots) = &site.robots_url {
            println!("    Sitemaps from: {}", robots);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --download-sitemaps mode
async fn handle_download(coordinator: &Coordinator) -> anyhow::Result<()> {
    let reports = coordinator
        .download_sitemaps()
        .await
        .context("Sitemap download failed")?;

    for (site, report) in &reports {
        println!(
            "{}: {} fetched, {} stored, {} already present, {} failed",
            site, report.fetched, report.persisted, report.skipped_existing, report.failed
        );
    }
    Ok(())
}

/// Handles the --recover-ids mode
async fn handle_recover(coordinator: &Coordinator) -> anyhow::Result<()> {
    let recovered = coordinator
        .recover_start_ids()
        .await
        .context("Failed to scan progress log")?;

    for site in &coordinator.config().sites {
        match recovered.get(&site.name) {
            Some(id) => println!("{}: resume at {}", site.name, id),
            None => println!("{}: nothing recovered", site.name),
        }
    }
    Ok(())
}

fn print_reports(reports: &[TaskReport]) {
    for report in reports {
        println!("{}", report);
    }
}
