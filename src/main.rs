//! Counsel-Crawler main entry point
//!
//! This is the command-line interface for the Counsel-Crawler contact crawler.

use anyhow::Context;
use clap::Parser;
use counsel_crawler::config::{ensure_search_credential, load_config_with_hash, Config};
use counsel_crawler::crawler::crawl;
use counsel_crawler::model::SeedSite;
use counsel_crawler::output::{generate_markdown_summary, print_statistics};
use counsel_crawler::seeds::{distinct_domains, parse_url_list, push_config_seeds, SeedBuilder};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Counsel-Crawler: a polite contact crawler for law-firm websites
///
/// Counsel-Crawler fetches each selected firm's front page and the attorney
/// profile pages it links to, and extracts emails, phone numbers, vCards,
/// PDFs and images into one record per firm.
#[derive(Parser, Debug)]
#[command(name = "counsel-crawler")]
#[command(version)]
#[command(about = "A polite contact crawler for law-firm websites", long_about = None)]
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

    /// File of additional seed URLs, one per line
    #[arg(long, value_name = "FILE")]
    urls: Option<PathBuf>,

    /// Practice area recorded on seeds read from --urls
    #[arg(long, value_name = "AREA", requires = "urls")]
    practice_area: Option<String>,

    /// Validate config and list the seeds without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    ensure_search_credential(&config)?;

    let seeds = collect_seeds(&config, cli.urls.as_deref(), cli.practice_area)?;

    if cli.dry_run {
        handle_dry_run(&config, &seeds);
        return Ok(());
    }

    handle_crawl(config, seeds, &config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("counsel_crawler=info,warn"),
            1 => EnvFilter::new("counsel_crawler=debug,info"),
            2 => EnvFilter::new("counsel_crawler=trace,debug"),
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

/// Merges `[[seed]]` entries with the optional URL list file
fn collect_seeds(
    config: &Config,
    urls_file: Option<&Path>,
    practice_area: Option<String>,
) -> anyhow::Result<Vec<SeedSite>> {
    let mut builder = SeedBuilder::new();
    push_config_seeds(&mut builder, &config.seeds);

    if let Some(path) = urls_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read URL list {}", path.display()))?;
        let before = builder.len();
        for url in parse_url_list(&content) {
            builder.push(url, practice_area.clone(), Vec::new());
        }
        tracing::info!(
            "Imported {} seed(s) from {}",
            builder.len() - before,
            path.display()
        );
    }

    Ok(builder.build())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, seeds: &[SeedSite]) {
    println!("=== Counsel-Crawler Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Worker pool: {}", config.crawler.max_concurrent_requests);
    println!("  Per-domain burst: {}", config.crawler.per_domain_burst);
    println!(
        "  Politeness delay: {}ms",
        config.crawler.politeness_delay_ms
    );
    println!(
        "  Retries: {} (base delay {}ms)",
        config.crawler.max_retries, config.crawler.retry_base_delay_ms
    );
    println!("  Max profile links: {}", config.crawler.max_profile_links);
    println!("  Max pages per site: {}", config.crawler.max_pages_per_site);
    println!("  vCard size limit: {} bytes", config.vcard.max_bytes);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Summary: {}", config.output.summary_path);

    println!(
        "\nSeed Sites ({}, {} domains):",
        seeds.len(),
        distinct_domains(seeds)
    );
    for seed in seeds {
        match &seed.practice_area {
            Some(area) => println!("  - {} [{}]", seed.base_url, area),
            None => println!("  - {}", seed.base_url),
        }
    }

    println!("\n✓ Configuration is valid");
    if seeds.is_empty() {
        println!("✗ No seed sites: add [[seed]] entries or pass --urls");
    } else {
        println!("✓ Would start crawling {} seed site(s)", seeds.len());
    }
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, seeds: Vec<SeedSite>, config_hash: &str) -> anyhow::Result<()> {
    tracing::info!(
        "Crawling {} seed site(s) across {} domain(s)",
        seeds.len(),
        distinct_domains(&seeds)
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling crawl");
            on_signal.cancel();
        }
    });

    let summary_path = PathBuf::from(&config.output.summary_path);
    let report = match crawl(config, seeds, cancel).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    if report.cancelled {
        tracing::warn!(
            "Crawl cancelled: {} record(s) kept, {} discarded",
            report.records.len(),
            report.discarded.len()
        );
    } else {
        tracing::info!("Crawl completed successfully");
    }

    print_statistics(&report.statistics);

    generate_markdown_summary(&report, config_hash, &summary_path)?;
    println!("\n✓ Summary written to: {}", summary_path.display());

    Ok(())
}
