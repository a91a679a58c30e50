//! Patchwise main entry point
//!
//! This is the command-line interface for the Patchwise advisory scraper.

use anyhow::Context;
use clap::Parser;
use patchwise::batch::{
    collect_urls, map_rows, read_rows, BatchCoordinator, BatchReport, RowResult,
};
use patchwise::config::{load_config_with_hash, Config};
use patchwise::fetch::PageRenderer;
use patchwise::output::{
    generate_markdown_summary, print_statistics, render_row, write_rows, BatchStatistics,
    BatchSummary, RenderedRow,
};
use patchwise::storage::{open_store, ReportStore, RunStatus};
use patchwise::url::AdvisoryUrl;
use patchwise::VendorRegistry;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Patchwise: vendor advisory scraper
///
/// Reads rows of CVE reference URLs, fetches each unique advisory once
/// (vendor API, headless browser, or direct HTTP), extracts patch
/// identifiers, fix versions and download links, and reports a status per row.
#[derive(Parser, Debug)]
#[command(name = "patchwise")]
#[command(version)]
#[command(about = "Vendor advisory scraping and extraction engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Row file: one row per line, `[id,]url|url|...`
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show vendor resolution and fetch order for each unique URL without fetching
    #[arg(long)]
    dry_run: bool,

    /// Do not write the SQLite report
    #[arg(long)]
    no_report: bool,

    /// Write the markdown summary here instead of the configured path
    #[arg(long, value_name = "PATH")]
    summary: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let rows = read_rows(&cli.input)?;
    tracing::info!("Read {} rows from {}", rows.len(), cli.input.display());

    if cli.dry_run {
        handle_dry_run(&collect_urls(&rows));
        return Ok(());
    }

    let urls = collect_urls(&rows);
    let report = run_batch(&config, urls).await?;
    let row_results = map_rows(&rows, &report);

    let run_id = if cli.no_report {
        None
    } else {
        Some(save_report(&config, &config_hash, &report, &row_results)?)
    };

    let stats = BatchStatistics::collect(&report, &row_results);
    let summary_path = cli
        .summary
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.summary_path));
    let summary = BatchSummary {
        run_id,
        config_hash: Some(&config_hash),
        report: &report,
        stats: &stats,
    };
    generate_markdown_summary(&summary, &summary_path)
        .with_context(|| format!("failed to write summary {}", summary_path.display()))?;
    tracing::info!("Summary written to {}", summary_path.display());

    let rendered: Vec<RenderedRow> = row_results
        .iter()
        .map(|row| render_row(row, &config.output.link_delimiter))
        .collect();
    write_rows(&rendered, &mut std::io::stdout().lock())?;

    if !cli.quiet {
        print_statistics(&stats);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("patchwise=info,warn"),
            1 => EnvFilter::new("patchwise=debug,info"),
            2 => EnvFilter::new("patchwise=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    // Rows go to stdout, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows how each unique URL would be fetched
fn handle_dry_run(urls: &[String]) {
    let registry = VendorRegistry::builtin();
    let mut seen = HashSet::new();
    let mut malformed = 0;

    println!("=== Patchwise Dry Run ===\n");
    for raw in urls {
        match AdvisoryUrl::parse(raw) {
            Ok(url) => {
                if !seen.insert(url.as_str().to_string()) {
                    continue;
                }
                let profile = registry.resolve(&url);
                let order: Vec<&str> = profile.fetch_priority.iter().map(|s| s.as_str()).collect();
                println!(
                    "{}\n  vendor: {}\n  fetch order: {}",
                    url,
                    profile.name,
                    order.join(" -> ")
                );
            }
            Err(e) => {
                malformed += 1;
                println!("{}\n  malformed: {}", raw.trim(), e);
            }
        }
    }

    println!(
        "\n✓ {} reference URLs, {} unique, {} malformed",
        urls.len(),
        seen.len(),
        malformed
    );
}

#[cfg(feature = "browser")]
async fn build_renderer(config: &Config) -> Option<Arc<dyn PageRenderer>> {
    if !config.browser.enabled {
        return None;
    }
    match patchwise::fetch::ChromiumRenderer::launch(&config.fetch.user_agent).await {
        Ok(renderer) => {
            tracing::info!("Headless browser launched");
            Some(Arc::new(renderer))
        }
        Err(e) => {
            tracing::warn!("Headless browser unavailable, falling back to direct HTTP: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "browser"))]
async fn build_renderer(config: &Config) -> Option<Arc<dyn PageRenderer>> {
    if config.browser.enabled {
        tracing::warn!("[browser] enabled = true, but this build lacks the `browser` feature");
    }
    None
}

/// Runs the batch, logging progress and cancelling on Ctrl-C
async fn run_batch(config: &Config, urls: Vec<String>) -> anyhow::Result<BatchReport> {
    let renderer = build_renderer(config).await;
    let coordinator = Arc::new(BatchCoordinator::from_config(config, renderer)?);
    let mut handle = coordinator.spawn(urls);

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping batch");
            token.cancel();
        }
    });

    while let Some(progress) = handle.next_progress().await {
        tracing::info!(
            "[{}/{}] {} {}",
            progress.completed,
            progress.total,
            progress.status,
            progress.url
        );
    }

    Ok(handle.wait().await?)
}

/// Records the run, its URL outcomes and its row results
fn save_report(
    config: &Config,
    config_hash: &str,
    report: &BatchReport,
    rows: &[RowResult],
) -> anyhow::Result<i64> {
    let path = Path::new(&config.output.database_path);
    let mut store = open_store(path)
        .with_context(|| format!("failed to open report database {}", path.display()))?;

    let run_id = store.create_run(config_hash)?;
    store.save_outcomes(run_id, report)?;
    store.save_row_results(run_id, rows, &config.output.link_delimiter)?;
    let status = if report.interrupted {
        RunStatus::Interrupted
    } else {
        RunStatus::Completed
    };
    store.finish_run(run_id, status)?;

    tracing::info!("Run {} recorded in {}", run_id, path.display());
    Ok(run_id)
}
