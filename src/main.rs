use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use feedfold::config::Config;
use feedfold::feed::build_client;
use feedfold::ingest::run_ingestion;

#[derive(Parser, Debug)]
#[command(
    name = "feedfold",
    about = "Fold RSS/Atom feed items into a deduplicated JSON archive"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,

    /// Path to the JSON feed list (overrides config)
    #[arg(long, value_name = "FILE")]
    feeds: Option<PathBuf>,

    /// Output directory for the archive and metadata (overrides config)
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config).context("Failed to load configuration")?;
    if let Some(feeds) = args.feeds {
        config.feeds_path = feeds;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    let client = build_client().context("Failed to build HTTP client")?;

    let report = run_ingestion(&config, &client)
        .await
        .context("Ingestion run failed")?;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(count) => println!("✓ {}: {} items", outcome.url, count),
            Err(e) => eprintln!("✗ {}: {}", outcome.url, e),
        }
    }
    println!(
        "\n✓ Complete: {} total items ({} new)",
        report.metadata.total_items, report.metadata.new_items
    );

    Ok(())
}
