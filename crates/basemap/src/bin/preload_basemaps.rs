//! Downloads the Natural Earth layers the map renderer draws.
//!
//! Run once before starting workers (or during image build):
//!
//!   preload-basemaps --dir /data/basemaps
//!
//! Fetches the coastline and country-boundary datasets at all three Natural
//! Earth scales. Files already on disk are left alone, so re-running is safe.

use std::path::PathBuf;

use anyhow::Result;
use basemap::fetch_all;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "preload-basemaps")]
#[command(about = "Downloads Natural Earth basemap layers")]
struct Args {
    /// Directory to store layer files in
    #[arg(long, env = "BASEMAP_DIR", default_value = "/data/basemaps")]
    dir: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(dir = %args.dir.display(), "preloading basemap layers");

    let summary = fetch_all(&args.dir).await?;

    info!(
        fetched = summary.fetched,
        skipped = summary.skipped,
        "basemap preload complete"
    );

    Ok(())
}
