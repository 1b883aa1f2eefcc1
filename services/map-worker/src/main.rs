//! Map rendering worker service.
//!
//! Consumes GRIB download events from the Redis stream and publishes rendered
//! weather maps to object storage:
//! - Full product/region matrix per file, with placeholder cards for gaps
//! - Gzip-transparent GRIB intake, local path or URL
//! - Publishes map.generated events for downstream consumers
//! - HTTP status API for monitoring

mod fetch;
mod pipeline;
mod server;
mod state;
mod worker;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use basemap::BasemapStore;
use clap::Parser;
use map_common::{default_regions, load_region_config};
use map_storage::{ObjectStorage, ObjectStorageConfig};
use tokio::sync::broadcast;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use state::WorkerState;
use worker::WorkerContext;

#[derive(Parser, Debug)]
#[command(name = "map-worker")]
#[command(about = "Weather map rendering worker")]
struct Args {
    /// Worker name (for the consumer group)
    #[arg(short, long, env = "WORKER_NAME")]
    name: Option<String>,

    /// Number of concurrent consumer tasks
    #[arg(short, long, env = "WORKER_CONCURRENCY", default_value = "4")]
    concurrency: usize,

    /// Redis URL for the event stream
    #[arg(long, env = "REDIS_URL", default_value = "redis://redis:6379")]
    redis_url: String,

    /// S3/MinIO endpoint
    #[arg(long, env = "S3_ENDPOINT", default_value = "http://minio:9000")]
    s3_endpoint: String,

    /// Bucket rendered maps are published to
    #[arg(long, env = "S3_BUCKET", default_value = "weather-maps")]
    s3_bucket: String,

    /// S3 access key
    #[arg(long, env = "S3_ACCESS_KEY", default_value = "minioadmin")]
    s3_access_key: String,

    /// S3 secret key
    #[arg(long, env = "S3_SECRET_KEY", default_value = "minioadmin")]
    s3_secret_key: String,

    /// Region config file (YAML); the built-in set is used when omitted
    #[arg(long, env = "WORKER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding Natural Earth basemap layers
    #[arg(long, env = "BASEMAP_DIR", default_value = "/data/basemaps")]
    basemap_dir: PathBuf,

    /// Spool directory for downloaded GRIB files
    #[arg(long, env = "SPOOL_DIR", default_value = "/tmp/weathermaps")]
    spool_dir: PathBuf,

    /// Port for status HTTP server
    #[arg(long, env = "STATUS_PORT", default_value = "8080")]
    status_port: u16,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
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
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let worker_name = args
        .name
        .clone()
        .unwrap_or_else(|| format!("worker-{}", Uuid::new_v4()));

    info!(name = %worker_name, "Starting map worker");

    let regions = match &args.config {
        Some(path) => load_region_config(path)?,
        None => default_regions(),
    };
    let region_ids: Vec<&str> = regions.iter().map(|r| r.id.as_str()).collect();
    info!(regions = ?region_ids, "Loaded regions");

    let storage_config = ObjectStorageConfig {
        endpoint: args.s3_endpoint.clone(),
        bucket: args.s3_bucket.clone(),
        access_key_id: args.s3_access_key.clone(),
        secret_access_key: args.s3_secret_key.clone(),
        ..ObjectStorageConfig::default()
    };
    let storage = ObjectStorage::new(&storage_config)?;
    storage.verify().await?;
    info!(endpoint = %args.s3_endpoint, bucket = %args.s3_bucket, "Connected to object storage");

    let state = Arc::new(WorkerState::new(worker_name.clone()));

    let ctx = Arc::new(WorkerContext {
        storage,
        basemaps: BasemapStore::new(args.basemap_dir.clone()),
        regions,
        state: state.clone(),
        spool_dir: args.spool_dir.clone(),
        redis_url: args.redis_url.clone(),
        http: fetch::build_client()?,
    });

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Status server
    {
        let state = state.clone();
        let port = args.status_port;
        tokio::spawn(async move {
            if let Err(e) = server::run_server(state, port).await {
                error!(error = %e, "Status server failed");
            }
        });
    }

    // Consumer tasks
    let mut consumers = Vec::new();
    for i in 0..args.concurrency.max(1) {
        let consumer_name = format!("{}-{}", worker_name, i);
        consumers.push(tokio::spawn(worker::run_consumer(
            consumer_name,
            ctx.clone(),
            shutdown_tx.subscribe(),
        )));
    }

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    shutdown_tx.send(()).ok();

    for handle in consumers {
        handle.await.ok();
    }

    info!(
        events = state.events_received.load(Ordering::Relaxed),
        maps = state.maps_rendered.load(Ordering::Relaxed),
        placeholders = state.placeholder_maps.load(Ordering::Relaxed),
        failures = state.map_failures.load(Ordering::Relaxed),
        bytes_uploaded = state.bytes_uploaded.load(Ordering::Relaxed),
        "Map worker stopped"
    );
    Ok(())
}
