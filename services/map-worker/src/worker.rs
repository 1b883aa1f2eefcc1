//! Consumer loop: claim events from the stream and dispatch them.

use basemap::BasemapStore;
use map_common::RegionSpec;
use map_storage::{ClaimedEvent, EventBus, ObjectStorage, WeatherEvent};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::pipeline;
use crate::state::WorkerState;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const CLAIM_ERROR_DELAY: Duration = Duration::from_secs(1);

/// Everything a consumer task needs, shared across tasks.
pub struct WorkerContext {
    pub storage: ObjectStorage,
    pub basemaps: BasemapStore,
    pub regions: Vec<RegionSpec>,
    pub state: Arc<WorkerState>,
    pub spool_dir: PathBuf,
    pub redis_url: String,
    pub http: reqwest::Client,
}

/// Run one consumer until shutdown is signalled. Connection failures retry
/// forever; a worker that outlives a Redis restart picks its claims back up.
pub async fn run_consumer(
    name: String,
    ctx: Arc<WorkerContext>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut bus = match connect_with_retry(&ctx.redis_url, &name, &mut shutdown).await {
        Some(bus) => bus,
        None => return,
    };
    info!(consumer = %name, "Consumer started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                info!(consumer = %name, "Consumer stopping");
                return;
            }
            claimed = bus.next_event() => match claimed {
                Ok(Some(claimed)) => handle_event(&ctx, &mut bus, claimed).await,
                Ok(None) => {}
                Err(e) => {
                    error!(consumer = %name, error = %e, "Failed to claim event");
                    tokio::time::sleep(CLAIM_ERROR_DELAY).await;
                    if let Ok(fresh) = EventBus::connect(&ctx.redis_url, &name).await {
                        bus = fresh;
                    }
                }
            }
        }
    }
}

async fn connect_with_retry(
    redis_url: &str,
    consumer: &str,
    shutdown: &mut broadcast::Receiver<()>,
) -> Option<EventBus> {
    loop {
        match EventBus::connect(redis_url, consumer).await {
            Ok(bus) => return Some(bus),
            Err(e) => {
                error!(consumer, error = %e, "Cannot connect to event bus, retrying");
            }
        }
        tokio::select! {
            _ = shutdown.recv() => return None,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}

/// Process one claimed event and acknowledge it. The claim is left pending
/// (not acked) only when processing failed for a reason that is not scoped
/// to this event, so another delivery can succeed.
async fn handle_event(ctx: &WorkerContext, bus: &mut EventBus, claimed: ClaimedEvent) {
    ctx.state.events_received.fetch_add(1, Ordering::Relaxed);
    let ClaimedEvent { stream_id, event } = claimed;

    match event {
        WeatherEvent::GribDownloaded {
            file_path,
            model,
            run_date,
            run_hour,
        } => {
            info!(file = %file_path, model = %model, "Processing GRIB file");
            match pipeline::process_grib(ctx, bus, &file_path, &model, &run_date, &run_hour).await
            {
                Ok(summary) => {
                    ctx.state.gribs_processed.fetch_add(1, Ordering::Relaxed);
                    info!(
                        file = %file_path,
                        maps = summary.maps,
                        placeholders = summary.placeholders,
                        failures = summary.failures,
                        "GRIB file processed"
                    );
                }
                Err(e) => {
                    ctx.state.grib_failures.fetch_add(1, Ordering::Relaxed);
                    error!(file = %file_path, error = %e, "GRIB processing failed");
                    if !e.is_event_scoped() {
                        return;
                    }
                }
            }
        }
        WeatherEvent::MapDeleted { url } => match ctx.storage.key_from_url(&url) {
            Some(key) => match ctx.storage.delete(&key).await {
                Ok(()) => {
                    ctx.state.maps_deleted.fetch_add(1, Ordering::Relaxed);
                    info!(key = %key, "Deleted map");
                }
                Err(e) => error!(key = %key, error = %e, "Failed to delete map"),
            },
            None => warn!(url = %url, "Delete request for a map outside our bucket"),
        },
        // Published by us; other consumers care about these.
        WeatherEvent::MapGenerated { .. } => {}
    }

    if let Err(e) = bus.ack(&stream_id).await {
        warn!(stream_id = %stream_id, error = %e, "Failed to acknowledge event");
    }
}
