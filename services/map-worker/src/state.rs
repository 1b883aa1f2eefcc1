//! Shared worker state backing the status endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::AtomicU64;
use std::time::Instant;
use tokio::sync::RwLock;

const MAX_RECENT: usize = 100;

/// Counters and recent work, shared between consumer tasks and the HTTP
/// server.
#[derive(Debug)]
pub struct WorkerState {
    pub name: String,
    pub events_received: AtomicU64,
    pub gribs_processed: AtomicU64,
    pub grib_failures: AtomicU64,
    pub maps_rendered: AtomicU64,
    pub placeholder_maps: AtomicU64,
    pub map_failures: AtomicU64,
    pub maps_deleted: AtomicU64,
    pub bytes_uploaded: AtomicU64,
    recent: RwLock<VecDeque<RecentMap>>,
    started_at: Instant,
}

/// One published map, as reported on /status.
#[derive(Debug, Clone, Serialize)]
pub struct RecentMap {
    pub url: String,
    pub product: String,
    pub region: String,
    pub run: String,
    pub placeholder: bool,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl WorkerState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events_received: AtomicU64::new(0),
            gribs_processed: AtomicU64::new(0),
            grib_failures: AtomicU64::new(0),
            maps_rendered: AtomicU64::new(0),
            placeholder_maps: AtomicU64::new(0),
            map_failures: AtomicU64::new(0),
            maps_deleted: AtomicU64::new(0),
            bytes_uploaded: AtomicU64::new(0),
            recent: RwLock::new(VecDeque::new()),
            started_at: Instant::now(),
        }
    }

    pub async fn record_map(&self, map: RecentMap) {
        let mut recent = self.recent.write().await;
        recent.push_front(map);
        while recent.len() > MAX_RECENT {
            recent.pop_back();
        }
    }

    /// Most recent maps, newest first.
    pub async fn recent_maps(&self, limit: usize) -> Vec<RecentMap> {
        self.recent
            .read()
            .await
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
