//! Redis Streams event bus connecting downloaders and render workers.
//!
//! All services share one stream. Render workers consume through a consumer
//! group, so each event is claimed by exactly one worker and survives worker
//! restarts until acknowledged.

use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use map_common::{MapError, MapResult};

const STREAM_KEY: &str = "weather:events";
const CONSUMER_GROUP: &str = "map-renderer";
const BLOCK_MS: usize = 5000;

/// Events exchanged over the bus.
///
/// The JSON payload carries its kind in an `event` field, so producers in
/// other languages can match on it without sharing a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum WeatherEvent {
    /// A model file landed on shared storage and is ready to render.
    #[serde(rename = "grib.downloaded")]
    GribDownloaded {
        file_path: String,
        model: String,
        run_date: String,
        run_hour: String,
    },
    /// A rendered map was uploaded. The field is named `parameter` on the
    /// wire, which is what downstream consumers match on.
    #[serde(rename = "map.generated")]
    MapGenerated {
        model: String,
        run_date: String,
        run_hour: String,
        parameter: String,
        forecast_hour: u32,
        region: String,
        url: String,
    },
    /// A previously published map should be removed.
    #[serde(rename = "map.deleted")]
    MapDeleted { url: String },
}

impl WeatherEvent {
    /// Stream-field value identifying the payload kind.
    pub fn kind(&self) -> &'static str {
        match self {
            WeatherEvent::GribDownloaded { .. } => "grib.downloaded",
            WeatherEvent::MapGenerated { .. } => "map.generated",
            WeatherEvent::MapDeleted { .. } => "map.deleted",
        }
    }
}

/// An event claimed from the stream, paired with the id to acknowledge.
#[derive(Debug, Clone)]
pub struct ClaimedEvent {
    pub stream_id: String,
    pub event: WeatherEvent,
}

/// Consumer-group handle on the shared event stream.
pub struct EventBus {
    conn: MultiplexedConnection,
    consumer: String,
}

impl EventBus {
    /// Connect to Redis and ensure the consumer group exists.
    pub async fn connect(redis_url: &str, consumer: &str) -> MapResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| MapError::EventBusError(format!("invalid Redis URL: {}", e)))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| MapError::EventBusError(format!("Redis connection failed: {}", e)))?;

        // BUSYGROUP means another worker created the group first.
        let created: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(STREAM_KEY)
            .arg(CONSUMER_GROUP)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;
        if let Err(e) = created {
            if !e.to_string().contains("BUSYGROUP") {
                return Err(MapError::EventBusError(format!(
                    "cannot create consumer group: {}",
                    e
                )));
            }
        }

        Ok(Self {
            conn,
            consumer: consumer.to_string(),
        })
    }

    /// Claim the next event for this consumer, blocking up to five seconds.
    ///
    /// Entries whose payload does not parse are acknowledged and skipped so
    /// one poison entry cannot wedge the whole group.
    pub async fn next_event(&mut self) -> MapResult<Option<ClaimedEvent>> {
        let opts = StreamReadOptions::default()
            .group(CONSUMER_GROUP, &self.consumer)
            .count(1)
            .block(BLOCK_MS);

        let reply: StreamReadReply = self
            .conn
            .xread_options(&[STREAM_KEY], &[">"], &opts)
            .await
            .map_err(|e| MapError::EventBusError(format!("read failed: {}", e)))?;

        for stream in reply.keys {
            for entry in stream.ids {
                match parse_entry(&entry) {
                    Ok(event) => {
                        return Ok(Some(ClaimedEvent {
                            stream_id: entry.id,
                            event,
                        }));
                    }
                    Err(e) => {
                        warn!(stream_id = %entry.id, error = %e, "dropping unparseable event");
                        self.ack(&entry.id).await?;
                    }
                }
            }
        }

        Ok(None)
    }

    /// Acknowledge a processed entry.
    pub async fn ack(&mut self, stream_id: &str) -> MapResult<()> {
        let _: i64 = redis::cmd("XACK")
            .arg(STREAM_KEY)
            .arg(CONSUMER_GROUP)
            .arg(stream_id)
            .query_async(&mut self.conn)
            .await
            .map_err(|e| MapError::EventBusError(format!("ack failed: {}", e)))?;
        Ok(())
    }

    /// Append an event to the stream, returning its entry id.
    pub async fn publish(&mut self, event: &WeatherEvent) -> MapResult<String> {
        let json = serde_json::to_string(event)
            .map_err(|e| MapError::InternalError(format!("serialize failed: {}", e)))?;

        let entry_id: String = redis::cmd("XADD")
            .arg(STREAM_KEY)
            .arg("*")
            .arg("event")
            .arg(event.kind())
            .arg("data")
            .arg(&json)
            .query_async(&mut self.conn)
            .await
            .map_err(|e| MapError::EventBusError(format!("publish failed: {}", e)))?;

        debug!(stream_id = %entry_id, kind = event.kind(), "published event");
        Ok(entry_id)
    }
}

fn parse_entry(entry: &StreamId) -> Result<WeatherEvent, String> {
    let data = entry
        .map
        .get("data")
        .ok_or_else(|| "missing data field".to_string())?;
    let bytes: Vec<u8> =
        redis::from_redis_value(data).map_err(|e| format!("bad data field: {}", e))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("bad event JSON: {}", e))
}
