//! Storage and messaging for the map rendering pipeline.
//!
//! Provides the two shared backends every worker talks to:
//! - Object storage (MinIO/S3) holding the published map images
//! - Redis Streams event bus carrying download and publish notifications

pub mod events;
pub mod object_store;

pub use self::object_store::{ObjectStorage, ObjectStorageConfig};
pub use events::{ClaimedEvent, EventBus, WeatherEvent};
