//! Error types shared across the weathermaps crates.

use thiserror::Error;

/// Result type alias using MapError.
pub type MapResult<T> = Result<T, MapError>;

/// Primary error type for map pipeline operations.
#[derive(Debug, Error)]
pub enum MapError {
    // === Decoding Errors ===
    #[error("Invalid GRIB2 data: {0}")]
    GribError(String),

    // === Rendering Errors ===
    #[error("Rendering failed: {0}")]
    RenderError(String),

    #[error("Basemap error: {0}")]
    BasemapError(String),

    // === Storage Errors ===
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Event bus error: {0}")]
    EventBusError(String),

    // === Input Errors ===
    #[error("Fetch failed: {0}")]
    FetchError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl MapError {
    /// Whether the failure is scoped to one event or map, as opposed to a
    /// connection-level failure that warrants backing off and retrying.
    pub fn is_event_scoped(&self) -> bool {
        !matches!(
            self,
            MapError::EventBusError(_) | MapError::InternalError(_)
        )
    }
}

// Conversion from common error types
impl From<std::io::Error> for MapError {
    fn from(err: std::io::Error) -> Self {
        MapError::InternalError(format!("I/O error: {}", err))
    }
}

impl From<serde_json::Error> for MapError {
    fn from(err: serde_json::Error) -> Self {
        MapError::InternalError(format!("JSON error: {}", err))
    }
}
