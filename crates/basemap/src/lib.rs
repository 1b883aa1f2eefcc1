//! Vector basemap layers for map rendering.
//!
//! Wraps the Natural Earth coastline and country-boundary datasets:
//! - Fetching the published GeoJSON files (see the `preload-basemaps` binary)
//! - Parsing geometries into plain (lon, lat) polylines
//! - Caching parsed layers so render workers share one copy

pub mod fetch;
pub mod geojson;
pub mod store;

pub use fetch::{fetch_all, fetch_layer, layer_url, FetchSummary};
pub use geojson::FeatureCollection;
pub use store::{layer_file_name, resolution_for, BasemapStore, LayerKind, Polylines, Resolution};
