//! Common types shared across the weathermaps crates.

pub mod error;
pub mod grid;
pub mod product;
pub mod region;
pub mod run;

pub use error::{MapError, MapResult};
pub use grid::{normalize_lon, GridField, GridGeometry};
pub use product::Product;
pub use region::{default_regions, load_region_config, RegionBounds, RegionSpec};
pub use run::{forecast_hour_from_name, ModelRun};
