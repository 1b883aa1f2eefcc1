//! Rendering of forecast fields into finished PNG maps.
//!
//! The pipeline per map: subset the decoded grid to a region
//! ([`grid::extract_region`]), resample it to plot resolution, paint it as a
//! filled raster or as contour lines, overlay coastline and border
//! polylines, add the title, footer and color scale, and encode the canvas
//! as a PNG ([`png::encode_png`]).

use thiserror::Error;

use map_common::MapError;

pub mod compose;
pub mod contour;
pub mod glyphs;
pub mod grid;
pub mod png;
pub mod ramp;

pub use compose::{compose_map, render_error_card, BaseLayers, MapStyle, RenderedMap};
pub use grid::{eastward_offset, extract_region, RegionGrid};

/// Errors raised while turning a field into a map image.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("region does not intersect the data grid: {0}")]
    RegionOutsideGrid(String),

    #[error("no finite data values inside the region")]
    NoData,

    #[error("cannot build canvas: {0}")]
    Canvas(String),

    #[error("PNG encoding failed: {0}")]
    Encoding(String),
}

impl From<RenderError> for MapError {
    fn from(err: RenderError) -> Self {
        MapError::RenderError(err.to_string())
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
