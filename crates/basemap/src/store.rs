//! Cached access to Natural Earth layer files on disk.
//!
//! Layer files are fetched ahead of time by the `preload-basemaps` binary.
//! The store parses each GeoJSON file once and keeps the flattened polylines
//! behind an `Arc`, so concurrent renders share a single copy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use map_common::{MapError, MapResult, RegionBounds};
use tokio::sync::RwLock;
use tracing::debug;

use crate::geojson::FeatureCollection;

/// Flattened line work for one layer: a list of (lon, lat) polylines.
pub type Polylines = Vec<Vec<(f64, f64)>>;

/// The vector layers drawn on every map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Physical coastlines.
    Coastline,
    /// Country boundary lines over land.
    Borders,
}

impl LayerKind {
    pub const ALL: [LayerKind; 2] = [LayerKind::Coastline, LayerKind::Borders];

    /// Natural Earth dataset name for this layer.
    pub fn dataset(&self) -> &'static str {
        match self {
            LayerKind::Coastline => "coastline",
            LayerKind::Borders => "admin_0_boundary_lines_land",
        }
    }
}

/// Natural Earth publishes each dataset at three nominal scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// 1:10m, most detailed.
    High,
    /// 1:50m.
    Medium,
    /// 1:110m, coarsest.
    Low,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Resolution::High, Resolution::Medium, Resolution::Low];

    /// Scale token used in Natural Earth file names.
    pub fn scale(&self) -> &'static str {
        match self {
            Resolution::High => "10m",
            Resolution::Medium => "50m",
            Resolution::Low => "110m",
        }
    }
}

/// Picks a layer resolution from the longitude span of a region.
///
/// Narrow regions get the detailed coastline set; continental views use the
/// coarse set so line work stays legible at plot scale.
pub fn resolution_for(bounds: &RegionBounds) -> Resolution {
    let span = bounds.width();
    if span < 10.0 {
        Resolution::High
    } else if span < 40.0 {
        Resolution::Medium
    } else {
        Resolution::Low
    }
}

/// File name a layer is stored under, matching the upstream GeoJSON name.
pub fn layer_file_name(kind: LayerKind, resolution: Resolution) -> String {
    format!("ne_{}_{}.geojson", resolution.scale(), kind.dataset())
}

/// Lazily parsed cache of the layer files under one directory.
pub struct BasemapStore {
    dir: PathBuf,
    cache: RwLock<HashMap<(LayerKind, Resolution), Arc<Polylines>>>,
}

impl BasemapStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Directory the layer files live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the polylines for one layer, parsing its file on first use.
    pub async fn layer(
        &self,
        kind: LayerKind,
        resolution: Resolution,
    ) -> MapResult<Arc<Polylines>> {
        if let Some(cached) = self.cache.read().await.get(&(kind, resolution)) {
            return Ok(cached.clone());
        }

        let loaded = Arc::new(self.load(kind, resolution).await?);
        let mut cache = self.cache.write().await;
        // Another task may have loaded the same layer while we parsed.
        let entry = cache.entry((kind, resolution)).or_insert(loaded);
        Ok(entry.clone())
    }

    /// Coastline and border layers for a region, at a resolution matched to
    /// its extent.
    pub async fn layers_for(
        &self,
        bounds: &RegionBounds,
    ) -> MapResult<(Arc<Polylines>, Arc<Polylines>)> {
        let resolution = resolution_for(bounds);
        let coastlines = self.layer(LayerKind::Coastline, resolution).await?;
        let borders = self.layer(LayerKind::Borders, resolution).await?;
        Ok((coastlines, borders))
    }

    async fn load(&self, kind: LayerKind, resolution: Resolution) -> MapResult<Polylines> {
        let path = self.dir.join(layer_file_name(kind, resolution));
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            MapError::BasemapError(format!(
                "cannot read {} ({}); run preload-basemaps to fetch layer files",
                path.display(),
                e
            ))
        })?;
        let collection: FeatureCollection = serde_json::from_str(&raw).map_err(|e| {
            MapError::BasemapError(format!("invalid GeoJSON in {}: {}", path.display(), e))
        })?;
        let polylines = collection.into_polylines();
        debug!(
            path = %path.display(),
            lines = polylines.len(),
            "loaded basemap layer"
        );
        Ok(polylines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COASTLINE_JSON: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "LineString",
                    "coordinates": [[34.0, 31.0], [35.0, 32.0], [35.5, 33.0]]
                }
            }
        ]
    }"#;

    fn write_layer(dir: &Path, kind: LayerKind, resolution: Resolution, json: &str) {
        std::fs::write(dir.join(layer_file_name(kind, resolution)), json).unwrap();
    }

    #[test]
    fn test_resolution_for_region_span() {
        let narrow = RegionBounds::new(33.5, 36.5, 29.0, 33.5).unwrap();
        let medium = RegionBounds::new(25.0, 40.0, 25.0, 40.0).unwrap();
        let wide = RegionBounds::new(-10.0, 40.0, 25.0, 70.0).unwrap();

        assert_eq!(resolution_for(&narrow), Resolution::High);
        assert_eq!(resolution_for(&medium), Resolution::Medium);
        assert_eq!(resolution_for(&wide), Resolution::Low);
    }

    #[test]
    fn test_layer_file_names_match_natural_earth() {
        assert_eq!(
            layer_file_name(LayerKind::Coastline, Resolution::High),
            "ne_10m_coastline.geojson"
        );
        assert_eq!(
            layer_file_name(LayerKind::Borders, Resolution::Low),
            "ne_110m_admin_0_boundary_lines_land.geojson"
        );
    }

    #[tokio::test]
    async fn test_layer_parses_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        write_layer(dir.path(), LayerKind::Coastline, Resolution::Low, COASTLINE_JSON);

        let store = BasemapStore::new(dir.path());
        let lines = store
            .layer(LayerKind::Coastline, Resolution::Low)
            .await
            .unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), 3);
        assert_eq!(lines[0][0], (34.0, 31.0));
    }

    #[tokio::test]
    async fn test_layer_is_cached_after_first_load() {
        let dir = tempfile::tempdir().unwrap();
        write_layer(dir.path(), LayerKind::Coastline, Resolution::Low, COASTLINE_JSON);

        let store = BasemapStore::new(dir.path());
        let first = store
            .layer(LayerKind::Coastline, Resolution::Low)
            .await
            .unwrap();

        // Delete the file; the cached copy must still be served.
        std::fs::remove_file(
            dir.path()
                .join(layer_file_name(LayerKind::Coastline, Resolution::Low)),
        )
        .unwrap();

        let second = store
            .layer(LayerKind::Coastline, Resolution::Low)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_missing_file_names_the_preloader() {
        let dir = tempfile::tempdir().unwrap();
        let store = BasemapStore::new(dir.path());

        let err = store
            .layer(LayerKind::Borders, Resolution::High)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("preload-basemaps"), "got: {message}");
        assert!(message.contains("ne_10m_admin_0_boundary_lines_land.geojson"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_layer(
            dir.path(),
            LayerKind::Coastline,
            Resolution::Medium,
            "{ not geojson",
        );

        let store = BasemapStore::new(dir.path());
        let err = store
            .layer(LayerKind::Coastline, Resolution::Medium)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid GeoJSON"));
    }

    #[tokio::test]
    async fn test_layers_for_uses_span_matched_resolution() {
        let dir = tempfile::tempdir().unwrap();
        write_layer(dir.path(), LayerKind::Coastline, Resolution::High, COASTLINE_JSON);
        write_layer(
            dir.path(),
            LayerKind::Borders,
            Resolution::High,
            r#"{"type": "FeatureCollection", "features": []}"#,
        );

        let store = BasemapStore::new(dir.path());
        let narrow = RegionBounds::new(33.5, 36.5, 29.0, 33.5).unwrap();
        let (coastlines, borders) = store.layers_for(&narrow).await.unwrap();

        assert_eq!(coastlines.len(), 1);
        assert!(borders.is_empty());
    }
}
