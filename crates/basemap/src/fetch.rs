//! Fetches Natural Earth GeoJSON layers over HTTP.
//!
//! Used by the `preload-basemaps` binary to populate the layer directory
//! before any worker renders a map.

use std::path::Path;
use std::time::Duration;

use map_common::{MapError, MapResult};
use tracing::{info, warn};

use crate::geojson::FeatureCollection;
use crate::store::{layer_file_name, LayerKind, Resolution};

const NATURAL_EARTH_BASE: &str =
    "https://raw.githubusercontent.com/nvkelso/natural-earth-vector/master/geojson";

const MAX_ATTEMPTS: u32 = 4;
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(2);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upstream URL for one layer file.
pub fn layer_url(kind: LayerKind, resolution: Resolution) -> String {
    format!("{}/{}", NATURAL_EARTH_BASE, layer_file_name(kind, resolution))
}

/// Outcome of a [`fetch_all`] run.
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchSummary {
    pub fetched: usize,
    pub skipped: usize,
}

pub fn build_client() -> MapResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| MapError::FetchError(format!("failed to build HTTP client: {}", e)))
}

/// Downloads every layer at every resolution into `dir`, skipping files
/// already present.
pub async fn fetch_all(dir: &Path) -> MapResult<FetchSummary> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| MapError::FetchError(format!("cannot create {}: {}", dir.display(), e)))?;

    let client = build_client()?;
    let mut summary = FetchSummary::default();
    for kind in LayerKind::ALL {
        for resolution in Resolution::ALL {
            if fetch_layer(&client, dir, kind, resolution).await? {
                summary.fetched += 1;
            } else {
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}

/// Downloads one layer file unless it already exists on disk.
///
/// Returns `true` when a file was downloaded. The body is parsed as GeoJSON
/// before it replaces anything on disk, so a truncated transfer or an HTML
/// error page never lands under the final name.
pub async fn fetch_layer(
    client: &reqwest::Client,
    dir: &Path,
    kind: LayerKind,
    resolution: Resolution,
) -> MapResult<bool> {
    let file_name = layer_file_name(kind, resolution);
    let final_path = dir.join(&file_name);
    if final_path.exists() {
        info!(path = %final_path.display(), "layer file already exists, skipping");
        return Ok(false);
    }

    let url = layer_url(kind, resolution);
    let body = get_with_retries(client, &url).await?;

    serde_json::from_slice::<FeatureCollection>(&body)
        .map_err(|e| MapError::FetchError(format!("{} is not a feature collection: {}", url, e)))?;

    let temp_path = dir.join(format!("{}.partial", file_name));
    tokio::fs::write(&temp_path, &body)
        .await
        .map_err(|e| MapError::FetchError(format!("cannot write {}: {}", temp_path.display(), e)))?;
    tokio::fs::rename(&temp_path, &final_path).await.map_err(|e| {
        MapError::FetchError(format!(
            "cannot move {} into place: {}",
            temp_path.display(),
            e
        ))
    })?;

    info!(
        url = %url,
        path = %final_path.display(),
        bytes = body.len(),
        "fetched basemap layer"
    );
    Ok(true)
}

async fn get_with_retries(client: &reqwest::Client, url: &str) -> MapResult<Vec<u8>> {
    let mut delay = INITIAL_RETRY_DELAY;
    let mut last_error = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        match try_get(client, url).await {
            Ok(body) => return Ok(body),
            Err(e) => {
                warn!(url = %url, attempt, error = %e, "layer download failed");
                last_error = e;
            }
        }
        if attempt < MAX_ATTEMPTS {
            tokio::time::sleep(delay).await;
            delay = std::cmp::min(delay * 2, MAX_RETRY_DELAY);
        }
    }

    Err(MapError::FetchError(format!(
        "{} failed after {} attempts: {}",
        url, MAX_ATTEMPTS, last_error
    )))
}

async fn try_get(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("request error: {}", e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| format!("body read error: {}", e))?;
    Ok(body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_urls_point_at_natural_earth() {
        assert_eq!(
            layer_url(LayerKind::Coastline, Resolution::Medium),
            "https://raw.githubusercontent.com/nvkelso/natural-earth-vector/master/geojson/ne_50m_coastline.geojson"
        );
        assert_eq!(
            layer_url(LayerKind::Borders, Resolution::High),
            "https://raw.githubusercontent.com/nvkelso/natural-earth-vector/master/geojson/ne_10m_admin_0_boundary_lines_land.geojson"
        );
    }

    #[tokio::test]
    async fn test_existing_file_is_not_refetched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ne_110m_coastline.geojson"), "{}").unwrap();

        let client = build_client().unwrap();
        let fetched = fetch_layer(&client, dir.path(), LayerKind::Coastline, Resolution::Low)
            .await
            .unwrap();
        assert!(!fetched, "existing file must short-circuit the download");
    }
}
