//! HTTP download of GRIB files into the local spool directory.

use map_common::{MapError, MapResult};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(2);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn build_client() -> MapResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| MapError::FetchError(format!("cannot build HTTP client: {}", e)))
}

/// File name to spool a URL under. The query string and fragment are
/// dropped and unsafe characters replaced so the result is a single path
/// component.
pub fn spool_name(url: &str) -> String {
    let without_query = match url.find(|c| c == '?' || c == '#') {
        Some(i) => &url[..i],
        None => url,
    };
    let trimmed = without_query.trim_end_matches('/');
    let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "download.grib2".to_string()
    } else {
        sanitized
    }
}

/// Download `url` into `spool_dir`, returning the local path. Files already
/// present are reused without contacting the server.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    spool_dir: &Path,
) -> MapResult<PathBuf> {
    tokio::fs::create_dir_all(spool_dir)
        .await
        .map_err(|e| MapError::FetchError(format!("cannot create spool dir: {}", e)))?;

    let target = spool_dir.join(spool_name(url));
    if target.exists() {
        info!(path = %target.display(), "File already spooled, skipping download");
        return Ok(target);
    }

    let partial = spool_dir.join(format!("{}.partial", spool_name(url)));
    let mut delay = INITIAL_RETRY_DELAY;

    for attempt in 1..=MAX_ATTEMPTS {
        match try_download(client, url, &partial).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial, &target)
                    .await
                    .map_err(|e| MapError::FetchError(format!("cannot move download: {}", e)))?;
                info!(url, path = %target.display(), bytes, "Downloaded GRIB file");
                return Ok(target);
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                warn!(url, attempt, error = %e, "Download attempt failed");
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
            }
        }
    }

    Err(MapError::FetchError(format!(
        "download of {} failed after {} attempts",
        url, MAX_ATTEMPTS
    )))
}

async fn try_download(
    client: &reqwest::Client,
    url: &str,
    partial: &Path,
) -> Result<u64, String> {
    use futures::StreamExt;

    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }

    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(|e| e.to_string())?;
    let mut stream = response.bytes_stream();
    let mut bytes: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        file.write_all(&chunk).await.map_err(|e| e.to_string())?;
        bytes += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| e.to_string())?;
    file.sync_all().await.map_err(|e| e.to_string())?;
    Ok(bytes)
}
