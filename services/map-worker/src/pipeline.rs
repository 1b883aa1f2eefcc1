//! The render pipeline: one GRIB file in, a matrix of published maps out.
//!
//! Every product in [`Product::ALL`] is rendered for every configured region.
//! A product missing from the file or failing to render produces a
//! placeholder card instead of a map, so the full matrix is always published
//! and viewers never see a stale image for a newer run.

use bytes::Bytes;
use chrono::Utc;
use flate2::read::GzDecoder;
use grib2_decoder::{find_product, Grib2Message, Grib2Reader};
use map_common::{
    forecast_hour_from_name, GridField, MapError, MapResult, ModelRun, Product, RegionSpec,
};
use map_renderer::{compose_map, render_error_card, BaseLayers, MapStyle, RenderedMap};
use map_storage::{EventBus, WeatherEvent};
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::fetch;
use crate::state::RecentMap;
use crate::worker::WorkerContext;

/// Outcome of one processed GRIB file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSummary {
    pub maps: u32,
    pub placeholders: u32,
    pub failures: u32,
}

/// Render and publish all products and regions for one downloaded file.
///
/// Per-cell failures are counted and logged without aborting the rest of the
/// matrix. Only errors that would hit every cell alike (dead event bus,
/// internal faults) abort early, so the claim stays pending and the whole
/// event is retried.
pub async fn process_grib(
    ctx: &WorkerContext,
    bus: &mut EventBus,
    file_path: &str,
    model: &str,
    run_date: &str,
    run_hour: &str,
) -> MapResult<ProcessSummary> {
    let (local, downloaded) = ensure_local(ctx, file_path).await?;
    let result = render_file(ctx, bus, &local, file_path, model, run_date, run_hour).await;

    // Spooled downloads are one-shot; local files belong to whoever
    // published the event.
    if downloaded {
        if let Err(e) = tokio::fs::remove_file(&local).await {
            warn!(path = %local.display(), error = %e, "Failed to remove spooled file");
        }
    }
    result
}

async fn render_file(
    ctx: &WorkerContext,
    bus: &mut EventBus,
    local: &std::path::Path,
    file_path: &str,
    model: &str,
    run_date: &str,
    run_hour: &str,
) -> MapResult<ProcessSummary> {
    let raw = tokio::fs::read(local)
        .await
        .map_err(|e| MapError::FetchError(format!("cannot read {}: {}", local.display(), e)))?;
    let data = decompress_if_gzip(raw)?;

    let (messages, parse_errors) = Grib2Reader::new(data).read_all();
    if !parse_errors.is_empty() {
        warn!(
            count = parse_errors.len(),
            file = %local.display(),
            "Some GRIB messages failed to parse"
        );
    }
    if messages.is_empty() {
        return Err(MapError::GribError(format!(
            "no decodable messages in {}",
            local.display()
        )));
    }

    let forecast_hour = resolve_forecast_hour(file_path, &messages);
    let run = ModelRun::new(model, run_date, run_hour, forecast_hour);
    info!(run = %run.descriptor(), messages = messages.len(), "Rendering maps");

    let style = MapStyle::default();
    let mut summary = ProcessSummary::default();

    for product in Product::ALL {
        let field = extract_field(&messages, product, &run);

        for region in &ctx.regions {
            let started = Instant::now();

            let (map, placeholder) =
                match render_map(ctx, &style, product, region, &run, field.as_ref()).await {
                    Ok(rendered) => rendered,
                    Err(e) => {
                        error!(
                            product = product.id(),
                            region = %region.id,
                            error = %e,
                            "Failed to render map"
                        );
                        ctx.state.map_failures.fetch_add(1, Ordering::Relaxed);
                        summary.failures += 1;
                        continue;
                    }
                };

            match upload_and_publish(ctx, bus, product, region, &run, map).await {
                Ok(url) => {
                    if placeholder {
                        ctx.state.placeholder_maps.fetch_add(1, Ordering::Relaxed);
                        summary.placeholders += 1;
                    } else {
                        ctx.state.maps_rendered.fetch_add(1, Ordering::Relaxed);
                        summary.maps += 1;
                    }
                    ctx.state
                        .record_map(RecentMap {
                            url,
                            product: product.id().to_string(),
                            region: region.id.clone(),
                            run: run.descriptor(),
                            placeholder,
                            duration_ms: started.elapsed().as_millis() as u64,
                            completed_at: Utc::now(),
                        })
                        .await;
                }
                Err(e) if !e.is_event_scoped() => return Err(e),
                Err(e) => {
                    error!(
                        product = product.id(),
                        region = %region.id,
                        error = %e,
                        "Failed to publish map"
                    );
                    ctx.state.map_failures.fetch_add(1, Ordering::Relaxed);
                    summary.failures += 1;
                }
            }
        }
    }

    info!(
        run = %run.descriptor(),
        maps = summary.maps,
        placeholders = summary.placeholders,
        failures = summary.failures,
        "Finished file"
    );
    Ok(summary)
}

/// Find, unpack and unit-convert one product's field. `None` means the
/// region loop will publish placeholder cards for it.
fn extract_field(messages: &[Grib2Message], product: Product, run: &ModelRun) -> Option<GridField> {
    match find_product(messages, product) {
        Some(message) => match message.unpack() {
            Ok(mut field) => {
                field.convert_units(|v| product.convert(v));
                Some(field)
            }
            Err(e) => {
                warn!(product = product.id(), error = %e, "Failed to unpack field");
                None
            }
        },
        None => {
            warn!(
                product = product.id(),
                run = %run.descriptor(),
                "Product not present in file"
            );
            None
        }
    }
}

/// Render one map, or a placeholder card when the field is missing or the
/// composition fails. The bool is true for placeholders.
async fn render_map(
    ctx: &WorkerContext,
    style: &MapStyle,
    product: Product,
    region: &RegionSpec,
    run: &ModelRun,
    field: Option<&GridField>,
) -> MapResult<(RenderedMap, bool)> {
    let (coastlines, borders) = ctx.basemaps.layers_for(&region.bounds).await?;
    let layers = BaseLayers {
        coastlines: coastlines.as_slice(),
        borders: borders.as_slice(),
    };

    match field {
        Some(field) => match compose_map(field, product, region, run, layers, style) {
            Ok(map) => Ok((map, false)),
            Err(e) => {
                warn!(
                    product = product.id(),
                    region = %region.id,
                    error = %e,
                    "Falling back to placeholder card"
                );
                let card = render_error_card(product, region, run, &e.to_string(), style)?;
                Ok((card, true))
            }
        },
        None => {
            let card = render_error_card(
                product,
                region,
                run,
                "product not present in model file",
                style,
            )?;
            Ok((card, true))
        }
    }
}

/// Write the PNG to object storage and announce it on the event stream.
async fn upload_and_publish(
    ctx: &WorkerContext,
    bus: &mut EventBus,
    product: Product,
    region: &RegionSpec,
    run: &ModelRun,
    map: RenderedMap,
) -> MapResult<String> {
    let key = run.object_key(product.id(), &region.id);
    let size = map.png.len() as u64;
    ctx.storage.put(&key, Bytes::from(map.png)).await?;
    ctx.state.bytes_uploaded.fetch_add(size, Ordering::Relaxed);
    let url = ctx.storage.public_url(&key);

    bus.publish(&WeatherEvent::MapGenerated {
        model: run.model.clone(),
        run_date: run.run_date.clone(),
        run_hour: run.run_hour.clone(),
        parameter: product.id().to_string(),
        forecast_hour: run.forecast_hour,
        region: region.id.clone(),
        url: url.clone(),
    })
    .await?;

    Ok(url)
}

/// Resolve an event's file reference to a local path, downloading URLs into
/// the spool directory. The bool is true when the file was downloaded and
/// should be removed after processing.
async fn ensure_local(ctx: &WorkerContext, file_path: &str) -> MapResult<(PathBuf, bool)> {
    if file_path.starts_with("http://") || file_path.starts_with("https://") {
        let path = fetch::download_file(&ctx.http, file_path, &ctx.spool_dir).await?;
        return Ok((path, true));
    }
    let path = PathBuf::from(file_path);
    if !path.exists() {
        return Err(MapError::FetchError(format!(
            "{} does not exist",
            path.display()
        )));
    }
    Ok((path, false))
}

/// Transparently inflate gzip-compressed files; anything else passes through.
fn decompress_if_gzip(raw: Vec<u8>) -> MapResult<Vec<u8>> {
    if raw.len() < 2 || raw[0] != 0x1f || raw[1] != 0x8b {
        return Ok(raw);
    }
    let mut decoder = GzDecoder::new(raw.as_slice());
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| MapError::GribError(format!("gzip decompression failed: {}", e)))?;
    Ok(out)
}

/// Forecast hour for the run: the file name wins, the first message's GRIB
/// header is the fallback.
fn resolve_forecast_hour(file_path: &str, messages: &[Grib2Message]) -> u32 {
    forecast_hour_from_name(file_path)
        .or_else(|| {
            messages
                .first()
                .map(|m| m.product.forecast_hours(m.identification.reference_time))
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use test_utils::Grib2MessageBuilder;

    #[test]
    fn test_decompress_passthrough() {
        let raw = b"GRIB....".to_vec();
        assert_eq!(decompress_if_gzip(raw.clone()).unwrap(), raw);
        assert_eq!(decompress_if_gzip(Vec::new()).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_decompress_gzip() {
        let payload = b"GRIB message bytes".to_vec();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(decompress_if_gzip(compressed).unwrap(), payload);
    }

    #[test]
    fn test_resolve_forecast_hour() {
        let data = Grib2MessageBuilder::new().forecast_hour(48).build();
        let (messages, errors) = Grib2Reader::new(data).read_all();
        assert!(errors.is_empty());

        // File name takes precedence over the header.
        assert_eq!(
            resolve_forecast_hour("/data/gfs.t00z.pgrb2.0p25.f024", &messages),
            24
        );
        // No lead time in the name: fall back to the header.
        assert_eq!(resolve_forecast_hour("analysis.grib2", &messages), 48);
        assert_eq!(resolve_forecast_hour("analysis.grib2", &[]), 0);
    }
}
