//! Region subsetting and plot-resolution resampling.
//!
//! Source grids are global or regional lat/lon rasters; a map covers a small
//! window of one. [`extract_region`] cuts that window (plus a margin so
//! interpolation has support at the edges), handling global grids that wrap
//! across the region and regional grids that only partly cover it.

use map_common::{normalize_lon, GridField, RegionBounds};

use crate::{RenderError, RenderResult};

/// Margin of source data pulled around the region, in degrees.
const MARGIN_DEG: f64 = 0.5;

/// Signed eastward offset of `lon` from `from_lon`, in degrees, folded into
/// (-180, 180]. The plot x axis measures longitudes this way so regions that
/// cross the Greenwich meridian (e.g. -10..40) stay monotonic.
pub fn eastward_offset(from_lon: f64, lon: f64) -> f64 {
    let mut d = (normalize_lon(lon) - normalize_lon(from_lon)).rem_euclid(360.0);
    if d > 180.0 {
        d -= 360.0;
    }
    d
}

/// A window of a source grid covering one region, stored north to south.
///
/// Column positions are kept as eastward offsets from the region's west edge
/// rather than raw longitudes, so they are strictly increasing even when the
/// window wraps through 0°.
#[derive(Debug, Clone)]
pub struct RegionGrid {
    pub cols: usize,
    pub rows: usize,
    /// Eastward offset of each column from the region's west edge.
    pub lon_offsets: Vec<f64>,
    /// Latitude of each row, strictly decreasing.
    pub lats: Vec<f64>,
    /// Row-major values; NaN where the source grid has no coverage.
    pub values: Vec<f32>,
}

impl RegionGrid {
    pub fn value(&self, row: usize, col: usize) -> f32 {
        if row >= self.rows || col >= self.cols {
            return f32::NAN;
        }
        self.values[row * self.cols + col]
    }

    fn lon_step(&self) -> f64 {
        self.lon_offsets[1] - self.lon_offsets[0]
    }

    fn lat_step(&self) -> f64 {
        self.lats[0] - self.lats[1]
    }

    /// Bilinear sample at fractional grid coordinates. NaN corners drop out
    /// of the interpolation with their weight; a sample with no finite
    /// corner is NaN.
    pub fn sample(&self, frac_col: f64, frac_row: f64) -> f32 {
        if !frac_col.is_finite() || !frac_row.is_finite() {
            return f32::NAN;
        }
        if frac_col < -0.5 || frac_row < -0.5 {
            return f32::NAN;
        }
        let c0 = (frac_col.floor().max(0.0) as usize).min(self.cols - 1);
        let r0 = (frac_row.floor().max(0.0) as usize).min(self.rows - 1);
        let c1 = (c0 + 1).min(self.cols - 1);
        let r1 = (r0 + 1).min(self.rows - 1);
        let dx = (frac_col - c0 as f64).clamp(0.0, 1.0) as f32;
        let dy = (frac_row - r0 as f64).clamp(0.0, 1.0) as f32;

        let corners = [
            (self.value(r0, c0), (1.0 - dx) * (1.0 - dy)),
            (self.value(r0, c1), dx * (1.0 - dy)),
            (self.value(r1, c0), (1.0 - dx) * dy),
            (self.value(r1, c1), dx * dy),
        ];

        let mut acc = 0.0f32;
        let mut total = 0.0f32;
        for (v, w) in corners {
            if v.is_finite() {
                acc += v * w;
                total += w;
            }
        }
        if total < 1e-6 {
            f32::NAN
        } else {
            acc / total
        }
    }

    /// Resample to a `width` x `height` raster spanning exactly `bounds`,
    /// sampling at pixel centers.
    pub fn resample_plot(&self, width: usize, height: usize, bounds: &RegionBounds) -> Vec<f32> {
        let mut out = Vec::with_capacity(width * height);
        let lon_step = self.lon_step();
        let lat_step = self.lat_step();

        for y in 0..height {
            let lat = bounds.lat_max - (y as f64 + 0.5) / height as f64 * bounds.height();
            let frac_row = (self.lats[0] - lat) / lat_step;
            for x in 0..width {
                let offset = (x as f64 + 0.5) / width as f64 * bounds.width();
                let frac_col = (offset - self.lon_offsets[0]) / lon_step;
                out.push(self.sample(frac_col, frac_row));
            }
        }
        out
    }

    /// Min and max over finite values, `None` when every value is NaN.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut it = self.values.iter().filter(|v| v.is_finite());
        let first = *it.next()?;
        let (mut min, mut max) = (first, first);
        for &v in it {
            min = min.min(v);
            max = max.max(v);
        }
        Some((min, max))
    }
}

/// Cut the window of `field` covering `bounds` plus a margin.
///
/// Global grids wrap columns across the dateline and Greenwich as needed.
/// Regional grids yield NaN columns or rows where they do not reach; a
/// region with no overlap at all is an error.
pub fn extract_region(field: &GridField, bounds: &RegionBounds) -> RenderResult<RegionGrid> {
    let geom = &field.geometry;
    let global = geom.is_global_lon();

    // Column walk: grid columns have eastward offsets col0 + k * di from the
    // region's west edge; pick k so the offsets bracket the padded span.
    let col0 = eastward_offset(bounds.lon_min, geom.lon_first);
    let k_start = ((-MARGIN_DEG - col0) / geom.di).floor() as i64;
    let k_end = ((bounds.width() + MARGIN_DEG - col0) / geom.di).ceil() as i64;
    let cols = (k_end - k_start + 1) as usize;

    let src_cols: Vec<Option<usize>> = (k_start..=k_end)
        .map(|k| {
            if global {
                Some(k.rem_euclid(geom.ni as i64) as usize)
            } else if (0..geom.ni as i64).contains(&k) {
                Some(k as usize)
            } else {
                None
            }
        })
        .collect();

    if src_cols.iter().all(|c| c.is_none()) {
        return Err(RenderError::RegionOutsideGrid(format!(
            "longitudes {}..{} not covered",
            bounds.lon_min, bounds.lon_max
        )));
    }

    // Row walk: storage rows covering the padded latitude span, emitted
    // north to south regardless of the source scan direction.
    let lat_hi = (bounds.lat_max + MARGIN_DEG).min(90.0);
    let lat_lo = (bounds.lat_min - MARGIN_DEG).max(-90.0);
    let fr_a = geom.fractional_row(lat_hi);
    let fr_b = geom.fractional_row(lat_lo);
    let last_row = (geom.nj - 1) as f64;

    if fr_a.max(fr_b) < 0.0 || fr_a.min(fr_b) > last_row {
        return Err(RenderError::RegionOutsideGrid(format!(
            "latitudes {}..{} not covered",
            bounds.lat_min, bounds.lat_max
        )));
    }

    let mut r_min = fr_a.min(fr_b).floor().max(0.0) as usize;
    let mut r_max = (fr_a.max(fr_b).ceil() as usize).min(geom.nj - 1);
    if r_min == r_max {
        // Grazing overlap, widen to the two nearest rows.
        if r_max + 1 < geom.nj {
            r_max += 1;
        } else {
            r_min -= 1;
        }
    }

    let storage_rows: Vec<usize> = if geom.scans_south_to_north {
        (r_min..=r_max).rev().collect()
    } else {
        (r_min..=r_max).collect()
    };
    let rows = storage_rows.len();

    let lon_offsets: Vec<f64> = (k_start..=k_end)
        .map(|k| col0 + k as f64 * geom.di)
        .collect();
    let lats: Vec<f64> = storage_rows.iter().map(|&r| geom.lat_at(r)).collect();

    let mut values = Vec::with_capacity(rows * cols);
    for &r in &storage_rows {
        for src in &src_cols {
            match src {
                Some(c) => values.push(field.value_at(r, *c)),
                None => values.push(f32::NAN),
            }
        }
    }

    Ok(RegionGrid {
        cols,
        rows,
        lon_offsets,
        lats,
        values,
    })
}
