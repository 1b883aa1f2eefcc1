//! Regular latitude/longitude grids decoded from GRIB2 fields.

use serde::{Deserialize, Serialize};

/// Geometry of a regular lat/lon grid.
///
/// Rows follow storage order: row 0 is the first row in the data section,
/// at `lat_first`. `di`/`dj` are positive spacings in degrees; the `j`
/// direction is described by `scans_south_to_north`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    /// Points along a parallel (longitude direction).
    pub ni: usize,
    /// Points along a meridian (latitude direction).
    pub nj: usize,
    /// Latitude of the first grid row, degrees.
    pub lat_first: f64,
    /// Longitude of the first grid column, degrees in 0..360.
    pub lon_first: f64,
    /// Longitude spacing, degrees.
    pub di: f64,
    /// Latitude spacing, degrees.
    pub dj: f64,
    /// True when rows advance from south to north.
    pub scans_south_to_north: bool,
}

/// Construction failures for grid geometry.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("grid has zero extent: {ni}x{nj}")]
    EmptyGrid { ni: usize, nj: usize },

    #[error("grid spacing must be positive and finite: di={di}, dj={dj}")]
    InvalidSpacing { di: f64, dj: f64 },

    #[error("value count {got} does not match grid size {expected}")]
    LengthMismatch { expected: usize, got: usize },
}

impl GridGeometry {
    pub fn new(
        ni: usize,
        nj: usize,
        lat_first: f64,
        lon_first: f64,
        di: f64,
        dj: f64,
        scans_south_to_north: bool,
    ) -> Result<Self, GridError> {
        if ni < 2 || nj < 2 {
            return Err(GridError::EmptyGrid { ni, nj });
        }
        if !(di.is_finite() && dj.is_finite()) || di <= 0.0 || dj <= 0.0 {
            return Err(GridError::InvalidSpacing { di, dj });
        }
        Ok(Self {
            ni,
            nj,
            lat_first,
            lon_first: normalize_lon(lon_first),
            di,
            dj,
            scans_south_to_north,
        })
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.ni * self.nj
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latitude of a storage row.
    pub fn lat_at(&self, row: usize) -> f64 {
        if self.scans_south_to_north {
            self.lat_first + row as f64 * self.dj
        } else {
            self.lat_first - row as f64 * self.dj
        }
    }

    /// Longitude of a storage column, normalized to 0..360.
    pub fn lon_at(&self, col: usize) -> f64 {
        normalize_lon(self.lon_first + col as f64 * self.di)
    }

    /// Whether the grid wraps the full circle of longitude.
    pub fn is_global_lon(&self) -> bool {
        self.ni as f64 * self.di >= 360.0 - self.di * 0.5
    }

    /// Fractional storage row of a latitude. May fall outside 0..nj-1 when
    /// the latitude is not covered.
    pub fn fractional_row(&self, lat: f64) -> f64 {
        if self.scans_south_to_north {
            (lat - self.lat_first) / self.dj
        } else {
            (self.lat_first - lat) / self.dj
        }
    }

    /// Fractional storage column of a longitude, measured eastward from the
    /// first column. Always >= 0; values past `ni - 1` mean the longitude is
    /// only reachable by wrapping (global grids) or not covered (regional).
    pub fn fractional_col(&self, lon: f64) -> f64 {
        let delta = (normalize_lon(lon) - self.lon_first).rem_euclid(360.0);
        delta / self.di
    }
}

/// Normalize a longitude into 0..360.
pub fn normalize_lon(lon: f64) -> f64 {
    let mut l = lon.rem_euclid(360.0);
    if l >= 360.0 {
        l -= 360.0;
    }
    l
}

/// A decoded field on a regular lat/lon grid. Missing points are NaN.
#[derive(Debug, Clone)]
pub struct GridField {
    pub geometry: GridGeometry,
    pub values: Vec<f32>,
}

impl GridField {
    pub fn new(geometry: GridGeometry, values: Vec<f32>) -> Result<Self, GridError> {
        if values.len() != geometry.len() {
            return Err(GridError::LengthMismatch {
                expected: geometry.len(),
                got: values.len(),
            });
        }
        Ok(Self { geometry, values })
    }

    /// Value at a grid position, NaN when out of bounds.
    pub fn value_at(&self, row: usize, col: usize) -> f32 {
        if row >= self.geometry.nj || col >= self.geometry.ni {
            return f32::NAN;
        }
        self.values[row * self.geometry.ni + col]
    }

    /// Minimum and maximum over finite values, None for an all-NaN field.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in &self.values {
            if v.is_finite() {
                min = min.min(v);
                max = max.max(v);
            }
        }
        if min <= max {
            Some((min, max))
        } else {
            None
        }
    }

    /// Apply a unit conversion to every finite value in place.
    pub fn convert_units<F: Fn(f32) -> f32>(&mut self, f: F) {
        for v in self.values.iter_mut() {
            if v.is_finite() {
                *v = f(*v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global_quarter_degree() -> GridGeometry {
        // GFS 0.25 degree layout: north-to-south from 90N, 0..359.75E
        GridGeometry::new(1440, 721, 90.0, 0.0, 0.25, 0.25, false).unwrap()
    }

    #[test]
    fn test_geometry_validation() {
        assert!(GridGeometry::new(1, 10, 0.0, 0.0, 1.0, 1.0, false).is_err());
        assert!(GridGeometry::new(10, 10, 0.0, 0.0, 0.0, 1.0, false).is_err());
        assert!(GridGeometry::new(10, 10, 0.0, 0.0, 1.0, f64::NAN, false).is_err());
    }

    #[test]
    fn test_global_detection() {
        assert!(global_quarter_degree().is_global_lon());
        let regional = GridGeometry::new(100, 100, 45.0, 20.0, 0.1, 0.1, false).unwrap();
        assert!(!regional.is_global_lon());
    }

    #[test]
    fn test_lat_lon_accessors() {
        let g = global_quarter_degree();
        assert_eq!(g.lat_at(0), 90.0);
        assert_eq!(g.lat_at(720), -90.0);
        assert_eq!(g.lon_at(0), 0.0);
        assert_eq!(g.lon_at(1439), 359.75);
        // wraps back around
        assert_eq!(g.lon_at(1440), 0.0);
    }

    #[test]
    fn test_fractional_lookup_wraps_greenwich() {
        let g = global_quarter_degree();
        // -5 degrees is 355E, eastward offset 355 from the first column
        let col = g.fractional_col(-5.0);
        assert!((col - 1420.0).abs() < 1e-9);
        let row = g.fractional_row(45.0);
        assert!((row - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_south_to_north_rows() {
        let g = GridGeometry::new(10, 5, -20.0, 100.0, 1.0, 1.0, true).unwrap();
        assert_eq!(g.lat_at(0), -20.0);
        assert_eq!(g.lat_at(4), -16.0);
        assert!((g.fractional_row(-18.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_field_min_max_ignores_nan() {
        let g = GridGeometry::new(2, 2, 0.0, 0.0, 1.0, 1.0, false).unwrap();
        let f = GridField::new(g, vec![1.0, f32::NAN, 3.0, 2.0]).unwrap();
        assert_eq!(f.min_max(), Some((1.0, 3.0)));

        let all_nan = GridField::new(g, vec![f32::NAN; 4]).unwrap();
        assert!(all_nan.min_max().is_none());
    }

    #[test]
    fn test_convert_units_skips_nan() {
        let g = GridGeometry::new(2, 2, 0.0, 0.0, 1.0, 1.0, false).unwrap();
        let mut f = GridField::new(g, vec![273.15, f32::NAN, 274.15, 272.15]).unwrap();
        f.convert_units(|v| v - 273.15);
        assert!((f.values[0] - 0.0).abs() < 1e-4);
        assert!(f.values[1].is_nan());
        assert!((f.values[2] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_value_at_out_of_bounds() {
        let g = GridGeometry::new(2, 2, 0.0, 0.0, 1.0, 1.0, false).unwrap();
        let f = GridField::new(g, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(f.value_at(1, 1), 4.0);
        assert!(f.value_at(2, 0).is_nan());
        assert!(f.value_at(0, 2).is_nan());
    }
}
