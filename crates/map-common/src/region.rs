//! Geographic regions that maps are rendered for.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{MapError, MapResult};

/// Geographic extent of a rendered map, in degrees.
///
/// Longitudes are given in -180..360 space with `lon_min < lon_max`; a
/// region may span the Greenwich meridian (e.g. -10..40) but not the
/// antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionBounds {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl RegionBounds {
    /// Create a validated bounds rectangle.
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> MapResult<Self> {
        let bounds = Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Validate a bounds rectangle, e.g. one deserialized from config.
    pub fn validate(&self) -> MapResult<()> {
        let finite = self.lon_min.is_finite()
            && self.lon_max.is_finite()
            && self.lat_min.is_finite()
            && self.lat_max.is_finite();
        if !finite {
            return Err(MapError::ConfigError(format!(
                "region bounds must be finite, got {:?}",
                self
            )));
        }
        if self.lon_min >= self.lon_max || self.lat_min >= self.lat_max {
            return Err(MapError::ConfigError(format!(
                "region bounds are inverted or empty: {:?}",
                self
            )));
        }
        if self.lon_min < -180.0 || self.lon_max > 360.0 {
            return Err(MapError::ConfigError(format!(
                "region longitudes must lie in -180..360, got {}..{}",
                self.lon_min, self.lon_max
            )));
        }
        if self.lat_min < -90.0 || self.lat_max > 90.0 {
            return Err(MapError::ConfigError(format!(
                "region latitudes must lie in -90..90, got {}..{}",
                self.lat_min, self.lat_max
            )));
        }
        Ok(())
    }

    /// Longitude span in degrees.
    pub fn width(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    /// Latitude span in degrees.
    pub fn height(&self) -> f64 {
        self.lat_max - self.lat_min
    }

    /// Height over width, used to shape the plot rectangle.
    pub fn aspect(&self) -> f64 {
        self.height() / self.width()
    }

    /// Check if a point is contained within the bounds. The longitude is
    /// tested in both -180..180 and 0..360 representations.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if lat < self.lat_min || lat > self.lat_max {
            return false;
        }
        let alt = if lon < 0.0 { lon + 360.0 } else { lon - 360.0 };
        (lon >= self.lon_min && lon <= self.lon_max)
            || (alt >= self.lon_min && alt <= self.lon_max)
    }

    /// Grow the bounds by `degrees` on every side, clamped to valid
    /// latitudes. Used to pull a margin of source data around the plot.
    pub fn padded(&self, degrees: f64) -> Self {
        Self {
            lon_min: self.lon_min - degrees,
            lon_max: self.lon_max + degrees,
            lat_min: (self.lat_min - degrees).max(-90.0),
            lat_max: (self.lat_max + degrees).min(90.0),
        }
    }
}

/// A named region to render maps for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSpec {
    pub id: String,
    #[serde(flatten)]
    pub bounds: RegionBounds,
}

impl RegionSpec {
    pub fn new(id: impl Into<String>, bounds: RegionBounds) -> Self {
        Self {
            id: id.into(),
            bounds,
        }
    }
}

/// The built-in region set, used when no config file is given.
pub fn default_regions() -> Vec<RegionSpec> {
    vec![
        RegionSpec::new(
            "israel",
            RegionBounds {
                lon_min: 33.5,
                lon_max: 36.5,
                lat_min: 29.0,
                lat_max: 33.5,
            },
        ),
        RegionSpec::new(
            "eastern_med",
            RegionBounds {
                lon_min: 25.0,
                lon_max: 40.0,
                lat_min: 25.0,
                lat_max: 40.0,
            },
        ),
        RegionSpec::new(
            "europe",
            RegionBounds {
                lon_min: -10.0,
                lon_max: 40.0,
                lat_min: 25.0,
                lat_max: 70.0,
            },
        ),
        RegionSpec::new(
            "middle_east",
            RegionBounds {
                lon_min: 25.0,
                lon_max: 60.0,
                lat_min: 10.0,
                lat_max: 45.0,
            },
        ),
    ]
}

#[derive(Debug, Deserialize)]
struct RegionsFile {
    regions: Vec<RegionSpec>,
}

/// Load a region set from a YAML file.
///
/// ```yaml
/// regions:
///   - id: israel
///     lon_min: 33.5
///     lon_max: 36.5
///     lat_min: 29.0
///     lat_max: 33.5
/// ```
pub fn load_region_config(path: &Path) -> MapResult<Vec<RegionSpec>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MapError::ConfigError(format!("failed to read {}: {}", path.display(), e))
    })?;

    let file: RegionsFile = serde_yaml::from_str(&content).map_err(|e| {
        MapError::ConfigError(format!("failed to parse {}: {}", path.display(), e))
    })?;

    if file.regions.is_empty() {
        return Err(MapError::ConfigError(format!(
            "{} defines no regions",
            path.display()
        )));
    }

    for region in &file.regions {
        if region.id.is_empty() || region.id.contains(char::is_whitespace) {
            return Err(MapError::ConfigError(format!(
                "invalid region id {:?} in {}",
                region.id,
                path.display()
            )));
        }
        region.bounds.validate()?;
    }

    Ok(file.regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_measures() {
        let b = RegionBounds::new(25.0, 40.0, 25.0, 40.0).unwrap();
        assert_eq!(b.width(), 15.0);
        assert_eq!(b.height(), 15.0);
        assert_eq!(b.aspect(), 1.0);
    }

    #[test]
    fn test_bounds_rejects_inverted() {
        assert!(RegionBounds::new(40.0, 25.0, 25.0, 40.0).is_err());
        assert!(RegionBounds::new(25.0, 40.0, 40.0, 25.0).is_err());
        assert!(RegionBounds::new(0.0, 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_bounds_rejects_out_of_range() {
        assert!(RegionBounds::new(-200.0, 0.0, 0.0, 10.0).is_err());
        assert!(RegionBounds::new(0.0, 10.0, -100.0, 10.0).is_err());
        assert!(RegionBounds::new(0.0, 10.0, 0.0, 95.0).is_err());
    }

    #[test]
    fn test_contains_wraps_longitude() {
        // Greenwich-spanning region given in -10..40 space
        let b = RegionBounds::new(-10.0, 40.0, 25.0, 70.0).unwrap();
        assert!(b.contains(-5.0, 50.0));
        assert!(b.contains(355.0, 50.0)); // same meridian, 0..360 form
        assert!(b.contains(20.0, 50.0));
        assert!(!b.contains(50.0, 50.0));
        assert!(!b.contains(-5.0, 80.0));
    }

    #[test]
    fn test_padded_clamps_latitude() {
        let b = RegionBounds::new(0.0, 10.0, 85.0, 90.0).unwrap();
        let p = b.padded(2.0);
        assert_eq!(p.lat_max, 90.0);
        assert_eq!(p.lat_min, 83.0);
        assert_eq!(p.lon_min, -2.0);
    }

    #[test]
    fn test_default_regions() {
        let regions = default_regions();
        assert_eq!(regions.len(), 4);
        for region in &regions {
            region.bounds.validate().unwrap();
        }
        assert_eq!(regions[0].id, "israel");
        assert_eq!(regions[2].bounds.lon_min, -10.0);
    }
}
