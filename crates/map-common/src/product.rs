//! Weather products rendered from each GRIB2 file.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MapError;

/// A renderable weather product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    /// 2 metre air temperature, filled gradient in degrees Celsius.
    Temperature2m,
    /// Accumulated total precipitation, filled steps in kg/m^2.
    Precipitation,
    /// Mean sea level pressure as labelled isobars in hPa.
    Synoptic,
}

impl Product {
    pub const ALL: [Product; 3] = [
        Product::Temperature2m,
        Product::Precipitation,
        Product::Synoptic,
    ];

    /// Short identifier used in object keys and events.
    pub fn id(&self) -> &'static str {
        match self {
            Product::Temperature2m => "t2m",
            Product::Precipitation => "apcp",
            Product::Synoptic => "synoptic",
        }
    }

    /// Map title (drawn in the title band).
    pub fn title(&self) -> &'static str {
        match self {
            Product::Temperature2m => "2m Temperature (°C)",
            Product::Precipitation => "Total Precipitation (kg/m^2)",
            Product::Synoptic => "Mean Sea Level Pressure (hPa)",
        }
    }

    /// Display units after conversion.
    pub fn units(&self) -> &'static str {
        match self {
            Product::Temperature2m => "°C",
            Product::Precipitation => "kg/m^2",
            Product::Synoptic => "hPa",
        }
    }

    /// GRIB2 (discipline, category, number) identifying the source field.
    pub fn grib_selector(&self) -> (u8, u8, u8) {
        match self {
            Product::Temperature2m => (0, 0, 0), // TMP
            Product::Precipitation => (0, 1, 8), // APCP
            Product::Synoptic => (0, 3, 1),      // PRMSL
        }
    }

    /// Fixed-surface type the field must sit on, when it matters.
    /// 103 = height above ground, 101 = mean sea level, 1 = surface.
    pub fn level_type(&self) -> Option<u8> {
        match self {
            Product::Temperature2m => Some(103),
            Product::Precipitation => Some(1),
            Product::Synoptic => Some(101),
        }
    }

    /// Required level value in level-type units, when one is required.
    /// Temperature comes from exactly 2 m above ground; GFS also publishes
    /// 80 m and 100 m fields on the same level type.
    pub fn level_value(&self) -> Option<f64> {
        match self {
            Product::Temperature2m => Some(2.0),
            Product::Precipitation => None,
            Product::Synoptic => None,
        }
    }

    /// Convert one value from GRIB units to display units.
    pub fn convert(&self, value: f32) -> f32 {
        match self {
            Product::Temperature2m => value - 273.15, // K to °C
            Product::Precipitation => value,          // kg/m^2 as-is
            Product::Synoptic => value / 100.0,       // Pa to hPa
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Product {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "t2m" => Ok(Product::Temperature2m),
            "apcp" => Ok(Product::Precipitation),
            "synoptic" => Ok(Product::Synoptic),
            other => Err(MapError::ConfigError(format!(
                "unknown product: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_ids_round_trip() {
        for product in Product::ALL {
            assert_eq!(Product::from_str(product.id()).unwrap(), product);
        }
        assert!(Product::from_str("wind").is_err());
    }

    #[test]
    fn test_unit_conversion() {
        assert!((Product::Temperature2m.convert(273.15) - 0.0).abs() < 1e-4);
        assert!((Product::Synoptic.convert(101_325.0) - 1013.25).abs() < 1e-3);
        assert_eq!(Product::Precipitation.convert(12.5), 12.5);
    }

    #[test]
    fn test_selectors() {
        assert_eq!(Product::Temperature2m.grib_selector(), (0, 0, 0));
        assert_eq!(Product::Precipitation.grib_selector(), (0, 1, 8));
        assert_eq!(Product::Synoptic.grib_selector(), (0, 3, 1));
        assert_eq!(Product::Synoptic.level_type(), Some(101));
    }
}
