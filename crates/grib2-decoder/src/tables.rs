//! Parameter and level lookup tables (WMO code tables, abridged to the
//! meteorological discipline the pipeline reads).

use std::fmt;

/// GRIB2 parameter identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterId {
    pub discipline: u8,
    pub category: u8,
    pub number: u8,
}

impl ParameterId {
    pub fn new(discipline: u8, category: u8, number: u8) -> Self {
        Self {
            discipline,
            category,
            number,
        }
    }

    /// Conventional short name, falling back to `VAR_d-c-n`.
    pub fn short_name(&self) -> String {
        let name = match (self.discipline, self.category, self.number) {
            // Category 0: temperature
            (0, 0, 0) => "TMP",
            (0, 0, 4) => "TMAX",
            (0, 0, 5) => "TMIN",
            (0, 0, 6) => "DPT",

            // Category 1: moisture
            (0, 1, 0) => "SPFH",
            (0, 1, 1) => "RH",
            (0, 1, 3) => "PWAT",
            (0, 1, 7) => "PRATE",
            (0, 1, 8) => "APCP",
            (0, 1, 13) => "WEASD",

            // Category 2: momentum
            (0, 2, 0) => "WDIR",
            (0, 2, 1) => "WIND",
            (0, 2, 2) => "UGRD",
            (0, 2, 3) => "VGRD",
            (0, 2, 22) => "GUST",

            // Category 3: mass
            (0, 3, 0) => "PRES",
            (0, 3, 1) => "PRMSL",
            (0, 3, 5) => "HGT",

            // Category 6: cloud
            (0, 6, 1) => "TCDC",

            // Category 7: stability
            (0, 7, 6) => "CAPE",
            (0, 7, 7) => "CIN",

            // Category 19: physical atmospheric properties
            (0, 19, 0) => "VIS",

            _ => {
                return format!(
                    "VAR_{}-{}-{}",
                    self.discipline, self.category, self.number
                )
            }
        };
        name.to_string()
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Describe a fixed surface (code table 4.5), with the scaled level value.
pub fn level_description(level_type: u8, level_value: f64) -> String {
    match level_type {
        1 => "surface".to_string(),
        2 => "cloud base".to_string(),
        3 => "cloud top".to_string(),
        4 => "0C isotherm".to_string(),
        6 => "max wind".to_string(),
        7 => "tropopause".to_string(),
        8 => "top of atmosphere".to_string(),
        100 => format!("{} mb", level_value / 100.0),
        101 => "mean sea level".to_string(),
        102 => format!("{} m above MSL", level_value),
        103 => format!("{} m above ground", level_value),
        106 => format!("{} m below surface", level_value),
        200 => "entire atmosphere".to_string(),
        _ => format!("level type {} value {}", level_type, level_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_parameters() {
        assert_eq!(ParameterId::new(0, 0, 0).short_name(), "TMP");
        assert_eq!(ParameterId::new(0, 1, 8).short_name(), "APCP");
        assert_eq!(ParameterId::new(0, 3, 1).short_name(), "PRMSL");
        assert_eq!(ParameterId::new(0, 2, 2).short_name(), "UGRD");
    }

    #[test]
    fn test_unknown_parameter_fallback() {
        assert_eq!(ParameterId::new(3, 9, 250).short_name(), "VAR_3-9-250");
    }

    #[test]
    fn test_level_descriptions() {
        assert_eq!(level_description(1, 0.0), "surface");
        assert_eq!(level_description(101, 0.0), "mean sea level");
        assert_eq!(level_description(103, 2.0), "2 m above ground");
        assert_eq!(level_description(100, 85_000.0), "850 mb");
        assert_eq!(level_description(150, 3.0), "level type 150 value 3");
    }
}
