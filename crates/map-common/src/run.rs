//! Model run identity and storage key layout.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One forecast step of one model run, the unit every event and object key
/// is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRun {
    /// Model identifier, e.g. "gfs".
    pub model: String,
    /// Run date as YYYYMMDD.
    pub run_date: String,
    /// Run cycle hour as HH (00, 06, 12, 18).
    pub run_hour: String,
    /// Forecast lead time in hours.
    pub forecast_hour: u32,
}

impl ModelRun {
    pub fn new(
        model: impl Into<String>,
        run_date: impl Into<String>,
        run_hour: impl Into<String>,
        forecast_hour: u32,
    ) -> Self {
        Self {
            model: model.into(),
            run_date: run_date.into(),
            run_hour: run_hour.into(),
            forecast_hour,
        }
    }

    /// Object key for one rendered map:
    /// `{model}/{run_date}/{run_hour}/{product}/{fhr:03}_{region}.png`
    pub fn object_key(&self, product_id: &str, region_id: &str) -> String {
        format!(
            "{}/{}/{}/{}/{:03}_{}.png",
            self.model, self.run_date, self.run_hour, product_id, self.forecast_hour, region_id
        )
    }

    /// Human-readable run descriptor for log lines and map footers,
    /// e.g. "GFS 20250101 00Z +024H".
    pub fn descriptor(&self) -> String {
        format!(
            "{} {} {}Z +{:03}H",
            self.model.to_uppercase(),
            self.run_date,
            self.run_hour,
            self.forecast_hour
        )
    }

    /// The run's reference time, when the date and hour strings parse.
    pub fn reference_time(&self) -> Option<DateTime<Utc>> {
        let date = NaiveDate::parse_from_str(&self.run_date, "%Y%m%d").ok()?;
        let hour: u32 = self.run_hour.parse().ok()?;
        date.and_hms_opt(hour, 0, 0)
            .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
    }
}

/// Extract the forecast hour from a model file name.
///
/// NWP file names conventionally carry the lead time as an `.f`-prefixed
/// digit group, e.g. `gfs.t00z.pgrb2.0p25.f024`. Returns `None` when no such
/// group exists so the caller can fall back to the GRIB header.
pub fn forecast_hour_from_name(name: &str) -> Option<u32> {
    let idx = name.rfind(".f")?;
    let digits: String = name[idx + 2..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
