//! GRIB2 section parsing.
//!
//! A message is: section 0 (fixed 16-byte indicator), then sections 1..7,
//! each framed as `[length u32][number u8][body...]`, then the "7777"
//! trailer. Section 2 (local use) may appear and is skipped; sections 4..7
//! may repeat within one message in general GRIB2, but the feeds this
//! pipeline reads emit one field per message, which is what is supported.

use std::ops::Range;

use chrono::{DateTime, NaiveDate, Utc};

use map_common::{GridGeometry, normalize_lon};

use crate::{Grib2Error, Grib2Result};

/// Section 0: indicator.
#[derive(Debug, Clone, Copy)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub total_length: u64,
}

/// Section 1: identification.
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub table_version: u8,
    pub local_table_version: u8,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
}

/// Section 3: grid definition (template 3.0, regular lat/lon).
#[derive(Debug, Clone, Copy)]
pub struct GridDefinition {
    pub template: u16,
    pub num_data_points: u32,
    pub ni: u32,
    pub nj: u32,
    /// Degrees, converted from microdegrees.
    pub lat_first: f64,
    pub lon_first: f64,
    pub lat_last: f64,
    pub lon_last: f64,
    pub di: f64,
    pub dj: f64,
    pub scanning_mode: u8,
}

impl GridDefinition {
    /// Whether rows advance south to north (scanning mode bit for +j).
    pub fn scans_south_to_north(&self) -> bool {
        self.scanning_mode & 0x40 != 0
    }

    /// Build the grid geometry, deriving increments from the corner points
    /// when the file encodes them as missing.
    pub fn geometry(&self) -> Grib2Result<GridGeometry> {
        let malformed = |reason: String| Grib2Error::MalformedSection { section: 3, reason };

        if self.scanning_mode & 0x80 != 0 {
            return Err(malformed("westward i scanning is not supported".into()));
        }
        if self.scanning_mode & 0x30 != 0 {
            return Err(malformed(format!(
                "unsupported scanning mode {:#04x} (column-major or alternating rows)",
                self.scanning_mode
            )));
        }

        let ni = self.ni as usize;
        let nj = self.nj as usize;

        let di = if self.di > 0.0 {
            self.di
        } else {
            // increment flagged missing, derive from the corner longitudes
            let span = (self.lon_last - self.lon_first).rem_euclid(360.0);
            span / (self.ni.max(2) - 1) as f64
        };
        let dj = if self.dj > 0.0 {
            self.dj
        } else {
            (self.lat_last - self.lat_first).abs() / (self.nj.max(2) - 1) as f64
        };

        GridGeometry::new(
            ni,
            nj,
            self.lat_first,
            self.lon_first,
            di,
            dj,
            self.scans_south_to_north(),
        )
        .map_err(|e| malformed(e.to_string()))
    }
}

/// Section 4: product definition (common template 4.x head fields).
#[derive(Debug, Clone, Copy)]
pub struct ProductDefinition {
    pub template: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub time_unit: u8,
    pub forecast_time: u32,
    pub level_type: u8,
    pub level_scale: i8,
    pub level_scaled_value: u32,
    /// End of the overall time interval, present for template 4.8
    /// (accumulations). The effective lead time of an accumulated field.
    pub interval_end: Option<DateTime<Utc>>,
}

impl ProductDefinition {
    /// Level value with its decimal scale applied.
    pub fn level_value(&self) -> f64 {
        self.level_scaled_value as f64 * 10f64.powi(-(self.level_scale as i32))
    }

    /// Forecast lead time in whole hours, relative to the reference time.
    /// For accumulations this is the end of the accumulation interval.
    pub fn forecast_hours(&self, reference_time: DateTime<Utc>) -> u32 {
        if let Some(end) = self.interval_end {
            let hours = (end - reference_time).num_hours();
            if hours >= 0 {
                return hours as u32;
            }
        }
        time_unit_to_hours(self.time_unit, self.forecast_time)
    }
}

/// Section 5: data representation (template 5.0, simple packing).
#[derive(Debug, Clone, Copy)]
pub struct DataRepresentation {
    pub template: u16,
    /// Points actually packed in section 7 (excludes bitmap-missing ones).
    pub num_packed_points: u32,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
    pub original_field_type: u8,
}

/// Byte ranges of each section's body within a message, collected in one
/// walk so later parsing needs no re-scanning.
#[derive(Debug, Clone)]
pub struct SectionIndex {
    pub identification: Range<usize>,
    pub grid_definition: Range<usize>,
    pub product_definition: Range<usize>,
    pub data_representation: Range<usize>,
    pub bitmap_indicator: u8,
    pub bitmap_body: Option<Range<usize>>,
    pub data_body: Range<usize>,
}

/// Parse section 0 from the start of a message.
pub fn parse_indicator(data: &[u8]) -> Grib2Result<Indicator> {
    if data.len() < 16 {
        return Err(Grib2Error::TruncatedMessage {
            declared: 16,
            available: data.len(),
        });
    }
    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidMagic);
    }

    // Octets: 1-4 "GRIB", 5-6 reserved, 7 discipline, 8 edition,
    // 9-16 total message length (big-endian u64).
    let discipline = data[6];
    let edition = data[7];
    if edition != 2 {
        return Err(Grib2Error::UnsupportedEdition(edition));
    }

    let total_length = u64::from_be_bytes([
        data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
    ]);

    Ok(Indicator {
        discipline,
        edition,
        total_length,
    })
}

/// Walk the section chain and record every body range.
pub fn walk_sections(data: &[u8]) -> Grib2Result<SectionIndex> {
    let mut offset = 16; // past section 0

    let mut identification = None;
    let mut grid_definition = None;
    let mut product_definition = None;
    let mut data_representation = None;
    let mut bitmap_indicator = 255u8;
    let mut bitmap_body = None;
    let mut data_body = None;

    while offset + 4 <= data.len() {
        if &data[offset..offset + 4] == b"7777" {
            break;
        }
        if offset + 5 > data.len() {
            return Err(Grib2Error::MalformedSection {
                section: 0,
                reason: "section header runs past end of message".to_string(),
            });
        }

        let length = u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;
        let number = data[offset + 4];

        if length < 5 || offset + length > data.len() {
            return Err(Grib2Error::MalformedSection {
                section: number,
                reason: format!("bad section length {}", length),
            });
        }

        let body = offset..offset + length;
        match number {
            1 => identification = Some(body),
            2 => {} // local use, skipped
            3 => grid_definition = Some(body),
            4 => product_definition = Some(body),
            5 => data_representation = Some(body),
            6 => {
                bitmap_indicator = data[offset + 5];
                if bitmap_indicator == 0 && length > 6 {
                    bitmap_body = Some(offset + 6..offset + length);
                }
            }
            7 => data_body = Some(offset + 5..offset + length),
            other => {
                return Err(Grib2Error::MalformedSection {
                    section: other,
                    reason: "unknown section number".to_string(),
                })
            }
        }

        offset += length;
    }

    Ok(SectionIndex {
        identification: identification.ok_or(Grib2Error::MissingSection(1))?,
        grid_definition: grid_definition.ok_or(Grib2Error::MissingSection(3))?,
        product_definition: product_definition.ok_or(Grib2Error::MissingSection(4))?,
        data_representation: data_representation.ok_or(Grib2Error::MissingSection(5))?,
        bitmap_indicator,
        bitmap_body,
        data_body: data_body.ok_or(Grib2Error::MissingSection(7))?,
    })
}

/// Parse section 1 (identification).
pub fn parse_identification(data: &[u8], index: &SectionIndex) -> Grib2Result<Identification> {
    let sec = &data[index.identification.clone()];
    if sec.len() < 21 {
        return Err(Grib2Error::MalformedSection {
            section: 1,
            reason: format!("need 21 bytes, got {}", sec.len()),
        });
    }

    // Body offsets past the 5-byte section header.
    let b = &sec[5..];
    let center = u16::from_be_bytes([b[0], b[1]]);
    let sub_center = u16::from_be_bytes([b[2], b[3]]);
    let table_version = b[4];
    let local_table_version = b[5];
    let significance = b[6];

    let year = u16::from_be_bytes([b[7], b[8]]);
    let month = b[9];
    let day = b[10];
    let hour = b[11];
    let minute = b[12];
    let second = b[13];

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|d| d.and_hms_opt(hour as u32, minute as u32, second as u32))
        .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .ok_or_else(|| Grib2Error::MalformedSection {
            section: 1,
            reason: format!(
                "invalid reference time {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center,
        sub_center,
        table_version,
        local_table_version,
        significance_of_reference_time: significance,
        reference_time,
    })
}

/// Parse section 3 (grid definition), template 3.0 only.
pub fn parse_grid_definition(data: &[u8], index: &SectionIndex) -> Grib2Result<GridDefinition> {
    let sec = &data[index.grid_definition.clone()];
    if sec.len() < 14 {
        return Err(Grib2Error::MalformedSection {
            section: 3,
            reason: format!("need 14 bytes, got {}", sec.len()),
        });
    }

    let num_data_points = u32::from_be_bytes([sec[6], sec[7], sec[8], sec[9]]);
    let template = u16::from_be_bytes([sec[12], sec[13]]);
    if template != 0 {
        return Err(Grib2Error::UnsupportedTemplate {
            section: 3,
            template,
        });
    }

    // Template 3.0 body, offsets relative to the template start at byte 14:
    //  16-19 Ni, 20-23 Nj, 24-27 basic angle, 28-31 subdivisions,
    //  32-35 La1, 36-39 Lo1, 40 resolution flags, 41-44 La2, 45-48 Lo2,
    //  49-52 Di, 53-56 Dj, 57 scanning mode. Angles are microdegrees.
    let gd = &sec[14..];
    if gd.len() < 58 {
        return Err(Grib2Error::MalformedSection {
            section: 3,
            reason: format!("template 3.0 needs 58 bytes, got {}", gd.len()),
        });
    }

    let basic_angle = u32::from_be_bytes([gd[24], gd[25], gd[26], gd[27]]);
    if basic_angle != 0 && basic_angle != u32::MAX {
        return Err(Grib2Error::MalformedSection {
            section: 3,
            reason: format!("non-default basic angle {} is not supported", basic_angle),
        });
    }

    let ni = u32::from_be_bytes([gd[16], gd[17], gd[18], gd[19]]);
    let nj = u32::from_be_bytes([gd[20], gd[21], gd[22], gd[23]]);

    let la1 = i32::from_be_bytes([gd[32], gd[33], gd[34], gd[35]]);
    let lo1 = i32::from_be_bytes([gd[36], gd[37], gd[38], gd[39]]);
    let la2 = i32::from_be_bytes([gd[41], gd[42], gd[43], gd[44]]);
    let lo2 = i32::from_be_bytes([gd[45], gd[46], gd[47], gd[48]]);
    let di_raw = u32::from_be_bytes([gd[49], gd[50], gd[51], gd[52]]);
    let dj_raw = u32::from_be_bytes([gd[53], gd[54], gd[55], gd[56]]);
    let scanning_mode = gd[57];

    const MICRO: f64 = 1e-6;
    // All-ones means the increment is not given.
    let di = if di_raw == u32::MAX { 0.0 } else { di_raw as f64 * MICRO };
    let dj = if dj_raw == u32::MAX { 0.0 } else { dj_raw as f64 * MICRO };

    Ok(GridDefinition {
        template,
        num_data_points,
        ni,
        nj,
        lat_first: la1 as f64 * MICRO,
        lon_first: normalize_lon(lo1 as f64 * MICRO),
        lat_last: la2 as f64 * MICRO,
        lon_last: normalize_lon(lo2 as f64 * MICRO),
        di,
        dj,
        scanning_mode,
    })
}

/// Parse section 4 (product definition). The head fields read here sit at
/// the same offsets for the point-in-time and statistical templates
/// (4.0, 4.1, 4.2, 4.8 ...); the interval end is read for 4.8 only.
pub fn parse_product_definition(
    data: &[u8],
    index: &SectionIndex,
    _discipline: u8,
) -> Grib2Result<ProductDefinition> {
    let sec = &data[index.product_definition.clone()];
    if sec.len() < 28 {
        return Err(Grib2Error::MalformedSection {
            section: 4,
            reason: format!("need 28 bytes, got {}", sec.len()),
        });
    }

    let template = u16::from_be_bytes([sec[7], sec[8]]);
    let parameter_category = sec[9];
    let parameter_number = sec[10];
    let time_unit = sec[17];
    let forecast_time = u32::from_be_bytes([sec[18], sec[19], sec[20], sec[21]]);
    let level_type = sec[22];
    let level_scale = sec[23] as i8;
    let level_scaled_value = u32::from_be_bytes([sec[24], sec[25], sec[26], sec[27]]);

    // Template 4.8 appends the end of the overall accumulation interval:
    // year u16 at 34, then month/day/hour/minute/second bytes.
    let interval_end = if template == 8 && sec.len() >= 41 {
        let year = u16::from_be_bytes([sec[34], sec[35]]);
        NaiveDate::from_ymd_opt(year as i32, sec[36] as u32, sec[37] as u32)
            .and_then(|d| d.and_hms_opt(sec[38] as u32, sec[39] as u32, sec[40] as u32))
            .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
    } else {
        None
    };

    Ok(ProductDefinition {
        template,
        parameter_category,
        parameter_number,
        time_unit,
        forecast_time,
        level_type,
        level_scale,
        level_scaled_value,
        interval_end,
    })
}

/// Parse section 5 (data representation), template 5.0 head fields.
pub fn parse_data_representation(
    data: &[u8],
    index: &SectionIndex,
) -> Grib2Result<DataRepresentation> {
    let sec = &data[index.data_representation.clone()];
    if sec.len() < 11 {
        return Err(Grib2Error::MalformedSection {
            section: 5,
            reason: format!("need 11 bytes, got {}", sec.len()),
        });
    }

    let num_packed_points = u32::from_be_bytes([sec[5], sec[6], sec[7], sec[8]]);
    let template = u16::from_be_bytes([sec[9], sec[10]]);

    // Template 5.0: reference value (IEEE f32), binary scale (i16),
    // decimal scale (i16), bits per value, original field type.
    let (reference_value, binary_scale_factor, decimal_scale_factor, bits, field_type) =
        if template == 0 {
            if sec.len() < 21 {
                return Err(Grib2Error::MalformedSection {
                    section: 5,
                    reason: format!("template 5.0 needs 21 bytes, got {}", sec.len()),
                });
            }
            (
                f32::from_be_bytes([sec[11], sec[12], sec[13], sec[14]]),
                i16::from_be_bytes([sec[15], sec[16]]),
                i16::from_be_bytes([sec[17], sec[18]]),
                sec[19],
                sec[20],
            )
        } else {
            (0.0, 0, 0, 0, 0)
        };

    if template == 0 && !reference_value.is_finite() {
        return Err(Grib2Error::MalformedSection {
            section: 5,
            reason: format!("non-finite reference value {}", reference_value),
        });
    }

    Ok(DataRepresentation {
        template,
        num_packed_points,
        reference_value,
        binary_scale_factor,
        decimal_scale_factor,
        bits_per_value: bits,
        original_field_type: field_type,
    })
}

/// Convert a GRIB2 time-range value (code table 4.4) to whole hours.
pub fn time_unit_to_hours(unit: u8, value: u32) -> u32 {
    match unit {
        0 => value / 60,       // minutes
        1 => value,            // hours
        2 => value * 24,       // days
        10 => value * 3,       // 3-hour steps
        11 => value * 6,       // 6-hour steps
        12 => value * 12,      // 12-hour steps
        13 => value / 3600,    // seconds
        _ => value,
    }
}
