//! Builder for synthetic GRIB2 edition-2 messages.
//!
//! Emits byte-exact messages with sections 0 through 7 using grid template
//! 3.0 (lat/lon), product templates 4.0 or 4.8, simple packing (5.0) and an
//! optional bitmap. Useful for decoder tests that need real wire bytes
//! without shipping multi-megabyte model output in the repository.

use chrono::{TimeZone, Utc};

/// Fluent builder for a single GRIB2 message.
///
/// Defaults describe a 2m-ish temperature product on a small 6x4 one-degree
/// grid over Europe with integral values, so simple packing is lossless.
#[derive(Debug, Clone)]
pub struct Grib2MessageBuilder {
    discipline: u8,
    center: u16,
    reference: (u16, u8, u8, u8),
    category: u8,
    number: u8,
    time_unit: u8,
    forecast_time: u32,
    level_type: u8,
    level_scale: i8,
    level_scaled_value: u32,
    interval_end: Option<(u16, u8, u8, u8)>,
    ni: usize,
    nj: usize,
    lat_first: f64,
    lon_first: f64,
    di: f64,
    dj: f64,
    south_to_north: bool,
    decimal_scale: i16,
    values: Option<Vec<f32>>,
    bitmap: Option<Vec<bool>>,
}

impl Default for Grib2MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Grib2MessageBuilder {
    pub fn new() -> Self {
        Self {
            discipline: 0,
            center: 7,
            reference: (2025, 1, 1, 0),
            category: 0,
            number: 0,
            time_unit: 1,
            forecast_time: 0,
            level_type: 1,
            level_scale: 0,
            level_scaled_value: 0,
            interval_end: None,
            ni: 6,
            nj: 4,
            lat_first: 50.0,
            lon_first: 10.0,
            di: 1.0,
            dj: 1.0,
            south_to_north: false,
            decimal_scale: 0,
            values: None,
            bitmap: None,
        }
    }

    pub fn discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
    }

    /// Product category and number within the current discipline.
    pub fn parameter(mut self, discipline: u8, category: u8, number: u8) -> Self {
        self.discipline = discipline;
        self.category = category;
        self.number = number;
        self
    }

    pub fn reference_time(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.reference = (year, month, day, hour);
        self
    }

    /// Forecast lead in hours (code table 4.4 unit 1).
    pub fn forecast_hour(mut self, hours: u32) -> Self {
        self.time_unit = 1;
        self.forecast_time = hours;
        self
    }

    pub fn time_unit(mut self, unit: u8, forecast_time: u32) -> Self {
        self.time_unit = unit;
        self.forecast_time = forecast_time;
        self
    }

    /// First fixed surface with scale factor zero.
    pub fn level(mut self, level_type: u8, scaled_value: u32) -> Self {
        self.level_type = level_type;
        self.level_scale = 0;
        self.level_scaled_value = scaled_value;
        self
    }

    pub fn level_scaled(mut self, level_type: u8, scale: i8, scaled_value: u32) -> Self {
        self.level_type = level_type;
        self.level_scale = scale;
        self.level_scaled_value = scaled_value;
        self
    }

    /// Switch to product template 4.8 with the given accumulation interval end.
    pub fn accumulation_until(mut self, year: u16, month: u8, day: u8, hour: u8) -> Self {
        self.interval_end = Some((year, month, day, hour));
        self
    }

    pub fn grid(
        mut self,
        ni: usize,
        nj: usize,
        lat_first: f64,
        lon_first: f64,
        di: f64,
        dj: f64,
    ) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.lat_first = lat_first;
        self.lon_first = lon_first;
        self.di = di;
        self.dj = dj;
        self
    }

    pub fn scan_south_to_north(mut self) -> Self {
        self.south_to_north = true;
        self
    }

    pub fn decimal_scale(mut self, scale: i16) -> Self {
        self.decimal_scale = scale;
        self
    }

    /// Full-grid values in row-major scan order. Length must equal ni * nj.
    pub fn values(mut self, values: Vec<f32>) -> Self {
        self.values = Some(values);
        self
    }

    /// Presence bitmap, one flag per grid point. Values at absent points are
    /// ignored during packing.
    pub fn bitmap(mut self, present: Vec<bool>) -> Self {
        self.bitmap = Some(present);
        self
    }

    /// Assemble the complete message including the 7777 trailer.
    pub fn build(self) -> Vec<u8> {
        let grid_len = self.ni * self.nj;
        let values = self
            .values
            .clone()
            .unwrap_or_else(|| (0..grid_len).map(|i| 280.0 + i as f32).collect());
        assert_eq!(values.len(), grid_len, "values length must match grid");
        if let Some(bitmap) = &self.bitmap {
            assert_eq!(bitmap.len(), grid_len, "bitmap length must match grid");
        }

        let packed = pack_simple(&values, self.bitmap.as_deref(), self.decimal_scale);

        let mut body = Vec::new();
        body.extend_from_slice(&self.section_1());
        body.extend_from_slice(&self.section_3(grid_len));
        body.extend_from_slice(&self.section_4());
        body.extend_from_slice(&self.section_5(&packed));
        body.extend_from_slice(&self.section_6(grid_len));
        body.extend_from_slice(&section_7(&packed.data));

        let total = 16 + body.len() as u64 + 4;
        let mut message = Vec::with_capacity(total as usize);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]);
        message.push(self.discipline);
        message.push(2);
        message.extend_from_slice(&total.to_be_bytes());
        message.extend_from_slice(&body);
        message.extend_from_slice(b"7777");
        message
    }

    fn section_1(&self) -> Vec<u8> {
        let (year, month, day, hour) = self.reference;
        let mut sec = Vec::with_capacity(21);
        sec.extend_from_slice(&21u32.to_be_bytes());
        sec.push(1);
        sec.extend_from_slice(&self.center.to_be_bytes());
        sec.extend_from_slice(&0u16.to_be_bytes()); // sub-center
        sec.push(2); // master table version
        sec.push(1); // local table version
        sec.push(1); // significance: start of forecast
        sec.extend_from_slice(&year.to_be_bytes());
        sec.push(month);
        sec.push(day);
        sec.push(hour);
        sec.push(0); // minute
        sec.push(0); // second
        sec.push(0); // production status
        sec.push(1); // type: forecast products
        sec
    }

    fn section_3(&self, grid_len: usize) -> Vec<u8> {
        let mut sec = Vec::with_capacity(72);
        sec.extend_from_slice(&72u32.to_be_bytes());
        sec.push(3);
        sec.push(0); // grid definition source
        sec.extend_from_slice(&(grid_len as u32).to_be_bytes());
        sec.push(0); // optional point-count octets
        sec.push(0); // interpretation
        sec.extend_from_slice(&0u16.to_be_bytes()); // template 3.0

        // Template 3.0 body, 58 bytes.
        sec.push(6); // shape of earth: spherical, radius 6371229 m
        sec.push(0);
        sec.extend_from_slice(&0u32.to_be_bytes()); // radius
        sec.push(0);
        sec.extend_from_slice(&0u32.to_be_bytes()); // major axis
        sec.push(0);
        sec.extend_from_slice(&0u32.to_be_bytes()); // minor axis
        sec.extend_from_slice(&(self.ni as u32).to_be_bytes());
        sec.extend_from_slice(&(self.nj as u32).to_be_bytes());
        sec.extend_from_slice(&0u32.to_be_bytes()); // basic angle
        sec.extend_from_slice(&0u32.to_be_bytes()); // subdivisions

        let lat_last = if self.south_to_north {
            self.lat_first + (self.nj as f64 - 1.0) * self.dj
        } else {
            self.lat_first - (self.nj as f64 - 1.0) * self.dj
        };
        let lon_last = (self.lon_first + (self.ni as f64 - 1.0) * self.di).rem_euclid(360.0);

        sec.extend_from_slice(&microdegrees(self.lat_first).to_be_bytes());
        sec.extend_from_slice(&microdegrees(self.lon_first.rem_euclid(360.0)).to_be_bytes());
        sec.push(0x30); // resolution and component flags
        sec.extend_from_slice(&microdegrees(lat_last).to_be_bytes());
        sec.extend_from_slice(&microdegrees(lon_last).to_be_bytes());
        sec.extend_from_slice(&(microdegrees(self.di) as u32).to_be_bytes());
        sec.extend_from_slice(&(microdegrees(self.dj) as u32).to_be_bytes());
        sec.push(if self.south_to_north { 0x40 } else { 0x00 });
        sec
    }

    fn section_4(&self) -> Vec<u8> {
        let template: u16 = if self.interval_end.is_some() { 8 } else { 0 };
        let len: u32 = if self.interval_end.is_some() { 58 } else { 34 };
        let mut sec = Vec::with_capacity(len as usize);
        sec.extend_from_slice(&len.to_be_bytes());
        sec.push(4);
        sec.extend_from_slice(&0u16.to_be_bytes()); // coordinate values
        sec.extend_from_slice(&template.to_be_bytes());
        sec.push(self.category);
        sec.push(self.number);
        sec.push(2); // generating process: forecast
        sec.push(0); // background process
        sec.push(96); // generating process identifier
        sec.extend_from_slice(&0u16.to_be_bytes()); // cutoff hours
        sec.push(0); // cutoff minutes
        sec.push(self.time_unit);
        sec.extend_from_slice(&self.forecast_time.to_be_bytes());
        sec.push(self.level_type);
        sec.push(self.level_scale as u8);
        sec.extend_from_slice(&self.level_scaled_value.to_be_bytes());
        sec.push(255); // second surface: missing
        sec.push(0xFF);
        sec.extend_from_slice(&u32::MAX.to_be_bytes());

        if let Some((year, month, day, hour)) = self.interval_end {
            sec.extend_from_slice(&year.to_be_bytes());
            sec.push(month);
            sec.push(day);
            sec.push(hour);
            sec.push(0); // minute
            sec.push(0); // second
            sec.push(1); // one time range
            sec.extend_from_slice(&0u32.to_be_bytes()); // missing in interval
            sec.push(1); // statistical process: accumulation
            sec.push(2); // increment type
            sec.push(1); // range unit: hour
            sec.extend_from_slice(&self.accumulation_hours().to_be_bytes());
            sec.push(1); // increment unit
            sec.extend_from_slice(&0u32.to_be_bytes()); // increment
        }
        sec
    }

    fn accumulation_hours(&self) -> u32 {
        let Some((ey, em, ed, eh)) = self.interval_end else {
            return 0;
        };
        let (ry, rm, rd, rh) = self.reference;
        let start = Utc.with_ymd_and_hms(ry as i32, rm as u32, rd as u32, rh as u32, 0, 0);
        let end = Utc.with_ymd_and_hms(ey as i32, em as u32, ed as u32, eh as u32, 0, 0);
        match (start.single(), end.single()) {
            (Some(start), Some(end)) => {
                let total = (end - start).num_hours().max(0) as u32;
                total.saturating_sub(self.forecast_time)
            }
            _ => 0,
        }
    }

    fn section_5(&self, packed: &PackedValues) -> Vec<u8> {
        let mut sec = Vec::with_capacity(21);
        sec.extend_from_slice(&21u32.to_be_bytes());
        sec.push(5);
        sec.extend_from_slice(&(packed.num_points as u32).to_be_bytes());
        sec.extend_from_slice(&0u16.to_be_bytes()); // template 5.0
        sec.extend_from_slice(&packed.reference.to_be_bytes());
        sec.extend_from_slice(&0i16.to_be_bytes()); // binary scale factor
        sec.extend_from_slice(&self.decimal_scale.to_be_bytes());
        sec.push(packed.bits_per_value);
        sec.push(0); // original field type: float
        sec
    }

    fn section_6(&self, grid_len: usize) -> Vec<u8> {
        match &self.bitmap {
            None => {
                let mut sec = Vec::with_capacity(6);
                sec.extend_from_slice(&6u32.to_be_bytes());
                sec.push(6);
                sec.push(255);
                sec
            }
            Some(present) => {
                let bitmap_bytes = grid_len.div_ceil(8);
                let len = 6 + bitmap_bytes as u32;
                let mut sec = Vec::with_capacity(len as usize);
                sec.extend_from_slice(&len.to_be_bytes());
                sec.push(6);
                sec.push(0);
                let mut bytes = vec![0u8; bitmap_bytes];
                for (i, &set) in present.iter().enumerate() {
                    if set {
                        bytes[i / 8] |= 1 << (7 - (i % 8) as u8);
                    }
                }
                sec.extend_from_slice(&bytes);
                sec
            }
        }
    }
}

fn section_7(data: &[u8]) -> Vec<u8> {
    let len = 5 + data.len() as u32;
    let mut sec = Vec::with_capacity(len as usize);
    sec.extend_from_slice(&len.to_be_bytes());
    sec.push(7);
    sec.extend_from_slice(data);
    sec
}

struct PackedValues {
    reference: f32,
    bits_per_value: u8,
    num_points: usize,
    data: Vec<u8>,
}

/// Simple packing with binary scale factor zero: raw = v * 10^D - R.
/// Non-integral raws are rounded, so callers wanting lossless round trips
/// should pick values integral after decimal scaling.
fn pack_simple(values: &[f32], bitmap: Option<&[bool]>, decimal_scale: i16) -> PackedValues {
    let present: Vec<f64> = match bitmap {
        Some(flags) => values
            .iter()
            .zip(flags)
            .filter(|(_, &p)| p)
            .map(|(&v, _)| v as f64)
            .collect(),
        None => values.iter().map(|&v| v as f64).collect(),
    };

    if present.is_empty() {
        return PackedValues {
            reference: 0.0,
            bits_per_value: 0,
            num_points: 0,
            data: Vec::new(),
        };
    }

    let scale = 10f64.powi(decimal_scale as i32);
    let scaled: Vec<f64> = present.iter().map(|&v| v * scale).collect();
    let min = scaled.iter().cloned().fold(f64::INFINITY, f64::min);
    let reference = min as f32;

    let raws: Vec<u64> = scaled
        .iter()
        .map(|&s| (s - reference as f64).round().max(0.0) as u64)
        .collect();
    let max_raw = raws.iter().copied().max().unwrap_or(0);
    if max_raw == 0 {
        // Constant field, no packed data needed.
        return PackedValues {
            reference,
            bits_per_value: 0,
            num_points: present.len(),
            data: Vec::new(),
        };
    }

    let bits_per_value = (64 - max_raw.leading_zeros()) as u8;
    assert!(bits_per_value <= 32, "test values span too wide a range");

    let mut writer = BitWriter::new();
    for raw in raws {
        writer.write(raw as u32, bits_per_value);
    }
    PackedValues {
        reference,
        bits_per_value,
        num_points: present.len(),
        data: writer.finish(),
    }
}

struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    filled: u8,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            current: 0,
            filled: 0,
        }
    }

    fn write(&mut self, value: u32, num_bits: u8) {
        for i in (0..num_bits).rev() {
            let bit = ((value >> i) & 1) as u8;
            self.current = (self.current << 1) | bit;
            self.filled += 1;
            if self.filled == 8 {
                self.bytes.push(self.current);
                self.current = 0;
                self.filled = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push(self.current << (8 - self.filled));
        }
        self.bytes
    }
}

fn microdegrees(degrees: f64) -> i32 {
    (degrees * 1_000_000.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_message_framing() {
        let msg = Grib2MessageBuilder::new().build();
        assert_eq!(&msg[0..4], b"GRIB");
        assert_eq!(msg[7], 2, "edition");
        let declared = u64::from_be_bytes(msg[8..16].try_into().unwrap());
        assert_eq!(declared as usize, msg.len());
        assert_eq!(&msg[msg.len() - 4..], b"7777");
    }

    #[test]
    fn test_section_numbers_walk() {
        let msg = Grib2MessageBuilder::new().build();
        let mut offset = 16;
        let mut seen = Vec::new();
        while &msg[offset..offset + 4] != b"7777" {
            let len = u32::from_be_bytes(msg[offset..offset + 4].try_into().unwrap()) as usize;
            seen.push(msg[offset + 4]);
            offset += len;
        }
        assert_eq!(seen, vec![1, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_bit_writer_msb_first() {
        let mut w = BitWriter::new();
        w.write(0b101, 3);
        w.write(0b01, 2);
        w.write(0b110, 3);
        assert_eq!(w.finish(), vec![0b1010_1110]);
    }

    #[test]
    fn test_bit_writer_pads_final_byte() {
        let mut w = BitWriter::new();
        w.write(0b11, 2);
        assert_eq!(w.finish(), vec![0b1100_0000]);
    }

    #[test]
    fn test_constant_field_uses_zero_bits() {
        let packed = pack_simple(&[5.0, 5.0, 5.0], None, 0);
        assert_eq!(packed.bits_per_value, 0);
        assert!(packed.data.is_empty());
        assert_eq!(packed.reference, 5.0);
    }

    #[test]
    fn test_pack_respects_bitmap() {
        let bitmap = [true, false, true, false];
        let packed = pack_simple(&[1.0, 99.0, 3.0, 99.0], Some(&bitmap), 0);
        assert_eq!(packed.num_points, 2);
        assert_eq!(packed.reference, 1.0);
        // raws are 0 and 2, so 2 bits each
        assert_eq!(packed.bits_per_value, 2);
    }

    #[test]
    fn test_accumulation_template_length() {
        let msg = Grib2MessageBuilder::new()
            .parameter(0, 1, 8)
            .reference_time(2025, 3, 10, 6)
            .forecast_hour(3)
            .accumulation_until(2025, 3, 10, 12)
            .build();
        // Find section 4 and check its declared length.
        let mut offset = 16;
        loop {
            let len = u32::from_be_bytes(msg[offset..offset + 4].try_into().unwrap()) as usize;
            if msg[offset + 4] == 4 {
                assert_eq!(len, 58);
                // Interval end year at body offset 34.
                let year = u16::from_be_bytes(msg[offset + 34..offset + 36].try_into().unwrap());
                assert_eq!(year, 2025);
                break;
            }
            offset += len;
        }
    }

    #[test]
    fn test_bitmap_section_bytes() {
        let msg = Grib2MessageBuilder::new()
            .grid(4, 2, 40.0, 0.0, 1.0, 1.0)
            .values(vec![1.0; 8])
            .bitmap(vec![true, false, true, true, false, false, true, false])
            .build();
        let mut offset = 16;
        loop {
            let len = u32::from_be_bytes(msg[offset..offset + 4].try_into().unwrap()) as usize;
            if msg[offset + 4] == 6 {
                assert_eq!(msg[offset + 5], 0, "bitmap present indicator");
                assert_eq!(msg[offset + 6], 0b1011_0010);
                break;
            }
            offset += len;
        }
    }
}
