//! Simple-packing expansion (data representation template 5.0).
//!
//! `value = (R + raw * 2^E) * 10^(-D)` where `raw` is an unsigned integer of
//! `bits_per_value` bits, MSB first. When a bitmap is present, section 7
//! packs values for present points only, so the bit cursor advances only on
//! present points.

use crate::sections::DataRepresentation;
use crate::{Grib2Error, Grib2Result};

/// Expand packed data to one `f32` per grid point, NaN where the bitmap
/// marks a point missing.
pub fn unpack_simple(
    packed: &[u8],
    grid_len: usize,
    repr: &DataRepresentation,
    bitmap: Option<&[u8]>,
) -> Grib2Result<Vec<f32>> {
    let bits = repr.bits_per_value as usize;
    let decimal_scale = 10f32.powi(-(repr.decimal_scale_factor as i32));

    if bits == 0 {
        // Constant field: every present point is the reference value.
        let constant = repr.reference_value * decimal_scale;
        let values = (0..grid_len)
            .map(|i| if bit_is_set(bitmap, i) { constant } else { f32::NAN })
            .collect();
        return Ok(values);
    }

    if bits > 32 {
        return Err(Grib2Error::UnpackingError(format!(
            "{} bits per value exceeds the supported width",
            bits
        )));
    }

    if bitmap.is_none() && repr.num_packed_points as usize != grid_len {
        return Err(Grib2Error::UnpackingError(format!(
            "section 5 declares {} packed points for a {}-point grid with no bitmap",
            repr.num_packed_points, grid_len
        )));
    }

    let binary_scale = 2f32.powi(repr.binary_scale_factor as i32);
    let reference = repr.reference_value;

    let mut values = Vec::with_capacity(grid_len);
    let mut cursor = 0usize;

    for i in 0..grid_len {
        if !bit_is_set(bitmap, i) {
            values.push(f32::NAN);
            continue;
        }

        let raw = extract_bits(packed, cursor, bits).ok_or_else(|| {
            Grib2Error::UnpackingError(format!(
                "packed data exhausted at point {} of {}",
                i, grid_len
            ))
        })?;
        cursor += bits;

        values.push((reference + raw as f32 * binary_scale) * decimal_scale);
    }

    Ok(values)
}

/// Bitmap lookup: no bitmap means every point is present.
fn bit_is_set(bitmap: Option<&[u8]>, index: usize) -> bool {
    match bitmap {
        None => true,
        Some(bm) => {
            let byte = index / 8;
            let bit = 7 - (index % 8);
            byte < bm.len() && (bm[byte] >> bit) & 1 == 1
        }
    }
}

/// Read `num_bits` (1..=32) starting at `start_bit`, MSB first.
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> Option<u32> {
    debug_assert!((1..=32).contains(&num_bits));
    let end_bit = start_bit + num_bits;
    if end_bit > data.len() * 8 {
        return None;
    }

    // Widest case is 32 bits spanning 5 bytes, which fits in a u64.
    let first_byte = start_bit / 8;
    let last_byte = (end_bit + 7) / 8;
    let mut acc = 0u64;
    for &b in &data[first_byte..last_byte] {
        acc = (acc << 8) | b as u64;
    }

    let trailing = last_byte * 8 - end_bit;
    let mask = if num_bits == 64 { u64::MAX } else { (1u64 << num_bits) - 1 };
    Some(((acc >> trailing) & mask) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_repr(bits: u8, reference: f32, binary: i16, decimal: i16, packed: u32) -> DataRepresentation {
        DataRepresentation {
            template: 0,
            num_packed_points: packed,
            reference_value: reference,
            binary_scale_factor: binary,
            decimal_scale_factor: decimal,
            bits_per_value: bits,
            original_field_type: 0,
        }
    }

    #[test]
    fn test_extract_bits_msb_first() {
        let data = [0b1011_0101u8, 0b1100_0011];
        assert_eq!(extract_bits(&data, 0, 2), Some(0b10));
        assert_eq!(extract_bits(&data, 2, 2), Some(0b11));
        assert_eq!(extract_bits(&data, 0, 8), Some(0b1011_0101));
        // Crosses the byte boundary
        assert_eq!(extract_bits(&data, 6, 4), Some(0b0111));
        assert_eq!(extract_bits(&data, 0, 16), Some(0b1011_0101_1100_0011));
        assert_eq!(extract_bits(&data, 9, 8), None);
    }

    #[test]
    fn test_unpack_byte_aligned() {
        let packed = [100u8, 200];
        let repr = simple_repr(8, 0.0, 0, 0, 2);
        let values = unpack_simple(&packed, 2, &repr, None).unwrap();
        assert_eq!(values.len(), 2);
        assert!((values[0] - 100.0).abs() < 1e-3);
        assert!((values[1] - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_unpack_applies_scales() {
        // raw = 3, E = 2, D = 1: (10 + 3*4) / 10 = 2.2
        let packed = [0b0000_0011u8];
        let repr = simple_repr(8, 10.0, 2, 1, 1);
        let values = unpack_simple(&packed, 1, &repr, None).unwrap();
        assert!((values[0] - 2.2).abs() < 1e-4);
    }

    #[test]
    fn test_unpack_sub_byte_width() {
        // Three 5-bit values: 4, 17, 30 -> 00100 10001 11110 (+1 pad bit)
        let packed = [0b0010_0100, 0b0111_1100];
        let repr = simple_repr(5, 0.0, 0, 0, 3);
        let values = unpack_simple(&packed, 3, &repr, None).unwrap();
        assert_eq!(values, vec![4.0, 17.0, 30.0]);
    }

    #[test]
    fn test_unpack_bitmap_does_not_advance_on_missing() {
        // Grid of 4, bitmap 1011: packed stream holds 3 values for points
        // 0, 2 and 3.
        let packed = [10u8, 20, 30];
        let bitmap = [0b1011_0000u8];
        let repr = simple_repr(8, 0.0, 0, 0, 3);
        let values = unpack_simple(&packed, 4, &repr, Some(&bitmap)).unwrap();
        assert_eq!(values.len(), 4);
        assert!((values[0] - 10.0).abs() < 1e-3);
        assert!(values[1].is_nan());
        assert!((values[2] - 20.0).abs() < 1e-3);
        assert!((values[3] - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_unpack_constant_field() {
        let repr = simple_repr(0, 2885.0, 0, 1, 4);
        let values = unpack_simple(&[], 4, &repr, None).unwrap();
        assert_eq!(values.len(), 4);
        for v in values {
            assert!((v - 288.5).abs() < 1e-3);
        }
    }

    #[test]
    fn test_unpack_exhausted_data() {
        let packed = [1u8]; // one byte, but four 8-bit points expected
        let repr = simple_repr(8, 0.0, 0, 0, 4);
        let err = unpack_simple(&packed, 4, &repr, None).unwrap_err();
        assert!(matches!(err, Grib2Error::UnpackingError(_)));
    }

    #[test]
    fn test_unpack_point_count_mismatch() {
        let packed = [1u8, 2];
        let repr = simple_repr(8, 0.0, 0, 0, 99);
        assert!(unpack_simple(&packed, 2, &repr, None).is_err());
    }
}
