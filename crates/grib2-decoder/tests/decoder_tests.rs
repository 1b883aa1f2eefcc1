//! End-to-end decoder tests against synthetic GRIB2 messages.

use grib2_decoder::{find_product, Grib2Error, Grib2Message, Grib2Reader};
use map_common::Product;
use test_utils::Grib2MessageBuilder;

use bytes::Bytes;
use chrono::{TimeZone, Utc};

// ============================================================
// Message parsing
// ============================================================

#[test]
fn test_parse_default_message_metadata() {
    let bytes = Grib2MessageBuilder::new()
        .reference_time(2025, 6, 15, 12)
        .build();
    let message = Grib2Message::parse(Bytes::from(bytes)).unwrap();

    assert_eq!(message.indicator.edition, 2);
    assert_eq!(message.identification.center, 7);
    assert_eq!(
        message.identification.reference_time,
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    );
    assert_eq!(message.short_name(), "TMP");
    assert_eq!(message.grid.ni, 6);
    assert_eq!(message.grid.nj, 4);
}

#[test]
fn test_parse_grid_corners() {
    let bytes = Grib2MessageBuilder::new()
        .grid(11, 7, 42.0, 30.0, 0.5, 0.5)
        .values((0..77).map(|i| i as f32).collect())
        .build();
    let message = Grib2Message::parse(Bytes::from(bytes)).unwrap();

    assert!((message.grid.lat_first - 42.0).abs() < 1e-6);
    assert!((message.grid.lon_first - 30.0).abs() < 1e-6);
    // 10 columns east, 6 rows south of the first point
    assert!((message.grid.lon_last - 35.0).abs() < 1e-6);
    assert!((message.grid.lat_last - 39.0).abs() < 1e-6);
    assert!((message.grid.di - 0.5).abs() < 1e-6);
    assert!((message.grid.dj - 0.5).abs() < 1e-6);
}

#[test]
fn test_parse_rejects_wrong_edition() {
    let mut bytes = Grib2MessageBuilder::new().build();
    bytes[7] = 1;
    let err = Grib2Message::parse(Bytes::from(bytes)).unwrap_err();
    assert!(matches!(err, Grib2Error::UnsupportedEdition(1)));
}

// ============================================================
// Unpacking
// ============================================================

#[test]
fn test_unpack_round_trips_integral_values() {
    let values: Vec<f32> = (0..24).map(|i| 250.0 + i as f32).collect();
    let bytes = Grib2MessageBuilder::new().values(values.clone()).build();
    let message = Grib2Message::parse(Bytes::from(bytes)).unwrap();

    let field = message.unpack().unwrap();
    assert_eq!(field.values.len(), 24);
    for (got, want) in field.values.iter().zip(&values) {
        assert!((got - want).abs() < 1e-3, "got {} want {}", got, want);
    }
}

#[test]
fn test_unpack_with_decimal_scale() {
    // Half-degree steps are integral once scaled by 10^1.
    let values = vec![10.0, 10.5, 11.0, 11.5, 12.0, 12.5, 13.0, 13.5];
    let bytes = Grib2MessageBuilder::new()
        .grid(4, 2, 50.0, 10.0, 1.0, 1.0)
        .decimal_scale(1)
        .values(values.clone())
        .build();
    let message = Grib2Message::parse(Bytes::from(bytes)).unwrap();

    let field = message.unpack().unwrap();
    for (got, want) in field.values.iter().zip(&values) {
        assert!((got - want).abs() < 1e-3, "got {} want {}", got, want);
    }
}

#[test]
fn test_unpack_constant_field() {
    let bytes = Grib2MessageBuilder::new()
        .values(vec![288.0; 24])
        .build();
    let message = Grib2Message::parse(Bytes::from(bytes)).unwrap();
    assert_eq!(message.representation.bits_per_value, 0);

    let field = message.unpack().unwrap();
    assert!(field.values.iter().all(|&v| (v - 288.0).abs() < 1e-3));
}

#[test]
fn test_unpack_bitmap_places_values_correctly() {
    let bitmap = vec![true, false, true, true, false, false, true, false];
    let mut values = vec![0.0f32; 8];
    values[0] = 10.0;
    values[2] = 30.0;
    values[3] = 40.0;
    values[6] = 70.0;

    let bytes = Grib2MessageBuilder::new()
        .grid(4, 2, 50.0, 10.0, 1.0, 1.0)
        .values(values)
        .bitmap(bitmap)
        .build();
    let message = Grib2Message::parse(Bytes::from(bytes)).unwrap();

    let field = message.unpack().unwrap();
    assert!((field.values[0] - 10.0).abs() < 1e-3);
    assert!(field.values[1].is_nan());
    assert!((field.values[2] - 30.0).abs() < 1e-3);
    assert!((field.values[3] - 40.0).abs() < 1e-3);
    assert!(field.values[4].is_nan());
    assert!(field.values[5].is_nan());
    assert!((field.values[6] - 70.0).abs() < 1e-3);
    assert!(field.values[7].is_nan());
}

#[test]
fn test_unpack_south_to_north_geometry() {
    let bytes = Grib2MessageBuilder::new()
        .grid(10, 5, 20.0, 30.0, 1.0, 1.0)
        .scan_south_to_north()
        .values((0..50).map(|i| i as f32).collect())
        .build();
    let message = Grib2Message::parse(Bytes::from(bytes)).unwrap();
    assert!(message.grid.scans_south_to_north());

    let field = message.unpack().unwrap();
    assert!(field.geometry.scans_south_to_north);
    assert!((field.geometry.lat_at(0) - 20.0).abs() < 1e-6);
    assert!((field.geometry.lat_at(4) - 24.0).abs() < 1e-6);
}

#[test]
fn test_unpack_realistic_temperature_field() {
    let geom = test_utils::fixtures::regional_east_med();
    let values = test_utils::generators::temperature_grid_kelvin(geom.ni, geom.nj);
    let rounded: Vec<f32> = values.iter().map(|v| v.round()).collect();

    let bytes = Grib2MessageBuilder::new()
        .level(103, 2)
        .grid(
            geom.ni,
            geom.nj,
            geom.lat_first,
            geom.lon_first,
            geom.di,
            geom.dj,
        )
        .values(rounded.clone())
        .build();
    let message = Grib2Message::parse(Bytes::from(bytes)).unwrap();

    let field = message.unpack().unwrap();
    let (min, max) = field.min_max().unwrap();
    assert!(min >= 240.0 && max <= 320.0);
    assert_eq!(field.values.len(), geom.len());
    assert!((field.values[100] - rounded[100]).abs() < 1e-3);
}

// ============================================================
// Product selection
// ============================================================

#[test]
fn test_find_product_honors_level_value() {
    let t2m = Grib2MessageBuilder::new().level(103, 2).build();
    let t80m = Grib2MessageBuilder::new().level(103, 80).build();
    let prmsl = Grib2MessageBuilder::new()
        .parameter(0, 3, 1)
        .level(101, 0)
        .values(vec![101_325.0; 24])
        .build();

    let mut file = Vec::new();
    file.extend_from_slice(&t80m);
    file.extend_from_slice(&prmsl);
    file.extend_from_slice(&t2m);

    let (messages, errors) = Grib2Reader::new(file).read_all();
    assert!(errors.is_empty());
    assert_eq!(messages.len(), 3);

    let found = find_product(&messages, Product::Temperature2m).unwrap();
    assert_eq!(found.level_description(), "2 m above ground");

    let found = find_product(&messages, Product::Synoptic).unwrap();
    assert_eq!(found.short_name(), "PRMSL");
    assert_eq!(found.level_description(), "mean sea level");
}

#[test]
fn test_find_product_falls_back_on_unusual_level() {
    // Precipitation normally sits on the surface; accept it anywhere when
    // no surface message exists.
    let apcp = Grib2MessageBuilder::new()
        .parameter(0, 1, 8)
        .level(103, 0)
        .build();
    let (messages, errors) = Grib2Reader::new(apcp).read_all();
    assert!(errors.is_empty());

    let found = find_product(&messages, Product::Precipitation).unwrap();
    assert_eq!(found.short_name(), "APCP");
}

#[test]
fn test_find_product_missing() {
    let t2m = Grib2MessageBuilder::new().level(103, 2).build();
    let (messages, _) = Grib2Reader::new(t2m).read_all();
    assert!(find_product(&messages, Product::Synoptic).is_none());
}

// ============================================================
// Accumulation products
// ============================================================

#[test]
fn test_accumulation_interval_sets_lead_time() {
    let bytes = Grib2MessageBuilder::new()
        .parameter(0, 1, 8)
        .level(1, 0)
        .reference_time(2025, 3, 10, 6)
        .forecast_hour(3)
        .accumulation_until(2025, 3, 10, 12)
        .build();
    let message = Grib2Message::parse(Bytes::from(bytes)).unwrap();

    assert_eq!(message.product.template, 8);
    assert_eq!(
        message.product.interval_end,
        Some(Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap())
    );
    // The effective lead is the interval end, not the 3-hour start.
    assert_eq!(
        message
            .product
            .forecast_hours(message.identification.reference_time),
        6
    );
}

#[test]
fn test_three_hour_time_unit() {
    let bytes = Grib2MessageBuilder::new().time_unit(10, 2).build();
    let message = Grib2Message::parse(Bytes::from(bytes)).unwrap();
    assert_eq!(
        message
            .product
            .forecast_hours(message.identification.reference_time),
        6
    );
}

// ============================================================
// Multi-message files
// ============================================================

#[test]
fn test_reader_walks_concatenated_messages() {
    let mut file = Vec::new();
    file.extend_from_slice(&Grib2MessageBuilder::new().build());
    file.extend_from_slice(
        &Grib2MessageBuilder::new()
            .parameter(0, 3, 1)
            .level(101, 0)
            .values(vec![101_325.0; 24])
            .build(),
    );

    let (messages, errors) = Grib2Reader::new(file).read_all();
    assert!(errors.is_empty());
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].short_name(), "TMP");
    assert_eq!(messages[1].short_name(), "PRMSL");
}

#[test]
fn test_reader_skips_garbage_between_messages() {
    let mut file = vec![0u8; 64];
    file.extend_from_slice(&Grib2MessageBuilder::new().build());
    file.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    file.extend_from_slice(&Grib2MessageBuilder::new().level(103, 2).build());

    let (messages, errors) = Grib2Reader::new(file).read_all();
    assert!(errors.is_empty());
    assert_eq!(messages.len(), 2);
}

#[test]
fn test_reader_resyncs_after_corrupt_message() {
    let mut file = Vec::new();
    file.extend_from_slice(&Grib2MessageBuilder::new().build());
    // A message header whose declared length runs past the buffer.
    file.extend_from_slice(b"GRIB");
    file.extend_from_slice(&[0, 0, 0, 2]);
    file.extend_from_slice(&10_000u64.to_be_bytes());
    file.extend_from_slice(&Grib2MessageBuilder::new().level(103, 2).build());

    let (messages, errors) = Grib2Reader::new(file).read_all();
    assert_eq!(messages.len(), 2);
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], Grib2Error::TruncatedMessage { .. }));
}
