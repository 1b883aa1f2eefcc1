//! End-to-end composition tests over synthetic fields.

use map_common::{ModelRun, Product, RegionBounds, RegionSpec};
use map_renderer::{compose_map, render_error_card, BaseLayers, MapStyle, RenderError};
use test_utils::{
    field_on, gfs_one_degree, grid_with_nans, precipitation_grid, pressure_grid_pa, regional_east_med,
    regions, temperature_grid_kelvin,
};

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

fn png_dims(png: &[u8]) -> (u32, u32) {
    let w = u32::from_be_bytes(png[16..20].try_into().unwrap());
    let h = u32::from_be_bytes(png[20..24].try_into().unwrap());
    (w, h)
}

fn test_run() -> ModelRun {
    ModelRun::new("gfs", "20250101", "00", 24)
}

// ============================================================================
// compose_map tests
// ============================================================================

#[test]
fn test_temperature_map_dimensions_follow_region() {
    let mut field = field_on(regional_east_med(), temperature_grid_kelvin(61, 61));
    field.convert_units(|v| Product::Temperature2m.convert(v));
    let region = RegionSpec::new("eastern_med", regions::eastern_med());

    let map = compose_map(
        &field,
        Product::Temperature2m,
        &region,
        &test_run(),
        BaseLayers::default(),
        &MapStyle::default(),
    )
    .unwrap();

    assert_eq!(&map.png[0..8], &PNG_SIGNATURE);
    // Square region: 1010 px plot plus margins.
    assert_eq!((map.width, map.height), (1200, 1110));
    assert_eq!(png_dims(&map.png), (map.width, map.height));
}

#[test]
fn test_tall_region_clamps_plot_height() {
    let mut field = field_on(regional_east_med(), temperature_grid_kelvin(61, 61));
    field.convert_units(|v| Product::Temperature2m.convert(v));
    let region = RegionSpec::new("israel", regions::israel());

    let map = compose_map(
        &field,
        Product::Temperature2m,
        &region,
        &test_run(),
        BaseLayers::default(),
        &MapStyle::default(),
    )
    .unwrap();

    assert_eq!((map.width, map.height), (1200, 1500));
    assert_eq!(png_dims(&map.png), (1200, 1500));
}

#[test]
fn test_synoptic_map_from_global_grid() {
    let mut field = field_on(gfs_one_degree(), pressure_grid_pa(360, 181));
    field.convert_units(|v| Product::Synoptic.convert(v));
    let region = RegionSpec::new("europe", regions::europe());

    let map = compose_map(
        &field,
        Product::Synoptic,
        &region,
        &test_run(),
        BaseLayers::default(),
        &MapStyle::default(),
    )
    .unwrap();

    // Europe spans Greenwich; aspect 0.9 gives a 909 px plot.
    assert_eq!((map.width, map.height), (1200, 1009));
    assert!(map.png.len() > 1000, "isobar chart should not be trivial");
}

#[test]
fn test_precipitation_map_renders() {
    let field = field_on(regional_east_med(), precipitation_grid(61, 61, 7));
    let region = RegionSpec::new("eastern_med", regions::eastern_med());

    let map = compose_map(
        &field,
        Product::Precipitation,
        &region,
        &test_run(),
        BaseLayers::default(),
        &MapStyle::default(),
    )
    .unwrap();

    assert_eq!(&map.png[0..8], &PNG_SIGNATURE);
}

#[test]
fn test_geography_layers_change_the_image() {
    let mut field = field_on(regional_east_med(), temperature_grid_kelvin(61, 61));
    field.convert_units(|v| Product::Temperature2m.convert(v));
    let region = RegionSpec::new("eastern_med", regions::eastern_med());

    let coastlines = vec![vec![(26.0, 27.0), (32.0, 33.0), (39.0, 38.0)]];
    let borders = vec![vec![(30.0, 25.5), (30.0, 39.5)]];
    let layers = BaseLayers {
        coastlines: &coastlines,
        borders: &borders,
    };

    let bare = compose_map(
        &field,
        Product::Temperature2m,
        &region,
        &test_run(),
        BaseLayers::default(),
        &MapStyle::default(),
    )
    .unwrap();
    let with_geo = compose_map(
        &field,
        Product::Temperature2m,
        &region,
        &test_run(),
        layers,
        &MapStyle::default(),
    )
    .unwrap();

    assert_ne!(bare.png, with_geo.png);
}

#[test]
fn test_all_nan_field_is_no_data() {
    let field = field_on(regional_east_med(), grid_with_nans(61, 61, 1));
    let region = RegionSpec::new("eastern_med", regions::eastern_med());

    let err = compose_map(
        &field,
        Product::Temperature2m,
        &region,
        &test_run(),
        BaseLayers::default(),
        &MapStyle::default(),
    )
    .unwrap_err();

    assert!(matches!(err, RenderError::NoData));
}

#[test]
fn test_disjoint_region_is_rejected() {
    let field = field_on(regional_east_med(), temperature_grid_kelvin(61, 61));
    let far_away = RegionSpec::new(
        "atlantic",
        RegionBounds::new(-60.0, -40.0, 10.0, 30.0).unwrap(),
    );

    let err = compose_map(
        &field,
        Product::Temperature2m,
        &far_away,
        &test_run(),
        BaseLayers::default(),
        &MapStyle::default(),
    )
    .unwrap_err();

    assert!(matches!(err, RenderError::RegionOutsideGrid(_)));
}

// ============================================================================
// render_error_card tests
// ============================================================================

#[test]
fn test_error_card_is_a_fixed_size_png() {
    let region = RegionSpec::new("israel", regions::israel());
    let card = render_error_card(
        Product::Precipitation,
        &region,
        &test_run(),
        "no APCP field in message",
        &MapStyle::default(),
    )
    .unwrap();

    assert_eq!(&card.png[0..8], &PNG_SIGNATURE);
    assert_eq!((card.width, card.height), (640, 360));
    assert_eq!(png_dims(&card.png), (640, 360));
}
