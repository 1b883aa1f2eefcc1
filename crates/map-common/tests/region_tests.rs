//! Tests for region bounds and region config loading.

use std::io::Write;

use map_common::region::{default_regions, load_region_config, RegionBounds};

// ============================================================================
// Bounds behavior
// ============================================================================

#[test]
fn test_bounds_new() {
    let b = RegionBounds::new(-10.0, 40.0, 25.0, 70.0).unwrap();
    assert_eq!(b.lon_min, -10.0);
    assert_eq!(b.lon_max, 40.0);
    assert_eq!(b.lat_min, 25.0);
    assert_eq!(b.lat_max, 70.0);
}

#[test]
fn test_bounds_copy_semantics() {
    let a = RegionBounds::new(0.0, 10.0, 0.0, 10.0).unwrap();
    let b = a;
    assert_eq!(a, b);
}

#[test]
fn test_aspect_tall_region() {
    // israel: 3 degrees wide, 4.5 degrees tall
    let b = RegionBounds::new(33.5, 36.5, 29.0, 33.5).unwrap();
    assert!((b.aspect() - 1.5).abs() < 1e-9);
}

#[test]
fn test_contains_at_edges() {
    let b = RegionBounds::new(25.0, 60.0, 10.0, 45.0).unwrap();
    assert!(b.contains(25.0, 10.0));
    assert!(b.contains(60.0, 45.0));
    assert!(!b.contains(24.999, 10.0));
    assert!(!b.contains(25.0, 45.001));
}

// ============================================================================
// Config loading
// ============================================================================

#[test]
fn test_load_region_config_from_yaml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
regions:
  - id: alps
    lon_min: 5.0
    lon_max: 17.0
    lat_min: 43.0
    lat_max: 49.0
  - id: iberia
    lon_min: -10.0
    lon_max: 4.0
    lat_min: 35.0
    lat_max: 44.0
"#
    )
    .unwrap();

    let regions = load_region_config(file.path()).unwrap();
    assert_eq!(regions.len(), 2);
    assert_eq!(regions[0].id, "alps");
    assert_eq!(regions[1].bounds.lon_min, -10.0);
}

#[test]
fn test_load_region_config_rejects_bad_bounds() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
regions:
  - id: broken
    lon_min: 40.0
    lon_max: 10.0
    lat_min: 0.0
    lat_max: 10.0
"#
    )
    .unwrap();

    assert!(load_region_config(file.path()).is_err());
}

#[test]
fn test_load_region_config_rejects_empty_list() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "regions: []\n").unwrap();
    assert!(load_region_config(file.path()).is_err());
}

#[test]
fn test_load_region_config_rejects_whitespace_id() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
regions:
  - id: "two words"
    lon_min: 0.0
    lon_max: 10.0
    lat_min: 0.0
    lat_max: 10.0
"#
    )
    .unwrap();

    assert!(load_region_config(file.path()).is_err());
}

#[test]
fn test_load_region_config_missing_file() {
    assert!(load_region_config(std::path::Path::new("/nonexistent/regions.yaml")).is_err());
}

#[test]
fn test_default_region_ids() {
    let regions = default_regions();
    let ids: Vec<&str> = regions.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["israel", "eastern_med", "europe", "middle_east"]);
}
