//! Pre-defined geometries and regions for tests.

use map_common::{GridGeometry, RegionBounds};

/// Region extents matching the default render matrix.
pub mod regions {
    use super::RegionBounds;

    pub fn israel() -> RegionBounds {
        RegionBounds {
            lon_min: 33.5,
            lon_max: 36.5,
            lat_min: 29.0,
            lat_max: 33.5,
        }
    }

    pub fn eastern_med() -> RegionBounds {
        RegionBounds {
            lon_min: 25.0,
            lon_max: 40.0,
            lat_min: 25.0,
            lat_max: 40.0,
        }
    }

    /// Crosses the Greenwich meridian, exercising longitude wraparound on
    /// 0..360 grids.
    pub fn europe() -> RegionBounds {
        RegionBounds {
            lon_min: -10.0,
            lon_max: 40.0,
            lat_min: 25.0,
            lat_max: 70.0,
        }
    }

    pub fn middle_east() -> RegionBounds {
        RegionBounds {
            lon_min: 25.0,
            lon_max: 60.0,
            lat_min: 10.0,
            lat_max: 45.0,
        }
    }
}

/// GFS global 0.25 degree geometry: 1440x721, north-to-south from 90N.
pub fn gfs_quarter_degree() -> GridGeometry {
    GridGeometry::new(1440, 721, 90.0, 0.0, 0.25, 0.25, false)
        .expect("static geometry is valid")
}

/// GFS global 1 degree geometry: 360x181, north-to-south from 90N.
pub fn gfs_one_degree() -> GridGeometry {
    GridGeometry::new(360, 181, 90.0, 0.0, 1.0, 1.0, false)
        .expect("static geometry is valid")
}

/// A small global grid that keeps unit tests readable: 36x19 at 10 degrees.
pub fn small_global() -> GridGeometry {
    GridGeometry::new(36, 19, 90.0, 0.0, 10.0, 10.0, false)
        .expect("static geometry is valid")
}

/// A regional (non-global) grid over the eastern Mediterranean.
pub fn regional_east_med() -> GridGeometry {
    GridGeometry::new(61, 61, 45.0, 20.0, 0.5, 0.5, false)
        .expect("static geometry is valid")
}
