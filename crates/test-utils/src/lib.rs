//! Shared test utilities for the weathermaps workspace.
//!
//! Provides deterministic grid generators, fixture geometries and regions,
//! and a GRIB2 message builder that emits real bytes for decoder and
//! pipeline tests.
//!
//! Add to a crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod grib;

pub use fixtures::*;
pub use generators::*;
pub use grib::Grib2MessageBuilder;

/// Macro for approximate floating-point equality assertions.
///
/// ```ignore
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
