//! Deterministic grid data generators.
//!
//! All generators are pure functions of their arguments so tests get
//! identical data on every run.

use map_common::{GridField, GridGeometry};

/// A diagonal ramp encoding position: `col * 1000 + row`. Handy for
//  asserting where a value ended up after subsetting or resampling.
pub fn position_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Temperature-like values in Kelvin: ~250 K at the first row to ~310 K at
/// the last, with a small zonal wave.
pub fn temperature_grid_kelvin(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        let base = 250.0 + 60.0 * row as f32 / (height.max(2) - 1) as f32;
        for col in 0..width {
            let wave = 2.0 * (col as f32 * std::f32::consts::TAU / width.max(1) as f32).sin();
            data.push(base + wave);
        }
    }
    data
}

/// Patchy precipitation: mostly zero with deterministic wet cells.
pub fn precipitation_grid(width: usize, height: usize, seed: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let h = simple_hash(col as u32, row as u32, seed);
            // Roughly a quarter of cells are wet, up to ~50 kg/m^2
            let v = if h % 4 == 0 {
                (h % 500) as f32 / 10.0
            } else {
                0.0
            };
            data.push(v);
        }
    }
    data
}

/// Smooth mean-sea-level pressure field in Pa with one low and one high
/// center, good for contour tests.
pub fn pressure_grid_pa(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    let (lx, ly) = (width as f32 * 0.3, height as f32 * 0.4);
    let (hx, hy) = (width as f32 * 0.7, height as f32 * 0.6);
    let scale = (width.max(height) as f32 / 4.0).max(1.0);
    for row in 0..height {
        for col in 0..width {
            let dl = (((col as f32 - lx).powi(2) + (row as f32 - ly).powi(2)).sqrt() / scale).min(3.0);
            let dh = (((col as f32 - hx).powi(2) + (row as f32 - hy).powi(2)).sqrt() / scale).min(3.0);
            let low = -2500.0 * (-dl * dl).exp();
            let high = 1500.0 * (-dh * dh).exp();
            data.push(101_325.0 + low + high);
        }
    }
    data
}

pub fn constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// A grid with NaN at every `nan_every`-th point.
pub fn grid_with_nans(width: usize, height: usize, nan_every: usize) -> Vec<f32> {
    let mut data = position_grid(width, height);
    if nan_every == 0 {
        return data;
    }
    for (i, v) in data.iter_mut().enumerate() {
        if i % nan_every == 0 {
            *v = f32::NAN;
        }
    }
    data
}

/// Wrap generated values into a field on the given geometry.
pub fn field_on(geometry: GridGeometry, values: Vec<f32>) -> GridField {
    GridField::new(geometry, values).expect("generator length matches geometry")
}

/// Deterministic integer hash (no rand dependency).
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed.wrapping_add(x.wrapping_mul(374_761_393));
    h = h.wrapping_add(y.wrapping_mul(668_265_263));
    h = (h ^ (h >> 13)).wrapping_mul(1_274_126_177);
    h ^ (h >> 16)
}
