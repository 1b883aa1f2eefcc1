//! Color scales for filled map bodies and their legends.

/// RGBA color, straight (non-premultiplied) alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255, 255);
    pub const BLACK: Color = Color::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

/// Piecewise-linear gradient over ascending value stops.
#[derive(Debug, Clone)]
pub struct ColorRamp {
    stops: Vec<(f32, Color)>,
}

impl ColorRamp {
    /// Build from stops; they must already be in ascending value order.
    pub fn new(stops: Vec<(f32, Color)>) -> Self {
        debug_assert!(stops.len() >= 2);
        debug_assert!(stops.windows(2).all(|w| w[0].0 <= w[1].0));
        Self { stops }
    }

    pub fn domain(&self) -> (f32, f32) {
        (self.stops[0].0, self.stops[self.stops.len() - 1].0)
    }

    /// Color at `value`, clamped to the ramp ends. NaN is transparent.
    pub fn sample(&self, value: f32) -> Color {
        if value.is_nan() {
            return Color::TRANSPARENT;
        }
        let first = self.stops[0];
        if value <= first.0 {
            return first.1;
        }
        for pair in self.stops.windows(2) {
            let (v0, c0) = pair[0];
            let (v1, c1) = pair[1];
            if value <= v1 {
                let t = if v1 > v0 { (value - v0) / (v1 - v0) } else { 1.0 };
                return c0.lerp(c1, t);
            }
        }
        self.stops[self.stops.len() - 1].1
    }
}

// Diverging blue-white-red endpoints, coldest to near-freezing and
// near-freezing to hottest.
const COLD_SIDE: [Color; 4] = [
    Color::opaque(37, 14, 98),
    Color::opaque(32, 74, 181),
    Color::opaque(108, 163, 224),
    Color::opaque(211, 229, 243),
];
const WARM_SIDE: [Color; 4] = [
    Color::opaque(247, 219, 196),
    Color::opaque(242, 158, 99),
    Color::opaque(214, 77, 45),
    Color::opaque(130, 13, 22),
];
const FREEZING_WHITE: Color = Color::opaque(252, 252, 252);

/// Diverging temperature ramp over the observed range in °C.
///
/// When the range spans 0°C the white midpoint is pinned there, so freezing
/// reads the same on every map; otherwise the ramp uses only the cold or
/// only the warm side.
pub fn temperature_ramp(min_c: f32, max_c: f32) -> ColorRamp {
    let (min_c, max_c) = if max_c - min_c < 0.5 {
        (min_c - 1.0, max_c + 1.0)
    } else {
        (min_c, max_c)
    };

    let mut stops = Vec::new();
    if min_c < 0.0 && max_c > 0.0 {
        for (i, &c) in COLD_SIDE.iter().enumerate() {
            let frac = i as f32 / COLD_SIDE.len() as f32;
            stops.push((min_c * (1.0 - frac), c));
        }
        stops.push((0.0, FREEZING_WHITE));
        for (i, &c) in WARM_SIDE.iter().enumerate() {
            let frac = (i + 1) as f32 / WARM_SIDE.len() as f32;
            stops.push((max_c * frac, c));
        }
    } else if max_c <= 0.0 {
        let span = max_c - min_c;
        stops.push((min_c, COLD_SIDE[0]));
        stops.push((min_c + span * 0.33, COLD_SIDE[1]));
        stops.push((min_c + span * 0.66, COLD_SIDE[2]));
        stops.push((max_c, COLD_SIDE[3]));
    } else {
        let span = max_c - min_c;
        stops.push((min_c, WARM_SIDE[0]));
        stops.push((min_c + span * 0.33, WARM_SIDE[1]));
        stops.push((min_c + span * 0.66, WARM_SIDE[2]));
        stops.push((max_c, WARM_SIDE[3]));
    }
    ColorRamp::new(stops)
}

/// Stepped palette with explicit band edges. `colors` has one entry more
/// than `levels`: the band below the first edge, then one band per gap,
/// then the open band above the last edge.
#[derive(Debug, Clone)]
pub struct DiscretePalette {
    pub levels: Vec<f32>,
    pub colors: Vec<Color>,
}

impl DiscretePalette {
    pub fn new(levels: Vec<f32>, colors: Vec<Color>) -> Self {
        debug_assert_eq!(colors.len(), levels.len() + 1);
        debug_assert!(levels.windows(2).all(|w| w[0] < w[1]));
        Self { levels, colors }
    }

    /// Band color for `value`. NaN is transparent.
    pub fn color_for(&self, value: f32) -> Color {
        if value.is_nan() {
            return Color::TRANSPARENT;
        }
        let band = self.levels.iter().take_while(|&&edge| value >= edge).count();
        self.colors[band]
    }
}

/// Accumulated precipitation bands in kg/m^2, transparent below 0.2.
pub fn precipitation_palette() -> DiscretePalette {
    DiscretePalette::new(
        vec![
            0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 40.0, 50.0, 75.0, 100.0,
        ],
        vec![
            Color::TRANSPARENT,
            Color::opaque(180, 220, 250),
            Color::opaque(120, 180, 240),
            Color::opaque(70, 140, 225),
            Color::opaque(40, 100, 200),
            Color::opaque(35, 160, 80),
            Color::opaque(250, 210, 60),
            Color::opaque(250, 160, 40),
            Color::opaque(235, 95, 30),
            Color::opaque(215, 40, 40),
            Color::opaque(160, 25, 90),
            Color::opaque(120, 20, 150),
            Color::opaque(80, 10, 110),
        ],
    )
}

/// Round tick positions for a continuous legend: steps of 1, 2 or 5 times a
/// power of ten, aimed at roughly `target` ticks.
pub fn nice_ticks(min: f32, max: f32, target: usize) -> Vec<f32> {
    if !(min.is_finite() && max.is_finite()) || max <= min || target < 2 {
        return vec![];
    }
    let raw_step = (max - min) / (target - 1) as f32;
    let magnitude = 10f32.powf(raw_step.log10().floor());
    let normalized = raw_step / magnitude;
    let step = if normalized < 1.5 {
        magnitude
    } else if normalized < 3.0 {
        2.0 * magnitude
    } else if normalized < 7.0 {
        5.0 * magnitude
    } else {
        10.0 * magnitude
    };

    let mut ticks = Vec::new();
    let mut tick = (min / step).ceil() * step;
    while tick <= max + step * 1e-3 {
        // Snap values like 19.999998 back onto the step grid
        ticks.push((tick / step).round() * step);
        tick += step;
    }
    ticks
}
