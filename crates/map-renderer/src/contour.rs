//! Isoline extraction via marching squares.
//!
//! Runs on the plot-resolution raster; output coordinates are fractional
//! grid indices that the composer scales to pixels. Saddle cells are
//! disambiguated by the cell-center average, and cells touching NaN are
//! skipped, so isolines stop cleanly at coverage edges.

/// One traced isoline.
#[derive(Debug, Clone)]
pub struct ContourLine {
    pub level: f32,
    pub points: Vec<(f32, f32)>,
    pub closed: bool,
}

/// Levels at multiples of `interval` within the data range, e.g. 4 hPa
/// isobars: 996, 1000, 1004...
pub fn isoline_levels(min: f32, max: f32, interval: f32) -> Vec<f32> {
    if !(min.is_finite() && max.is_finite()) || interval <= 0.0 || max < min {
        return vec![];
    }
    let mut levels = Vec::new();
    let mut level = (min / interval).ceil() * interval;
    while level <= max {
        levels.push(level);
        level += interval;
    }
    levels
}

/// Trace all isolines for the given levels: march every cell, chain the
/// segments into polylines, then round corners with Chaikin passes.
pub fn trace_isolines(
    values: &[f32],
    cols: usize,
    rows: usize,
    levels: &[f32],
    smoothing_passes: u32,
) -> Vec<ContourLine> {
    let mut lines = Vec::new();
    if cols < 2 || rows < 2 || values.len() != cols * rows {
        return lines;
    }

    for &level in levels {
        let segments = march_cells(values, cols, rows, level);
        for (points, closed) in chain_segments(&segments) {
            let points = chaikin(points, closed, smoothing_passes);
            if points.len() >= 2 {
                lines.push(ContourLine {
                    level,
                    points,
                    closed,
                });
            }
        }
    }
    lines
}

type Segment = [(f32, f32); 2];

/// Marching squares over one level. Corner bits: top-left 1, top-right 2,
/// bottom-right 4, bottom-left 8.
fn march_cells(values: &[f32], cols: usize, rows: usize, level: f32) -> Vec<Segment> {
    let mut segments = Vec::new();

    for y in 0..rows - 1 {
        for x in 0..cols - 1 {
            let tl = values[y * cols + x];
            let tr = values[y * cols + x + 1];
            let bl = values[(y + 1) * cols + x];
            let br = values[(y + 1) * cols + x + 1];
            if tl.is_nan() || tr.is_nan() || bl.is_nan() || br.is_nan() {
                continue;
            }

            let mut idx = 0u8;
            if tl >= level {
                idx |= 1;
            }
            if tr >= level {
                idx |= 2;
            }
            if br >= level {
                idx |= 4;
            }
            if bl >= level {
                idx |= 8;
            }
            if idx == 0 || idx == 15 {
                continue;
            }

            let (xf, yf) = (x as f32, y as f32);
            let top = cross((xf, yf), (xf + 1.0, yf), tl, tr, level);
            let right = cross((xf + 1.0, yf), (xf + 1.0, yf + 1.0), tr, br, level);
            let bottom = cross((xf, yf + 1.0), (xf + 1.0, yf + 1.0), bl, br, level);
            let left = cross((xf, yf), (xf, yf + 1.0), tl, bl, level);

            match idx {
                1 | 14 => segments.push([left, top]),
                2 | 13 => segments.push([top, right]),
                3 | 12 => segments.push([left, right]),
                4 | 11 => segments.push([right, bottom]),
                6 | 9 => segments.push([top, bottom]),
                7 | 8 => segments.push([left, bottom]),
                5 => {
                    // tl and br high: the center decides whether they join.
                    if (tl + tr + bl + br) / 4.0 >= level {
                        segments.push([top, right]);
                        segments.push([left, bottom]);
                    } else {
                        segments.push([left, top]);
                        segments.push([right, bottom]);
                    }
                }
                10 => {
                    if (tl + tr + bl + br) / 4.0 >= level {
                        segments.push([left, top]);
                        segments.push([right, bottom]);
                    } else {
                        segments.push([top, right]);
                        segments.push([left, bottom]);
                    }
                }
                _ => {}
            }
        }
    }

    segments
}

/// Where the isoline crosses the edge between two corner values.
fn cross(a: (f32, f32), b: (f32, f32), va: f32, vb: f32, level: f32) -> (f32, f32) {
    if (vb - va).abs() < 1e-6 {
        return ((a.0 + b.0) * 0.5, (a.1 + b.1) * 0.5);
    }
    let t = ((level - va) / (vb - va)).clamp(0.0, 1.0);
    (a.0 + t * (b.0 - a.0), a.1 + t * (b.1 - a.1))
}

const CHAIN_EPSILON: f32 = 1e-3;

fn close_enough(a: (f32, f32), b: (f32, f32)) -> bool {
    (a.0 - b.0).abs() < CHAIN_EPSILON && (a.1 - b.1).abs() < CHAIN_EPSILON
}

/// Join loose segments into polylines, growing each line at both ends until
/// no segment attaches. Returns the points with a closed flag.
fn chain_segments(segments: &[Segment]) -> Vec<(Vec<(f32, f32)>, bool)> {
    let mut used = vec![false; segments.len()];
    let mut lines = Vec::new();

    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut points = vec![segments[start][0], segments[start][1]];

        // Grow at the tail, then flip and grow at the head the same way.
        for _ in 0..2 {
            loop {
                let tail = *points.last().unwrap();
                let mut attached = false;
                for (i, seg) in segments.iter().enumerate() {
                    if used[i] {
                        continue;
                    }
                    if close_enough(seg[0], tail) {
                        points.push(seg[1]);
                        used[i] = true;
                        attached = true;
                        break;
                    }
                    if close_enough(seg[1], tail) {
                        points.push(seg[0]);
                        used[i] = true;
                        attached = true;
                        break;
                    }
                }
                if !attached {
                    break;
                }
            }
            points.reverse();
        }

        let closed = points.len() > 2 && close_enough(points[0], *points.last().unwrap());
        if closed {
            points.pop();
        }
        lines.push((points, closed));
    }

    lines
}

/// Chaikin corner cutting. Open lines keep their endpoints; closed lines
/// wrap around.
fn chaikin(points: Vec<(f32, f32)>, closed: bool, passes: u32) -> Vec<(f32, f32)> {
    let mut points = points;
    for _ in 0..passes {
        if points.len() < 3 {
            break;
        }
        let n = points.len();
        let mut out = Vec::with_capacity(n * 2);
        let pairs = if closed { n } else { n - 1 };

        if !closed {
            out.push(points[0]);
        }
        for i in 0..pairs {
            let p = points[i];
            let q = points[(i + 1) % n];
            out.push((0.75 * p.0 + 0.25 * q.0, 0.75 * p.1 + 0.25 * q.1));
            out.push((0.25 * p.0 + 0.75 * q.0, 0.25 * p.1 + 0.75 * q.1));
        }
        if !closed {
            out.push(points[n - 1]);
        }
        points = out;
    }
    points
}
