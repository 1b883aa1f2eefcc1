//! Minimal stroke font for titles, tick labels and isoline annotations.
//!
//! Each glyph is a set of polylines on a 4x6 unit box, stroked with round
//! caps so small sizes stay legible. Covers uppercase letters, digits and
//! the punctuation the map furniture needs; anything else renders as a
//! blank advance.

use tiny_skia::{LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::ramp::Color;

const GLYPH_HEIGHT: f32 = 6.0;
const ADVANCE: f32 = 6.0;
const GAP: f32 = 2.0;

type Polyline = &'static [(f32, f32)];

/// Pixel width of `text` at the given size (glyph height in pixels).
pub fn text_width(text: &str, size: f32) -> f32 {
    let n = text.chars().count() as f32;
    if n == 0.0 {
        return 0.0;
    }
    let scale = size / GLYPH_HEIGHT;
    (n * ADVANCE - GAP) * scale
}

/// Draw `text` with its top-left corner at (x, y). Lowercase input is
/// uppercased; unknown characters advance the pen without drawing.
pub fn draw_text(pixmap: &mut Pixmap, text: &str, x: f32, y: f32, size: f32, color: Color) {
    let scale = size / GLYPH_HEIGHT;
    let mut pb = PathBuilder::new();
    let mut pen_x = x;

    for ch in text.chars() {
        for stroke in glyph_strokes(ch.to_ascii_uppercase()) {
            let mut points = stroke.iter();
            if let Some(&(sx, sy)) = points.next() {
                pb.move_to(pen_x + sx * scale, y + sy * scale);
            }
            for &(sx, sy) in points {
                pb.line_to(pen_x + sx * scale, y + sy * scale);
            }
        }
        pen_x += ADVANCE * scale;
    }

    let Some(path) = pb.finish() else {
        return;
    };

    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;

    let stroke = Stroke {
        width: (size * 0.14).max(1.0),
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };

    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

fn glyph_strokes(c: char) -> &'static [Polyline] {
    match c {
        'A' => &[&[(0.0, 6.0), (2.0, 0.0), (4.0, 6.0)], &[(0.8, 3.8), (3.2, 3.8)]],
        'B' => &[
            &[(0.0, 0.0), (0.0, 6.0)],
            &[(0.0, 0.0), (3.0, 0.0), (4.0, 1.0), (4.0, 2.0), (3.0, 3.0), (0.0, 3.0)],
            &[(3.0, 3.0), (4.0, 4.0), (4.0, 5.0), (3.0, 6.0), (0.0, 6.0)],
        ],
        'C' => &[&[
            (4.0, 1.0),
            (3.0, 0.0),
            (1.0, 0.0),
            (0.0, 1.0),
            (0.0, 5.0),
            (1.0, 6.0),
            (3.0, 6.0),
            (4.0, 5.0),
        ]],
        'D' => &[
            &[(0.0, 0.0), (0.0, 6.0)],
            &[(0.0, 0.0), (2.0, 0.0), (4.0, 2.0), (4.0, 4.0), (2.0, 6.0), (0.0, 6.0)],
        ],
        'E' => &[&[(4.0, 0.0), (0.0, 0.0), (0.0, 6.0), (4.0, 6.0)], &[(0.0, 3.0), (3.0, 3.0)]],
        'F' => &[&[(4.0, 0.0), (0.0, 0.0), (0.0, 6.0)], &[(0.0, 3.0), (3.0, 3.0)]],
        'G' => &[&[
            (4.0, 1.0),
            (3.0, 0.0),
            (1.0, 0.0),
            (0.0, 1.0),
            (0.0, 5.0),
            (1.0, 6.0),
            (3.0, 6.0),
            (4.0, 5.0),
            (4.0, 3.0),
            (2.0, 3.0),
        ]],
        'H' => &[
            &[(0.0, 0.0), (0.0, 6.0)],
            &[(4.0, 0.0), (4.0, 6.0)],
            &[(0.0, 3.0), (4.0, 3.0)],
        ],
        'I' => &[
            &[(1.0, 0.0), (3.0, 0.0)],
            &[(2.0, 0.0), (2.0, 6.0)],
            &[(1.0, 6.0), (3.0, 6.0)],
        ],
        'J' => &[&[(4.0, 0.0), (4.0, 5.0), (3.0, 6.0), (1.0, 6.0), (0.0, 5.0)]],
        'K' => &[&[(0.0, 0.0), (0.0, 6.0)], &[(4.0, 0.0), (0.0, 3.0), (4.0, 6.0)]],
        'L' => &[&[(0.0, 0.0), (0.0, 6.0), (4.0, 6.0)]],
        'M' => &[&[(0.0, 6.0), (0.0, 0.0), (2.0, 3.0), (4.0, 0.0), (4.0, 6.0)]],
        'N' => &[&[(0.0, 6.0), (0.0, 0.0), (4.0, 6.0), (4.0, 0.0)]],
        'O' => &[&[
            (1.0, 0.0),
            (3.0, 0.0),
            (4.0, 1.0),
            (4.0, 5.0),
            (3.0, 6.0),
            (1.0, 6.0),
            (0.0, 5.0),
            (0.0, 1.0),
            (1.0, 0.0),
        ]],
        'P' => &[&[
            (0.0, 6.0),
            (0.0, 0.0),
            (3.0, 0.0),
            (4.0, 1.0),
            (4.0, 2.0),
            (3.0, 3.0),
            (0.0, 3.0),
        ]],
        'Q' => &[
            &[
                (1.0, 0.0),
                (3.0, 0.0),
                (4.0, 1.0),
                (4.0, 5.0),
                (3.0, 6.0),
                (1.0, 6.0),
                (0.0, 5.0),
                (0.0, 1.0),
                (1.0, 0.0),
            ],
            &[(2.5, 4.5), (4.0, 6.0)],
        ],
        'R' => &[
            &[
                (0.0, 6.0),
                (0.0, 0.0),
                (3.0, 0.0),
                (4.0, 1.0),
                (4.0, 2.0),
                (3.0, 3.0),
                (0.0, 3.0),
            ],
            &[(1.5, 3.0), (4.0, 6.0)],
        ],
        'S' => &[&[
            (4.0, 1.0),
            (3.0, 0.0),
            (1.0, 0.0),
            (0.0, 1.0),
            (0.0, 2.0),
            (1.0, 3.0),
            (3.0, 3.0),
            (4.0, 4.0),
            (4.0, 5.0),
            (3.0, 6.0),
            (1.0, 6.0),
            (0.0, 5.0),
        ]],
        'T' => &[&[(0.0, 0.0), (4.0, 0.0)], &[(2.0, 0.0), (2.0, 6.0)]],
        'U' => &[&[(0.0, 0.0), (0.0, 5.0), (1.0, 6.0), (3.0, 6.0), (4.0, 5.0), (4.0, 0.0)]],
        'V' => &[&[(0.0, 0.0), (2.0, 6.0), (4.0, 0.0)]],
        'W' => &[&[(0.0, 0.0), (1.0, 6.0), (2.0, 3.0), (3.0, 6.0), (4.0, 0.0)]],
        'X' => &[&[(0.0, 0.0), (4.0, 6.0)], &[(4.0, 0.0), (0.0, 6.0)]],
        'Y' => &[&[(0.0, 0.0), (2.0, 3.0), (4.0, 0.0)], &[(2.0, 3.0), (2.0, 6.0)]],
        'Z' => &[&[(0.0, 0.0), (4.0, 0.0), (0.0, 6.0), (4.0, 6.0)]],
        '0' => &[
            &[
                (1.0, 0.0),
                (3.0, 0.0),
                (4.0, 1.0),
                (4.0, 5.0),
                (3.0, 6.0),
                (1.0, 6.0),
                (0.0, 5.0),
                (0.0, 1.0),
                (1.0, 0.0),
            ],
            &[(3.2, 1.2), (0.8, 4.8)],
        ],
        '1' => &[&[(1.0, 1.0), (2.0, 0.0), (2.0, 6.0)], &[(1.0, 6.0), (3.0, 6.0)]],
        '2' => &[&[
            (0.0, 1.0),
            (1.0, 0.0),
            (3.0, 0.0),
            (4.0, 1.0),
            (4.0, 2.0),
            (0.0, 6.0),
            (4.0, 6.0),
        ]],
        '3' => &[&[
            (0.0, 0.0),
            (4.0, 0.0),
            (2.0, 2.5),
            (3.0, 2.5),
            (4.0, 3.5),
            (4.0, 5.0),
            (3.0, 6.0),
            (1.0, 6.0),
            (0.0, 5.0),
        ]],
        '4' => &[&[(3.0, 6.0), (3.0, 0.0), (0.0, 4.0), (4.0, 4.0)]],
        '5' => &[&[
            (4.0, 0.0),
            (0.0, 0.0),
            (0.0, 2.5),
            (3.0, 2.5),
            (4.0, 3.5),
            (4.0, 5.0),
            (3.0, 6.0),
            (1.0, 6.0),
            (0.0, 5.0),
        ]],
        '6' => &[&[
            (3.0, 0.0),
            (1.0, 0.0),
            (0.0, 1.0),
            (0.0, 5.0),
            (1.0, 6.0),
            (3.0, 6.0),
            (4.0, 5.0),
            (4.0, 4.0),
            (3.0, 3.0),
            (0.0, 3.0),
        ]],
        '7' => &[&[(0.0, 0.0), (4.0, 0.0), (1.5, 6.0)]],
        '8' => &[
            &[(1.0, 3.0), (0.5, 2.5), (0.5, 0.5), (1.0, 0.0), (3.0, 0.0), (3.5, 0.5), (3.5, 2.5), (3.0, 3.0), (1.0, 3.0)],
            &[(1.0, 3.0), (0.0, 4.0), (0.0, 5.0), (1.0, 6.0), (3.0, 6.0), (4.0, 5.0), (4.0, 4.0), (3.0, 3.0)],
        ],
        '9' => &[&[
            (1.0, 6.0),
            (3.0, 6.0),
            (4.0, 5.0),
            (4.0, 1.0),
            (3.0, 0.0),
            (1.0, 0.0),
            (0.0, 1.0),
            (0.0, 2.0),
            (1.0, 3.0),
            (4.0, 3.0),
        ]],
        '-' => &[&[(0.8, 3.0), (3.2, 3.0)]],
        '+' => &[&[(2.0, 1.2), (2.0, 4.8)], &[(0.2, 3.0), (3.8, 3.0)]],
        '.' => &[&[(1.8, 5.6), (2.2, 6.0)]],
        ',' => &[&[(2.2, 5.4), (1.6, 6.6)]],
        ':' => &[&[(1.9, 1.6), (2.1, 1.9)], &[(1.9, 4.4), (2.1, 4.7)]],
        '^' => &[&[(1.0, 1.5), (2.0, 0.3), (3.0, 1.5)]],
        '(' => &[&[(3.0, 0.0), (2.0, 1.5), (2.0, 4.5), (3.0, 6.0)]],
        ')' => &[&[(1.0, 0.0), (2.0, 1.5), (2.0, 4.5), (1.0, 6.0)]],
        '/' => &[&[(4.0, 0.0), (0.0, 6.0)]],
        '°' => &[&[
            (1.4, 0.0),
            (2.6, 0.0),
            (3.0, 0.5),
            (3.0, 1.5),
            (2.6, 2.0),
            (1.4, 2.0),
            (1.0, 1.5),
            (1.0, 0.5),
            (1.4, 0.0),
        ]],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_digits_and_letters_defined() {
        for c in "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".chars() {
            assert!(!glyph_strokes(c).is_empty(), "missing glyph for {c}");
        }
        for c in "-+.,:()/°^".chars() {
            assert!(!glyph_strokes(c).is_empty(), "missing glyph for {c}");
        }
    }

    #[test]
    fn test_unknown_chars_are_blank() {
        assert!(glyph_strokes('@').is_empty());
        assert!(glyph_strokes(' ').is_empty());
    }

    #[test]
    fn test_text_width_scales() {
        assert_eq!(text_width("", 12.0), 0.0);
        let one = text_width("A", 12.0);
        let three = text_width("ABC", 12.0);
        assert!(one > 0.0);
        assert!((three - (one + 2.0 * ADVANCE * 2.0)).abs() < 1e-4);
        assert!(text_width("A", 24.0) > one);
    }

    #[test]
    fn test_draw_text_marks_pixels() {
        let mut pixmap = Pixmap::new(80, 20).unwrap();
        draw_text(&mut pixmap, "1013", 2.0, 2.0, 12.0, Color::BLACK);
        assert!(pixmap.data().iter().any(|&b| b != 0));
    }

    #[test]
    fn test_lowercase_maps_to_uppercase() {
        let mut upper = Pixmap::new(40, 20).unwrap();
        let mut lower = Pixmap::new(40, 20).unwrap();
        draw_text(&mut upper, "GFS", 2.0, 2.0, 12.0, Color::BLACK);
        draw_text(&mut lower, "gfs", 2.0, 2.0, 12.0, Color::BLACK);
        assert_eq!(upper.data(), lower.data());
    }
}
