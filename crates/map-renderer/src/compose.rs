//! Assembles finished maps: field fill, isobars, geography, furniture.
//!
//! The canvas is a fixed-width frame with a title band on top, a footer
//! band below and a legend stripe on the right; the plot rectangle's
//! height follows the region's aspect ratio. All drawing keeps every
//! canvas pixel fully opaque so the raw pixmap bytes can feed the PNG
//! encoder directly.

use map_common::{GridField, ModelRun, Product, RegionBounds, RegionSpec};
use tiny_skia::{
    LineCap, LineJoin, Paint, PathBuilder, Pixmap, Rect, Stroke, StrokeDash, Transform,
};
use tracing::debug;

use crate::contour::{isoline_levels, trace_isolines};
use crate::glyphs;
use crate::grid::{eastward_offset, extract_region};
use crate::png::encode_png;
use crate::ramp::{
    nice_ticks, precipitation_palette, temperature_ramp, Color, ColorRamp, DiscretePalette,
};
use crate::{RenderError, RenderResult};

const CANVAS_WIDTH: u32 = 1200;
const MARGIN_LEFT: f32 = 50.0;
const MARGIN_RIGHT: f32 = 140.0;
const MARGIN_TOP: f32 = 60.0;
const MARGIN_BOTTOM: f32 = 40.0;
const MIN_PLOT_HEIGHT: u32 = 360;
const MAX_PLOT_HEIGHT: u32 = 1400;

const ISOBAR_INTERVAL_HPA: f32 = 4.0;
/// Isobars are traced on a raster this many times coarser than the plot.
const CONTOUR_DOWNSCALE: usize = 3;
const MIN_LABELED_ISOBAR_PX: f32 = 60.0;

/// Colors and text sizes for one map. The defaults give the standard
/// white chart look.
#[derive(Debug, Clone)]
pub struct MapStyle {
    pub background: Color,
    pub coastline: Color,
    pub border: Color,
    pub isobar: Color,
    pub text: Color,
    pub title_size: f32,
    pub label_size: f32,
    pub smoothing_passes: u32,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            background: Color::WHITE,
            coastline: Color::opaque(70, 70, 70),
            border: Color::opaque(140, 140, 140),
            isobar: Color::opaque(40, 40, 40),
            text: Color::opaque(30, 30, 30),
            title_size: 20.0,
            label_size: 11.0,
            smoothing_passes: 2,
        }
    }
}

/// Geography polylines in (lon, lat) degree pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseLayers<'a> {
    pub coastlines: &'a [Vec<(f64, f64)>],
    pub borders: &'a [Vec<(f64, f64)>],
}

/// An encoded map ready for upload.
#[derive(Debug, Clone)]
pub struct RenderedMap {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

struct Layout {
    canvas_w: u32,
    canvas_h: u32,
    plot_x: f32,
    plot_y: f32,
    plot_w: u32,
    plot_h: u32,
}

fn layout_for(bounds: &RegionBounds) -> Layout {
    let plot_w = (CANVAS_WIDTH as f32 - MARGIN_LEFT - MARGIN_RIGHT) as u32;
    let plot_h = ((plot_w as f64 * bounds.aspect()).round() as u32)
        .clamp(MIN_PLOT_HEIGHT, MAX_PLOT_HEIGHT);
    Layout {
        canvas_w: CANVAS_WIDTH,
        canvas_h: plot_h + (MARGIN_TOP + MARGIN_BOTTOM) as u32,
        plot_x: MARGIN_LEFT,
        plot_y: MARGIN_TOP,
        plot_w,
        plot_h,
    }
}

enum Legend {
    Ramp(ColorRamp),
    Steps(DiscretePalette),
}

/// Render one product over one region into a finished PNG.
///
/// `field` must already be in display units (the product's `convert`
/// applied). Returns `NoData` when the region holds no finite values.
pub fn compose_map(
    field: &GridField,
    product: Product,
    region: &RegionSpec,
    run: &ModelRun,
    layers: BaseLayers<'_>,
    style: &MapStyle,
) -> RenderResult<RenderedMap> {
    let layout = layout_for(&region.bounds);
    let grid = extract_region(field, &region.bounds)?;
    let raster = grid.resample_plot(
        layout.plot_w as usize,
        layout.plot_h as usize,
        &region.bounds,
    );
    let (min, max) = finite_min_max(&raster).ok_or(RenderError::NoData)?;

    let mut pixmap = new_canvas(layout.canvas_w, layout.canvas_h)?;
    pixmap.fill(to_skia(style.background));

    let legend = paint_field(&mut pixmap, &raster, &layout, product, min, max);
    draw_geography(&mut pixmap, &layout, &region.bounds, layers, style);
    if product == Product::Synoptic {
        draw_isobars(&mut pixmap, &raster, &layout, style);
    }
    draw_frame(&mut pixmap, &layout, style);
    draw_titles(&mut pixmap, &layout, product, region, run, style);
    if let Some(legend) = legend {
        draw_legend(&mut pixmap, &layout, &legend, style);
    }

    debug!(
        region = %region.id,
        product = %product,
        min,
        max,
        "composed {}x{} map",
        layout.canvas_w,
        layout.canvas_h
    );

    let png = encode_png(pixmap.data(), layout.canvas_w, layout.canvas_h)?;
    Ok(RenderedMap {
        png,
        width: layout.canvas_w,
        height: layout.canvas_h,
    })
}

/// A placeholder card uploaded in place of a map that could not be
/// rendered, so a missing product is visible rather than silent.
pub fn render_error_card(
    product: Product,
    region: &RegionSpec,
    run: &ModelRun,
    message: &str,
    style: &MapStyle,
) -> RenderResult<RenderedMap> {
    const CARD_W: u32 = 640;
    const CARD_H: u32 = 360;

    let mut pixmap = new_canvas(CARD_W, CARD_H)?;
    pixmap.fill(to_skia(style.background));

    if let Some(rect) = Rect::from_xywh(4.0, 4.0, CARD_W as f32 - 8.0, CARD_H as f32 - 8.0) {
        let path = PathBuilder::from_rect(rect);
        let paint = solid_paint(style.border);
        let stroke = line_stroke(2.0, None);
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    let center = |text: &str, size: f32| (CARD_W as f32 - glyphs::text_width(text, size)) / 2.0;

    glyphs::draw_text(
        &mut pixmap,
        product.title(),
        center(product.title(), 16.0),
        60.0,
        16.0,
        style.text,
    );
    let headline = "DATA UNAVAILABLE";
    glyphs::draw_text(
        &mut pixmap,
        headline,
        center(headline, 26.0),
        140.0,
        26.0,
        style.text,
    );

    let detail: String = message.chars().take(48).collect();
    glyphs::draw_text(
        &mut pixmap,
        &detail,
        center(&detail, 12.0),
        200.0,
        12.0,
        style.text,
    );

    let footer = format!("{}  {}", run.descriptor(), region_label(region));
    glyphs::draw_text(
        &mut pixmap,
        &footer,
        center(&footer, 12.0),
        CARD_H as f32 - 40.0,
        12.0,
        style.text,
    );

    let png = encode_png(pixmap.data(), CARD_W, CARD_H)?;
    Ok(RenderedMap {
        png,
        width: CARD_W,
        height: CARD_H,
    })
}

fn new_canvas(width: u32, height: u32) -> RenderResult<Pixmap> {
    Pixmap::new(width, height)
        .ok_or_else(|| RenderError::Canvas(format!("cannot allocate {}x{} canvas", width, height)))
}

fn paint_field(
    pixmap: &mut Pixmap,
    raster: &[f32],
    layout: &Layout,
    product: Product,
    min: f32,
    max: f32,
) -> Option<Legend> {
    match product {
        Product::Temperature2m => {
            let ramp = temperature_ramp(min, max);
            fill_cells(pixmap, raster, layout, |v| ramp.sample(v));
            Some(Legend::Ramp(ramp))
        }
        Product::Precipitation => {
            let palette = precipitation_palette();
            fill_cells(pixmap, raster, layout, |v| palette.color_for(v));
            Some(Legend::Steps(palette))
        }
        Product::Synoptic => None,
    }
}

/// Write one plot pixel per raster value. Non-opaque colors (NaN holes,
/// dry precipitation) are skipped so the background shows through while
/// the canvas stays opaque.
fn fill_cells<F: Fn(f32) -> Color>(pixmap: &mut Pixmap, raster: &[f32], layout: &Layout, color_of: F) {
    let canvas_w = pixmap.width() as usize;
    let x0 = layout.plot_x as usize;
    let y0 = layout.plot_y as usize;
    let plot_w = layout.plot_w as usize;
    let data = pixmap.data_mut();

    for row in 0..layout.plot_h as usize {
        for col in 0..plot_w {
            let color = color_of(raster[row * plot_w + col]);
            if color.a != 255 {
                continue;
            }
            let p = ((y0 + row) * canvas_w + x0 + col) * 4;
            data[p] = color.r;
            data[p + 1] = color.g;
            data[p + 2] = color.b;
            data[p + 3] = 255;
        }
    }
}

fn draw_isobars(pixmap: &mut Pixmap, raster: &[f32], layout: &Layout, style: &MapStyle) {
    let plot_w = layout.plot_w as usize;
    let plot_h = layout.plot_h as usize;
    let cw = (plot_w / CONTOUR_DOWNSCALE).max(2);
    let ch = (plot_h / CONTOUR_DOWNSCALE).max(2);
    let coarse = downsample(raster, plot_w, plot_h, cw, ch);

    let Some((min, max)) = finite_min_max(&coarse) else {
        return;
    };
    let levels = isoline_levels(min, max, ISOBAR_INTERVAL_HPA);
    let lines = trace_isolines(&coarse, cw, ch, &levels, style.smoothing_passes);

    let step_x = layout.plot_w as f32 / cw as f32;
    let step_y = layout.plot_h as f32 / ch as f32;
    let to_px = |p: (f32, f32)| {
        (
            layout.plot_x + (p.0 + 0.5) * step_x,
            layout.plot_y + (p.1 + 0.5) * step_y,
        )
    };

    let paint = solid_paint(style.isobar);
    let stroke = line_stroke(1.6, None);
    let mut labels: Vec<(f32, f32, f32)> = Vec::new();

    let mut pb = PathBuilder::new();
    for line in &lines {
        let px: Vec<(f32, f32)> = line.points.iter().map(|&p| to_px(p)).collect();
        if px.len() < 2 {
            continue;
        }
        pb.move_to(px[0].0, px[0].1);
        for &(x, y) in &px[1..] {
            pb.line_to(x, y);
        }
        if line.closed {
            pb.close();
        }
        if polyline_length(&px) >= MIN_LABELED_ISOBAR_PX {
            let (mx, my) = px[px.len() / 2];
            labels.push((mx, my, line.level));
        }
    }
    if let Some(path) = pb.finish() {
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    // Labels sit on the line inside a cleared box; crowded or edge-hugging
    // candidates are dropped.
    let size = style.label_size;
    let x_lo = layout.plot_x + 15.0;
    let x_hi = layout.plot_x + layout.plot_w as f32 - 15.0;
    let y_lo = layout.plot_y + 12.0;
    let y_hi = layout.plot_y + layout.plot_h as f32 - 12.0;
    let mut placed: Vec<(f32, f32)> = Vec::new();

    for (mx, my, level) in labels {
        if mx < x_lo || mx > x_hi || my < y_lo || my > y_hi {
            continue;
        }
        if placed
            .iter()
            .any(|&(px, py)| (px - mx).abs() < 70.0 && (py - my).abs() < 20.0)
        {
            continue;
        }
        let text = format!("{:.0}", level);
        let tw = glyphs::text_width(&text, size);
        fill_rect(
            pixmap,
            mx - tw / 2.0 - 3.0,
            my - size / 2.0 - 2.0,
            tw + 6.0,
            size + 4.0,
            style.background,
        );
        glyphs::draw_text(
            pixmap,
            &text,
            mx - tw / 2.0,
            my - size / 2.0,
            size,
            style.isobar,
        );
        placed.push((mx, my));
    }
}

/// Nearest-pixel reduction of the plot raster for contour tracing.
fn downsample(raster: &[f32], w: usize, h: usize, cw: usize, ch: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(cw * ch);
    for j in 0..ch {
        let y = (((j as f64 + 0.5) * h as f64 / ch as f64) as usize).min(h - 1);
        for i in 0..cw {
            let x = (((i as f64 + 0.5) * w as f64 / cw as f64) as usize).min(w - 1);
            out.push(raster[y * w + x]);
        }
    }
    out
}

fn polyline_length(points: &[(f32, f32)]) -> f32 {
    points
        .windows(2)
        .map(|p| ((p[1].0 - p[0].0).hypot(p[1].1 - p[0].1)))
        .sum()
}

fn draw_geography(
    pixmap: &mut Pixmap,
    layout: &Layout,
    bounds: &RegionBounds,
    layers: BaseLayers<'_>,
    style: &MapStyle,
) {
    draw_polylines(pixmap, layout, bounds, layers.borders, style.border, 1.0, true);
    draw_polylines(
        pixmap,
        layout,
        bounds,
        layers.coastlines,
        style.coastline,
        1.5,
        false,
    );
}

/// Project lon/lat polylines into the plot rectangle and stroke them,
/// clipping each segment and dropping segments that wrap the far side of
/// the globe.
fn draw_polylines(
    pixmap: &mut Pixmap,
    layout: &Layout,
    bounds: &RegionBounds,
    lines: &[Vec<(f64, f64)>],
    color: Color,
    width: f32,
    dashed: bool,
) {
    if lines.is_empty() {
        return;
    }
    let w = layout.plot_w as f32;
    let h = layout.plot_h as f32;
    let project = |lat: f64, offset: f64| -> (f32, f32) {
        (
            (offset / bounds.width() * w as f64) as f32,
            ((bounds.lat_max - lat) / bounds.height() * h as f64) as f32,
        )
    };

    let mut pb = PathBuilder::new();
    for line in lines {
        let mut last_end: Option<(f32, f32)> = None;
        for pair in line.windows(2) {
            let (lon0, lat0) = pair[0];
            let (lon1, lat1) = pair[1];
            let d0 = eastward_offset(bounds.lon_min, lon0);
            let d1 = eastward_offset(bounds.lon_min, lon1);
            if (d0 - d1).abs() > 180.0 {
                last_end = None;
                continue;
            }
            let p0 = project(lat0, d0);
            let p1 = project(lat1, d1);
            let Some((a, b)) = clip_segment(p0, p1, w, h) else {
                last_end = None;
                continue;
            };
            let continues = matches!(
                last_end,
                Some(e) if (e.0 - a.0).abs() < 0.01 && (e.1 - a.1).abs() < 0.01
            );
            if continues {
                pb.line_to(layout.plot_x + b.0, layout.plot_y + b.1);
            } else {
                pb.move_to(layout.plot_x + a.0, layout.plot_y + a.1);
                pb.line_to(layout.plot_x + b.0, layout.plot_y + b.1);
            }
            last_end = Some(b);
        }
    }

    let Some(path) = pb.finish() else {
        return;
    };
    let paint = solid_paint(color);
    let dash = if dashed {
        StrokeDash::new(vec![4.0, 3.0], 0.0)
    } else {
        None
    };
    let stroke = line_stroke(width, dash);
    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

/// Liang-Barsky clip of a segment against the `[0,w] x [0,h]` rectangle.
fn clip_segment(
    p0: (f32, f32),
    p1: (f32, f32),
    w: f32,
    h: f32,
) -> Option<((f32, f32), (f32, f32))> {
    let dx = p1.0 - p0.0;
    let dy = p1.1 - p0.1;
    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;

    for (p, q) in [
        (-dx, p0.0),
        (dx, w - p0.0),
        (-dy, p0.1),
        (dy, h - p0.1),
    ] {
        if p.abs() < 1e-9 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                if r > t0 {
                    t0 = r;
                }
            } else {
                if r < t0 {
                    return None;
                }
                if r < t1 {
                    t1 = r;
                }
            }
        }
    }

    Some((
        (p0.0 + t0 * dx, p0.1 + t0 * dy),
        (p0.0 + t1 * dx, p0.1 + t1 * dy),
    ))
}

fn draw_frame(pixmap: &mut Pixmap, layout: &Layout, style: &MapStyle) {
    let Some(rect) = Rect::from_xywh(
        layout.plot_x - 0.5,
        layout.plot_y - 0.5,
        layout.plot_w as f32 + 1.0,
        layout.plot_h as f32 + 1.0,
    ) else {
        return;
    };
    let path = PathBuilder::from_rect(rect);
    let paint = solid_paint(style.text);
    let stroke = line_stroke(1.0, None);
    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

fn region_label(region: &RegionSpec) -> String {
    region.id.to_uppercase().replace('_', " ")
}

fn draw_titles(
    pixmap: &mut Pixmap,
    layout: &Layout,
    product: Product,
    region: &RegionSpec,
    run: &ModelRun,
    style: &MapStyle,
) {
    glyphs::draw_text(
        pixmap,
        product.title(),
        layout.plot_x,
        (MARGIN_TOP - style.title_size) / 2.0,
        style.title_size,
        style.text,
    );

    let footer = format!("{}  {}", run.descriptor(), region_label(region));
    glyphs::draw_text(
        pixmap,
        &footer,
        layout.plot_x,
        layout.canvas_h as f32 - MARGIN_BOTTOM + (MARGIN_BOTTOM - style.label_size) / 2.0,
        style.label_size,
        style.text,
    );
}

fn draw_legend(pixmap: &mut Pixmap, layout: &Layout, legend: &Legend, style: &MapStyle) {
    let bar_w = 22.0f32;
    let bar_h = (layout.plot_h as f32 * 0.75).max(120.0);
    let bar_x = layout.plot_x + layout.plot_w as f32 + 24.0;
    let bar_top = layout.plot_y + (layout.plot_h as f32 - bar_h) / 2.0;

    match legend {
        Legend::Ramp(ramp) => {
            let (lo, hi) = ramp.domain();
            let rows = bar_h as i32;
            for row in 0..rows {
                let v = hi - (row as f32 + 0.5) / bar_h * (hi - lo);
                fill_rect(pixmap, bar_x, bar_top + row as f32, bar_w, 1.0, ramp.sample(v));
            }

            let ticks = nice_ticks(lo, hi, 6);
            let fractional = ticks.iter().any(|t| (t - t.round()).abs() > 0.01);
            for tick in ticks {
                let y = bar_top + (hi - tick) / (hi - lo) * bar_h;
                fill_rect(pixmap, bar_x + bar_w, y - 0.5, 4.0, 1.0, style.text);
                let text = if fractional {
                    format!("{:.1}", tick)
                } else {
                    format!("{:.0}", tick)
                };
                glyphs::draw_text(
                    pixmap,
                    &text,
                    bar_x + bar_w + 8.0,
                    y - style.label_size / 2.0,
                    style.label_size,
                    style.text,
                );
            }
        }
        Legend::Steps(palette) => {
            let n = palette.colors.len();
            let cell_h = bar_h / n as f32;
            for (i, &color) in palette.colors.iter().enumerate() {
                if color.a != 255 {
                    continue;
                }
                let y = bar_top + bar_h - (i as f32 + 1.0) * cell_h;
                fill_rect(pixmap, bar_x, y, bar_w, cell_h, color);
            }
            for (i, &level) in palette.levels.iter().enumerate() {
                let y = bar_top + bar_h - (i as f32 + 1.0) * cell_h;
                fill_rect(pixmap, bar_x + bar_w, y - 0.5, 4.0, 1.0, style.text);
                glyphs::draw_text(
                    pixmap,
                    &level_label(level),
                    bar_x + bar_w + 8.0,
                    y - style.label_size / 2.0,
                    style.label_size,
                    style.text,
                );
            }
        }
    }

    if let Some(rect) = Rect::from_xywh(bar_x - 0.5, bar_top - 0.5, bar_w + 1.0, bar_h + 1.0) {
        let path = PathBuilder::from_rect(rect);
        let paint = solid_paint(style.text);
        let stroke = line_stroke(1.0, None);
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
}

fn level_label(v: f32) -> String {
    if (v - v.round()).abs() > 1e-3 {
        format!("{:.1}", v)
    } else {
        format!("{:.0}", v)
    }
}

/// Opaque axis-aligned rectangle written straight into the pixel buffer.
fn fill_rect(pixmap: &mut Pixmap, x: f32, y: f32, w: f32, h: f32, color: Color) {
    if color.a != 255 {
        return;
    }
    let canvas_w = pixmap.width() as i32;
    let canvas_h = pixmap.height() as i32;
    let x0 = (x.floor() as i32).max(0);
    let y0 = (y.floor() as i32).max(0);
    let x1 = ((x + w).ceil() as i32).min(canvas_w);
    let y1 = ((y + h).ceil() as i32).min(canvas_h);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let data = pixmap.data_mut();
    for yy in y0..y1 {
        for xx in x0..x1 {
            let p = ((yy * canvas_w + xx) * 4) as usize;
            data[p] = color.r;
            data[p + 1] = color.g;
            data[p + 2] = color.b;
            data[p + 3] = 255;
        }
    }
}

fn finite_min_max(values: &[f32]) -> Option<(f32, f32)> {
    let mut it = values.iter().filter(|v| v.is_finite());
    let first = *it.next()?;
    let (mut min, mut max) = (first, first);
    for &v in it {
        min = min.min(v);
        max = max.max(v);
    }
    Some((min, max))
}

fn to_skia(c: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

fn line_stroke(width: f32, dash: Option<StrokeDash>) -> Stroke {
    Stroke {
        width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        dash,
        ..Stroke::default()
    }
}
