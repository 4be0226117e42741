// ============================================================================
// SHAPE RASTERIZER - segments, ellipses, closed outlines, arrows
// ============================================================================
//
// Every primitive is expressed as a signed distance field (negative inside).
// Rows of the shape's bounding box are evaluated in parallel into a coverage
// buffer which is then composited onto the surface in a single pass, so joints
// between sub-segments never double-blend.

use rayon::prelude::*;

use crate::canvas::{BlendOp, Color, PixelSurface};

pub type Point = (f32, f32);

/// Arrow head length along the shaft.
pub const ARROW_HEAD_LENGTH: f32 = 20.0;
/// Half-width of the arrow head at its base.
pub const ARROW_HEAD_HALF_WIDTH: f32 = 14.0;
/// Half-width of the arrow body.
pub const ARROW_BODY_HALF_WIDTH: f32 = 8.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PaintStyle {
    #[default]
    Stroke,
    Fill,
}

/// How a primitive is painted onto the surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paint {
    pub color: Color,
    /// Stroke width in pixels. Ignored for filled shapes.
    pub width: f32,
    pub style: PaintStyle,
    pub blend: BlendOp,
    pub anti_alias: bool,
}

impl Paint {
    pub fn stroke(color: Color, width: f32) -> Self {
        Self {
            color,
            width,
            style: PaintStyle::Stroke,
            blend: BlendOp::SourceOver,
            anti_alias: true,
        }
    }

    pub fn fill(color: Color) -> Self {
        Self {
            style: PaintStyle::Fill,
            ..Self::stroke(color, 1.0)
        }
    }

    fn half_width(&self) -> f32 {
        (self.width * 0.5).max(0.5)
    }
}

/// Axis-aligned rectangle in surface coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    /// Rectangle spanning two corner points in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            left: a.0.min(b.0),
            top: a.1.min(b.1),
            right: a.0.max(b.0),
            bottom: a.1.max(b.1),
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

// ============================================================================
// PUBLIC PRIMITIVES
// ============================================================================

/// Round-capped segment from `a` to `b`. A zero-length segment paints a dot.
pub fn stroke_segment(surface: &mut PixelSurface, a: Point, b: Point, paint: &Paint) {
    let half = paint.half_width();
    let bounds = Rect::from_corners(a, b).inflate(half + 1.0);
    rasterize(surface, bounds, paint, |x, y| {
        sdf_line_segment(x, y, a, b) - half
    });
}

/// Clear a disc of the given diameter, revealing transparency.
pub fn erase_disc(surface: &mut PixelSurface, center: Point, diameter: f32, anti_alias: bool) {
    erase_segment(surface, center, center, diameter, anti_alias);
}

/// Erase along a segment, used when the eraser is dragged.
pub fn erase_segment(surface: &mut PixelSurface, a: Point, b: Point, diameter: f32, anti_alias: bool) {
    let paint = Paint {
        color: crate::canvas::TRANSPARENT,
        width: diameter,
        style: PaintStyle::Fill,
        blend: BlendOp::Clear,
        anti_alias,
    };
    stroke_segment(surface, a, b, &paint);
}

/// Ellipse inscribed in the rectangle spanned by `a` and `b`. Returns false
/// (drawing nothing) when the rectangle has zero width or height.
pub fn draw_ellipse(surface: &mut PixelSurface, a: Point, b: Point, paint: &Paint) -> bool {
    let rect = Rect::from_corners(a, b);
    if rect.is_empty() {
        return false;
    }
    let cx = (rect.left + rect.right) * 0.5;
    let cy = (rect.top + rect.bottom) * 0.5;
    let rx = rect.width() * 0.5;
    let ry = rect.height() * 0.5;
    match paint.style {
        PaintStyle::Fill => rasterize(surface, rect.inflate(1.0), paint, |x, y| {
            sdf_ellipse(x - cx, y - cy, rx, ry)
        }),
        PaintStyle::Stroke => {
            let half = paint.half_width();
            rasterize(surface, rect.inflate(half + 1.0), paint, |x, y| {
                sdf_ellipse(x - cx, y - cy, rx, ry).abs() - half
            })
        }
    }
    true
}

/// Closed polygon. Stroked paints trace every edge including the closing one;
/// filled paints cover the even-odd interior.
pub fn stroke_polygon(surface: &mut PixelSurface, points: &[Point], paint: &Paint) {
    if points.len() < 2 {
        if let Some(&p) = points.first() {
            stroke_segment(surface, p, p, paint);
        }
        return;
    }
    let half = paint.half_width();
    let mut bounds = Rect::from_corners(points[0], points[0]);
    for &p in &points[1..] {
        bounds = bounds.union_point(p);
    }
    match paint.style {
        PaintStyle::Stroke => rasterize(surface, bounds.inflate(half + 1.0), paint, |x, y| {
            sdf_polygon_edges(x, y, points) - half
        }),
        PaintStyle::Fill => rasterize(surface, bounds.inflate(1.0), paint, |x, y| {
            let d = sdf_polygon_edges(x, y, points);
            if point_in_polygon(x, y, points) { -d } else { d }
        }),
    }
}

/// Seven-point outline of a hollow arrow from `start` to `end`, or `None`
/// when the two points coincide.
pub fn arrow_outline(start: Point, end: Point) -> Option<[Point; 7]> {
    let dx = end.0 - start.0;
    let dy = end.1 - start.1;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return None;
    }
    let (ux, uy) = (dx / len, dy / len);
    let (nx, ny) = (-uy, ux);

    let head_len = ARROW_HEAD_LENGTH.min(len);
    let base = (end.0 - ux * head_len, end.1 - uy * head_len);
    let at = |p: Point, w: f32| (p.0 + nx * w, p.1 + ny * w);

    Some([
        at(start, ARROW_BODY_HALF_WIDTH),
        at(base, ARROW_BODY_HALF_WIDTH),
        at(base, ARROW_HEAD_HALF_WIDTH),
        end,
        at(base, -ARROW_HEAD_HALF_WIDTH),
        at(base, -ARROW_BODY_HALF_WIDTH),
        at(start, -ARROW_BODY_HALF_WIDTH),
    ])
}

/// Hollow arrow pointing at `end`. Returns false when the arrow is degenerate.
pub fn draw_arrow(surface: &mut PixelSurface, start: Point, end: Point, paint: &Paint) -> bool {
    match arrow_outline(start, end) {
        Some(outline) => {
            stroke_polygon(surface, &outline, paint);
            true
        }
        None => false,
    }
}

/// Solid rectangle, hard-edged: a pixel is covered when its centre is inside.
pub fn fill_rect(surface: &mut PixelSurface, rect: Rect, color: Color) {
    let paint = Paint {
        anti_alias: false,
        ..Paint::fill(color)
    };
    rasterize(surface, rect, &paint, |x, y| {
        if x >= rect.left && x < rect.right && y >= rect.top && y < rect.bottom {
            -1.0
        } else {
            1.0
        }
    });
}

// ============================================================================
// COVERAGE BUFFER
// ============================================================================

impl Rect {
    fn inflate(self, by: f32) -> Self {
        Self {
            left: self.left - by,
            top: self.top - by,
            right: self.right + by,
            bottom: self.bottom + by,
        }
    }

    fn union_point(self, p: Point) -> Self {
        Self {
            left: self.left.min(p.0),
            top: self.top.min(p.1),
            right: self.right.max(p.0),
            bottom: self.bottom.max(p.1),
        }
    }
}

fn rasterize<F>(surface: &mut PixelSurface, bounds: Rect, paint: &Paint, sdf: F)
where
    F: Fn(f32, f32) -> f32 + Sync,
{
    let x0 = (bounds.left.floor() as i64).max(0);
    let y0 = (bounds.top.floor() as i64).max(0);
    let x1 = (bounds.right.ceil() as i64).min(surface.width() as i64);
    let y1 = (bounds.bottom.ceil() as i64).min(surface.height() as i64);
    if x1 <= x0 || y1 <= y0 {
        return;
    }
    let buf_w = (x1 - x0) as usize;
    let buf_h = (y1 - y0) as usize;
    let aa = paint.anti_alias;

    let mut coverage = vec![0.0f32; buf_w * buf_h];
    coverage
        .par_chunks_mut(buf_w)
        .enumerate()
        .for_each(|(row, row_buf)| {
            let py = (y0 + row as i64) as f32 + 0.5;
            for (col, cov) in row_buf.iter_mut().enumerate() {
                let px = (x0 + col as i64) as f32 + 0.5;
                let d = sdf(px, py);
                *cov = if aa {
                    smoothstep(0.5, -0.5, d)
                } else if d < 0.0 {
                    1.0
                } else {
                    0.0
                };
            }
        });

    for (row, row_cov) in coverage.chunks(buf_w).enumerate() {
        let y = y0 + row as i64;
        for (col, &cov) in row_cov.iter().enumerate() {
            surface.blend(x0 + col as i64, y, paint.color, cov, paint.blend);
        }
    }
}

// ============================================================================
// DISTANCE FUNCTIONS
// ============================================================================

fn sdf_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    let nx = px / rx;
    let ny = py / ry;
    let len = (nx * nx + ny * ny).sqrt();
    if len < 1e-8 {
        return -rx.min(ry);
    }
    let scale = (rx * rx * ny * ny + ry * ry * nx * nx).sqrt() / (rx * ry * len);
    (len - 1.0) / scale
}

fn sdf_line_segment(px: f32, py: f32, a: Point, b: Point) -> f32 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len2 = dx * dx + dy * dy;
    let t = if len2 < 1e-12 {
        0.0
    } else {
        (((px - a.0) * dx + (py - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let cx = a.0 + t * dx;
    let cy = a.1 + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

/// Unsigned distance to the nearest edge of a closed polygon.
fn sdf_polygon_edges(px: f32, py: f32, points: &[Point]) -> f32 {
    let n = points.len();
    (0..n)
        .map(|i| sdf_line_segment(px, py, points[i], points[(i + 1) % n]))
        .fold(f32::MAX, f32::min)
}

fn point_in_polygon(px: f32, py: f32, points: &[Point]) -> bool {
    let n = points.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = points[i];
        let (xj, yj) = points[j];
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{BLACK, TRANSPARENT, WHITE};
    use image::Rgba;

    fn white(w: u32, h: u32) -> PixelSurface {
        PixelSurface::new_filled(w, h, WHITE).unwrap()
    }

    #[test]
    fn segment_paints_along_its_length() {
        let mut s = white(20, 20);
        stroke_segment(&mut s, (2.0, 10.0), (18.0, 10.0), &Paint::stroke(BLACK, 3.0));
        assert_eq!(s.get(10, 9).unwrap(), BLACK);
        assert_eq!(s.get(10, 2).unwrap(), WHITE);
    }

    #[test]
    fn zero_length_segment_paints_a_dot() {
        let mut s = white(10, 10);
        stroke_segment(&mut s, (5.5, 5.5), (5.5, 5.5), &Paint::stroke(BLACK, 4.0));
        assert_eq!(s.get(5, 5).unwrap(), BLACK);
        assert_eq!(s.get(0, 0).unwrap(), WHITE);
    }

    #[test]
    fn erase_disc_clears_to_transparent() {
        let mut s = white(10, 10);
        erase_disc(&mut s, (5.0, 5.0), 4.0, false);
        assert_eq!(s.get(4, 4).unwrap(), TRANSPARENT);
        assert_eq!(s.get(9, 9).unwrap(), WHITE);
    }

    #[test]
    fn erase_disc_matches_a_zero_length_erase_segment() {
        let mut disc = white(12, 12);
        let mut seg = white(12, 12);
        erase_disc(&mut disc, (6.0, 6.0), 5.0, true);
        erase_segment(&mut seg, (6.0, 6.0), (6.0, 6.0), 5.0, true);
        assert_eq!(disc, seg);
        assert_eq!(disc.get(5, 5).unwrap(), TRANSPARENT);
    }

    #[test]
    fn filled_ellipse_covers_centre_not_corners() {
        let mut s = white(30, 20);
        let paint = Paint {
            anti_alias: false,
            ..Paint::fill(BLACK)
        };
        assert!(draw_ellipse(&mut s, (25.0, 18.0), (5.0, 2.0), &paint));
        assert_eq!(s.get(15, 10).unwrap(), BLACK);
        assert_eq!(s.get(5, 2).unwrap(), WHITE);
    }

    #[test]
    fn stroked_ellipse_leaves_centre_untouched() {
        let mut s = white(30, 30);
        draw_ellipse(&mut s, (5.0, 5.0), (25.0, 25.0), &Paint::stroke(BLACK, 2.0));
        assert_eq!(s.get(15, 15).unwrap(), WHITE);
        assert_eq!(s.get(15, 5).unwrap(), BLACK);
    }

    #[test]
    fn empty_ellipse_draws_nothing() {
        let mut s = white(10, 10);
        let before = s.clone();
        assert!(!draw_ellipse(&mut s, (3.0, 3.0), (3.0, 8.0), &Paint::fill(BLACK)));
        assert_eq!(s, before);
    }

    #[test]
    fn arrow_outline_geometry() {
        let pts = arrow_outline((0.0, 0.0), (100.0, 0.0)).unwrap();
        assert_eq!(pts[0], (0.0, 8.0));
        assert_eq!(pts[1], (80.0, 8.0));
        assert_eq!(pts[2], (80.0, 14.0));
        assert_eq!(pts[3], (100.0, 0.0));
        assert_eq!(pts[4], (80.0, -14.0));
        assert_eq!(pts[6], (0.0, -8.0));
        assert!(arrow_outline((3.0, 3.0), (3.0, 3.0)).is_none());
    }

    #[test]
    fn hollow_arrow_keeps_its_interior() {
        let mut s = white(120, 40);
        assert!(draw_arrow(&mut s, (5.0, 20.0), (105.0, 20.0), &Paint::stroke(BLACK, 1.0)));
        assert_eq!(s.get(40, 20).unwrap(), WHITE);
        assert!(s.get(40, 12).unwrap()[0] < 255);
    }

    #[test]
    fn fill_rect_is_hard_edged() {
        let mut s = white(10, 10);
        fill_rect(
            &mut s,
            Rect {
                left: 2.0,
                top: 2.0,
                right: 5.0,
                bottom: 5.0,
            },
            Rgba([0, 0, 0, 180]),
        );
        assert_eq!(s.get(2, 2).unwrap(), Rgba([75, 75, 75, 255]));
        assert_eq!(s.get(4, 4).unwrap(), Rgba([75, 75, 75, 255]));
        assert_eq!(s.get(5, 5).unwrap(), WHITE);
    }

    #[test]
    fn shapes_clip_at_the_surface_edge() {
        let mut s = white(8, 8);
        stroke_segment(&mut s, (-20.0, 4.0), (40.0, 4.0), &Paint::stroke(BLACK, 2.0));
        assert_eq!(s.get(0, 3).unwrap(), BLACK);
        assert_eq!(s.get(7, 4).unwrap(), BLACK);
    }
}
