use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::canvas::{BlendOp, Color, PixelSurface};
use crate::ops::shapes::Point;

/// Horizontal placement of a line relative to its origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// A text stamp remembered by its canvas window so it can be repainted after
/// the underlying buffer is replaced.
#[derive(Clone)]
pub struct TextAnnotation {
    pub text: String,
    /// Baseline anchor in surface coordinates.
    pub position: Point,
    pub color: Color,
    pub size: f32,
    pub align: TextAlign,
    pub font: FontArc,
}

impl TextAnnotation {
    pub fn draw(&self, surface: &mut PixelSurface, anti_alias: bool) -> bool {
        draw_text(
            surface,
            &self.font,
            &self.text,
            self.size,
            self.position,
            self.color,
            self.align,
            anti_alias,
        )
    }
}

impl std::fmt::Debug for TextAnnotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextAnnotation")
            .field("text", &self.text)
            .field("position", &self.position)
            .field("color", &self.color)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// FONT RESOLUTION
// ============================================================================

/// Well-known locations of a plain sans-serif face, tried in order.
fn system_font_candidates() -> Vec<PathBuf> {
    let paths: &[&str] = &[
        #[cfg(target_os = "windows")]
        "C:\\Windows\\Fonts\\arial.ttf",
        #[cfg(target_os = "windows")]
        "C:\\Windows\\Fonts\\segoeui.ttf",
        #[cfg(target_os = "linux")]
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        #[cfg(target_os = "linux")]
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        #[cfg(target_os = "linux")]
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        #[cfg(target_os = "linux")]
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        #[cfg(target_os = "linux")]
        "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
        #[cfg(target_os = "linux")]
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
        #[cfg(target_os = "linux")]
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
        #[cfg(target_os = "macos")]
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        #[cfg(target_os = "macos")]
        "/Library/Fonts/Arial.ttf",
        #[cfg(target_os = "macos")]
        "/System/Library/Fonts/Helvetica.ttc",
    ];
    paths.iter().map(PathBuf::from).collect()
}

/// Load a TrueType/OpenType font file.
pub fn load_font(path: &Path) -> Option<FontArc> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "font not readable");
            return None;
        }
    };
    match FontArc::try_from_vec(data) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "not a usable font file");
            None
        }
    }
}

/// The configured font if it loads, otherwise the first system font found.
pub fn resolve_font(configured: Option<&Path>) -> Option<FontArc> {
    if let Some(path) = configured {
        if let Some(font) = load_font(path) {
            return Some(font);
        }
        warn!(path = %path.display(), "configured font unavailable, falling back to system fonts");
    }
    let found = system_font_candidates()
        .iter()
        .find_map(|p| load_font(p));
    if found.is_none() {
        warn!("no system font found; text stamping is unavailable");
    }
    found
}

// ============================================================================
// METRICS
// ============================================================================

/// Lay out a single line left-aligned at x=0, returning glyph x offsets and
/// the total advance width.
fn layout_line(font: &FontArc, text: &str, size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(size);
    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut last: Option<GlyphId> = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = last {
            cursor_x += scaled.kern(prev, id);
        }
        glyphs.push((id, cursor_x));
        cursor_x += scaled.h_advance(id);
        last = Some(id);
    }
    (glyphs, cursor_x)
}

/// Advance width of one line of text.
pub fn measure_text(font: &FontArc, text: &str, size: f32) -> f32 {
    layout_line(font, text, size).1
}

/// Height of a capital letter above the baseline.
pub fn cap_height(font: &FontArc, size: f32) -> f32 {
    let glyph = font
        .glyph_id('H')
        .with_scale_and_position(size, point(0.0, 0.0));
    match font.outline_glyph(glyph) {
        Some(outlined) => -outlined.px_bounds().min.y,
        None => font.as_scaled(size).ascent() * 0.7,
    }
}

/// Distance from the baseline to the lowest descender, as a positive number.
pub fn descent(font: &FontArc, size: f32) -> f32 {
    -font.as_scaled(size).descent()
}

// ============================================================================
// STAMPING
// ============================================================================

/// Draw one line of text with its baseline at `origin`. Returns false when
/// nothing landed on the surface.
#[allow(clippy::too_many_arguments)]
pub fn draw_text(
    surface: &mut PixelSurface,
    font: &FontArc,
    text: &str,
    size: f32,
    origin: Point,
    color: Color,
    align: TextAlign,
    anti_alias: bool,
) -> bool {
    if text.is_empty() || size <= 0.0 {
        return false;
    }
    let (glyphs, width) = layout_line(font, text, size);
    let offset = match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => -width * 0.5,
        TextAlign::Right => -width,
    };

    let outlined: Vec<_> = glyphs
        .into_iter()
        .filter_map(|(id, gx)| {
            let glyph = id.with_scale_and_position(
                size,
                point(origin.0 + offset + gx, origin.1),
            );
            font.outline_glyph(glyph)
        })
        .collect();
    if outlined.is_empty() {
        return false;
    }

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for g in &outlined {
        let b = g.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }
    let x0 = min_x.floor() as i64;
    let y0 = min_y.floor() as i64;
    let buf_w = (max_x.ceil() as i64 - x0).max(0) as usize;
    let buf_h = (max_y.ceil() as i64 - y0).max(0) as usize;
    if buf_w == 0 || buf_h == 0 {
        return false;
    }

    let mut coverage = vec![0.0f32; buf_w * buf_h];
    for g in &outlined {
        let b = g.px_bounds();
        let gx0 = b.min.x as i64 - x0;
        let gy0 = b.min.y as i64 - y0;
        g.draw(|px, py, cov| {
            let ix = gx0 + px as i64;
            let iy = gy0 + py as i64;
            if ix >= 0 && iy >= 0 && (ix as usize) < buf_w && (iy as usize) < buf_h {
                let idx = iy as usize * buf_w + ix as usize;
                let v = if anti_alias {
                    cov
                } else if cov > 0.5 {
                    1.0
                } else {
                    0.0
                };
                coverage[idx] = coverage[idx].max(v);
            }
        });
    }

    let mut touched = false;
    for (row, row_cov) in coverage.chunks(buf_w).enumerate() {
        let y = y0 + row as i64;
        for (col, &cov) in row_cov.iter().enumerate() {
            let x = x0 + col as i64;
            if cov > 0.001 && surface.contains(x, y) {
                surface.blend(x, y, color, cov, BlendOp::SourceOver);
                touched = true;
            }
        }
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{BLACK, WHITE};

    #[test]
    fn missing_font_file_is_none() {
        assert!(load_font(Path::new("/definitely/not/a/font.ttf")).is_none());
    }

    #[test]
    fn garbage_font_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(load_font(&path).is_none());
    }

    #[test]
    fn text_metrics_scale_with_size() {
        let Some(font) = resolve_font(None) else {
            return;
        };
        let small = measure_text(&font, "Hello", 10.0);
        let large = measure_text(&font, "Hello", 20.0);
        assert!(small > 0.0);
        assert!((large - 2.0 * small).abs() < 1.0);
        let cap = cap_height(&font, 20.0);
        assert!(cap > 5.0 && cap < 20.0);
        assert!(descent(&font, 20.0) > 0.0);
    }

    #[test]
    fn centred_text_straddles_the_anchor() {
        let Some(font) = resolve_font(None) else {
            return;
        };
        let mut s = PixelSurface::new_filled(200, 60, WHITE).unwrap();
        assert!(draw_text(
            &mut s,
            &font,
            "MMMM",
            24.0,
            (100.0, 40.0),
            BLACK,
            TextAlign::Center,
            true,
        ));
        let inked = |range: std::ops::Range<u32>| {
            range
                .flat_map(|x| (0..60).map(move |y| (x, y)))
                .any(|(x, y)| s.get(x, y).unwrap() != WHITE)
        };
        assert!(inked(60..100));
        assert!(inked(100..140));
        assert!(!inked(0..40));
    }

    #[test]
    fn empty_text_draws_nothing() {
        let Some(font) = resolve_font(None) else {
            return;
        };
        let mut s = PixelSurface::new_filled(10, 10, WHITE).unwrap();
        assert!(!draw_text(&mut s, &font, "", 12.0, (1.0, 8.0), BLACK, TextAlign::Left, true));
    }
}
