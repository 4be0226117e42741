use ab_glyph::FontArc;
use image::Rgba;
use std::sync::Arc;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, warn};

use super::geolocation::{Locator, describe_location};
use super::{BUILTIN_AUTHOR, Transform, TransformRequest};
use crate::canvas::{Color, WHITE};
use crate::error::TransformError;
use crate::ops::shapes::{Rect, fill_rect};
use crate::ops::text::{self, TextAlign};

/// Label background: black at roughly 70% opacity.
pub const LABEL_BACKGROUND: Color = Rgba([0, 0, 0, 180]);

/// Stamps the current local time and the machine's approximate location into
/// the bottom-left corner of the surface.
pub struct MetadataOverlay {
    locator: Arc<dyn Locator>,
    font: Option<FontArc>,
}

impl MetadataOverlay {
    pub const NAME: &'static str = "Data&Geolocation";

    pub fn new(locator: Arc<dyn Locator>, font: Option<FontArc>) -> Self {
        Self { locator, font }
    }
}

/// Current local time as `yyyy-MM-dd HH:mm:ss`, UTC when the local offset
/// cannot be determined.
pub fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Box geometry for the label, derived from the surface size.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelLayout {
    pub text_size: f32,
    pub padding: f32,
    pub line_height: f32,
    pub descent: f32,
    pub rect: Rect,
}

impl LabelLayout {
    pub fn compute(width: u32, height: u32, lines: &[&str], font: Option<&FontArc>) -> Self {
        let text_size = width.max(height) as f32 / 40.0;
        let padding = text_size * 0.3;
        let (cap, descent) = match font {
            Some(f) => (text::cap_height(f, text_size), text::descent(f, text_size)),
            None => (text_size * 0.7, text_size * 0.2),
        };
        let line_height = cap + padding;
        let bg_height = lines.len() as f32 * line_height + padding;
        let text_width = lines
            .iter()
            .map(|l| match font {
                Some(f) => text::measure_text(f, l, text_size),
                None => l.chars().count() as f32 * text_size * 0.6,
            })
            .fold(0.0f32, f32::max);
        let bg_width = text_width + 2.0 * padding;

        let margin = padding;
        let rect = Rect {
            left: margin,
            top: height as f32 - margin - bg_height,
            right: margin + bg_width,
            bottom: height as f32 - margin,
        };
        Self {
            text_size,
            padding,
            line_height,
            descent,
            rect,
        }
    }

    /// Baseline of line `i`.
    pub fn baseline(&self, i: usize) -> (f32, f32) {
        (
            self.rect.left + self.padding,
            self.rect.top + self.padding + (i + 1) as f32 * self.line_height - self.descent,
        )
    }
}

impl Transform for MetadataOverlay {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn author(&self) -> &str {
        BUILTIN_AUTHOR
    }

    fn apply(&self, request: &mut TransformRequest<'_>) -> Result<(), TransformError> {
        let stamp = timestamp();
        request.report(10);
        request.cancel().check()?;

        let location = describe_location(self.locator.as_ref());
        if self.font.is_none() {
            warn!("no font available; overlay draws the label box only");
        }
        request.report(30);
        request.cancel().check()?;

        let lines = [stamp.as_str(), location.as_str()];
        let (w, h) = (request.source().width(), request.source().height());
        let layout = LabelLayout::compute(w, h, &lines, self.font.as_ref());
        debug!(?layout, "overlay label measured");
        request.report(60);
        request.cancel().check()?;

        let target = request.target_mut();
        fill_rect(target, layout.rect, LABEL_BACKGROUND);
        if let Some(font) = &self.font {
            for (i, line) in lines.iter().enumerate() {
                text::draw_text(
                    target,
                    font,
                    line,
                    layout.text_size,
                    layout.baseline(i),
                    WHITE,
                    TextAlign::Left,
                    true,
                );
            }
        }
        request.report(90);
        request.cancel().check()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::PixelSurface;
    use crate::error::LookupError;
    use crate::plugins::{CancelToken, TransformRunner};
    use std::sync::Mutex;

    struct Fixed;

    impl Locator for Fixed {
        fn locate(&self) -> Result<String, LookupError> {
            Ok("1.000000, 2.000000".to_string())
        }
    }

    #[test]
    fn timestamp_has_the_expected_shape() {
        let t = timestamp();
        assert_eq!(t.len(), 19);
        assert_eq!(&t[4..5], "-");
        assert_eq!(&t[10..11], " ");
        assert_eq!(&t[13..14], ":");
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn layout_follows_surface_size() {
        let layout = LabelLayout::compute(400, 200, &["0123456789"], None);
        assert!(approx(layout.text_size, 10.0));
        assert!(approx(layout.padding, 3.0));
        assert!(approx(layout.line_height, 10.0));
        assert!(approx(layout.rect.left, 3.0));
        assert!(approx(layout.rect.bottom, 197.0));
        assert!(approx(layout.rect.top, 184.0));
        assert!(approx(layout.rect.right, 69.0));
        let (x, y) = layout.baseline(0);
        assert!(approx(x, 6.0));
        assert!(approx(y, 184.0 + 3.0 + 10.0 - 2.0));
    }

    #[test]
    fn label_box_lands_bottom_left_with_milestones() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = seen.clone();
            move |p: u8| seen.lock().unwrap().push(p)
        };
        let overlay = MetadataOverlay::new(Arc::new(Fixed), None);
        let mut s = PixelSurface::new_filled(400, 200, WHITE).unwrap();
        TransformRunner::run(&overlay, &mut s, &sink, &CancelToken::new()).unwrap();

        assert_eq!(s.get(4, 195).unwrap(), Rgba([75, 75, 75, 255]));
        assert_eq!(s.get(399, 0).unwrap(), WHITE);
        assert_eq!(s.get(1, 199).unwrap(), WHITE);
        assert_eq!(*seen.lock().unwrap(), vec![10, 30, 60, 90, 100]);
    }

    #[test]
    fn cancelled_overlay_changes_nothing() {
        let overlay = MetadataOverlay::new(Arc::new(Fixed), None);
        let mut s = PixelSurface::new_filled(100, 100, WHITE).unwrap();
        let before = s.clone();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = TransformRunner::run(&overlay, &mut s, &crate::plugins::NoProgress, &cancel)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(s, before);
    }
}
