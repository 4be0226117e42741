use super::{BUILTIN_AUTHOR, Transform, TransformRequest};
use crate::error::TransformError;

/// Luma-weighted grayscale. Colour channels take the truncated luma; alpha is
/// left as it was.
pub struct Grayscale;

impl Grayscale {
    pub const NAME: &'static str = "Black&White";
}

/// `0.299 R + 0.587 G + 0.114 B`, truncated. Integer weights keep gray inputs
/// exact, which makes the transform idempotent.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

impl Transform for Grayscale {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn author(&self) -> &str {
        BUILTIN_AUTHOR
    }

    fn apply(&self, request: &mut TransformRequest<'_>) -> Result<(), TransformError> {
        request.for_each_row(|source, y, row| {
            let stride = source.stride();
            let start = y as usize * stride;
            let src = &source.as_raw()[start..start + stride];
            for (out, px) in row.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                let l = luma(px[0], px[1], px[2]);
                out[0] = l;
                out[1] = l;
                out[2] = l;
                out[3] = px[3];
            }
            Ok(())
        })
    }
}
