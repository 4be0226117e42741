use image::{Rgba, RgbaImage};

use crate::error::{SurfaceError, SurfaceResult};
use crate::io::ImageFormat;

/// A straight-alpha RGBA8 color. Channel order is always R, G, B, A.
pub type Color = Rgba<u8>;

pub const TRANSPARENT: Color = Rgba([0, 0, 0, 0]);
pub const WHITE: Color = Rgba([255, 255, 255, 255]);
pub const BLACK: Color = Rgba([0, 0, 0, 255]);

/// Upper bound on surface area, matching what a single canvas window can hold.
const MAX_PIXELS: u64 = 256_000_000;

// ============================================================================
// BLENDING
// ============================================================================

/// How a rasterized coverage value is combined with the destination pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlendOp {
    /// Straight-alpha source-over.
    #[default]
    SourceOver,
    /// Scale destination alpha down by the coverage; full coverage leaves a
    /// fully transparent pixel. Reveals whatever sits underneath the surface.
    Clear,
}

/// Composite `src` over `dst` with the given extra coverage (0.0..=1.0).
pub fn blend_source_over(dst: Color, src: Color, coverage: f32) -> Color {
    let sa = (src[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return dst;
    }
    if sa >= 1.0 {
        return src;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return TRANSPARENT;
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

/// Remove `coverage` worth of the destination's alpha.
pub fn blend_clear(dst: Color, coverage: f32) -> Color {
    let cov = coverage.clamp(0.0, 1.0);
    if cov >= 1.0 {
        return TRANSPARENT;
    }
    let a = (dst[3] as f32 * (1.0 - cov)).round() as u8;
    if a == 0 {
        TRANSPARENT
    } else {
        Rgba([dst[0], dst[1], dst[2], a])
    }
}

// ============================================================================
// PIXEL SURFACE - one canvas window's raster buffer
// ============================================================================

/// A fixed-size RGBA8 raster. Dimensions never change in place: resizing or
/// loading means building a new surface and replacing the old one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelSurface {
    pixels: RgbaImage,
}

impl PixelSurface {
    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> SurfaceResult<Self> {
        Self::new_filled(width, height, TRANSPARENT)
    }

    /// Create a surface with every pixel set to `color`.
    pub fn new_filled(width: u32, height: u32, color: Color) -> SurfaceResult<Self> {
        check_dimensions(width, height)?;
        Ok(Self {
            pixels: RgbaImage::from_pixel(width, height, color),
        })
    }

    /// Adopt an existing RGBA image as a surface.
    pub fn from_rgba_image(pixels: RgbaImage) -> SurfaceResult<Self> {
        check_dimensions(pixels.width(), pixels.height())?;
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Bytes per row of the pixel store.
    pub fn stride(&self) -> usize {
        self.width() as usize * 4
    }

    /// True when the signed coordinate lies on the surface.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width() as i64 && y < self.height() as i64
    }

    fn check(&self, x: u32, y: u32) -> SurfaceResult<()> {
        if x < self.width() && y < self.height() {
            Ok(())
        } else {
            Err(SurfaceError::OutOfBounds {
                x: x as i64,
                y: y as i64,
                width: self.width(),
                height: self.height(),
            })
        }
    }

    pub fn get(&self, x: u32, y: u32) -> SurfaceResult<Color> {
        self.check(x, y)?;
        Ok(*self.pixels.get_pixel(x, y))
    }

    pub fn set(&mut self, x: u32, y: u32, color: Color) -> SurfaceResult<()> {
        self.check(x, y)?;
        self.pixels.put_pixel(x, y, color);
        Ok(())
    }

    /// Overwrite every pixel with `color`.
    pub fn clear(&mut self, color: Color) {
        for px in self.pixels.pixels_mut() {
            *px = color;
        }
    }

    /// Blend `color` into the pixel at a signed coordinate. Off-surface
    /// coordinates are ignored so rasterizers can clip instead of failing.
    pub fn blend(&mut self, x: i64, y: i64, color: Color, coverage: f32, op: BlendOp) {
        if coverage <= 0.0 || !self.contains(x, y) {
            return;
        }
        let px = self.pixels.get_pixel_mut(x as u32, y as u32);
        *px = match op {
            BlendOp::SourceOver => blend_source_over(*px, color, coverage),
            BlendOp::Clear => blend_clear(*px, coverage),
        };
    }

    /// Copy every pixel of `other` into this surface without reallocating.
    pub fn copy_from(&mut self, other: &PixelSurface) -> SurfaceResult<()> {
        if other.width() != self.width() || other.height() != self.height() {
            return Err(SurfaceError::DimensionMismatch {
                expected: self.as_raw().len(),
                actual: other.as_raw().len(),
            });
        }
        self.pixels.copy_from_slice(other.pixels.as_raw());
        Ok(())
    }

    /// Swap in a complete replacement pixel store of identical size.
    pub fn replace_pixels(&mut self, data: Vec<u8>) -> SurfaceResult<()> {
        let expected = self.as_raw().len();
        if data.len() != expected {
            return Err(SurfaceError::DimensionMismatch {
                expected,
                actual: data.len(),
            });
        }
        let (w, h) = (self.width(), self.height());
        match RgbaImage::from_raw(w, h, data) {
            Some(pixels) => {
                self.pixels = pixels;
                Ok(())
            }
            None => Err(SurfaceError::DimensionMismatch {
                expected,
                actual: 0,
            }),
        }
    }

    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    pub(crate) fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn as_rgba_image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_rgba_image(self) -> RgbaImage {
        self.pixels
    }

    /// Opaque copy of this surface composited over a solid background.
    /// Erased (transparent) regions take the background color.
    pub fn flatten_onto(&self, background: Color) -> PixelSurface {
        let mut out = self.clone();
        for px in out.pixels.pixels_mut() {
            *px = blend_source_over(background, *px, 1.0);
        }
        out
    }

    pub fn to_encoded_bytes(&self, format: ImageFormat) -> SurfaceResult<Vec<u8>> {
        crate::io::encode(self, format)
    }

    pub fn from_decoded_bytes(bytes: &[u8]) -> SurfaceResult<Self> {
        crate::io::decode(bytes)
    }
}

fn check_dimensions(width: u32, height: u32) -> SurfaceResult<()> {
    let total = width as u64 * height as u64;
    if width == 0 || height == 0 || total > MAX_PIXELS {
        return Err(SurfaceError::InvalidDimensions { width, height });
    }
    Ok(())
}
