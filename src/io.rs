use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::canvas::PixelSurface;
use crate::error::{SurfaceError, SurfaceResult};

/// JPEG quality used when a format is picked from a file extension alone.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

// ============================================================================
// FORMAT SELECTION
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg { quality: u8 },
    Bmp,
}

impl ImageFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            }),
            "bmp" => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> SurfaceResult<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext).ok_or_else(|| {
            SurfaceError::UnsupportedFormat(if ext.is_empty() {
                path.display().to_string()
            } else {
                ext.to_string()
            })
        })
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg { .. } => "jpg",
            ImageFormat::Bmp => "bmp",
        }
    }

    /// Same format with a different JPEG quality; other formats are unchanged.
    pub fn with_quality(self, quality: u8) -> Self {
        match self {
            ImageFormat::Jpeg { .. } => ImageFormat::Jpeg {
                quality: quality.clamp(1, 100),
            },
            other => other,
        }
    }
}

// ============================================================================
// ENCODE / DECODE
// ============================================================================

/// Encode a surface into an in-memory byte stream. JPEG has no alpha channel,
/// so the surface is converted to RGB8 first.
pub fn encode(surface: &PixelSurface, format: ImageFormat) -> SurfaceResult<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(surface, format, &mut out)?;
    Ok(out)
}

fn encode_into<W: Write>(
    surface: &PixelSurface,
    format: ImageFormat,
    writer: &mut W,
) -> SurfaceResult<()> {
    let image = surface.as_rgba_image();
    match format {
        ImageFormat::Png => {
            let encoder = PngEncoder::new(writer);
            encoder.write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        ImageFormat::Jpeg { quality } => {
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        ImageFormat::Bmp => {
            let mut encoder = BmpEncoder::new(writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
    }
    Ok(())
}

/// Decode any byte stream the `image` crate can sniff into an RGBA8 surface.
pub fn decode(bytes: &[u8]) -> SurfaceResult<PixelSurface> {
    let img = image::load_from_memory(bytes)?;
    PixelSurface::from_rgba_image(img.to_rgba8())
}

// ============================================================================
// FILE HELPERS
// ============================================================================

pub fn load(path: &Path) -> SurfaceResult<PixelSurface> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

pub fn save(surface: &PixelSurface, path: &Path, format: ImageFormat) -> SurfaceResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_into(surface, format, &mut writer)?;
    writer.flush()?;
    Ok(())
}
