// ============================================================================
// ERROR TYPES
// ============================================================================

use thiserror::Error;

/// Result type for pixel surface and codec operations.
pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// Errors raised by [`PixelSurface`](crate::canvas::PixelSurface) and the codec boundary.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// A coordinate fell outside `[0, width) × [0, height)`.
    #[error("pixel ({x}, {y}) is outside the {width}x{height} surface")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },

    /// Surfaces must have at least one pixel.
    #[error("invalid surface dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// A replacement pixel store does not match the surface size.
    #[error("expected {expected} bytes of pixel data, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The requested encoding is not one the codec supports.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Encoding or decoding failed inside the image codec.
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),

    /// Reading or writing an image file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a transform invocation that did not complete.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The cancellation signal was observed. Expected, user initiated.
    #[error("transform cancelled")]
    Cancelled,

    /// The transform hit an unexpected fault. The target surface is untouched.
    #[error("transform '{transform}' failed: {cause}")]
    Failed { transform: String, cause: String },
}

impl TransformError {
    pub fn failed(transform: impl Into<String>, cause: impl ToString) -> Self {
        TransformError::Failed {
            transform: transform.into(),
            cause: cause.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransformError::Cancelled)
    }
}

/// Failure of the geolocation lookup used by the overlay transform.
/// Always converted into a fallback string, never surfaced to callers.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("geolocation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed geolocation response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("geolocation service reported status '{0}'")]
    Status(String),

    #[error("geolocation response carried no coordinates")]
    MissingCoordinates,
}

/// A `key=value` settings override that could not be applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("expected key=value, got '{0}'")]
    Malformed(String),

    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}
