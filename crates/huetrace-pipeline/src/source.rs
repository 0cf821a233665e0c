//! Pixel access and decoding.
//!
//! The pipeline reads pixels through the [`PixelSource`] trait so callers
//! that already hold a decoded raster can skip [`decode`].  Transparency
//! is flattened on read: anything more than half transparent comes back
//! as opaque white, matching how the vectorizer treats PNG cut-outs.

use image::RgbaImage;

use crate::color::Rgb;
use crate::types::{Dimensions, PipelineError};

/// Pixels with alpha at or below this read as white.
pub const TRANSPARENT_ALPHA_MAX: u8 = 127;

/// Read-only random access to an RGBA pixel grid.
pub trait PixelSource {
    /// Grid size in pixels.
    fn dimensions(&self) -> Dimensions;

    /// Raw RGBA value at `(x, y)`.  Callers stay within [`dimensions`](Self::dimensions).
    fn rgba(&self, x: u32, y: u32) -> [u8; 4];

    /// Opaque color at `(x, y)` with transparency flattened to white.
    fn color(&self, x: u32, y: u32) -> Rgb {
        let [r, g, b, a] = self.rgba(x, y);
        if a <= TRANSPARENT_ALPHA_MAX {
            Rgb::WHITE
        } else {
            Rgb::new(r, g, b)
        }
    }
}

impl PixelSource for RgbaImage {
    fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        self.get_pixel(x, y).0
    }
}

/// Decode raw image bytes into an RGBA raster.
///
/// Supports PNG, JPEG, BMP, and WebP formats (whatever the `image` crate
/// was built with).
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
#[must_use = "returns the decoded image"]
pub fn decode(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}
