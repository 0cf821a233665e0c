//! Working-resolution downsampling.
//!
//! Color quantization and per-layer tracing both scale with pixel count,
//! so color-mode runs first shrink large images until the longer side
//! matches `max_side_length`.  The traced geometry is scaled back up at
//! serialization time (see [`ProcessResult::restore_scale`](crate::ProcessResult::restore_scale)).

use std::fmt;

use image::RgbaImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Resampling filter used when downsampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DownsampleFilter {
    /// Nearest-neighbor: fastest, keeps hard color edges.
    Nearest,
    /// Bilinear interpolation.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom).
    CatmullRom,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl DownsampleFilter {
    const fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for DownsampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("nearest"),
            Self::Triangle => f.write_str("triangle"),
            Self::CatmullRom => f.write_str("catmull-rom"),
            Self::Lanczos3 => f.write_str("lanczos3"),
        }
    }
}

/// Target size for an image whose longer side must not exceed
/// `max_side`, or `None` when no resize is needed (`max_side == 0`
/// disables downsampling).
#[must_use]
pub fn target_size(width: u32, height: u32, max_side: u32) -> Option<(u32, u32)> {
    let long_side = width.max(height);
    if max_side == 0 || long_side <= max_side {
        return None;
    }
    let ratio = f64::from(max_side) / f64::from(long_side);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scale = |v: u32| ((f64::from(v) * ratio).round() as u32).max(1);
    Some((scale(width), scale(height)))
}

/// Shrink `image` so its longer side is at most `max_side` pixels.
///
/// Returns `None` when the image is already small enough.
#[must_use]
pub fn downsample(image: &RgbaImage, max_side: u32, filter: DownsampleFilter) -> Option<RgbaImage> {
    let (width, height) = target_size(image.width(), image.height(), max_side)?;
    log::debug!(
        "downsampling {}x{} -> {width}x{height} ({filter})",
        image.width(),
        image.height()
    );
    Some(image::imageops::resize(
        image,
        width,
        height,
        filter.to_image_filter(),
    ))
}
