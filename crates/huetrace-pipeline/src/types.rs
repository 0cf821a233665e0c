//! Shared types for the huetrace pipeline.

use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::config::Mode;
use crate::palette::Palette;
use crate::trace::Curve;

/// Re-export `RgbaImage` so downstream crates can hand decoded images
/// to the pipeline without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Linear interpolation: `a + lambda * (b - a)`.
    #[must_use]
    pub fn lerp(a: Self, b: Self, lambda: f64) -> Self {
        Self {
            x: lambda.mul_add(b.x - a.x, a.x),
            y: lambda.mul_add(b.y - a.y, a.y),
        }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Errors that can occur while vectorizing an image.
///
/// Degenerate but well-formed inputs (an all-background image, say) are
/// not errors; they come back as [`Outcome::Untraceable`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input byte slice was empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// A configuration parameter is out of range.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The run was cancelled or its deadline passed.
    #[error("vectorization was cancelled")]
    Cancelled,
}

/// One traced color layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Palette color for this layer, or `None` for the monochrome layer
    /// whose color is picked at serialization time.
    pub color: Option<Rgb>,
    /// Share of foreground pixels (percent) represented by this layer.
    pub share: f64,
    /// Closed outlines, ready for `evenodd` filling.
    pub curves: Vec<Curve>,
}

impl Layer {
    /// Total number of segments across all curves.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.curves.iter().map(Curve::len).sum()
    }
}

/// The result of a successful trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResult {
    /// Which pipeline produced the layers.
    pub mode: Mode,
    /// Dimensions of the pixel grid that was traced.
    pub dimensions: Dimensions,
    /// Dimensions of the image before any working-resolution downsample.
    pub source_dimensions: Dimensions,
    /// Detected (or configured) background color.
    pub background: Rgb,
    /// Whether the background should be left out of the output document.
    pub remove_background: bool,
    /// Final palette; `None` in monochrome mode.
    pub palette: Option<Palette>,
    /// One entry per palette color (or the single monochrome layer).
    pub layers: Vec<Layer>,
}

/// Background and palette colors of a traced image, as hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageColors {
    /// Background color.
    pub background: String,
    /// Palette colors in layer order.
    pub colors: Vec<String>,
}

impl ProcessResult {
    /// Factor mapping traced coordinates back onto the source image.
    #[must_use]
    pub fn restore_scale(&self) -> f64 {
        if self.dimensions.width == 0 {
            return 1.0;
        }
        f64::from(self.source_dimensions.width) / f64::from(self.dimensions.width)
    }

    /// Background and palette colors as hex strings.
    #[must_use]
    pub fn image_colors(&self) -> ImageColors {
        ImageColors {
            background: self.background.to_hex(),
            colors: self
                .layers
                .iter()
                .filter_map(|layer| layer.color.map(Rgb::to_hex))
                .collect(),
        }
    }

    /// Total number of curves across all layers.
    #[must_use]
    pub fn curve_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.curves.len()).sum()
    }
}

/// Why an image produced nothing to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Untraceable {
    /// Every pixel is within the background distance.
    NoForegroundColors,
    /// Palette post-processing discarded every cluster.
    EmptyPalette,
    /// The monochrome mask has no set bits.
    EmptyMask,
    /// Every traced path fell below the area threshold.
    NoPaths,
}

impl std::fmt::Display for Untraceable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::NoForegroundColors => "no foreground colors",
            Self::EmptyPalette => "palette is empty after post-processing",
            Self::EmptyMask => "monochrome mask is empty",
            Self::NoPaths => "no path exceeded the area threshold",
        };
        f.write_str(text)
    }
}

/// What a pipeline run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Layers ready for serialization.
    Traced(ProcessResult),
    /// Nothing traceable; skip serialization.
    Untraceable(Untraceable),
}

impl Outcome {
    /// The traced result, if any.
    #[must_use]
    pub const fn traced(&self) -> Option<&ProcessResult> {
        match self {
            Self::Traced(result) => Some(result),
            Self::Untraceable(_) => None,
        }
    }

    /// Consume the outcome, returning the traced result if any.
    #[must_use]
    pub fn into_traced(self) -> Option<ProcessResult> {
        match self {
            Self::Traced(result) => Some(result),
            Self::Untraceable(_) => None,
        }
    }
}
