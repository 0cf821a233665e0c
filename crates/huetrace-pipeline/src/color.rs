//! Color values and the conversions between them.
//!
//! Quantization works on [`Sample`]s: three-component vectors in either
//! sRGB (0..=255 per channel) or CIE L\*a\*b\* (D65 white point).  All
//! similarity decisions in the crate go through [`sample_distance`] or
//! [`Rgb::distance`], both plain Euclidean distances.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// D65 reference white used for XYZ <-> Lab.
const REFERENCE_WHITE: [f64; 3] = [0.950_47, 1.0, 1.088_83];

/// Lab companding threshold, `(6/29)^3`.
const LAB_EPSILON: f64 = 0.008_856;

/// Slope of the linear segment of the Lab companding function.
const LAB_SLOPE: f64 = 7.787;

/// Offset of the linear segment of the Lab companding function.
const LAB_OFFSET: f64 = 16.0 / 116.0;

/// Distance below which a color counts as white.
pub const WHITE_LIKE_DISTANCE: f64 = 5.0;

/// A color vector in the active clustering space.
pub type Sample = [f64; 3];

/// Euclidean distance between two samples.
#[must_use]
pub fn sample_distance(a: &Sample, b: &Sample) -> f64 {
    sample_distance_squared(a, b).sqrt()
}

/// Squared Euclidean distance between two samples.
#[must_use]
pub fn sample_distance_squared(a: &Sample, b: &Sample) -> f64 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d0.mul_add(d0, d1.mul_add(d1, d2 * d2))
}

/// Color space the K-means++ clusterer operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// Raw sRGB channel values.
    Rgb,
    /// Perceptual CIE L\*a\*b\*.
    #[default]
    Lab,
}

impl ColorSpace {
    /// Convert an RGB color into a sample in this space.
    #[must_use]
    pub fn sample(self, color: Rgb) -> Sample {
        match self {
            Self::Rgb => [
                f64::from(color.r),
                f64::from(color.g),
                f64::from(color.b),
            ],
            Self::Lab => {
                let lab = color.to_lab();
                [lab.l, lab.a, lab.b]
            }
        }
    }

    /// Convert a sample in this space back to an RGB color.
    #[must_use]
    pub fn to_rgb(self, sample: &Sample) -> Rgb {
        match self {
            Self::Rgb => Rgb::new(
                channel_from_unit(sample[0] / 255.0),
                channel_from_unit(sample[1] / 255.0),
                channel_from_unit(sample[2] / 255.0),
            ),
            Self::Lab => Lab {
                l: sample[0],
                a: sample[1],
                b: sample[2],
            }
            .to_rgb(),
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgb => f.write_str("rgb"),
            Self::Lab => f.write_str("lab"),
        }
    }
}

/// An opaque 8-bit sRGB color.
///
/// Serializes as a lowercase `#rrggbb` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Pure white.
    pub const WHITE: Self = Self::new(255, 255, 255);
    /// Pure black.
    pub const BLACK: Self = Self::new(0, 0, 0);

    /// Create a color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Euclidean distance in RGB space.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dr = f64::from(self.r) - f64::from(other.r);
        let dg = f64::from(self.g) - f64::from(other.g);
        let db = f64::from(self.b) - f64::from(other.b);
        dr.mul_add(dr, dg.mul_add(dg, db * db)).sqrt()
    }

    /// Rec. 709 luma on the raw channel values (0..=255).
    #[must_use]
    pub fn luma(self) -> f64 {
        0.2126f64.mul_add(
            f64::from(self.r),
            0.7153f64.mul_add(f64::from(self.g), 0.0721 * f64::from(self.b)),
        )
    }

    /// Whether this color is within [`WHITE_LIKE_DISTANCE`] of white.
    #[must_use]
    pub fn is_white_like(self) -> bool {
        self.distance(Self::WHITE) < WHITE_LIKE_DISTANCE
    }

    /// Lowercase `#rrggbb` representation.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Convert to CIE XYZ (D65, components nominally in `0.0..=1.09`).
    #[must_use]
    pub fn to_xyz(self) -> Xyz {
        let r = srgb_to_linear(f64::from(self.r) / 255.0);
        let g = srgb_to_linear(f64::from(self.g) / 255.0);
        let b = srgb_to_linear(f64::from(self.b) / 255.0);
        Xyz {
            x: 0.4124f64.mul_add(r, 0.3576f64.mul_add(g, 0.1805 * b)),
            y: 0.2126f64.mul_add(r, 0.7152f64.mul_add(g, 0.0722 * b)),
            z: 0.0193f64.mul_add(r, 0.1192f64.mul_add(g, 0.9505 * b)),
        }
    }

    /// Convert to CIE L\*a\*b\*.
    #[must_use]
    pub fn to_lab(self) -> Lab {
        self.to_xyz().to_lab()
    }

    /// Convert to HSL with integer degrees and percentages.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn to_hsl(self) -> Hsl {
        let r = f64::from(self.r) / 255.0;
        let g = f64::from(self.g) / 255.0;
        let b = f64::from(self.b) / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;
        let lightness = f64::midpoint(max, min);

        if delta == 0.0 {
            return Hsl {
                hue: 0,
                saturation: 0,
                lightness: percent(lightness),
            };
        }

        let saturation = if lightness < 0.5 {
            delta / (max + min)
        } else {
            delta / (2.0 - max - min)
        };

        let delta_r = ((max - r) / 6.0 + delta / 2.0) / delta;
        let delta_g = ((max - g) / 6.0 + delta / 2.0) / delta;
        let delta_b = ((max - b) / 6.0 + delta / 2.0) / delta;

        let mut hue = if r == max {
            delta_b - delta_g
        } else if g == max {
            1.0 / 3.0 + delta_r - delta_b
        } else {
            2.0 / 3.0 + delta_g - delta_r
        };
        if hue < 0.0 {
            hue += 1.0;
        }
        if hue > 1.0 {
            hue -= 1.0;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let degrees = (hue * 360.0).round() as u16 % 360;

        Hsl {
            hue: degrees,
            saturation: percent(saturation),
            lightness: percent(lightness),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Error returned when a hex color string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex color {0:?}: expected #rrggbb")]
pub struct ParseColorError(String);

impl FromStr for Rgb {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseColorError(s.to_owned());
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(err());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| err())
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_hex()
    }
}

impl TryFrom<String> for Rgb {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A CIE XYZ color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Xyz {
    /// X tristimulus value.
    pub x: f64,
    /// Y tristimulus value (luminance).
    pub y: f64,
    /// Z tristimulus value.
    pub z: f64,
}

impl Xyz {
    /// Convert to CIE L\*a\*b\* relative to D65.
    #[must_use]
    pub fn to_lab(self) -> Lab {
        let fx = lab_forward(self.x / REFERENCE_WHITE[0]);
        let fy = lab_forward(self.y / REFERENCE_WHITE[1]);
        let fz = lab_forward(self.z / REFERENCE_WHITE[2]);
        Lab {
            l: 116.0f64.mul_add(fy, -16.0),
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }

    /// Convert to sRGB, clamping out-of-gamut channels.
    #[must_use]
    pub fn to_rgb(self) -> Rgb {
        let r = 3.2406f64.mul_add(self.x, (-1.5372f64).mul_add(self.y, -0.4986 * self.z));
        let g = (-0.9689f64).mul_add(self.x, 1.8758f64.mul_add(self.y, 0.0415 * self.z));
        let b = 0.0557f64.mul_add(self.x, (-0.2040f64).mul_add(self.y, 1.0570 * self.z));
        Rgb::new(
            channel_from_unit(linear_to_srgb(r)),
            channel_from_unit(linear_to_srgb(g)),
            channel_from_unit(linear_to_srgb(b)),
        )
    }
}

/// A CIE L\*a\*b\* color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    /// Lightness, `0.0..=100.0`.
    pub l: f64,
    /// Green-red axis.
    pub a: f64,
    /// Blue-yellow axis.
    pub b: f64,
}

impl Lab {
    /// Convert back to XYZ relative to D65.
    #[must_use]
    pub fn to_xyz(self) -> Xyz {
        let fy = (self.l + 16.0) / 116.0;
        let fx = self.a / 500.0 + fy;
        let fz = fy - self.b / 200.0;
        Xyz {
            x: lab_inverse(fx) * REFERENCE_WHITE[0],
            y: lab_inverse(fy) * REFERENCE_WHITE[1],
            z: lab_inverse(fz) * REFERENCE_WHITE[2],
        }
    }

    /// Convert to sRGB, clamping out-of-gamut channels.
    #[must_use]
    pub fn to_rgb(self) -> Rgb {
        self.to_xyz().to_rgb()
    }
}

/// HSL with hue in whole degrees and saturation/lightness in whole percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsl {
    /// Hue, `0..360`.
    pub hue: u16,
    /// Saturation, `0..=100`.
    pub saturation: u8,
    /// Lightness, `0..=100`.
    pub lightness: u8,
}

impl Hsl {
    /// Near-white, near-black, or desaturated.
    #[must_use]
    pub const fn is_grayscale(self) -> bool {
        self.lightness >= 95 || self.lightness <= 5 || self.saturation <= 10
    }

    /// Circular hue distance in degrees (`0..=180`).
    #[must_use]
    pub const fn hue_difference(self, other: Self) -> u16 {
        let d = self.hue.abs_diff(other.hue);
        if d > 180 { 360 - d } else { d }
    }
}

fn srgb_to_linear(c: f64) -> f64 {
    if c > 0.040_45 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

fn linear_to_srgb(c: f64) -> f64 {
    if c > 0.003_130_8 {
        1.055f64.mul_add(c.powf(1.0 / 2.4), -0.055)
    } else {
        12.92 * c
    }
}

fn lab_forward(t: f64) -> f64 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        LAB_SLOPE.mul_add(t, LAB_OFFSET)
    }
}

fn lab_inverse(t: f64) -> f64 {
    let cube = t * t * t;
    if cube > LAB_EPSILON {
        cube
    } else {
        (t - LAB_OFFSET) / LAB_SLOPE
    }
}

/// Map a `0.0..=1.0` value to a channel byte, clamping and rounding.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel_from_unit(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 100.0).round() as u8
}
