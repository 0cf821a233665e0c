//! Pipeline configuration.
//!
//! [`PipelineConfig`] deserializes from JSON with every field optional
//! (missing fields take their defaults).  The option names used by the
//! classic PHP/JS vectorizer front ends (`turnpolicy`, `turdsize`,
//! `optcurve`, ...) are accepted as aliases.
//!
//! Call [`PipelineConfig::normalized`] before running the pipeline; the
//! entry points in the crate root do this for you.

use serde::{Deserialize, Serialize};

use crate::color::{ColorSpace, Rgb};
use crate::downsample::DownsampleFilter;
use crate::trace::{TraceParams, TurnPolicy};
use crate::types::PipelineError;

/// Which pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Quantize colors and trace one layer per palette entry.
    #[default]
    Color,
    /// Trace a single brightness/background-derived mask.
    Black,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Color => f.write_str("color"),
            Self::Black => f.write_str("black"),
        }
    }
}

/// How the monochrome mask is derived in [`Mode::Black`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitmapType {
    /// Luma below `black_level`.
    BlackLevel,
    /// Distance from the background above `bgcolor_level`.
    BgColor,
    /// Luma below `black_level`, or distance from the background above
    /// `balance_level`.
    #[default]
    Balance,
}

/// Configuration for the vectorization pipeline.
///
/// All parameters have defaults matching the classic vectorizer.  Fields
/// are public; [`normalized`](Self::normalized) reconciles the palette
/// size controls and rejects out-of-range values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// `color` runs the full quantize-then-trace pipeline; `black`
    /// traces a single mask and skips clustering.
    pub mode: Mode,

    // --- Tracing ---
    /// Tie-break rule at ambiguous boundary corners.
    #[serde(alias = "turnpolicy")]
    pub turn_policy: TurnPolicy,

    /// Paths enclosing this many pixels or fewer are discarded.
    #[serde(alias = "turdsize")]
    pub turd_size: u32,

    /// Merge consecutive Bezier segments where tolerance allows.
    #[serde(alias = "optcurve")]
    pub opt_curve: bool,

    /// Maximum deviation (pixels) accepted when merging segments.
    #[serde(alias = "opttolerance")]
    pub opt_tolerance: f64,

    /// Corner threshold: vertices with a smoothness estimate at or above
    /// this become sharp corners.  `0.0` makes every vertex a corner.
    #[serde(alias = "alphamax")]
    pub alpha_max: f64,

    // --- Monochrome mask ---
    /// Mask derivation strategy for [`Mode::Black`].
    pub bitmap_type: BitmapType,

    /// Luma threshold for the `blacklevel` and `balance` strategies.
    pub black_level: f64,

    /// Background distance threshold for the `bgcolor` strategy.
    pub bgcolor_level: f64,

    /// Background distance threshold for the `balance` strategy.
    pub balance_level: f64,

    // --- Palette size ---
    /// Number of K-means++ clusters.  Reconciled against `color_size`
    /// during normalization.
    pub clusters_num: usize,

    /// Upper bound for `clusters_num`.
    pub clusters_num_max: usize,

    /// Lower bound for `clusters_num`.
    pub clusters_num_min: usize,

    /// Maximum number of colors in the final palette.
    pub color_size: usize,

    // --- Clustering ---
    /// K-means stops once no center moves farther than this.
    pub kmeans_difference_distance: f64,

    /// Extra slack added to `similar_color_distance` when building layers,
    /// closing hairline gaps at anti-aliased color boundaries.
    pub kmeans_gap_fix_value: f64,

    /// Cluster in Lab (perceptual) instead of raw RGB.
    pub kmeans_use_lab_color: bool,

    /// Seed for K-means++ initialization.  `None` draws from OS entropy,
    /// so palettes can differ between runs.
    pub seed: Option<u64>,

    // --- Palette post-processing ---
    /// Palette entries below this share (percent) are dropped as noise.
    pub keep_color_rate_min: f64,

    /// Colors closer than this are considered the same color.
    pub similar_color_distance: f64,

    /// Pixels closer than this to the background are background.
    pub bg_color_distance: f64,

    /// Maximum hue difference (degrees) for merging small entries.
    pub merge_color_hue_min: f64,

    /// Enable merging of small entries into hue-neighbours.
    pub merge_color_hue: bool,

    /// Omit the background rectangle and keep white-like layers visible.
    pub remove_background: bool,

    /// Fixed background color; `None` auto-detects from the border.
    pub background: Option<Rgb>,

    // --- Working resolution ---
    /// In color mode, images whose longer side exceeds this are
    /// downsampled before quantization.  `0` disables.
    pub max_side_length: u32,

    /// Resampling filter for the working-resolution downsample.
    pub downsample_filter: DownsampleFilter,
}

impl PipelineConfig {
    /// Default mode.
    pub const DEFAULT_MODE: Mode = Mode::Color;
    /// Default turn policy.
    pub const DEFAULT_TURN_POLICY: TurnPolicy = TurnPolicy::Minority;
    /// Default path area threshold.
    pub const DEFAULT_TURD_SIZE: u32 = 2;
    /// Default for curve merging.
    pub const DEFAULT_OPT_CURVE: bool = true;
    /// Default curve merge tolerance.
    pub const DEFAULT_OPT_TOLERANCE: f64 = 0.2;
    /// Default corner threshold.
    pub const DEFAULT_ALPHA_MAX: f64 = 1.0;
    /// Default monochrome mask strategy.
    pub const DEFAULT_BITMAP_TYPE: BitmapType = BitmapType::Balance;
    /// Default luma threshold.
    pub const DEFAULT_BLACK_LEVEL: f64 = 128.0;
    /// Default background threshold for `bgcolor`.
    pub const DEFAULT_BGCOLOR_LEVEL: f64 = 120.0;
    /// Default background threshold for `balance`.
    pub const DEFAULT_BALANCE_LEVEL: f64 = 128.0;
    /// Default cluster count.
    pub const DEFAULT_CLUSTERS_NUM: usize = 10;
    /// Default cluster count upper bound.
    pub const DEFAULT_CLUSTERS_NUM_MAX: usize = 20;
    /// Default cluster count lower bound.
    pub const DEFAULT_CLUSTERS_NUM_MIN: usize = 5;
    /// Default palette size.
    pub const DEFAULT_COLOR_SIZE: usize = 5;
    /// Default K-means convergence distance.
    pub const DEFAULT_KMEANS_DIFFERENCE_DISTANCE: f64 = 5.0;
    /// Default layer gap-fix slack.
    pub const DEFAULT_KMEANS_GAP_FIX_VALUE: f64 = 5.0;
    /// Default minimum palette share (percent).
    pub const DEFAULT_KEEP_COLOR_RATE_MIN: f64 = 0.5;
    /// Default color similarity distance.
    pub const DEFAULT_SIMILAR_COLOR_DISTANCE: f64 = 40.0;
    /// Default background distance.
    pub const DEFAULT_BG_COLOR_DISTANCE: f64 = 35.0;
    /// Default hue merge window (degrees).
    pub const DEFAULT_MERGE_COLOR_HUE_MIN: f64 = 5.0;
    /// Default working resolution.
    pub const DEFAULT_MAX_SIDE_LENGTH: u32 = 512;

    /// Color space the clusterer should use.
    #[must_use]
    pub const fn color_space(&self) -> ColorSpace {
        if self.kmeans_use_lab_color {
            ColorSpace::Lab
        } else {
            ColorSpace::Rgb
        }
    }

    /// Tracing parameters derived from this configuration.
    #[must_use]
    pub const fn trace_params(&self) -> TraceParams {
        TraceParams {
            turn_policy: self.turn_policy,
            turd_size: self.turd_size,
            alpha_max: self.alpha_max,
            opt_curve: self.opt_curve,
            opt_tolerance: self.opt_tolerance,
        }
    }

    /// Reconcile the palette size controls and validate thresholds.
    ///
    /// `clusters_num` becomes `color_size` when it is smaller, otherwise
    /// `min(2 * color_size, clusters_num_max)`; either way it is then
    /// raised to at least `clusters_num_min`.  Zero `color_size`,
    /// `clusters_num`, or convergence distance fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if any threshold is
    /// negative or not finite, or if `clusters_num_min` exceeds
    /// `clusters_num_max`.
    pub fn normalized(&self) -> Result<Self, PipelineError> {
        self.validate()?;

        let mut config = self.clone();
        if config.color_size == 0 {
            config.color_size = Self::DEFAULT_COLOR_SIZE;
        }
        if config.clusters_num == 0 {
            config.clusters_num = Self::DEFAULT_CLUSTERS_NUM;
        }
        if config.kmeans_difference_distance <= 0.0 {
            config.kmeans_difference_distance = Self::DEFAULT_KMEANS_DIFFERENCE_DISTANCE;
        }

        config.clusters_num = if config.clusters_num < config.color_size {
            config.color_size
        } else {
            (config.color_size * 2).min(config.clusters_num_max)
        };
        config.clusters_num = config.clusters_num.max(config.clusters_num_min);

        Ok(config)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        let thresholds = [
            ("opt_tolerance", self.opt_tolerance),
            ("alpha_max", self.alpha_max),
            ("black_level", self.black_level),
            ("bgcolor_level", self.bgcolor_level),
            ("balance_level", self.balance_level),
            ("kmeans_difference_distance", self.kmeans_difference_distance),
            ("kmeans_gap_fix_value", self.kmeans_gap_fix_value),
            ("keep_color_rate_min", self.keep_color_rate_min),
            ("similar_color_distance", self.similar_color_distance),
            ("bg_color_distance", self.bg_color_distance),
            ("merge_color_hue_min", self.merge_color_hue_min),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.clusters_num_min > self.clusters_num_max {
            return Err(PipelineError::InvalidConfig(format!(
                "clusters_num_min ({}) exceeds clusters_num_max ({})",
                self.clusters_num_min, self.clusters_num_max
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: Self::DEFAULT_MODE,
            turn_policy: Self::DEFAULT_TURN_POLICY,
            turd_size: Self::DEFAULT_TURD_SIZE,
            opt_curve: Self::DEFAULT_OPT_CURVE,
            opt_tolerance: Self::DEFAULT_OPT_TOLERANCE,
            alpha_max: Self::DEFAULT_ALPHA_MAX,
            bitmap_type: Self::DEFAULT_BITMAP_TYPE,
            black_level: Self::DEFAULT_BLACK_LEVEL,
            bgcolor_level: Self::DEFAULT_BGCOLOR_LEVEL,
            balance_level: Self::DEFAULT_BALANCE_LEVEL,
            clusters_num: Self::DEFAULT_CLUSTERS_NUM,
            clusters_num_max: Self::DEFAULT_CLUSTERS_NUM_MAX,
            clusters_num_min: Self::DEFAULT_CLUSTERS_NUM_MIN,
            color_size: Self::DEFAULT_COLOR_SIZE,
            kmeans_difference_distance: Self::DEFAULT_KMEANS_DIFFERENCE_DISTANCE,
            kmeans_gap_fix_value: Self::DEFAULT_KMEANS_GAP_FIX_VALUE,
            kmeans_use_lab_color: true,
            seed: None,
            keep_color_rate_min: Self::DEFAULT_KEEP_COLOR_RATE_MIN,
            similar_color_distance: Self::DEFAULT_SIMILAR_COLOR_DISTANCE,
            bg_color_distance: Self::DEFAULT_BG_COLOR_DISTANCE,
            merge_color_hue_min: Self::DEFAULT_MERGE_COLOR_HUE_MIN,
            merge_color_hue: true,
            remove_background: false,
            background: None,
            max_side_length: Self::DEFAULT_MAX_SIDE_LENGTH,
            downsample_filter: DownsampleFilter::Triangle,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_clusters_follow_color_size() {
        let config = PipelineConfig::default().normalized().unwrap();
        // clusters_num (10) >= color_size (5): min(2 * 5, 20)
        assert_eq!(config.clusters_num, 10);
    }

    #[test]
    fn clusters_below_color_size_are_raised_to_it() {
        let config = PipelineConfig {
            clusters_num: 6,
            color_size: 8,
            ..PipelineConfig::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(config.clusters_num, 8);
    }

    #[test]
    fn clusters_are_capped_at_max() {
        let config = PipelineConfig {
            clusters_num: 50,
            color_size: 15,
            ..PipelineConfig::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(config.clusters_num, 20);
    }

    #[test]
    fn clusters_are_raised_to_min() {
        let config = PipelineConfig {
            clusters_num: 1,
            color_size: 1,
            ..PipelineConfig::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(config.clusters_num, 5);
    }

    #[test]
    fn zero_values_fall_back_to_defaults() {
        let config = PipelineConfig {
            color_size: 0,
            kmeans_difference_distance: 0.0,
            ..PipelineConfig::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(config.color_size, PipelineConfig::DEFAULT_COLOR_SIZE);
        assert!(
            (config.kmeans_difference_distance
                - PipelineConfig::DEFAULT_KMEANS_DIFFERENCE_DISTANCE)
                .abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn negative_threshold_is_rejected() {
        let result = PipelineConfig {
            similar_color_distance: -1.0,
            ..PipelineConfig::default()
        }
        .normalized();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn nan_threshold_is_rejected() {
        let result = PipelineConfig {
            alpha_max: f64::NAN,
            ..PipelineConfig::default()
        }
        .normalized();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn inverted_cluster_bounds_are_rejected() {
        let result = PipelineConfig {
            clusters_num_min: 30,
            ..PipelineConfig::default()
        }
        .normalized();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn deserializes_classic_option_names() {
        let json = r##"{
            "mode": "black",
            "turnpolicy": "majority",
            "turdsize": 7,
            "optcurve": false,
            "alphamax": 0.5,
            "bitmap_type": "blacklevel",
            "background": "#ffffff"
        }"##;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.mode, Mode::Black);
        assert_eq!(config.turn_policy, TurnPolicy::Majority);
        assert_eq!(config.turd_size, 7);
        assert!(!config.opt_curve);
        assert!((config.alpha_max - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.bitmap_type, BitmapType::BlackLevel);
        assert_eq!(config.background, Some(Rgb::WHITE));
        // Unspecified fields keep their defaults.
        assert_eq!(config.color_size, PipelineConfig::DEFAULT_COLOR_SIZE);
    }

    #[test]
    fn json_round_trip_preserves_config() {
        let config = PipelineConfig {
            seed: Some(42),
            background: Some(Rgb::new(10, 20, 30)),
            ..PipelineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn color_space_follows_lab_flag() {
        let mut config = PipelineConfig::default();
        assert_eq!(config.color_space(), ColorSpace::Lab);
        config.kmeans_use_lab_color = false;
        assert_eq!(config.color_space(), ColorSpace::Rgb);
    }
}
