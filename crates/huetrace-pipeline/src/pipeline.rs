//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! ```rust
//! # use huetrace_pipeline::{CancelToken, Pipeline, PipelineConfig, PipelineError};
//! # fn run(png: Vec<u8>) -> Result<(), PipelineError> {
//! let cancel = CancelToken::new();
//! let mut rng = huetrace_pipeline::rng_for(&PipelineConfig::default());
//! let outcome = Pipeline::new(png, PipelineConfig::default())
//!     .decode()?
//!     .downsample()
//!     .detect_background()
//!     .quantize(&mut rng, &cancel)?
//!     .build_palette()
//!     .trace(&cancel)?
//!     .into_outcome();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, so
//! stages cannot be skipped or reordered.  Black mode runs through the
//! same chain: downsampling, quantization and palette construction turn
//! into no-ops and tracing uses the monochrome mask.
//!
//! Degenerate input (nothing but background, say) is carried forward as
//! an [`Untraceable`] reason and surfaces from [`Traced::into_outcome`].

use image::RgbaImage;
use rand::Rng;

use crate::background::detect_background;
use crate::cancel::CancelToken;
use crate::color::Rgb;
use crate::config::{Mode, PipelineConfig};
use crate::diagnostics::StageMetrics;
use crate::kmeans::{KMeansRun, kmeans};
use crate::layer::{LayerBuilder, collect_samples, monochrome_mask};
use crate::palette::{Palette, build_palette, cluster_colors};
use crate::source::PixelSource;
use crate::trace::{TurnPolicy, trace_bitmap};
use crate::types::{Dimensions, Layer, Outcome, PipelineError, ProcessResult, Untraceable};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing; call .decode() to continue"]
pub struct Pending {
    config: PipelineConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Normalize the configuration and decode the source image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for out-of-range
    /// configuration, [`PipelineError::EmptyInput`] for empty bytes and
    /// [`PipelineError::ImageDecode`] for undecodable data.
    pub fn decode(self) -> Result<Decoded, PipelineError> {
        let config = self.config.normalized()?;
        let image = crate::source::decode(&self.source)?;
        log::debug!(
            "decoded {} bytes into {}x{}",
            self.source.len(),
            image.width(),
            image.height()
        );
        Ok(Decoded {
            config,
            image,
            source_len: self.source.len(),
        })
    }
}

// ───────────────────────── Stage 1: Decoded ──────────────────────────

/// Pipeline state holding the full-resolution raster.
#[must_use = "pipeline stages are consumed by advancing; call .downsample() to continue"]
pub struct Decoded {
    config: PipelineConfig,
    image: RgbaImage,
    source_len: usize,
}

impl Decoded {
    /// The decoded RGBA image.
    #[must_use]
    pub const fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// The normalized configuration driving the remaining stages.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Metrics for the decode step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let dims = PixelSource::dimensions(&self.image);
        StageMetrics::Decode {
            input_bytes: self.source_len,
            width: dims.width,
            height: dims.height,
            pixel_count: dims.pixel_count(),
        }
    }

    /// Shrink to the working resolution (color mode only).
    pub fn downsample(self) -> Downsampled {
        let source_dimensions = PixelSource::dimensions(&self.image);
        let resized = match self.config.mode {
            Mode::Color => crate::downsample::downsample(
                &self.image,
                self.config.max_side_length,
                self.config.downsample_filter,
            ),
            Mode::Black => None,
        };
        let applied = resized.is_some();
        Downsampled {
            image: resized.unwrap_or(self.image),
            config: self.config,
            source_dimensions,
            applied,
        }
    }
}

// ───────────────────────── Stage 2: Downsampled ──────────────────────

/// Pipeline state at working resolution.
#[must_use = "pipeline stages are consumed by advancing; call .detect_background() to continue"]
pub struct Downsampled {
    config: PipelineConfig,
    image: RgbaImage,
    source_dimensions: Dimensions,
    applied: bool,
}

impl Downsampled {
    /// The working-resolution image.
    #[must_use]
    pub const fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Whether the image was actually resized.
    #[must_use]
    pub const fn applied(&self) -> bool {
        self.applied
    }

    /// Metrics for the downsample step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let dims = PixelSource::dimensions(&self.image);
        StageMetrics::Downsample {
            original_width: self.source_dimensions.width,
            original_height: self.source_dimensions.height,
            width: dims.width,
            height: dims.height,
            max_side_length: self.config.max_side_length,
            filter: self.config.downsample_filter.to_string(),
            applied: self.applied,
        }
    }

    /// Pick the background color: the configured one if set, otherwise
    /// the most frequent border color.
    pub fn detect_background(self) -> BackgroundDetected {
        let (background, detected) = match self.config.background {
            Some(color) => (color, false),
            None => (
                detect_background(&self.image, self.config.similar_color_distance),
                true,
            ),
        };
        BackgroundDetected {
            config: self.config,
            image: self.image,
            source_dimensions: self.source_dimensions,
            background,
            detected,
        }
    }
}

// ───────────────────────── Stage 3: BackgroundDetected ───────────────

/// Pipeline state once the background color is known.
#[must_use = "pipeline stages are consumed by advancing; call .quantize() to continue"]
pub struct BackgroundDetected {
    config: PipelineConfig,
    image: RgbaImage,
    source_dimensions: Dimensions,
    background: Rgb,
    detected: bool,
}

impl BackgroundDetected {
    /// The background color in effect.
    #[must_use]
    pub const fn background(&self) -> Rgb {
        self.background
    }

    /// Metrics for the background step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Background {
            color: self.background.to_hex(),
            detected: self.detected,
        }
    }

    /// Cluster the foreground pixels (color mode only).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cancelled`] if `cancel` trips during
    /// clustering.
    pub fn quantize<R: Rng>(
        self,
        rng: &mut R,
        cancel: &CancelToken,
    ) -> Result<Quantized, PipelineError> {
        let mut quantized = Quantized {
            config: self.config,
            image: self.image,
            source_dimensions: self.source_dimensions,
            background: self.background,
            sample_count: 0,
            run: None,
            clusters: Vec::new(),
            untraceable: None,
        };
        if quantized.config.mode == Mode::Black {
            return Ok(quantized);
        }

        let space = quantized.config.color_space();
        let samples = collect_samples(
            &quantized.image,
            quantized.background,
            quantized.config.bg_color_distance,
            space,
        );
        quantized.sample_count = samples.len();
        if samples.is_empty() {
            log::info!("every pixel matches the background {}", quantized.background);
            quantized.untraceable = Some(Untraceable::NoForegroundColors);
            return Ok(quantized);
        }

        let run = kmeans(
            &samples,
            quantized.config.clusters_num,
            quantized.config.kmeans_difference_distance,
            rng,
            cancel,
        )?;
        log::debug!(
            "k-means: {} samples -> {} clusters in {} iterations",
            samples.len(),
            run.clusters.len(),
            run.iterations()
        );
        quantized.clusters = cluster_colors(&run, space);
        quantized.run = Some(run);
        Ok(quantized)
    }
}

// ───────────────────────── Stage 4: Quantized ────────────────────────

/// Pipeline state after clustering.
#[must_use = "pipeline stages are consumed by advancing; call .build_palette() to continue"]
pub struct Quantized {
    config: PipelineConfig,
    image: RgbaImage,
    source_dimensions: Dimensions,
    background: Rgb,
    sample_count: usize,
    run: Option<KMeansRun>,
    clusters: Vec<(Rgb, usize)>,
    untraceable: Option<Untraceable>,
}

impl Quantized {
    /// Cluster colors with their member counts, most populous first.
    #[must_use]
    pub fn clusters(&self) -> &[(Rgb, usize)] {
        &self.clusters
    }

    /// Metrics for the clustering step, or `None` if it was skipped.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        let run = self.run.as_ref()?;
        Some(StageMetrics::Quantize {
            sample_count: self.sample_count,
            k: self.config.clusters_num,
            iterations: run.iterations(),
            cluster_count: self.clusters.len(),
            final_displacement: run.displacements.last().copied().unwrap_or(0.0),
            color_space: self.config.color_space().to_string(),
        })
    }

    /// Post-process the clusters into the final palette (color mode only).
    pub fn build_palette(self) -> Paletted {
        let mut untraceable = self.untraceable;
        let palette = match self.config.mode {
            Mode::Color if untraceable.is_none() => {
                let palette = build_palette(&self.clusters, self.background, &self.config);
                if palette.is_empty() {
                    log::info!("palette post-processing removed every cluster");
                    untraceable = Some(Untraceable::EmptyPalette);
                }
                Some(palette)
            }
            _ => None,
        };
        Paletted {
            config: self.config,
            image: self.image,
            source_dimensions: self.source_dimensions,
            background: self.background,
            cluster_count: self.clusters.len(),
            palette,
            untraceable,
        }
    }
}

// ───────────────────────── Stage 5: Paletted ─────────────────────────

/// Pipeline state with the palette frozen.
#[must_use = "pipeline stages are consumed by advancing; call .trace() to continue"]
pub struct Paletted {
    config: PipelineConfig,
    image: RgbaImage,
    source_dimensions: Dimensions,
    background: Rgb,
    cluster_count: usize,
    palette: Option<Palette>,
    untraceable: Option<Untraceable>,
}

impl Paletted {
    /// The final palette (color mode only).
    #[must_use]
    pub const fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    /// Metrics for the palette step, or `None` if it was skipped.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        let palette = self.palette.as_ref()?;
        Some(StageMetrics::Palette {
            cluster_count: self.cluster_count,
            color_count: palette.len(),
            remap_count: palette.remap.len(),
            all_grayscale: palette.all_grayscale,
        })
    }

    /// Build and trace every layer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cancelled`] if `cancel` trips between
    /// layers or paths.
    pub fn trace(self, cancel: &CancelToken) -> Result<Traced, PipelineError> {
        if let Some(reason) = self.untraceable {
            return Ok(Traced::untraceable(reason));
        }

        let layers = match &self.palette {
            Some(palette) => {
                trace_palette(&self.image, palette, self.background, &self.config, cancel)?
            }
            None => match trace_monochrome(&self.image, self.background, &self.config, cancel)?
            {
                Some(layer) => vec![layer],
                None => return Ok(Traced::untraceable(Untraceable::EmptyMask)),
            },
        };

        if layers.iter().all(|layer| layer.curves.is_empty()) {
            log::info!("no path exceeded turd size {}", self.config.turd_size);
            return Ok(Traced::untraceable(Untraceable::NoPaths));
        }

        let result = ProcessResult {
            mode: self.config.mode,
            dimensions: PixelSource::dimensions(&self.image),
            source_dimensions: self.source_dimensions,
            background: self.background,
            remove_background: self.config.remove_background,
            palette: self.palette,
            layers,
        };
        Ok(Traced {
            outcome: Outcome::Traced(result),
        })
    }
}

fn trace_palette(
    image: &RgbaImage,
    palette: &Palette,
    background: Rgb,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<Vec<Layer>, PipelineError> {
    let mut params = config.trace_params();
    if palette.all_grayscale {
        log::debug!("grayscale palette, tracing with the {} turn policy", TurnPolicy::White);
        params.turn_policy = TurnPolicy::White;
    }

    let mut builder = LayerBuilder::new(image, palette, background, config);
    let mut layers = Vec::with_capacity(palette.len());
    for (index, entry) in palette.entries.iter().enumerate() {
        cancel.check()?;
        let Some(mask) = builder.build(index) else {
            continue;
        };
        let curves = if mask.any() {
            trace_bitmap(&mask, &params, cancel)?
        } else {
            log::debug!("layer {} has no pixels", entry.hex());
            Vec::new()
        };
        log::debug!("layer {}: {} curves", entry.hex(), curves.len());
        layers.push(Layer {
            color: Some(entry.color),
            share: entry.share,
            curves,
        });
    }
    Ok(layers)
}

fn trace_monochrome(
    image: &RgbaImage,
    background: Rgb,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<Option<Layer>, PipelineError> {
    let mask = monochrome_mask(image, background, config);
    if !mask.any() {
        log::info!("monochrome mask ({:?}) is empty", config.bitmap_type);
        return Ok(None);
    }
    let curves = trace_bitmap(&mask, &config.trace_params(), cancel)?;
    Ok(Some(Layer {
        color: None,
        share: 100.0,
        curves,
    }))
}

// ───────────────────────── Stage 6: Traced ───────────────────────────

/// Final pipeline state.
#[derive(Debug)]
pub struct Traced {
    outcome: Outcome,
}

impl Traced {
    const fn untraceable(reason: Untraceable) -> Self {
        Self {
            outcome: Outcome::Untraceable(reason),
        }
    }

    /// The pipeline outcome.
    #[must_use]
    pub const fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Metrics for the trace step.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let layers = self
            .outcome
            .traced()
            .map_or(&[][..], |result| result.layers.as_slice());
        StageMetrics::Trace {
            layer_count: layers.len(),
            curve_count: layers.iter().map(|l| l.curves.len()).sum(),
            segment_count: layers.iter().map(Layer::segment_count).sum(),
            corner_count: layers
                .iter()
                .flat_map(|l| &l.curves)
                .map(crate::trace::Curve::corner_count)
                .sum(),
        }
    }

    /// Consume the final stage.
    #[must_use]
    pub fn into_outcome(self) -> Outcome {
        self.outcome
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental vectorization pipeline.
///
/// [`Pipeline::new`] starts from encoded bytes; [`Pipeline::from_image`]
/// starts from an already-decoded raster.
pub struct Pipeline;

impl Pipeline {
    /// Store the source bytes and config without processing anything.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image_bytes: Vec<u8>, config: PipelineConfig) -> Pending {
        Pending {
            config,
            source: image_bytes,
        }
    }

    /// Start from a decoded raster, skipping the decode stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for out-of-range
    /// configuration.
    pub fn from_image(image: RgbaImage, config: &PipelineConfig) -> Result<Decoded, PipelineError> {
        Ok(Decoded {
            config: config.normalized()?,
            image,
            source_len: 0,
        })
    }
}
