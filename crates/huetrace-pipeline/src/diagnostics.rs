//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! [`process_with_diagnostics`] drives the [`Pipeline`](crate::Pipeline)
//! stage by stage, timing each transition with a caller-supplied
//! [`Clock`] and collecting the stage's [`StageMetrics`].  The clock is
//! injected so native callers can use `std::time::Instant`, browser
//! callers can use [`WebClock`], and tests can count ticks.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::config::PipelineConfig;
use crate::pipeline::Pipeline;
use crate::types::{Outcome, PipelineError};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by `web_time::Instant` (`performance.now()` on WASM).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClock;

impl Clock for WebClock {
    type Instant = web_time::Instant;

    fn now(&self) -> Self::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &Self::Instant) -> Duration {
        since.elapsed()
    }
}

/// Diagnostics collected from a single pipeline run.
///
/// Stages that only run in color mode have `Option` fields that are
/// `None` when the stage was skipped (black mode, or nothing left to
/// cluster).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 0: image decoding.
    pub decode: StageDiagnostics,
    /// Stage 1: working-resolution downsample.
    pub downsample: StageDiagnostics,
    /// Stage 2: background detection.
    pub background: StageDiagnostics,
    /// Stage 3: K-means++ clustering (color mode only).
    pub quantize: Option<StageDiagnostics>,
    /// Stage 4: palette post-processing (color mode only).
    pub palette: Option<StageDiagnostics>,
    /// Stage 5: layer building and tracing.
    pub trace: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes (0 for a pre-decoded raster).
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Downsampling metrics.
    Downsample {
        /// Width before downsampling.
        original_width: u32,
        /// Height before downsampling.
        original_height: u32,
        /// Working width.
        width: u32,
        /// Working height.
        height: u32,
        /// Configured longest-side limit.
        max_side_length: u32,
        /// Resampling filter name.
        filter: String,
        /// Whether a resize actually happened.
        applied: bool,
    },
    /// Background detection metrics.
    Background {
        /// Background color as `#rrggbb`.
        color: String,
        /// `false` when the color came from the configuration.
        detected: bool,
    },
    /// K-means++ clustering metrics.
    Quantize {
        /// Number of foreground samples clustered.
        sample_count: usize,
        /// Requested cluster count.
        k: usize,
        /// Lloyd iterations until convergence.
        iterations: usize,
        /// Distinct cluster colors produced.
        cluster_count: usize,
        /// Largest center displacement in the last iteration.
        final_displacement: f64,
        /// Color space the clustering ran in.
        color_space: String,
    },
    /// Palette post-processing metrics.
    Palette {
        /// Clusters going in.
        cluster_count: usize,
        /// Palette entries coming out.
        color_count: usize,
        /// Entries in the remap table.
        remap_count: usize,
        /// Whether every cluster was grayscale.
        all_grayscale: bool,
    },
    /// Tracing metrics.
    Trace {
        /// Number of layers produced.
        layer_count: usize,
        /// Closed curves across all layers.
        curve_count: usize,
        /// Segments across all curves.
        segment_count: usize,
        /// Corner segments across all curves.
        corner_count: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Palette size (0 in black mode).
    pub color_count: usize,
    /// Closed curves in the result.
    pub curve_count: usize,
    /// `traced`, or the reason nothing was traced.
    pub outcome: String,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages: Vec<(&str, &StageDiagnostics)> = vec![
            ("Decode", &self.decode),
            ("Downsample", &self.downsample),
            ("Background", &self.background),
        ];
        if let Some(ref q) = self.quantize {
            stages.push(("Quantize", q));
        }
        if let Some(ref p) = self.palette {
            stages.push(("Palette", p));
        }
        stages.push(("Trace", &self.trace));

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Colors: {}  |  Curves: {}  |  Outcome: {}",
            self.summary.color_count, self.summary.curve_count, self.summary.outcome,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Downsample {
            original_width,
            original_height,
            width,
            height,
            filter,
            applied,
            ..
        } => {
            if *applied {
                format!("{original_width}x{original_height} -> {width}x{height} ({filter})")
            } else {
                format!("{width}x{height} (unchanged)")
            }
        }
        StageMetrics::Background { color, detected } => {
            let source = if *detected { "detected" } else { "configured" };
            format!("{color} ({source})")
        }
        StageMetrics::Quantize {
            sample_count,
            k,
            iterations,
            cluster_count,
            final_displacement,
            color_space,
        } => format!(
            "{sample_count} samples, k={k} -> {cluster_count} clusters in {iterations} iters ({color_space}, shift={final_displacement:.2})",
        ),
        StageMetrics::Palette {
            cluster_count,
            color_count,
            remap_count,
            all_grayscale,
        } => {
            let gray = if *all_grayscale { " grayscale" } else { "" };
            format!("{cluster_count} -> {color_count} colors, {remap_count} remaps{gray}")
        }
        StageMetrics::Trace {
            layer_count,
            curve_count,
            segment_count,
            corner_count,
        } => format!(
            "{layer_count} layers, {curve_count} curves, {segment_count} segments ({corner_count} corners)",
        ),
    }
}

/// Time one stage transition.
fn timed<C: Clock, T>(clock: &C, stage: impl FnOnce() -> T) -> (T, Duration) {
    let start = clock.now();
    let value = stage();
    (value, clock.elapsed(&start))
}

/// Run the full pipeline, collecting per-stage diagnostics.
///
/// Produces the same [`Outcome`] as [`crate::process_with_cancel`] for
/// the same input, config and seed.
///
/// # Errors
///
/// Returns the same errors as [`crate::process_with_cancel`].
pub fn process_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    cancel: &CancelToken,
    clock: &C,
) -> Result<(Outcome, PipelineDiagnostics), PipelineError> {
    let mut rng = crate::rng_for(config);
    let total_start = clock.now();

    let (decoded, d) = timed(clock, || {
        Pipeline::new(image_bytes.to_vec(), config.clone()).decode()
    });
    let decoded = decoded?;
    let decode = StageDiagnostics {
        duration: d,
        metrics: decoded.metrics(),
    };
    let image_dims = crate::source::PixelSource::dimensions(decoded.image());

    let (downsampled, d) = timed(clock, || decoded.downsample());
    let downsample = StageDiagnostics {
        duration: d,
        metrics: downsampled.metrics(),
    };

    let (detected, d) = timed(clock, || downsampled.detect_background());
    let background = StageDiagnostics {
        duration: d,
        metrics: detected.metrics(),
    };

    let (quantized, d) = timed(clock, || detected.quantize(&mut rng, cancel));
    let quantized = quantized?;
    let quantize = quantized.metrics().map(|metrics| StageDiagnostics {
        duration: d,
        metrics,
    });

    let (paletted, d) = timed(clock, || quantized.build_palette());
    let palette = paletted.metrics().map(|metrics| StageDiagnostics {
        duration: d,
        metrics,
    });
    let color_count = paletted.palette().map_or(0, crate::palette::Palette::len);

    let (traced, d) = timed(clock, || paletted.trace(cancel));
    let traced = traced?;
    let trace = StageDiagnostics {
        duration: d,
        metrics: traced.metrics(),
    };

    let total_duration = clock.elapsed(&total_start);
    let outcome = traced.into_outcome();

    let summary = PipelineSummary {
        image_width: image_dims.width,
        image_height: image_dims.height,
        pixel_count: image_dims.pixel_count(),
        color_count,
        curve_count: outcome.traced().map_or(0, crate::ProcessResult::curve_count),
        outcome: match &outcome {
            Outcome::Traced(_) => "traced".to_owned(),
            Outcome::Untraceable(reason) => reason.to_string(),
        },
    };

    let diagnostics = PipelineDiagnostics {
        decode,
        downsample,
        background,
        quantize,
        palette,
        trace,
        total_duration,
        summary,
    };
    Ok((outcome, diagnostics))
}
