//! huetrace-pipeline: raster to color-layered vector outlines (sans-IO).
//!
//! Converts a raster image into closed Bezier outlines through:
//! decode -> downsample -> background detection -> K-means++ color
//! quantization -> palette post-processing -> per-color layer masks ->
//! Potrace-style tracing.  `mode = black` skips quantization and traces a
//! single brightness mask instead.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory byte
//! slices and returns structured data.  SVG serialization lives in
//! `huetrace-export`.

pub mod background;
pub mod bitmap;
pub mod cancel;
pub mod color;
pub mod config;
pub mod diagnostics;
pub mod downsample;
pub mod kmeans;
pub mod layer;
pub mod palette;
pub mod pipeline;
pub mod source;
pub mod trace;
pub mod types;

use rand::SeedableRng;
use rand::rngs::StdRng;

pub use cancel::CancelToken;
pub use color::{ColorSpace, Rgb};
pub use config::{BitmapType, Mode, PipelineConfig};
pub use downsample::DownsampleFilter;
pub use palette::{ColorRemap, Palette, PaletteEntry};
pub use pipeline::Pipeline;
pub use source::PixelSource;
pub use trace::{Curve, Segment, SegmentKind, TraceParams, TurnPolicy};
pub use types::{
    Dimensions, ImageColors, Layer, Outcome, PipelineError, Point, ProcessResult, RgbaImage,
    Untraceable,
};

/// The K-means++ random source for `config`: seeded from `config.seed`
/// when set, from OS entropy otherwise.
#[must_use]
pub fn rng_for(config: &PipelineConfig) -> StdRng {
    config
        .seed
        .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

/// Run the full vectorization pipeline.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration and
/// produces either traced layers or the reason nothing was traceable.
///
/// # Pipeline steps
///
/// 1. Normalize the configuration and decode the image
/// 2. Downsample to the working resolution (color mode)
/// 3. Detect the background color (unless configured)
/// 4. K-means++ clustering of foreground pixels (color mode)
/// 5. Palette post-processing and remap table (color mode)
/// 6. Build each layer mask and trace it
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for out-of-range configuration.
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is unrecognized.
pub fn process(image_bytes: &[u8], config: &PipelineConfig) -> Result<Outcome, PipelineError> {
    process_with_cancel(image_bytes, config, &CancelToken::new())
}

/// [`process`] with cooperative cancellation.
///
/// # Errors
///
/// As [`process`], plus [`PipelineError::Cancelled`] once `cancel` trips.
pub fn process_with_cancel(
    image_bytes: &[u8],
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<Outcome, PipelineError> {
    let mut rng = rng_for(config);
    let outcome = Pipeline::new(image_bytes.to_vec(), config.clone())
        .decode()?
        .downsample()
        .detect_background()
        .quantize(&mut rng, cancel)?
        .build_palette()
        .trace(cancel)?
        .into_outcome();
    log_outcome(&outcome);
    Ok(outcome)
}

/// Vectorize an already-decoded raster.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for out-of-range configuration
/// and [`PipelineError::Cancelled`] once `cancel` trips.
pub fn vectorize(
    image: RgbaImage,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<Outcome, PipelineError> {
    let mut rng = rng_for(config);
    vectorize_with_rng(image, config, &mut rng, cancel)
}

/// [`vectorize`] with a caller-supplied random source for K-means++.
///
/// # Errors
///
/// As [`vectorize`].
pub fn vectorize_with_rng<R: rand::Rng>(
    image: RgbaImage,
    config: &PipelineConfig,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<Outcome, PipelineError> {
    let outcome = Pipeline::from_image(image, config)?
        .downsample()
        .detect_background()
        .quantize(rng, cancel)?
        .build_palette()
        .trace(cancel)?
        .into_outcome();
    log_outcome(&outcome);
    Ok(outcome)
}

fn log_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Traced(result) => log::info!(
            "traced {} layers, {} curves ({}x{})",
            result.layers.len(),
            result.curve_count(),
            result.dimensions.width,
            result.dimensions.height
        ),
        Outcome::Untraceable(reason) => log::warn!("nothing to trace: {reason}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba([rgb[0], rgb[1], rgb[2], 255]))
    }

    #[test]
    fn process_empty_input() {
        let result = process(&[], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_corrupt_input() {
        let result = process(&[0xFF, 0x00], &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn tiny_black_square_traces_to_four_corners() {
        let config = PipelineConfig {
            mode: Mode::Black,
            black_level: 128.0,
            alpha_max: 0.0,
            ..PipelineConfig::default()
        };
        let outcome = process(&encode_png(&solid(2, 2, [0, 0, 0])), &config).unwrap();
        let result = outcome.traced().unwrap();
        assert_eq!(result.layers.len(), 1);
        let curves = &result.layers[0].curves;
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].len(), 4);
        assert_eq!(curves[0].corner_count(), 4);
    }

    #[test]
    fn solid_red_yields_one_full_layer() {
        let config = PipelineConfig {
            color_size: 1,
            background: Some(Rgb::WHITE),
            seed: Some(11),
            ..PipelineConfig::default()
        };
        let outcome = vectorize(solid(4, 4, [255, 0, 0]), &config, &CancelToken::new()).unwrap();
        let result = outcome.traced().unwrap();

        let palette = result.palette.as_ref().unwrap();
        assert_eq!(palette.len(), 1);
        let red = palette.entries[0].color;
        assert!(red.r >= 253 && red.g <= 2 && red.b <= 2, "{red}");
        assert!((palette.entries[0].share - 100.0).abs() < 1e-9);

        assert_eq!(result.layers.len(), 1);
        assert_eq!(result.layers[0].curves.len(), 1);
        assert_eq!(result.image_colors().background, "#ffffff");
    }

    #[test]
    fn all_background_is_untraceable() {
        let png = encode_png(&solid(8, 8, [255, 255, 255]));
        let outcome = process(&png, &PipelineConfig::default()).unwrap();
        assert_eq!(outcome, Outcome::Untraceable(Untraceable::NoForegroundColors));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let img = RgbaImage::from_fn(30, 30, |x, y| {
            if x < 10 {
                image::Rgba([255, 255, 255, 255])
            } else if y < 15 {
                image::Rgba([220, 30, 30, 255])
            } else {
                image::Rgba([30, 30, 220, 255])
            }
        });
        let config = PipelineConfig {
            seed: Some(5),
            background: Some(Rgb::WHITE),
            ..PipelineConfig::default()
        };
        let a = vectorize(img.clone(), &config, &CancelToken::new()).unwrap();
        let b = vectorize(img, &config, &CancelToken::new()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.traced().unwrap().layers.len(), 2);
    }

    #[test]
    fn downsampled_result_records_source_size() {
        let img = RgbaImage::from_fn(64, 64, |x, y| {
            if (16..48).contains(&x) && (16..48).contains(&y) {
                image::Rgba([0, 128, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        let config = PipelineConfig {
            max_side_length: 32,
            seed: Some(1),
            ..PipelineConfig::default()
        };
        let outcome = process(&encode_png(&img), &config).unwrap();
        let result = outcome.traced().unwrap();
        assert_eq!(result.dimensions.width, 32);
        assert_eq!(result.source_dimensions.width, 64);
        assert!((result.restore_scale() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cancelled_run_reports_cancellation() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let config = PipelineConfig {
            background: Some(Rgb::WHITE),
            ..PipelineConfig::default()
        };
        let result = vectorize(solid(4, 4, [255, 0, 0]), &config, &cancel);
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }
}
