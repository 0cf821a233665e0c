//! huetrace: raster image in, color-layered SVG out.
//!
//! Runs the vectorization pipeline on one image file and writes the SVG
//! document.  Optional per-stage diagnostics report timings and counts,
//! which helps when tuning the quantization and tracing parameters.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin huetrace -- [OPTIONS] <INPUT>
//! ```
//!
//! Exit status is 0 on success, 1 on any input or pipeline failure, and
//! 2 when the image holds nothing traceable (no SVG is written).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use huetrace_export::SvgOptions;
use huetrace_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use huetrace_pipeline::{CancelToken, Outcome, PipelineConfig, ProcessResult, Rgb};

/// Exit status for images with nothing to trace.
const EXIT_UNTRACEABLE: u8 = 2;

/// Convert a raster image into a color-layered SVG.
///
/// Colors are quantized with K-means++ and each palette color is traced
/// into closed Bezier outlines.  `--mode black` traces a single
/// monochrome mask instead.
#[derive(Parser)]
#[command(name = "huetrace", version)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Where to write the SVG.  Defaults to the input path with an
    /// `.svg` extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Color layers or a single monochrome mask.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_MODE)]
    mode: ModeArg,

    /// Maximum number of colors in the final palette.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_COLOR_SIZE)]
    color_size: usize,

    /// Requested K-means cluster count (reconciled with --color-size).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLUSTERS_NUM)]
    clusters_num: usize,

    /// Cluster in RGB instead of CIE Lab.
    #[arg(long)]
    rgb: bool,

    /// Keep hue-similar palette colors separate.
    #[arg(long)]
    no_merge_hue: bool,

    /// Leave the background out of the document.
    #[arg(long)]
    remove_background: bool,

    /// Fixed background color (`#rrggbb`) instead of detecting it.
    #[arg(long)]
    background: Option<Rgb>,

    /// Longest side of the working image in color mode.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_SIDE_LENGTH, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    max_side_length: u32,

    /// Resampling filter for the working image.
    #[arg(long, value_enum, default_value_t = FilterArg::Triangle)]
    downsample_filter: FilterArg,

    /// Monochrome mask derivation.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_BITMAP_TYPE)]
    bitmap_type: BitmapTypeArg,

    /// Luma threshold for the monochrome mask.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLACK_LEVEL)]
    black_level: f64,

    /// Background distance threshold for `--bitmap-type bg-color`.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BGCOLOR_LEVEL)]
    bgcolor_level: f64,

    /// Background distance threshold for `--bitmap-type balance`.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BALANCE_LEVEL)]
    balance_level: f64,

    /// How ambiguous pixel corners are resolved while tracing.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_TURN_POLICY)]
    turn_policy: TurnPolicyArg,

    /// Drop outlines enclosing this many pixels or fewer.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_TURD_SIZE)]
    turd_size: u32,

    /// Corner threshold; 0 makes every vertex a corner.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_ALPHA_MAX)]
    alpha_max: f64,

    /// Keep every Bezier segment instead of merging runs.
    #[arg(long)]
    no_opt_curve: bool,

    /// Allowed error when merging Bezier runs.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_OPT_TOLERANCE)]
    opt_tolerance: f64,

    /// Seed for K-means++ initialization (random when omitted).
    #[arg(long)]
    seed: Option<u64>,

    /// Give up after this many milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Output size as a multiple of the input size.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Fill shapes or stroke their outlines.
    #[arg(long, value_enum, default_value_t = PathTypeArg::Fill)]
    path_type: PathTypeArg,

    /// Paint for monochrome output.
    #[arg(long, default_value = SvgOptions::DEFAULT_FILL_COLOR)]
    fill_color: String,

    /// Print the background and palette colors.
    #[arg(long)]
    colors: bool,

    /// Print the per-stage diagnostics report.
    #[arg(long)]
    diagnostics: bool,

    /// Print diagnostics as JSON instead of the report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// One layer per palette color.
    Color,
    /// A single monochrome layer.
    Black,
}

#[derive(Clone, Copy, ValueEnum)]
enum BitmapTypeArg {
    /// Luma below --black-level.
    BlackLevel,
    /// Far from the background color.
    BgColor,
    /// Dark or far from the background color.
    Balance,
}

#[derive(Clone, Copy, ValueEnum)]
enum TurnPolicyArg {
    Black,
    White,
    Left,
    Right,
    Minority,
    Majority,
}

/// Downsample resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum FilterArg {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic Catmull-Rom.
    CatmullRom,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

#[derive(Clone, Copy, ValueEnum)]
enum PathTypeArg {
    /// Filled shapes.
    Fill,
    /// Stroked outlines.
    Stroke,
}

const fn mode_from_pipeline(mode: huetrace_pipeline::Mode) -> ModeArg {
    match mode {
        huetrace_pipeline::Mode::Color => ModeArg::Color,
        huetrace_pipeline::Mode::Black => ModeArg::Black,
    }
}

const fn bitmap_type_from_pipeline(kind: huetrace_pipeline::BitmapType) -> BitmapTypeArg {
    match kind {
        huetrace_pipeline::BitmapType::BlackLevel => BitmapTypeArg::BlackLevel,
        huetrace_pipeline::BitmapType::BgColor => BitmapTypeArg::BgColor,
        huetrace_pipeline::BitmapType::Balance => BitmapTypeArg::Balance,
    }
}

const fn turn_policy_from_pipeline(policy: huetrace_pipeline::TurnPolicy) -> TurnPolicyArg {
    match policy {
        huetrace_pipeline::TurnPolicy::Black => TurnPolicyArg::Black,
        huetrace_pipeline::TurnPolicy::White => TurnPolicyArg::White,
        huetrace_pipeline::TurnPolicy::Left => TurnPolicyArg::Left,
        huetrace_pipeline::TurnPolicy::Right => TurnPolicyArg::Right,
        huetrace_pipeline::TurnPolicy::Minority => TurnPolicyArg::Minority,
        huetrace_pipeline::TurnPolicy::Majority => TurnPolicyArg::Majority,
    }
}

// CLI defaults derived from the pipeline's so the two cannot silently
// diverge.
const CLI_DEFAULT_MODE: ModeArg = mode_from_pipeline(PipelineConfig::DEFAULT_MODE);
const CLI_DEFAULT_BITMAP_TYPE: BitmapTypeArg =
    bitmap_type_from_pipeline(PipelineConfig::DEFAULT_BITMAP_TYPE);
const CLI_DEFAULT_TURN_POLICY: TurnPolicyArg =
    turn_policy_from_pipeline(PipelineConfig::DEFAULT_TURN_POLICY);

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.  `--seed` still applies when
/// the JSON carries no seed of its own.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        let mut config: PipelineConfig = serde_json::from_str(json)
            .map_err(|e| format!("Error parsing --config-json: {e}"))?;
        config.seed = config.seed.or(cli.seed);
        return Ok(config);
    }

    Ok(PipelineConfig {
        mode: match cli.mode {
            ModeArg::Color => huetrace_pipeline::Mode::Color,
            ModeArg::Black => huetrace_pipeline::Mode::Black,
        },
        color_size: cli.color_size,
        clusters_num: cli.clusters_num,
        kmeans_use_lab_color: !cli.rgb,
        merge_color_hue: !cli.no_merge_hue,
        remove_background: cli.remove_background,
        background: cli.background,
        max_side_length: cli.max_side_length,
        downsample_filter: match cli.downsample_filter {
            FilterArg::Nearest => huetrace_pipeline::DownsampleFilter::Nearest,
            FilterArg::Triangle => huetrace_pipeline::DownsampleFilter::Triangle,
            FilterArg::CatmullRom => huetrace_pipeline::DownsampleFilter::CatmullRom,
            FilterArg::Lanczos3 => huetrace_pipeline::DownsampleFilter::Lanczos3,
        },
        bitmap_type: match cli.bitmap_type {
            BitmapTypeArg::BlackLevel => huetrace_pipeline::BitmapType::BlackLevel,
            BitmapTypeArg::BgColor => huetrace_pipeline::BitmapType::BgColor,
            BitmapTypeArg::Balance => huetrace_pipeline::BitmapType::Balance,
        },
        black_level: cli.black_level,
        bgcolor_level: cli.bgcolor_level,
        balance_level: cli.balance_level,
        turn_policy: match cli.turn_policy {
            TurnPolicyArg::Black => huetrace_pipeline::TurnPolicy::Black,
            TurnPolicyArg::White => huetrace_pipeline::TurnPolicy::White,
            TurnPolicyArg::Left => huetrace_pipeline::TurnPolicy::Left,
            TurnPolicyArg::Right => huetrace_pipeline::TurnPolicy::Right,
            TurnPolicyArg::Minority => huetrace_pipeline::TurnPolicy::Minority,
            TurnPolicyArg::Majority => huetrace_pipeline::TurnPolicy::Majority,
        },
        turd_size: cli.turd_size,
        alpha_max: cli.alpha_max,
        opt_curve: !cli.no_opt_curve,
        opt_tolerance: cli.opt_tolerance,
        seed: cli.seed,
        ..PipelineConfig::default()
    })
}

fn svg_options_from_cli(cli: &Cli, config: &PipelineConfig) -> SvgOptions {
    SvgOptions {
        scale: cli.scale,
        path_type: match cli.path_type {
            PathTypeArg::Fill => huetrace_export::PathType::Fill,
            PathTypeArg::Stroke => huetrace_export::PathType::Stroke,
        },
        fill_color: cli.fill_color.clone(),
        title: cli
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_owned),
        description: Some(format!(
            "huetrace mode={} color_size={} seed={}",
            config.mode,
            config.color_size,
            config
                .seed
                .map_or_else(|| "random".to_owned(), |s| s.to_string()),
        )),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "read {} ({} bytes)",
        cli.input.display(),
        image_bytes.len()
    );
    log::debug!("config: {config:?}");

    let cancel = cli
        .timeout_ms
        .map_or_else(CancelToken::new, |ms| {
            CancelToken::with_timeout(Duration::from_millis(ms))
        });

    let outcome = if cli.diagnostics || cli.json {
        match huetrace_pipeline::diagnostics::process_with_diagnostics(
            &image_bytes,
            &config,
            &cancel,
            &StdClock,
        ) {
            Ok((outcome, diagnostics)) => {
                if let Err(msg) = print_diagnostics(&diagnostics, cli.json) {
                    eprintln!("{msg}");
                    return ExitCode::FAILURE;
                }
                outcome
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        match huetrace_pipeline::process_with_cancel(&image_bytes, &config, &cancel) {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }
    };

    let result = match outcome {
        Outcome::Traced(result) => result,
        Outcome::Untraceable(reason) => {
            eprintln!("Nothing to trace in {}: {reason}", cli.input.display());
            return ExitCode::from(EXIT_UNTRACEABLE);
        }
    };

    if cli.colors {
        print_colors(&result);
    }

    let options = svg_options_from_cli(&cli, &config);
    let svg = match huetrace_export::to_svg(&result, &options) {
        Ok(svg) => svg,
        Err(e) => {
            eprintln!("Export error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.input));
    match std::fs::write(&output, &svg) {
        Ok(()) => {
            log::info!("SVG written to {} ({} bytes)", output.display(), svg.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error writing SVG to {}: {e}", output.display());
            ExitCode::FAILURE
        }
    }
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("svg")
}

fn print_diagnostics(diagnostics: &PipelineDiagnostics, json: bool) -> Result<(), String> {
    if json {
        let text = serde_json::to_string_pretty(diagnostics)
            .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
        println!("{text}");
    } else {
        println!("{}", diagnostics.report());
    }
    Ok(())
}

fn print_colors(result: &ProcessResult) {
    let colors = result.image_colors();
    println!("background: {}", colors.background);
    for (i, color) in colors.colors.iter().enumerate() {
        println!("color {}: {color}", i + 1);
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
