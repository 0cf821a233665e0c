//! huetrace-export: SVG serialization for traced layers (sans-IO).
//!
//! Takes a [`huetrace_pipeline::ProcessResult`] and produces an SVG
//! document string.  Writing the string anywhere is the caller's job.

pub mod svg;

pub use svg::{ExportError, PathType, SvgOptions, build_path_data, to_svg};
