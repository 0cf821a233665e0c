//! Bitmap tracing: binary mask to closed Bezier outlines.
//!
//! The stages run per boundary path:
//!
//! 1. [`decompose`](decompose::decompose) walks mask boundaries into
//!    lattice paths.
//! 2. [`straight_runs`](polygon::straight_runs) and
//!    [`best_polygon`](polygon::best_polygon) find the optimal polygon.
//! 3. [`adjust_vertices`](vertex::adjust_vertices) moves its vertices to
//!    sub-pixel positions.
//! 4. [`smooth`](smooth::smooth) classifies corners and places Bezier
//!    control points.
//! 5. [`optimize`](optimize::optimize) merges runs of curve segments.

pub mod curve;
pub mod decompose;
mod geom;
pub mod optimize;
pub mod polygon;
pub mod smooth;
pub mod vertex;

use serde::{Deserialize, Serialize};

pub use curve::{Curve, Segment, SegmentKind};
pub use decompose::{Path, PathSign, TurnPolicy};

use crate::bitmap::Bitmap;
use crate::cancel::CancelToken;
use crate::types::PipelineError;

/// Parameters controlling how a mask is traced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceParams {
    /// Tie-break rule at ambiguous corners.
    pub turn_policy: TurnPolicy,
    /// Paths enclosing this many pixels or fewer are discarded.
    pub turd_size: u32,
    /// Corner threshold.
    pub alpha_max: f64,
    /// Merge Bezier runs.
    pub opt_curve: bool,
    /// Merge tolerance in pixels.
    pub opt_tolerance: f64,
}

impl Default for TraceParams {
    fn default() -> Self {
        Self {
            turn_policy: TurnPolicy::Minority,
            turd_size: 2,
            alpha_max: 1.0,
            opt_curve: true,
            opt_tolerance: 0.2,
        }
    }
}

/// Trace every outline in `bitmap`.
///
/// # Errors
///
/// Returns [`PipelineError::Cancelled`] if `cancel` trips.
pub fn trace_bitmap(
    bitmap: &Bitmap,
    params: &TraceParams,
    cancel: &CancelToken,
) -> Result<Vec<Curve>, PipelineError> {
    let paths = decompose::decompose(bitmap, params.turn_policy, params.turd_size, cancel)?;
    Ok(paths
        .iter()
        .map(|path| path_to_curve(path, params))
        .filter(|curve| !curve.is_empty())
        .collect())
}

/// Fit one boundary path.
#[must_use]
pub fn path_to_curve(path: &Path, params: &TraceParams) -> Curve {
    let sums = polygon::calc_sums(&path.points);
    let lon = polygon::straight_runs(&path.points);
    let polygon = polygon::best_polygon(&path.points, &sums, &lon);

    let mut vertices = vertex::adjust_vertices(&path.points, &sums, &polygon);
    if path.sign == PathSign::Negative {
        vertices.reverse();
    }

    let curve = smooth::smooth(&vertices, params.alpha_max);
    if params.opt_curve {
        optimize::optimize(&curve, params.opt_tolerance)
    } else {
        curve
    }
}
