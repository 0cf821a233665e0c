//! Corner detection and Bezier control point placement.

use super::curve::{Curve, Segment, SegmentKind};
use super::geom::{ddenom, dpara};
use super::vertex::Vertices;
use crate::types::Point;

/// Smoothness below this is raised so curves never collapse to lines.
const ALPHA_MIN: f64 = 0.55;

/// Smoothness reported when the neighbours coincide.
const ALPHA_DEGENERATE: f64 = 4.0 / 3.0;

/// Turn a closed polygon into segments, one per vertex.
///
/// Segment `j` bends around vertex `j` and ends at the midpoint of the
/// edge to vertex `j + 1`.  Vertices whose smoothness estimate reaches
/// `alpha_max`, and vertices flagged as forced corners, become
/// [`SegmentKind::Corner`].
#[must_use]
pub fn smooth(vertices: &Vertices, alpha_max: f64) -> Curve {
    let v = &vertices.points;
    let m = v.len();
    let mut segments = Vec::with_capacity(m);

    for j in 0..m {
        let i = (j + m - 1) % m;
        let k = (j + 1) % m;
        let end = Point::lerp(v[k], v[j], 0.5);

        let denom = ddenom(v[i], v[k]);
        let alpha0 = if denom == 0.0 {
            ALPHA_DEGENERATE
        } else {
            let dd = (dpara(v[i], v[j], v[k]) / denom).abs();
            let alpha = if dd > 1.0 { 1.0 - 1.0 / dd } else { 0.0 };
            alpha / 0.75
        };

        let forced = vertices.forced_corners.get(j).copied().unwrap_or(false);
        let segment = if forced || alpha0 >= alpha_max {
            Segment {
                kind: SegmentKind::Corner,
                controls: [v[j], v[j], end],
                vertex: v[j],
                alpha: alpha0,
                alpha0,
                beta: 0.5,
            }
        } else {
            let alpha = alpha0.clamp(ALPHA_MIN, 1.0);
            let lambda = 0.5f64.mul_add(alpha, 0.5);
            Segment {
                kind: SegmentKind::Curve,
                controls: [
                    Point::lerp(v[i], v[j], lambda),
                    Point::lerp(v[k], v[j], lambda),
                    end,
                ],
                vertex: v[j],
                alpha,
                alpha0,
                beta: 0.5,
            }
        };
        segments.push(segment);
    }

    Curve::new(segments)
}
