//! Closed piecewise-cubic outlines.

use serde::{Deserialize, Serialize};

use crate::types::Point;

/// How a segment reaches its end point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    /// Two straight lines meeting at [`Segment::vertex`].
    Corner,
    /// One cubic Bezier.
    Curve,
}

/// One segment of a closed [`Curve`].
///
/// A segment starts at the end point of the previous segment (the curve
/// wraps around).  For [`SegmentKind::Curve`], `controls` holds the two
/// Bezier control points followed by the end point.  For
/// [`SegmentKind::Corner`], only `controls[1]` (equal to `vertex`) and
/// `controls[2]` (the end point) are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment shape.
    pub kind: SegmentKind,
    /// Control points; `controls[2]` is the end point.
    pub controls: [Point; 3],
    /// Polygon vertex this segment bends around.
    pub vertex: Point,
    /// Clamped smoothness used for the control points.
    pub alpha: f64,
    /// Raw smoothness before clamping.
    pub alpha0: f64,
    /// Position of the end point along the adjacent edge.
    pub beta: f64,
}

impl Segment {
    /// Where this segment ends.
    #[must_use]
    pub const fn end(&self) -> Point {
        self.controls[2]
    }
}

/// A closed outline made of corner and Bezier segments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Curve {
    segments: Vec<Segment>,
}

impl Curve {
    /// Wrap a segment list.
    #[must_use]
    pub const fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// The segments in drawing order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of segments.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the curve has no segments.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The point drawing starts from: the end of the last segment.
    #[must_use]
    pub fn start(&self) -> Option<Point> {
        self.segments.last().map(Segment::end)
    }

    /// Number of corner segments.
    #[must_use]
    pub fn corner_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.kind == SegmentKind::Corner)
            .count()
    }

    /// Whether every coordinate is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.segments.iter().all(|s| {
            s.controls
                .iter()
                .chain(std::iter::once(&s.vertex))
                .all(|p| p.x.is_finite() && p.y.is_finite())
        })
    }
}
