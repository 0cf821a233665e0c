//! Merging runs of Bezier segments into single curves.
//!
//! A dynamic program over the closed curve finds the fewest segments that
//! reproduce it within `tolerance`.  A run `i..j` can merge only when it
//! turns consistently in one direction by less than a half circle; the
//! merged Bezier is sized to preserve the run's area and must pass near
//! every original vertex and edge.

use super::curve::{Curve, Segment, SegmentKind};
use super::geom::{bezier, cprod, dpara, iprod, iprod1, sign_f, tangent};
use crate::types::Point;

/// Cosine bound for the accumulated turning angle of a merge run
/// (just under 179 degrees).
const TURN_COS_LIMIT: f64 = -0.999_847_695_156;

/// A candidate merged segment.
#[derive(Debug, Clone, Copy)]
struct Merge {
    penalty: f64,
    controls: [Point; 2],
    t: f64,
    s: f64,
    alpha: f64,
}

struct Context<'a> {
    segments: &'a [Segment],
    vertices: Vec<Point>,
    convexity: Vec<i32>,
    area: Vec<f64>,
    tolerance: f64,
}

impl Context<'_> {
    fn len(&self) -> usize {
        self.segments.len()
    }

    fn end(&self, i: usize) -> Point {
        self.segments[i].end()
    }

    /// Try to replace segments `i+1..=j` (cyclic) with one Bezier.
    fn merge(&self, i: usize, j: usize) -> Option<Merge> {
        let m = self.len();
        let v = &self.vertices;
        if i == j {
            return None;
        }

        let i1 = (i + 1) % m;
        let conv = self.convexity[i1];
        if conv == 0 {
            return None;
        }

        // Consistent convexity and bounded total turn.
        let d = v[i].distance(v[i1]);
        let mut k = i1;
        while k != j {
            let k1 = (k + 1) % m;
            let k2 = (k + 2) % m;
            if self.convexity[k1] != conv {
                return None;
            }
            if sign_f(cprod(v[i], v[i1], v[k1], v[k2])) != conv {
                return None;
            }
            if iprod1(v[i], v[i1], v[k1], v[k2]) < d * v[k1].distance(v[k2]) * TURN_COS_LIMIT {
                return None;
            }
            k = k1;
        }

        let p0 = self.end(i);
        let p1 = v[i1];
        let p2 = v[j];
        let p3 = self.end(j);

        let mut area = self.area[j] - self.area[i];
        area -= dpara(v[0], self.end(i), self.end(j)) / 2.0;
        if i >= j {
            area += self.area[m];
        }

        let a1 = dpara(p0, p1, p2);
        let a2 = dpara(p0, p1, p3);
        let a3 = dpara(p0, p2, p3);
        let a4 = a1 + a3 - a2;

        #[allow(clippy::float_cmp)]
        if a2 == a1 {
            return None;
        }

        let t = a3 / (a3 - a4);
        let s = a2 / (a2 - a1);
        let a = a2 * t / 2.0;
        if a == 0.0 {
            return None;
        }

        let r = area / a;
        let discriminant = 4.0 - r / 0.3;
        if discriminant < 0.0 {
            return None;
        }
        let alpha = 2.0 - discriminant.sqrt();

        let c0 = Point::lerp(p0, p1, t * alpha);
        let c1 = Point::lerp(p3, p2, s * alpha);
        let mut penalty = 0.0;

        // Original vertices must sit close to the new curve.
        let mut k = i1;
        while k != j {
            let k1 = (k + 1) % m;
            let tt = tangent(p0, c0, c1, p3, v[k], v[k1])?;
            let pt = bezier(tt, p0, c0, c1, p3);
            let d = v[k].distance(v[k1]);
            if d == 0.0 {
                return None;
            }
            let d1 = dpara(v[k], v[k1], pt) / d;
            if d1.abs() > self.tolerance {
                return None;
            }
            if iprod(v[k], v[k1], pt) < 0.0 || iprod(v[k1], v[k], pt) < 0.0 {
                return None;
            }
            penalty += d1 * d1;
            k = k1;
        }

        // And the original curve must not bulge past it.
        let mut k = i;
        while k != j {
            let k1 = (k + 1) % m;
            let (e0, e1) = (self.end(k), self.end(k1));
            let tt = tangent(p0, c0, c1, p3, e0, e1)?;
            let pt = bezier(tt, p0, c0, c1, p3);
            let d = e0.distance(e1);
            if d == 0.0 {
                return None;
            }
            let mut d1 = dpara(e0, e1, pt) / d;
            let mut d2 = dpara(e0, e1, v[k1]) / d * 0.75 * self.segments[k1].alpha;
            if d2 < 0.0 {
                d1 = -d1;
                d2 = -d2;
            }
            if d1 < d2 - self.tolerance {
                return None;
            }
            if d1 < d2 {
                penalty += (d1 - d2) * (d1 - d2);
            }
            k = k1;
        }

        (penalty.is_finite() && alpha.is_finite()).then_some(Merge {
            penalty,
            controls: [c0, c1],
            t,
            s,
            alpha,
        })
    }
}

/// Merge Bezier runs of `curve` where `tolerance` allows.
///
/// Never returns more segments than it was given.
#[must_use]
pub fn optimize(curve: &Curve, tolerance: f64) -> Curve {
    let segments = curve.segments();
    let m = segments.len();
    if m == 0 {
        return curve.clone();
    }

    let vertices: Vec<Point> = segments.iter().map(|s| s.vertex).collect();

    let convexity: Vec<i32> = (0..m)
        .map(|i| match segments[i].kind {
            SegmentKind::Curve => sign_f(dpara(
                vertices[(i + m - 1) % m],
                vertices[i],
                vertices[(i + 1) % m],
            )),
            SegmentKind::Corner => 0,
        })
        .collect();

    // Cumulative signed area up to each segment end.
    let mut area = vec![0.0; m + 1];
    let mut acc = 0.0;
    let origin = vertices[0];
    for i in 0..m {
        let i1 = (i + 1) % m;
        if segments[i1].kind == SegmentKind::Curve {
            let alpha = segments[i1].alpha;
            acc += 0.3 * alpha * (4.0 - alpha) * dpara(segments[i].end(), vertices[i1], segments[i1].end())
                / 2.0;
            acc += dpara(origin, segments[i].end(), segments[i1].end()) / 2.0;
        }
        area[i + 1] = acc;
    }

    let ctx = Context {
        segments,
        vertices,
        convexity,
        area,
        tolerance,
    };

    let mut prev = vec![0usize; m + 1];
    let mut pen = vec![0.0f64; m + 1];
    let mut len = vec![0usize; m + 1];
    let mut merges: Vec<Option<Merge>> = vec![None; m + 1];

    for j in 1..=m {
        prev[j] = j - 1;
        pen[j] = pen[j - 1];
        len[j] = len[j - 1] + 1;

        for i in (0..j.saturating_sub(1)).rev() {
            let Some(merge) = ctx.merge(i, j % m) else {
                break;
            };
            if len[j] > len[i] + 1 || (len[j] == len[i] + 1 && pen[j] > pen[i] + merge.penalty) {
                prev[j] = i;
                pen[j] = pen[i] + merge.penalty;
                len[j] = len[i] + 1;
                merges[j] = Some(merge);
            }
        }
    }

    let om = len[m];
    let mut out: Vec<Segment> = Vec::with_capacity(om);
    let mut s = vec![1.0f64; om];
    let mut t = vec![1.0f64; om];

    let mut j = m;
    for slot in (0..om).rev() {
        let source = segments[j % m];
        match merges[j].filter(|_| prev[j] != j - 1) {
            Some(merge) => {
                out.push(Segment {
                    kind: SegmentKind::Curve,
                    controls: [merge.controls[0], merge.controls[1], source.end()],
                    vertex: Point::lerp(source.end(), ctx.vertices[j % m], merge.s),
                    alpha: merge.alpha,
                    alpha0: merge.alpha,
                    beta: 0.5,
                });
                s[slot] = merge.s;
                t[slot] = merge.t;
            }
            None => out.push(source),
        }
        j = prev[j];
    }
    out.reverse();

    for i in 0..om {
        let i1 = (i + 1) % om;
        let denom = s[i] + t[i1];
        out[i].beta = if denom == 0.0 { 0.5 } else { s[i] / denom };
    }

    log::trace!("optimized curve: {m} -> {om} segments");
    Curve::new(out)
}

#[cfg(test)]
mod tests {
    use super::super::smooth::smooth;
    use super::super::vertex::Vertices;
    use super::*;

    fn polygon_curve(points: Vec<Point>, alpha_max: f64) -> Curve {
        let n = points.len();
        smooth(
            &Vertices {
                points,
                forced_corners: vec![false; n],
            },
            alpha_max,
        )
    }

    fn regular_polygon(sides: usize, radius: f64) -> Vec<Point> {
        #[allow(clippy::cast_precision_loss)]
        (0..sides)
            .map(|k| {
                let theta = std::f64::consts::TAU * k as f64 / sides as f64;
                Point::new(radius.mul_add(theta.cos(), 50.0), radius.mul_add(theta.sin(), 50.0))
            })
            .collect()
    }

    #[test]
    fn corners_are_never_merged() {
        let curve = polygon_curve(
            vec![
                Point::new(0.0, 0.0),
                Point::new(0.0, 10.0),
                Point::new(10.0, 10.0),
                Point::new(10.0, 0.0),
            ],
            1.0,
        );
        assert_eq!(curve.corner_count(), 4);
        assert_eq!(optimize(&curve, 0.2), curve);
    }

    #[test]
    fn smooth_circle_loses_segments() {
        let curve = polygon_curve(regular_polygon(16, 20.0), 1.0);
        assert_eq!(curve.corner_count(), 0);
        let optimized = optimize(&curve, 0.2);
        assert!(optimized.len() < curve.len(), "{} segments", optimized.len());
        assert!(optimized.is_finite());
    }

    #[test]
    fn zero_tolerance_never_adds_segments() {
        let curve = polygon_curve(regular_polygon(12, 8.0), 1.0);
        let optimized = optimize(&curve, 0.0);
        assert!(optimized.len() <= curve.len());
        assert!(optimized.is_finite());
    }

    #[test]
    fn empty_curve_is_unchanged() {
        assert!(optimize(&Curve::default(), 0.2).is_empty());
    }
}
