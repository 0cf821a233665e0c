//! Sub-pixel vertex placement.
//!
//! Each polygon edge gets a best-fit line through the path points it
//! spans.  A vertex is then moved to the point minimizing the summed
//! squared distance to its two adjacent lines, constrained to the unit
//! square around the original lattice vertex.

use super::polygon::Sum;
use crate::types::Point;

/// How many times a singular system is regularized before giving up.
const REGULARIZE_ATTEMPTS: usize = 3;

/// Symmetric 3x3 quadratic form over homogeneous `(x, y, 1)`.
type Quad = [[f64; 3]; 3];

/// Adjusted vertices, one per polygon vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertices {
    /// Vertex positions in image coordinates.
    pub points: Vec<Point>,
    /// Vertices that fell back to the lattice point and must be corners.
    pub forced_corners: Vec<bool>,
}

impl Vertices {
    /// Flip orientation, keeping flags aligned with their points.
    pub fn reverse(&mut self) {
        self.points.reverse();
        self.forced_corners.reverse();
    }
}

/// Centroid and principal direction of the points `i..=j` (cyclic
/// indices, possibly outside `0..n`), relative to the first path point.
fn point_slope(sums: &[Sum], n: usize, i: isize, j: isize) -> (Point, Point) {
    #[allow(clippy::cast_possible_wrap)]
    let len = n as isize;
    let (mut i, mut j) = (i, j);
    let mut wraps = 0isize;
    while j >= len {
        j -= len;
        wraps += 1;
    }
    while i >= len {
        i -= len;
        wraps -= 1;
    }
    while j < 0 {
        j += len;
        wraps -= 1;
    }
    while i < 0 {
        i += len;
        wraps += 1;
    }

    #[allow(clippy::cast_sign_loss)]
    let (iu, ju) = (i as usize, j as usize);
    #[allow(clippy::cast_precision_loss)]
    let r = wraps as f64;
    let total = sums[n];
    let field = |f: fn(&Sum) -> f64| r.mul_add(f(&total), f(&sums[ju + 1]) - f(&sums[iu]));

    let x = field(|s| s.x);
    let y = field(|s| s.y);
    let x2 = field(|s| s.x2);
    let xy = field(|s| s.xy);
    let y2 = field(|s| s.y2);
    #[allow(clippy::cast_precision_loss)]
    let k = (j + 1 - i + wraps * len) as f64;

    let center = Point::new(x / k, y / k);

    let mut a = (x2 - x * x / k) / k;
    let b = (xy - x * y / k) / k;
    let mut c = (y2 - y * y / k) / k;

    let lambda2 = (a + c + (a - c).mul_add(a - c, 4.0 * b * b).sqrt()) / 2.0;
    a -= lambda2;
    c -= lambda2;

    let direction = if a.abs() >= c.abs() {
        let l = a.hypot(b);
        if l == 0.0 {
            Point::default()
        } else {
            Point::new(-b / l, a / l)
        }
    } else {
        let l = c.hypot(b);
        if l == 0.0 {
            Point::default()
        } else {
            Point::new(-c / l, b / l)
        }
    };

    (center, direction)
}

/// Squared distance form of the line through `center` along `direction`.
fn line_quad(center: Point, direction: Point) -> Quad {
    let d = direction.x.mul_add(direction.x, direction.y * direction.y);
    if d == 0.0 {
        return [[0.0; 3]; 3];
    }
    let v = [
        direction.y,
        -direction.x,
        direction.x.mul_add(center.y, -(direction.y * center.x)),
    ];
    let mut q = [[0.0; 3]; 3];
    for (l, row) in q.iter_mut().enumerate() {
        for (k, cell) in row.iter_mut().enumerate() {
            *cell = v[l] * v[k] / d;
        }
    }
    q
}

fn quad_form(q: &Quad, w: Point) -> f64 {
    let v = [w.x, w.y, 1.0];
    let mut sum = 0.0;
    for (l, row) in q.iter().enumerate() {
        for (k, cell) in row.iter().enumerate() {
            sum += v[l] * cell * v[k];
        }
    }
    sum
}

/// Stationary point of `q`, if its 2x2 block is invertible.
fn solve(q: &Quad) -> Option<Point> {
    let det = q[0][0].mul_add(q[1][1], -(q[0][1] * q[1][0]));
    if det == 0.0 {
        return None;
    }
    let w = Point::new(
        q[1][2].mul_add(q[0][1], -(q[0][2] * q[1][1])) / det,
        q[0][2].mul_add(q[1][0], -(q[1][2] * q[0][0])) / det,
    );
    (w.x.is_finite() && w.y.is_finite()).then_some(w)
}

/// Add a constraint line through `s` orthogonal to the degenerate
/// direction of `q`.
fn regularize(q: &mut Quad, s: Point) {
    let (v0, v1) = if q[0][0] > q[1][1] {
        (-q[0][1], q[0][0])
    } else if q[1][1] != 0.0 {
        (-q[1][1], q[1][0])
    } else {
        (1.0, 0.0)
    };
    let d = v0.mul_add(v0, v1 * v1);
    if d == 0.0 {
        return;
    }
    let v = [v0, v1, (-v1).mul_add(s.y, -(v0 * s.x))];
    for (l, row) in q.iter_mut().enumerate() {
        for (k, cell) in row.iter_mut().enumerate() {
            *cell += v[l] * v[k] / d;
        }
    }
}

/// Minimum of `q` over the unit square centered on `s`: the edge
/// intercepts of the axis-constrained minimizers and the four corners.
fn constrained_minimum(q: &Quad, s: Point) -> Point {
    let mut best = s;
    let mut min = quad_form(q, s);
    let consider = |w: Point, min: &mut f64, best: &mut Point| {
        let cand = quad_form(q, w);
        if cand < *min {
            *min = cand;
            *best = w;
        }
    };

    if q[0][0] != 0.0 {
        for z in [0.0, 1.0] {
            let wy = s.y - 0.5 + z;
            let wx = -q[0][1].mul_add(wy, q[0][2]) / q[0][0];
            if (wx - s.x).abs() <= 0.5 {
                consider(Point::new(wx, wy), &mut min, &mut best);
            }
        }
    }
    if q[1][1] != 0.0 {
        for z in [0.0, 1.0] {
            let wx = s.x - 0.5 + z;
            let wy = -q[1][0].mul_add(wx, q[1][2]) / q[1][1];
            if (wy - s.y).abs() <= 0.5 {
                consider(Point::new(wx, wy), &mut min, &mut best);
            }
        }
    }
    for l in [0.0, 1.0] {
        for k in [0.0, 1.0] {
            consider(Point::new(s.x - 0.5 + l, s.y - 0.5 + k), &mut min, &mut best);
        }
    }
    best
}

/// Place each polygon vertex `polygon[i]` at its sub-pixel optimum.
#[must_use]
pub fn adjust_vertices(points: &[(i32, i32)], sums: &[Sum], polygon: &[usize]) -> Vertices {
    let n = points.len();
    let m = polygon.len();
    if m == 0 {
        return Vertices {
            points: Vec::new(),
            forced_corners: Vec::new(),
        };
    }
    let (x0, y0) = (f64::from(points[0].0), f64::from(points[0].1));

    #[allow(clippy::cast_possible_wrap)]
    let quads: Vec<Quad> = (0..m)
        .map(|i| {
            let start = polygon[i];
            let next = polygon[(i + 1) % m];
            let end = (next + n - start) % n + start;
            let (center, direction) = point_slope(sums, n, start as isize, end as isize);
            line_quad(center, direction)
        })
        .collect();

    let mut adjusted = Vec::with_capacity(m);
    let mut forced = Vec::with_capacity(m);

    for i in 0..m {
        let (px, py) = points[polygon[i]];
        let s = Point::new(f64::from(px) - x0, f64::from(py) - y0);

        let prev = &quads[(i + m - 1) % m];
        let mut q = [[0.0; 3]; 3];
        for (l, row) in q.iter_mut().enumerate() {
            for (k, cell) in row.iter_mut().enumerate() {
                *cell = prev[l][k] + quads[i][l][k];
            }
        }

        let mut solution = None;
        for _ in 0..=REGULARIZE_ATTEMPTS {
            if let Some(w) = solve(&q) {
                solution = Some(w);
                break;
            }
            regularize(&mut q, s);
        }

        let Some(w) = solution else {
            log::trace!("vertex {i} stayed singular, keeping lattice point");
            adjusted.push(Point::new(f64::from(px), f64::from(py)));
            forced.push(true);
            continue;
        };

        let local = if (w.x - s.x).abs() <= 0.5 && (w.y - s.y).abs() <= 0.5 {
            w
        } else {
            constrained_minimum(&q, s)
        };
        adjusted.push(Point::new(local.x + x0, local.y + y0));
        forced.push(false);
    }

    Vertices {
        points: adjusted,
        forced_corners: forced,
    }
}

#[cfg(test)]
mod tests {
    use super::super::polygon::{best_polygon, calc_sums, straight_runs};
    use super::*;

    fn square_2x2() -> Vec<(i32, i32)> {
        vec![(0, 0), (0, 1), (0, 2), (1, 2), (2, 2), (2, 1), (2, 0), (1, 0)]
    }

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn square_vertices_land_on_corners() {
        let points = square_2x2();
        let sums = calc_sums(&points);
        let polygon = best_polygon(&points, &sums, &straight_runs(&points));
        let vertices = adjust_vertices(&points, &sums, &polygon);
        let expected = [(0.0, 0.0), (0.0, 2.0), (2.0, 2.0), (2.0, 0.0)];
        assert_eq!(vertices.points.len(), 4);
        for (v, (x, y)) in vertices.points.iter().zip(expected) {
            assert!(close(*v, Point::new(x, y)), "{v:?} vs ({x}, {y})");
        }
        assert!(vertices.forced_corners.iter().all(|&f| !f));
    }

    #[test]
    fn horizontal_run_fits_horizontal_line() {
        let points = [(0, 0), (1, 0), (2, 0), (3, 0)];
        let sums = calc_sums(&points);
        let (center, direction) = point_slope(&sums, 4, 0, 3);
        assert!(close(center, Point::new(1.5, 0.0)));
        assert!(direction.y.abs() < 1e-12);
        assert!((direction.x.abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn parallel_lines_need_regularization() {
        // Two copies of the line y = 0: singular, solved after one
        // regularization through s.
        let q = line_quad(Point::new(0.0, 0.0), Point::new(1.0, 0.0));
        let mut sum = [[0.0; 3]; 3];
        for l in 0..3 {
            for k in 0..3 {
                sum[l][k] = 2.0 * q[l][k];
            }
        }
        assert!(solve(&sum).is_none());
        regularize(&mut sum, Point::new(3.0, 0.0));
        let w = solve(&sum).unwrap_or_default();
        assert!(close(w, Point::new(3.0, 0.0)), "{w:?}");
    }

    #[test]
    fn empty_polygon_has_no_vertices() {
        let vertices = adjust_vertices(&[], &[Sum::default()], &[]);
        assert!(vertices.points.is_empty());
    }
}
