//! Optimal polygon approximation of a boundary path.
//!
//! [`straight_runs`] computes, for every path point, how far the path
//! can be followed while staying within a unit corridor of a straight
//! line.  [`best_polygon`] then picks the polygon with the fewest
//! vertices drawn from those runs, breaking ties by the smallest total
//! deviation.

use super::geom::{cyclic, modulo, sign, xprod};

/// Prefix sums of point coordinates relative to the first path point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sum {
    /// Sum of x.
    pub x: f64,
    /// Sum of y.
    pub y: f64,
    /// Sum of x*y.
    pub xy: f64,
    /// Sum of x^2.
    pub x2: f64,
    /// Sum of y^2.
    pub y2: f64,
}

/// `n + 1` prefix sums for a path of `n` points.
#[must_use]
pub fn calc_sums(points: &[(i32, i32)]) -> Vec<Sum> {
    let Some(&(x0, y0)) = points.first() else {
        return vec![Sum::default()];
    };
    let mut sums = Vec::with_capacity(points.len() + 1);
    let mut acc = Sum::default();
    sums.push(acc);
    for &(px, py) in points {
        let x = f64::from(px - x0);
        let y = f64::from(py - y0);
        acc.x += x;
        acc.y += y;
        acc.xy = x.mul_add(y, acc.xy);
        acc.x2 = x.mul_add(x, acc.x2);
        acc.y2 = y.mul_add(y, acc.y2);
        sums.push(acc);
    }
    sums
}

/// Index into the four-direction counter for a unit axis step.
const fn direction(dx: i64, dy: i64) -> usize {
    match (dx, dy) {
        (1, _) => 3,
        (-1, _) => 0,
        (_, 1) => 2,
        _ => 1,
    }
}

fn diff(points: &[(i32, i32)], a: usize, b: usize) -> (i64, i64) {
    (
        i64::from(points[a].0) - i64::from(points[b].0),
        i64::from(points[a].1) - i64::from(points[b].1),
    )
}

/// For every point `i`, the furthest index `lon[i]` such that the path
/// from `i` to `lon[i]` is straight.
#[must_use]
pub fn straight_runs(points: &[(i32, i32)]) -> Vec<usize> {
    let n = points.len();
    if n == 0 {
        return Vec::new();
    }

    // next corner: the furthest index still collinear with i
    let mut next_corner = vec![0usize; n];
    let mut k = 0;
    for i in (0..n).rev() {
        if points[i].0 != points[k].0 && points[i].1 != points[k].1 {
            k = i + 1;
        }
        next_corner[i] = k;
    }

    let mut pivot = vec![0usize; n];
    for i in (0..n).rev() {
        let mut counts = [0u32; 4];
        let (sx, sy) = diff(points, (i + 1) % n, i);
        counts[direction(sx, sy)] += 1;

        let mut constraint = [(0i64, 0i64); 2];
        let mut k = next_corner[i];
        let mut k1 = i;
        let mut found = false;

        loop {
            let (dx, dy) = diff(points, k, k1);
            counts[direction(sign(dx), sign(dy))] += 1;

            if counts.iter().all(|&c| c > 0) {
                pivot[i] = k1;
                found = true;
                break;
            }

            let cur = diff(points, k, i);
            if xprod(constraint[0], cur) < 0 || xprod(constraint[1], cur) > 0 {
                break;
            }

            if cur.0.abs() > 1 || cur.1.abs() > 1 {
                let off = (
                    cur.0 + if cur.1 >= 0 && (cur.1 > 0 || cur.0 < 0) { 1 } else { -1 },
                    cur.1 + if cur.0 <= 0 && (cur.0 < 0 || cur.1 < 0) { 1 } else { -1 },
                );
                if xprod(constraint[0], off) >= 0 {
                    constraint[0] = off;
                }
                let off = (
                    cur.0 + if cur.1 <= 0 && (cur.1 < 0 || cur.0 < 0) { 1 } else { -1 },
                    cur.1 + if cur.0 >= 0 && (cur.0 > 0 || cur.1 < 0) { 1 } else { -1 },
                );
                if xprod(constraint[1], off) <= 0 {
                    constraint[1] = off;
                }
            }

            k1 = k;
            k = next_corner[k1];
            if !cyclic(k, i, k1) {
                break;
            }
        }

        if !found {
            let (ddx, ddy) = diff(points, k, k1);
            let dk = (sign(ddx), sign(ddy));
            let cur = diff(points, k1, i);

            let a = xprod(constraint[0], cur);
            let b = xprod(constraint[0], dk);
            let c = xprod(constraint[1], cur);
            let d = xprod(constraint[1], dk);

            let mut j = 10_000_000i64;
            if b < 0 {
                j = a.div_euclid(-b);
            }
            if d > 0 {
                j = j.min((-c).div_euclid(d));
            }
            let target = i64::try_from(k1).unwrap_or(0) + j;
            pivot[i] = modulo(isize::try_from(target).unwrap_or(0), n);
        }
    }

    let mut lon = vec![0usize; n];
    let mut j = pivot[n - 1];
    lon[n - 1] = j;
    for i in (0..n - 1).rev() {
        if cyclic(i + 1, pivot[i], j) {
            j = pivot[i];
        }
        lon[i] = j;
    }

    let mut i = n - 1;
    while cyclic((i + 1) % n, j, lon[i]) {
        lon[i] = j;
        if i == 0 {
            break;
        }
        i -= 1;
    }

    lon
}

/// RMS distance of points `i..=j` (cyclic, `j` may exceed `n`) from the
/// chord joining them, scaled by the chord length.
fn penalty(points: &[(i32, i32)], sums: &[Sum], i: usize, j: usize) -> f64 {
    let n = points.len();
    let (j, wraps) = if j >= n { (j - n, 1.0) } else { (j, 0.0) };

    let field = |f: fn(&Sum) -> f64| f(&sums[j + 1]) - f(&sums[i]) + wraps * f(&sums[n]);
    let x = field(|s| s.x);
    let y = field(|s| s.y);
    let x2 = field(|s| s.x2);
    let xy = field(|s| s.xy);
    let y2 = field(|s| s.y2);

    #[allow(clippy::cast_precision_loss)]
    let k = wraps.mul_add(n as f64, j as f64 + 1.0 - i as f64);

    let (x0, y0) = (f64::from(points[0].0), f64::from(points[0].1));
    let (xi, yi) = (f64::from(points[i].0), f64::from(points[i].1));
    let (xj, yj) = (f64::from(points[j].0), f64::from(points[j].1));

    let px = f64::midpoint(xi, xj) - x0;
    let py = f64::midpoint(yi, yj) - y0;
    let ey = xj - xi;
    let ex = -(yj - yi);

    let a = (2.0f64.mul_add(-x * px, x2)) / k + px * px;
    let b = (xy - x * py - y * px) / k + px * py;
    let c = (2.0f64.mul_add(-y * py, y2)) / k + py * py;

    let s = (ex * ex).mul_add(a, (2.0 * ex * ey).mul_add(b, ey * ey * c));
    s.max(0.0).sqrt()
}

/// Vertex indices of the optimal polygon.
///
/// `lon` comes from [`straight_runs`] on the same points.
#[must_use]
pub fn best_polygon(points: &[(i32, i32)], sums: &[Sum], lon: &[usize]) -> Vec<usize> {
    let n = points.len();
    if n == 0 {
        return Vec::new();
    }

    // clip0[i]: furthest reachable j from i; clip1[j]: earliest i reaching j
    let mut clip0 = vec![0usize; n];
    for (i, slot) in clip0.iter_mut().enumerate() {
        #[allow(clippy::cast_possible_wrap)]
        let mut c = modulo(lon[modulo(i as isize - 1, n)] as isize - 1, n);
        if c == i {
            c = (i + 1) % n;
        }
        *slot = if c < i { n } else { c };
    }

    let mut clip1 = vec![0usize; n + 1];
    let mut j = 1;
    for (i, &reach) in clip0.iter().enumerate() {
        while j <= reach {
            clip1[j] = i;
            j += 1;
        }
    }

    // seg0: greedy forward bounds; seg1: greedy backward bounds
    let mut seg0 = vec![0usize; n + 1];
    let mut i = 0;
    let mut m = 0;
    while i < n {
        seg0[m] = i;
        i = clip0[i];
        m += 1;
    }
    seg0[m] = n;

    let mut seg1 = vec![0usize; m + 1];
    let mut i = n;
    for j in (1..=m).rev() {
        seg1[j] = i;
        i = clip1[i];
    }

    let mut pen = vec![0.0f64; n + 1];
    let mut prev = vec![0usize; n + 1];
    for j in 1..=m {
        for i in seg1[j]..=seg0[j] {
            let mut best: Option<f64> = None;
            for k in (clip1[i]..=seg0[j - 1]).rev() {
                let candidate = penalty(points, sums, k, i) + pen[k];
                if best.is_none_or(|b| candidate < b) {
                    prev[i] = k;
                    best = Some(candidate);
                }
            }
            pen[i] = best.unwrap_or(0.0);
        }
    }

    let mut polygon = vec![0usize; m];
    let mut i = n;
    for slot in polygon.iter_mut().rev() {
        i = prev[i];
        *slot = i;
    }
    polygon
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_2x2() -> Vec<(i32, i32)> {
        vec![(0, 0), (0, 1), (0, 2), (1, 2), (2, 2), (2, 1), (2, 0), (1, 0)]
    }

    #[test]
    fn sums_accumulate_relative_to_first_point() {
        let sums = calc_sums(&[(5, 5), (5, 6), (6, 6), (6, 5)]);
        assert_eq!(sums.len(), 5);
        let last = sums[4];
        assert!((last.x - 2.0).abs() < 1e-12);
        assert!((last.y - 2.0).abs() < 1e-12);
        assert!((last.xy - 1.0).abs() < 1e-12);
        assert!((last.x2 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn square_runs_reach_the_opposite_corner() {
        assert_eq!(straight_runs(&square_2x2()), vec![4, 5, 6, 7, 0, 1, 2, 3]);
    }

    #[test]
    fn square_polygon_uses_the_corners() {
        let points = square_2x2();
        let sums = calc_sums(&points);
        let lon = straight_runs(&points);
        assert_eq!(best_polygon(&points, &sums, &lon), vec![0, 2, 4, 6]);
    }

    #[test]
    fn rectangle_polygon_has_four_vertices() {
        // 6x3 rectangle walked down, right, up, left from (0,0).
        let mut points = Vec::new();
        points.extend((0..3).map(|y| (0, y)));
        points.extend((0..6).map(|x| (x, 3)));
        points.extend((1..=3).rev().map(|y| (6, y)));
        points.extend((1..=6).rev().map(|x| (x, 0)));
        let sums = calc_sums(&points);
        let lon = straight_runs(&points);
        let polygon = best_polygon(&points, &sums, &lon);
        assert_eq!(polygon.len(), 4);
        let corners: Vec<_> = polygon.iter().map(|&i| points[i]).collect();
        for corner in [(0, 0), (0, 3), (6, 3), (6, 0)] {
            assert!(corners.contains(&corner), "{corners:?}");
        }
    }

    #[test]
    fn penalty_of_collinear_run_is_zero() {
        let points = square_2x2();
        let sums = calc_sums(&points);
        assert!(penalty(&points, &sums, 0, 2).abs() < 1e-12);
    }
}
