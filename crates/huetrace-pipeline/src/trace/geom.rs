//! Small geometric helpers shared by the fitting stages.

use crate::types::Point;

/// Sign of `v` as `-1`, `0`, or `1`.
pub const fn sign(v: i64) -> i64 {
    v.signum()
}

/// Sign of a float as `-1`, `0`, or `1`; zero for NaN.
pub fn sign_f(v: f64) -> i32 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// Euclidean remainder for cyclic indexing.
pub const fn modulo(a: isize, n: usize) -> usize {
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    let r = a.rem_euclid(n as isize) as usize;
    r
}

/// Whether `b` lies in the cyclic half-open interval `[a, c)`.
pub const fn cyclic(a: usize, b: usize, c: usize) -> bool {
    if a <= c {
        a <= b && b < c
    } else {
        a <= b || b < c
    }
}

/// Cross product of two integer vectors.
pub const fn xprod(a: (i64, i64), b: (i64, i64)) -> i64 {
    a.0 * b.1 - a.1 * b.0
}

/// Twice the signed area of triangle `p0 p1 p2`.
pub fn dpara(p0: Point, p1: Point, p2: Point) -> f64 {
    let (x1, y1) = (p1.x - p0.x, p1.y - p0.y);
    let (x2, y2) = (p2.x - p0.x, p2.y - p0.y);
    x1.mul_add(y2, -(x2 * y1))
}

/// Normalizer for [`dpara`]: the L-infinity distance from `p0` to the
/// line through `p2` measured along the unit-ish orthogonal direction.
pub fn ddenom(p0: Point, p2: Point) -> f64 {
    let ry = f64::from(sign_f(p2.x - p0.x));
    let rx = -f64::from(sign_f(p2.y - p0.y));
    ry.mul_add(p2.x - p0.x, -(rx * (p2.y - p0.y)))
}

/// Cross product of `p1 - p0` and `p3 - p2`.
pub fn cprod(p0: Point, p1: Point, p2: Point, p3: Point) -> f64 {
    let (x1, y1) = (p1.x - p0.x, p1.y - p0.y);
    let (x2, y2) = (p3.x - p2.x, p3.y - p2.y);
    x1.mul_add(y2, -(x2 * y1))
}

/// Dot product of `p1 - p0` and `p2 - p0`.
pub fn iprod(p0: Point, p1: Point, p2: Point) -> f64 {
    let (x1, y1) = (p1.x - p0.x, p1.y - p0.y);
    let (x2, y2) = (p2.x - p0.x, p2.y - p0.y);
    x1.mul_add(x2, y1 * y2)
}

/// Dot product of `p1 - p0` and `p3 - p2`.
pub fn iprod1(p0: Point, p1: Point, p2: Point, p3: Point) -> f64 {
    let (x1, y1) = (p1.x - p0.x, p1.y - p0.y);
    let (x2, y2) = (p3.x - p2.x, p3.y - p2.y);
    x1.mul_add(x2, y1 * y2)
}

/// Point at parameter `t` on the cubic Bezier `p0 p1 p2 p3`.
pub fn bezier(t: f64, p0: Point, p1: Point, p2: Point, p3: Point) -> Point {
    let s = 1.0 - t;
    let w0 = s * s * s;
    let w1 = 3.0 * s * s * t;
    let w2 = 3.0 * t * t * s;
    let w3 = t * t * t;
    Point::new(
        w0.mul_add(p0.x, w1.mul_add(p1.x, w2.mul_add(p2.x, w3 * p3.x))),
        w0.mul_add(p0.y, w1.mul_add(p1.y, w2.mul_add(p2.y, w3 * p3.y))),
    )
}

/// Parameter in `[0, 1]` where the Bezier `p0 p1 p2 p3` runs parallel to
/// `q1 - q0`, if there is one.
pub fn tangent(p0: Point, p1: Point, p2: Point, p3: Point, q0: Point, q1: Point) -> Option<f64> {
    let a0 = cprod(p0, p1, q0, q1);
    let b0 = cprod(p1, p2, q0, q1);
    let c0 = cprod(p2, p3, q0, q1);

    let a = 2.0f64.mul_add(-b0, a0 + c0);
    let b = 2.0 * (b0 - a0);
    let c = a0;

    let d = b.mul_add(b, -(4.0 * a * c));
    if a == 0.0 || d < 0.0 {
        return None;
    }

    let s = d.sqrt();
    let r1 = (-b + s) / (2.0 * a);
    let r2 = (-b - s) / (2.0 * a);

    if (0.0..=1.0).contains(&r1) {
        Some(r1)
    } else if (0.0..=1.0).contains(&r2) {
        Some(r2)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulo_wraps_negatives() {
        assert_eq!(modulo(-1, 5), 4);
        assert_eq!(modulo(7, 5), 2);
        assert_eq!(modulo(0, 5), 0);
    }

    #[test]
    fn cyclic_intervals() {
        assert!(cyclic(1, 2, 4));
        assert!(!cyclic(1, 4, 4));
        assert!(cyclic(4, 0, 2));
        assert!(cyclic(4, 5, 2));
        assert!(!cyclic(4, 3, 2));
    }

    #[test]
    fn dpara_is_twice_triangle_area() {
        let a = dpara(Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(0.0, 3.0));
        assert!((a - 6.0).abs() < 1e-12);
    }

    #[test]
    fn bezier_endpoints() {
        let p0 = Point::new(0.0, 0.0);
        let p3 = Point::new(3.0, 1.0);
        let p1 = Point::new(1.0, 2.0);
        let p2 = Point::new(2.0, 2.0);
        assert_eq!(bezier(0.0, p0, p1, p2, p3), p0);
        assert_eq!(bezier(1.0, p0, p1, p2, p3), p3);
    }

    #[test]
    fn tangent_finds_horizontal_point() {
        // y'(t) vanishes where (1-t)^2 = 2t^2.
        let p0 = Point::new(0.0, 0.0);
        let p1 = Point::new(0.0, 1.0);
        let p2 = Point::new(3.0, 1.0);
        let p3 = Point::new(2.0, -1.0);
        let t = tangent(p0, p1, p2, p3, Point::new(0.0, 0.0), Point::new(1.0, 0.0)).unwrap_or(-1.0);
        assert!((t - (2.0f64.sqrt() - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn straight_line_has_no_tangent_parameter() {
        let p = |x: f64| Point::new(x, 0.0);
        assert_eq!(tangent(p(0.0), p(1.0), p(2.0), p(3.0), p(0.0), p(1.0)), None);
    }
}
