//! Path decomposition: split a bitmap into closed boundary paths.
//!
//! Boundaries are walked on the pixel-corner lattice with the filled
//! region kept on one side.  After each path is found, its interior is
//! XOR-inverted in a working copy so holes surface as fresh regions and
//! the scan can simply continue in raster order.

use serde::{Deserialize, Serialize};

use crate::bitmap::Bitmap;
use crate::cancel::CancelToken;
use crate::types::PipelineError;

/// How to resolve ambiguous corners where two filled pixels touch only
/// diagonally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPolicy {
    /// Connect filled pixels on outer paths.
    Black,
    /// Connect filled pixels on hole paths.
    White,
    /// Always turn left.
    Left,
    /// Always turn right.
    Right,
    /// Favor the color that is rarer in the neighbourhood.
    #[default]
    Minority,
    /// Favor the color that dominates the neighbourhood.
    Majority,
}

impl std::fmt::Display for TurnPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Black => "black",
            Self::White => "white",
            Self::Left => "left",
            Self::Right => "right",
            Self::Minority => "minority",
            Self::Majority => "majority",
        };
        f.write_str(name)
    }
}

/// Whether a path bounds a filled region or a hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSign {
    /// Outer boundary of filled pixels.
    Positive,
    /// Boundary of a hole.
    Negative,
}

/// A closed boundary on the pixel-corner lattice.
///
/// Consecutive points (including last to first) differ by one unit step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// Lattice points in walk order.
    pub points: Vec<(i32, i32)>,
    /// Enclosed area in pixels.
    pub area: i64,
    /// Outer boundary or hole.
    pub sign: PathSign,
    /// Smallest x on the path.
    pub min_x: i32,
    /// Largest x on the path.
    pub max_x: i32,
    /// Smallest y on the path.
    pub min_y: i32,
    /// Largest y on the path.
    pub max_y: i32,
}

/// Extract every boundary path from `bitmap`.
///
/// `bitmap` is left untouched; the walk runs on a private copy.  Paths
/// enclosing `turd_size` pixels or fewer are dropped.
///
/// # Errors
///
/// Returns [`PipelineError::Cancelled`] if `cancel` trips between paths.
pub fn decompose(
    bitmap: &Bitmap,
    policy: TurnPolicy,
    turd_size: u32,
    cancel: &CancelToken,
) -> Result<Vec<Path>, PipelineError> {
    let mut work = bitmap.clone();
    let mut paths = Vec::new();
    let mut cursor = 0;

    while let Some(start) = work.next_set(cursor) {
        cancel.check()?;

        let path = find_path(bitmap, &work, start, policy);
        xor_path(&mut work, &path);

        cursor = work.raster_index(start.0, start.1);
        if work.get(start.0, start.1) {
            cursor += 1;
        }

        if path.area.unsigned_abs() > u64::from(turd_size) {
            paths.push(path);
        }
    }

    log::trace!("decomposed {} paths", paths.len());
    Ok(paths)
}

/// Walk the boundary that starts at the upper-left corner of `start`.
fn find_path(original: &Bitmap, work: &Bitmap, start: (i32, i32), policy: TurnPolicy) -> Path {
    let sign = if original.get(start.0, start.1) {
        PathSign::Positive
    } else {
        PathSign::Negative
    };

    let (mut x, mut y) = start;
    let (mut dir_x, mut dir_y) = (0i32, 1i32);
    let mut path = Path {
        points: Vec::new(),
        area: 0,
        sign,
        min_x: x,
        max_x: x,
        min_y: y,
        max_y: y,
    };

    loop {
        path.points.push((x, y));
        path.min_x = path.min_x.min(x);
        path.max_x = path.max_x.max(x);
        path.min_y = path.min_y.min(y);
        path.max_y = path.max_y.max(y);

        x += dir_x;
        y += dir_y;
        path.area -= i64::from(x) * i64::from(dir_y);

        if (x, y) == start {
            break;
        }

        let left = work.get(x + (dir_x + dir_y - 1) / 2, y + (dir_y - dir_x - 1) / 2);
        let right = work.get(x + (dir_x - dir_y - 1) / 2, y + (dir_y + dir_x - 1) / 2);

        let turn_right = if right && !left {
            match policy {
                TurnPolicy::Right => true,
                TurnPolicy::Black => sign == PathSign::Positive,
                TurnPolicy::White => sign == PathSign::Negative,
                TurnPolicy::Majority => majority(work, x, y),
                TurnPolicy::Minority => !majority(work, x, y),
                TurnPolicy::Left => false,
            }
        } else if right {
            true
        } else if !left {
            false
        } else {
            continue;
        };

        (dir_x, dir_y) = if turn_right {
            (-dir_y, dir_x)
        } else {
            (dir_y, -dir_x)
        };
    }

    path
}

/// Majority vote over square rings of radius 2, 3 and 4 around the
/// lattice point `(x, y)`.  The first ring with a non-zero tally decides.
fn majority(work: &Bitmap, x: i32, y: i32) -> bool {
    for i in 2..5 {
        let mut tally = 0i32;
        for a in (-i + 1)..i {
            for (px, py) in [
                (x + a, y + i - 1),
                (x + i - 1, y + a - 1),
                (x + a - 1, y - i),
                (x - i, y + a),
            ] {
                tally += if work.get(px, py) { 1 } else { -1 };
            }
        }
        if tally != 0 {
            return tally > 0;
        }
    }
    false
}

/// Invert everything enclosed by `path`: for each vertical edge, flip
/// the row segment from the edge to the path's rightmost x.
fn xor_path(work: &mut Bitmap, path: &Path) {
    let Some(&(_, mut last_y)) = path.points.first() else {
        return;
    };
    for &(x, y) in &path.points[1..] {
        if y != last_y {
            let row = last_y.min(y);
            for col in x..path.max_x {
                work.flip(col, row);
            }
            last_y = y;
        }
    }
}
