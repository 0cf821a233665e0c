//! Background color detection.
//!
//! Samples a sparse ring just inside the image border plus the center
//! pixel, folds near-identical colors together, and reports the most
//! frequent one.  Border-heavy sampling assumes the subject sits roughly
//! in the middle of the frame.

use crate::color::Rgb;
use crate::source::PixelSource;

/// Number of sample steps along each side.
const STEPS_PER_SIDE: u32 = 7;

/// Inset of the left sample column.
const LEFT_COLUMN_X: i64 = 4;

/// Detect the background color of `source`.
///
/// Colors within `similar_distance` of a more frequent sample are counted
/// toward it.  An empty image reports white.
#[must_use]
pub fn detect_background<S: PixelSource + ?Sized>(source: &S, similar_distance: f64) -> Rgb {
    let dims = source.dimensions();
    if dims.width == 0 || dims.height == 0 {
        return Rgb::WHITE;
    }

    let mut counts: Vec<(Rgb, usize)> = Vec::new();
    for (x, y) in sample_points(dims.width, dims.height) {
        let color = source.color(x, y);
        match counts.iter_mut().find(|(c, _)| *c == color) {
            Some((_, n)) => *n += 1,
            None => counts.push((color, 1)),
        }
    }
    sort_by_count(&mut counts);

    let mut merged = merge_similar_once(&counts, similar_distance);
    sort_by_count(&mut merged);

    let background = merged.first().map_or(Rgb::WHITE, |&(color, _)| color);
    log::debug!(
        "background {background} from {} distinct border colors",
        counts.len()
    );
    background
}

/// Border and center sample coordinates, clamped into the grid and
/// deduplicated in first-seen order.
#[must_use]
pub fn sample_points(width: u32, height: u32) -> Vec<(u32, u32)> {
    let w = i64::from(width);
    let h = i64::from(height);
    let step_w = usize::try_from(width.div_ceil(STEPS_PER_SIDE).max(1)).unwrap_or(1);
    let step_h = usize::try_from(height.div_ceil(STEPS_PER_SIDE).max(1)).unwrap_or(1);

    let mut raw: Vec<(i64, i64)> = Vec::new();
    raw.extend((1..=w).step_by(step_w).map(|x| (x, 1)));
    raw.extend((1..=h).step_by(step_h).map(|y| (w - 1, y)));
    raw.extend((1..=w).step_by(step_w).map(|x| (x, h - 2)));
    raw.extend((1..=h).step_by(step_h).map(|y| (LEFT_COLUMN_X, y)));
    raw.push(((w + 1) / 2, (h + 1) / 2));

    let mut points: Vec<(u32, u32)> = Vec::with_capacity(raw.len());
    for (x, y) in raw {
        let clamp = |v: i64, len: i64| u32::try_from(v.clamp(0, len - 1)).unwrap_or(0);
        let point = (clamp(x, w), clamp(y, h));
        if !points.contains(&point) {
            points.push(point);
        }
    }
    points
}

/// Fold each color into the first earlier color within `distance`.
///
/// When the newcomer outnumbers the color it matches, it takes that
/// color's place (moved to the end) with the combined count.
fn merge_similar_once(counts: &[(Rgb, usize)], distance: f64) -> Vec<(Rgb, usize)> {
    let mut merged: Vec<(Rgb, usize)> = Vec::with_capacity(counts.len());
    for &(color, count) in counts {
        match merged
            .iter()
            .position(|&(existing, _)| existing.distance(color) <= distance)
        {
            Some(i) if count > merged[i].1 => {
                let (_, existing_count) = merged.remove(i);
                merged.push((color, count + existing_count));
            }
            Some(i) => merged[i].1 += count,
            None => merged.push((color, count)),
        }
    }
    merged
}

fn sort_by_count(counts: &mut [(Rgb, usize)]) {
    counts.sort_by(|a, b| b.1.cmp(&a.1));
}
