//! K-means++ clustering of color samples.
//!
//! Seeding follows Arthur & Vassilvitskii: the first center is a uniform
//! pick, each further center is drawn with probability proportional to its
//! squared distance from the nearest existing center.  Lloyd iterations
//! then run until no center moves by `convergence` or more.
//!
//! The random source is a type parameter so tests (and callers wanting
//! reproducible palettes) can pass a seeded [`rand::rngs::StdRng`].

use rand::Rng;

use crate::cancel::CancelToken;
use crate::color::{Sample, sample_distance, sample_distance_squared};
use crate::types::PipelineError;

/// One cluster: its center and the number of samples assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Component-wise mean of the member samples.
    pub center: Sample,
    /// Number of member samples.
    pub count: usize,
}

/// The outcome of a clustering run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KMeansRun {
    /// Non-empty clusters, most populous first.
    pub clusters: Vec<Cluster>,
    /// Largest center displacement observed in each Lloyd iteration.
    pub displacements: Vec<f64>,
}

impl KMeansRun {
    /// Number of Lloyd iterations performed.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.displacements.len()
    }
}

/// Cluster `samples` into at most `k` groups.
///
/// Returns an empty run when `samples` is empty or `k` is zero.  Fewer
/// than `k` clusters come back when the samples hold fewer than `k`
/// distinct values, or when a center ends up with no members.
///
/// # Errors
///
/// Returns [`PipelineError::Cancelled`] if `cancel` trips between
/// iterations.
pub fn kmeans<R: Rng>(
    samples: &[Sample],
    k: usize,
    convergence: f64,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<KMeansRun, PipelineError> {
    if samples.is_empty() || k == 0 {
        return Ok(KMeansRun::default());
    }

    let mut centers = seed_centers(samples, k, rng);
    let mut counts = vec![0usize; centers.len()];
    let mut displacements = Vec::new();

    loop {
        cancel.check()?;

        let mut sums = vec![[0.0f64; 3]; centers.len()];
        let mut members = vec![0usize; centers.len()];
        for sample in samples {
            let i = nearest_center(sample, &centers);
            members[i] += 1;
            for (acc, v) in sums[i].iter_mut().zip(sample) {
                *acc += v;
            }
        }

        let mut max_shift = 0.0f64;
        let mut updated: Vec<(Sample, usize)> = Vec::with_capacity(centers.len());
        for ((old, sum), &count) in centers.iter().zip(&sums).zip(&members) {
            let center = if count == 0 {
                *old
            } else {
                #[allow(clippy::cast_precision_loss)]
                let n = count as f64;
                [sum[0] / n, sum[1] / n, sum[2] / n]
            };
            max_shift = max_shift.max(sample_distance(old, &center));
            updated.push((center, count));
        }

        // Most populous first; ties keep their previous order.
        updated.sort_by(|a, b| b.1.cmp(&a.1));
        centers = updated.iter().map(|&(c, _)| c).collect();
        counts = updated.iter().map(|&(_, n)| n).collect();

        displacements.push(max_shift);
        log::trace!(
            "kmeans iteration {}: max shift {max_shift:.3}",
            displacements.len()
        );
        if max_shift < convergence {
            break;
        }
    }

    let clusters = centers
        .into_iter()
        .zip(counts)
        .filter(|&(_, count)| count > 0)
        .map(|(center, count)| Cluster { center, count })
        .collect::<Vec<_>>();

    log::debug!(
        "kmeans: {} clusters from {} samples in {} iterations",
        clusters.len(),
        samples.len(),
        displacements.len()
    );

    Ok(KMeansRun {
        clusters,
        displacements,
    })
}

/// K-means++ seeding.  Stops early once every sample coincides with a
/// chosen center.
fn seed_centers<R: Rng>(samples: &[Sample], k: usize, rng: &mut R) -> Vec<Sample> {
    let first = samples[rng.random_range(0..samples.len())];
    let mut centers = vec![first];
    let mut nearest: Vec<f64> = samples
        .iter()
        .map(|s| sample_distance_squared(s, &first))
        .collect();

    while centers.len() < k {
        let total: f64 = nearest.iter().sum();
        if total <= 0.0 {
            break;
        }

        let threshold = rng.random::<f64>() * total;
        let mut chosen = None;
        let mut acc = 0.0;
        for (i, &d) in nearest.iter().enumerate() {
            if d <= 0.0 {
                continue;
            }
            acc += d;
            chosen = Some(i);
            if acc >= threshold {
                break;
            }
        }
        let Some(index) = chosen else { break };

        let center = samples[index];
        for (d, s) in nearest.iter_mut().zip(samples) {
            *d = d.min(sample_distance_squared(s, &center));
        }
        centers.push(center);
    }

    centers
}

/// Index of the closest center; the first one wins ties.
fn nearest_center(sample: &Sample, centers: &[Sample]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let d = sample_distance_squared(sample, center);
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn blobs() -> Vec<Sample> {
        let mut samples = Vec::new();
        for i in 0..30 {
            let jitter = f64::from(i % 5);
            samples.push([10.0 + jitter, 10.0, 10.0]);
        }
        for i in 0..10 {
            let jitter = f64::from(i % 3);
            samples.push([200.0, 180.0 + jitter, 40.0]);
        }
        samples
    }

    #[test]
    fn empty_samples_give_empty_run() {
        let mut rng = StdRng::seed_from_u64(1);
        let run = kmeans(&[], 4, 5.0, &mut rng, &CancelToken::new()).unwrap();
        assert!(run.clusters.is_empty());
        assert_eq!(run.iterations(), 0);
    }

    #[test]
    fn separates_two_blobs() {
        let mut rng = StdRng::seed_from_u64(7);
        let run = kmeans(&blobs(), 2, 0.5, &mut rng, &CancelToken::new()).unwrap();
        assert_eq!(run.clusters.len(), 2);
        // Larger blob first.
        assert_eq!(run.clusters[0].count, 30);
        assert_eq!(run.clusters[1].count, 10);
        assert!((run.clusters[0].center[0] - 12.0).abs() < 1e-9);
        assert!((run.clusters[1].center[1] - 181.0).abs() < 0.5);
    }

    #[test]
    fn identical_samples_stop_seeding_early() {
        let samples = vec![[50.0, 60.0, 70.0]; 16];
        let mut rng = StdRng::seed_from_u64(3);
        let run = kmeans(&samples, 5, 5.0, &mut rng, &CancelToken::new()).unwrap();
        assert_eq!(run.clusters.len(), 1);
        assert_eq!(run.clusters[0].count, 16);
        assert_eq!(run.clusters[0].center, [50.0, 60.0, 70.0]);
    }

    #[test]
    fn same_seed_same_palette() {
        let samples = blobs();
        let a = kmeans(
            &samples,
            4,
            1.0,
            &mut StdRng::seed_from_u64(99),
            &CancelToken::new(),
        )
        .unwrap();
        let b = kmeans(
            &samples,
            4,
            1.0,
            &mut StdRng::seed_from_u64(99),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn counts_cover_every_sample() {
        let samples = blobs();
        let mut rng = StdRng::seed_from_u64(5);
        let run = kmeans(&samples, 6, 1.0, &mut rng, &CancelToken::new()).unwrap();
        let total: usize = run.clusters.iter().map(|c| c.count).sum();
        assert_eq!(total, samples.len());
    }

    #[test]
    fn clusters_are_sorted_by_count() {
        let samples = blobs();
        let mut rng = StdRng::seed_from_u64(11);
        let run = kmeans(&samples, 5, 1.0, &mut rng, &CancelToken::new()).unwrap();
        assert!(run.clusters.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn cancelled_token_aborts() {
        let token = CancelToken::new();
        token.cancel();
        let mut rng = StdRng::seed_from_u64(1);
        let result = kmeans(&blobs(), 2, 1.0, &mut rng, &token);
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[test]
    fn nearest_center_prefers_first_on_tie() {
        let centers = [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]];
        assert_eq!(nearest_center(&[1.0, 0.0, 0.0], &centers), 0);
    }
}
