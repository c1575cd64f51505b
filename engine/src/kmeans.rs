//! K-means with k-means++ seeding and Lloyd iterations.
//!
//! Seed → Assign → Update, repeated until the assignment vector stops
//! changing or the iteration budget runs out. Both exits produce a fit;
//! [`KMeansFit::converged`] tells them apart.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ClusterError, Result};
use crate::math::{check_dimensions, euclidean_distance, squared_euclidean, weighted_random_choice};

pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Number of clusters used when the caller does not pick one:
/// `clamp(floor(sqrt(n / 2)), 3, 10)`.
pub fn default_k(n: usize) -> usize {
    let k = ((n as f64) / 2.0).sqrt().floor() as usize;
    k.clamp(3, 10)
}

/// K-means clusterer.
#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    max_iterations: usize,
    seed: Option<u64>,
}

/// Output of [`KMeans::fit`].
#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// Centroid index per input point.
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f32>>,
    pub iterations: usize,
    pub converged: bool,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: None,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Fixes the random source so runs are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Runs k-means over `vectors`.
    ///
    /// `k` is capped at the number of points.
    pub fn fit<V: AsRef<[f32]>>(&self, vectors: &[V]) -> Result<KMeansFit> {
        if vectors.is_empty() {
            return Err(ClusterError::InvalidArgument("kmeans: no vectors".into()));
        }
        if self.k == 0 {
            return Err(ClusterError::InvalidArgument("kmeans: k must be positive".into()));
        }
        let dim = check_dimensions(vectors)?;
        let n = vectors.len();
        let k = self.k.min(n);
        let max_iterations = self.max_iterations.max(1);

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut centroids = seed_plus_plus(vectors, k, &mut rng);
        let mut assignments: Vec<usize> = Vec::new();
        let mut iterations = 0;
        let mut converged = false;

        for _ in 0..max_iterations {
            iterations += 1;

            let next: Vec<usize> = vectors
                .iter()
                .map(|v| nearest_centroid(v.as_ref(), &centroids))
                .collect();
            if next == assignments {
                converged = true;
                break;
            }
            assignments = next;

            let mut sums = vec![vec![0.0f64; dim]; k];
            let mut counts = vec![0usize; k];
            for (v, &c) in vectors.iter().zip(assignments.iter()) {
                counts[c] += 1;
                for (s, &x) in sums[c].iter_mut().zip(v.as_ref().iter()) {
                    *s += x as f64;
                }
            }

            for (c, centroid) in centroids.iter_mut().enumerate() {
                if counts[c] == 0 {
                    // Starved centroid: reseed from a random point.
                    let idx = rng.gen_range(0..n);
                    *centroid = vectors[idx].as_ref().to_vec();
                    tracing::debug!(centroid = c, point = idx, "kmeans: reseeded empty cluster");
                    continue;
                }
                let count = counts[c] as f64;
                for (dst, &s) in centroid.iter_mut().zip(sums[c].iter()) {
                    *dst = (s / count) as f32;
                }
            }
        }

        Ok(KMeansFit {
            assignments,
            centroids,
            iterations,
            converged,
        })
    }
}

/// k-means++: first centroid uniform, each next one drawn with probability
/// proportional to the squared distance to the nearest chosen centroid.
fn seed_plus_plus<V: AsRef<[f32]>>(vectors: &[V], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let n = vectors.len();
    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);
    centroids.push(vectors[rng.gen_range(0..n)].as_ref().to_vec());

    let mut nearest: Vec<f64> = vectors
        .iter()
        .map(|v| squared_euclidean(v.as_ref(), &centroids[0]) as f64)
        .collect();

    while centroids.len() < k {
        let total: f64 = nearest.iter().sum();
        let idx = if total > 0.0 {
            weighted_random_choice(&nearest, rng).unwrap_or(0)
        } else {
            // Every point coincides with a centroid.
            rng.gen_range(0..n)
        };
        let chosen = vectors[idx].as_ref().to_vec();
        for (d, v) in nearest.iter_mut().zip(vectors.iter()) {
            let dist = squared_euclidean(v.as_ref(), &chosen) as f64;
            if dist < *d {
                *d = dist;
            }
        }
        centroids.push(chosen);
    }
    centroids
}

/// Index of the closest centroid; ties go to the lowest index.
fn nearest_centroid(v: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_euclidean(v, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// Mean silhouette coefficient over all points, using Euclidean distance.
///
/// Points in a singleton cluster score 0, and so does every point when
/// there is only one cluster.
pub fn silhouette_score<V: AsRef<[f32]>>(vectors: &[V], labels: &[usize]) -> f32 {
    debug_assert_eq!(vectors.len(), labels.len());
    let n = vectors.len();
    if n == 0 {
        return 0.0;
    }

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &l) in labels.iter().enumerate() {
        groups.entry(l).or_default().push(i);
    }
    if groups.len() < 2 {
        return 0.0;
    }

    let mean_distance = |i: usize, members: &[usize]| -> f64 {
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for &j in members {
            if j != i {
                sum += euclidean_distance(vectors[i].as_ref(), vectors[j].as_ref()) as f64;
                count += 1;
            }
        }
        if count == 0 { 0.0 } else { sum / count as f64 }
    };

    let mut total = 0.0f64;
    for i in 0..n {
        let own = &groups[&labels[i]];
        if own.len() < 2 {
            continue;
        }
        let a = mean_distance(i, own);
        let b = groups
            .iter()
            .filter(|(l, _)| **l != labels[i])
            .map(|(_, members)| mean_distance(i, members))
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    (total / n as f64) as f32
}
