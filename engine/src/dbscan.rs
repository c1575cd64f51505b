//! Density-based clustering with outlier detection.
//!
//! Neighborhoods are found by an exhaustive scan, so a fit costs O(n²)
//! distance evaluations. That is fine for the few thousand embeddings a
//! clustering request carries; larger inputs need a spatial index first.

use std::collections::VecDeque;

use crate::error::{ClusterError, Result};
use crate::math::{check_dimensions, euclidean_distance};

/// Epsilon used when no similarity threshold is configured.
pub const DEFAULT_EPS: f32 = 0.3;

/// Minimum neighborhood size for a core point, the point itself included.
pub const DEFAULT_MIN_PTS: usize = 3;

/// Label for points that belong to no cluster.
pub const NOISE: i32 = -1;

const UNDEFINED: i32 = 0;

/// DBSCAN clusterer over Euclidean distance.
#[derive(Debug, Clone)]
pub struct Dbscan {
    eps: f32,
    min_pts: usize,
}

impl Default for Dbscan {
    fn default() -> Self {
        Self::new(DEFAULT_EPS, DEFAULT_MIN_PTS)
    }
}

impl Dbscan {
    pub fn new(eps: f32, min_pts: usize) -> Self {
        Self { eps, min_pts }
    }

    /// Derives epsilon from a cosine-similarity threshold: `eps = 1 - min_similarity`.
    pub fn from_min_similarity(min_similarity: Option<f32>) -> Self {
        let eps = min_similarity.map_or(DEFAULT_EPS, |s| 1.0 - s);
        Self::new(eps, DEFAULT_MIN_PTS)
    }

    pub fn eps(&self) -> f32 {
        self.eps
    }

    pub fn min_pts(&self) -> usize {
        self.min_pts
    }

    /// Labels each vector with a cluster id (1, 2, ...) or [`NOISE`].
    ///
    /// Clusters are numbered in the order their first core point appears,
    /// so the result is deterministic for a fixed input order.
    pub fn fit<V: AsRef<[f32]>>(&self, vectors: &[V]) -> Result<Vec<i32>> {
        if !(self.eps.is_finite() && self.eps >= 0.0) {
            return Err(ClusterError::InvalidArgument(format!(
                "dbscan: eps must be a non-negative number, got {}",
                self.eps
            )));
        }
        check_dimensions(vectors)?;

        let n = vectors.len();
        let mut labels = vec![UNDEFINED; n];
        let mut cluster_id: i32 = 0;

        for i in 0..n {
            if labels[i] != UNDEFINED {
                continue;
            }

            let neighbors = self.range_query(vectors, i);
            if neighbors.len() < self.min_pts {
                labels[i] = NOISE;
                continue;
            }

            cluster_id += 1;
            labels[i] = cluster_id;

            let mut queue: VecDeque<usize> = neighbors.into_iter().filter(|&j| j != i).collect();
            while let Some(q) = queue.pop_front() {
                if labels[q] == NOISE {
                    // Border point: reachable, but does not expand further.
                    labels[q] = cluster_id;
                    continue;
                }
                if labels[q] != UNDEFINED {
                    continue;
                }
                labels[q] = cluster_id;

                let q_neighbors = self.range_query(vectors, q);
                if q_neighbors.len() >= self.min_pts {
                    queue.extend(
                        q_neighbors
                            .into_iter()
                            .filter(|&j| labels[j] == UNDEFINED || labels[j] == NOISE),
                    );
                }
            }
        }

        Ok(labels)
    }

    /// Indices of all points within eps of `vectors[idx]`, `idx` included.
    fn range_query<V: AsRef<[f32]>>(&self, vectors: &[V], idx: usize) -> Vec<usize> {
        let q = vectors[idx].as_ref();
        vectors
            .iter()
            .enumerate()
            .filter(|(_, v)| euclidean_distance(q, v.as_ref()) <= self.eps)
            .map(|(j, _)| j)
            .collect()
    }
}
