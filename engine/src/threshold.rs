//! Single-pass threshold clustering kept for callers of the older API.
//!
//! Embeddings are visited in input order. An unassigned embedding opens a
//! new cluster, and every later unassigned embedding whose cosine similarity
//! to that cluster's running centroid reaches the threshold joins it. The
//! centroid is recomputed after each join, so members are only guaranteed
//! to be close to the centroid, not to each other.

use crate::error::{ClusterError, Result};
use crate::math::{check_dimensions, cosine_unchecked};
use crate::types::{Cluster, Embedding};

/// Groups `embeddings` greedily by similarity to a running centroid.
///
/// Every embedding ends up in exactly one cluster. Cluster ids are
/// `cluster-0`, `cluster-1`, ... in creation order.
pub fn cluster_by_similarity(embeddings: &[Embedding], threshold: f32) -> Result<Vec<Cluster>> {
    if !(-1.0..=1.0).contains(&threshold) {
        return Err(ClusterError::InvalidArgument(format!(
            "similarity threshold must lie in [-1, 1], got {threshold}"
        )));
    }
    check_dimensions(embeddings)?;

    let n = embeddings.len();
    let mut assigned = vec![false; n];
    let mut clusters = Vec::new();

    for seed in 0..n {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;

        let mut members = vec![seed];
        let mut sum: Vec<f64> = embeddings[seed].vector.iter().map(|&x| x as f64).collect();
        let mut running: Vec<f32> = embeddings[seed].vector.clone();

        for j in (seed + 1)..n {
            if assigned[j] {
                continue;
            }
            if cosine_unchecked(&embeddings[j].vector, &running) >= threshold {
                assigned[j] = true;
                members.push(j);
                for (s, &x) in sum.iter_mut().zip(embeddings[j].vector.iter()) {
                    *s += x as f64;
                }
                let count = members.len() as f64;
                running = sum.iter().map(|&s| (s / count) as f32).collect();
            }
        }

        clusters.push(Cluster::from_indices(
            format!("cluster-{}", clusters.len()),
            embeddings,
            &members,
        ));
    }

    Ok(clusters)
}
