use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::math::{average_pairwise_similarity, centroid, euclidean_distance, squared_euclidean};
use crate::types::{Cluster, Embedding};

/// Statistics describing one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAnalysis {
    pub cluster_id: String,
    pub size: usize,
    /// Mean pairwise cosine similarity, clamped to [0, 1].
    pub cohesion: f32,
    pub centroid: Vec<f32>,
    /// Mean Euclidean distance from members to the centroid.
    pub mean_distance: f32,
    /// Largest Euclidean distance from a member to the centroid.
    pub max_distance: f32,
    /// Member ids closest to the centroid, nearest first.
    pub representatives: Vec<String>,
}

/// Computes the analysis of `cluster` from its resolved `members`.
///
/// The centroid is recomputed from the members, so clusters returned by
/// the remote backend without one are handled too.
pub fn analyze(cluster: &Cluster, members: &[Embedding], representatives: usize) -> ClusterAnalysis {
    let centroid = centroid(members);
    let cohesion = average_pairwise_similarity(members).clamp(0.0, 1.0);

    let distances: Vec<f32> = members
        .iter()
        .map(|m| euclidean_distance(&m.vector, &centroid))
        .collect();
    let mean_distance = if distances.is_empty() {
        0.0
    } else {
        distances.iter().sum::<f32>() / distances.len() as f32
    };
    let max_distance = distances.iter().copied().fold(0.0, f32::max);

    let refs: Vec<&Embedding> = members.iter().collect();
    let representatives = nearest_to_centroid(&centroid, &refs, representatives)
        .into_iter()
        .map(|e| e.id.clone())
        .collect();

    ClusterAnalysis {
        cluster_id: cluster.id.clone(),
        size: members.len(),
        cohesion,
        centroid,
        mean_distance,
        max_distance,
        representatives,
    }
}

/// The `count` members with the smallest Euclidean distance to
/// `centroid`, nearest first. Ties keep input order.
pub(crate) fn nearest_to_centroid<'a>(
    centroid: &[f32],
    members: &[&'a Embedding],
    count: usize,
) -> Vec<&'a Embedding> {
    let mut scored: Vec<(f32, &'a Embedding)> = members
        .iter()
        .filter(|m| m.vector.len() == centroid.len())
        .map(|&m| (squared_euclidean(&m.vector, centroid), m))
        .collect();
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    scored.into_iter().take(count).map(|(_, m)| m).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members() -> Vec<Embedding> {
        vec![
            Embedding::new("a", vec![1.0, 0.0]),
            Embedding::new("b", vec![1.0, 0.2]),
            Embedding::new("c", vec![1.0, 1.0]),
        ]
    }

    #[test]
    fn analysis_statistics() {
        let m = members();
        let cluster = Cluster::from_indices("c0", &m, &[0, 1, 2]);
        let report = analyze(&cluster, &m, 2);

        assert_eq!(report.cluster_id, "c0");
        assert_eq!(report.size, 3);
        assert!((report.centroid[0] - 1.0).abs() < 1e-6);
        assert!((report.centroid[1] - 0.4).abs() < 1e-6);
        assert!((report.cohesion - cluster.cohesion).abs() < 1e-6);
        assert!((report.max_distance - 0.6).abs() < 1e-5);
        assert!((report.mean_distance - (0.4 + 0.2 + 0.6) / 3.0).abs() < 1e-5);
        assert_eq!(report.representatives, vec!["b", "a"]);
    }

    #[test]
    fn empty_members() {
        let cluster = Cluster {
            id: "x".into(),
            members: Vec::new(),
            centroid: None,
            size: 0,
            cohesion: 1.0,
        };
        let report = analyze(&cluster, &[], 5);
        assert_eq!(report.size, 0);
        assert!(report.centroid.is_empty());
        assert_eq!(report.mean_distance, 0.0);
        assert!(report.representatives.is_empty());
    }

    #[test]
    fn nearest_limits_and_orders() {
        let m = members();
        let refs: Vec<&Embedding> = m.iter().collect();
        let got = nearest_to_centroid(&[0.0, 1.0], &refs, 10);
        let ids: Vec<&str> = got.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(nearest_to_centroid(&[0.0, 1.0], &refs, 1).len(), 1);
    }

    #[test]
    fn nearest_ranks_by_distance_not_direction() {
        // "wide" points the same way as the centroid but sits far from it.
        let m = vec![
            Embedding::new("short", vec![1.0, 0.0]),
            Embedding::new("wide", vec![10.0, 0.0]),
            Embedding::new("closest", vec![5.5, 0.5]),
        ];
        let cluster = Cluster::from_indices("c0", &m, &[0, 1, 2]);
        let report = analyze(&cluster, &m, 1);
        assert_eq!(report.representatives, vec!["closest"]);

        let refs: Vec<&Embedding> = m.iter().collect();
        let ids: Vec<&str> = nearest_to_centroid(&report.centroid, &refs, 3)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids[0], "closest");
    }
}
