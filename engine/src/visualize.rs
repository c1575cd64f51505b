//! 2D layouts for clustering results.

use std::collections::HashMap;
use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

use embedcluster_analytics::ProjectedPoint;

use crate::types::ClusteringResult;

/// Radius of the ring cluster centers sit on in the fallback layout.
pub const RING_RADIUS: f32 = 100.0;

/// Member circle radius per cluster member in the fallback layout.
pub const RADIUS_PER_MEMBER: f32 = 2.0;

/// Gap between the outermost cluster circle and the outlier ring.
pub const OUTLIER_MARGIN: f32 = 50.0;

/// Where node positions came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutSource {
    /// Remote 2D projection of the embeddings.
    Projection,
    /// Local circular layout.
    Fallback,
}

/// A positioned embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualNode {
    pub id: String,
    /// `None` for outliers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    pub x: f32,
    pub y: f32,
}

/// The circle a cluster occupies in the layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterCircle {
    pub cluster_id: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterVisualization {
    /// One node per cluster member and per outlier.
    pub nodes: Vec<VisualNode>,
    pub clusters: Vec<ClusterCircle>,
    pub source: LayoutSource,
}

impl ClusterVisualization {
    pub fn node(&self, id: &str) -> Option<&VisualNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Deterministic layout that needs no remote service.
///
/// Cluster centers are spaced evenly on a ring of [`RING_RADIUS`] (a lone
/// cluster sits at the origin). Each cluster's members are spaced evenly
/// on a circle of radius `RADIUS_PER_MEMBER * size` around its center.
/// Outliers get their own ring outside every cluster circle.
pub fn circular_layout(result: &ClusteringResult) -> ClusterVisualization {
    let count = result.clusters.len();
    let mut nodes = Vec::with_capacity(result.embedding_count());
    let mut circles = Vec::with_capacity(count);

    for (i, cluster) in result.clusters.iter().enumerate() {
        let (cx, cy) = if count == 1 {
            (0.0, 0.0)
        } else {
            polar(RING_RADIUS, i, count)
        };
        let radius = RADIUS_PER_MEMBER * cluster.members.len() as f32;
        for (j, member) in cluster.members.iter().enumerate() {
            let (dx, dy) = polar(radius, j, cluster.members.len());
            nodes.push(VisualNode {
                id: member.clone(),
                cluster_id: Some(cluster.id.clone()),
                x: cx + dx,
                y: cy + dy,
            });
        }
        circles.push(ClusterCircle {
            cluster_id: cluster.id.clone(),
            x: cx,
            y: cy,
            radius,
            size: cluster.size,
        });
    }

    if !result.outliers.is_empty() {
        let reach = circles
            .iter()
            .map(|c| (c.x * c.x + c.y * c.y).sqrt() + c.radius)
            .fold(0.0, f32::max);
        let radius = reach + OUTLIER_MARGIN;
        for (j, id) in result.outliers.iter().enumerate() {
            let (x, y) = polar(radius, j, result.outliers.len());
            nodes.push(VisualNode {
                id: id.clone(),
                cluster_id: None,
                x,
                y,
            });
        }
    }

    ClusterVisualization {
        nodes,
        clusters: circles,
        source: LayoutSource::Fallback,
    }
}

/// Builds a layout from projected points.
///
/// Returns `None` unless every member and outlier has a position.
pub fn from_projection(
    result: &ClusteringResult,
    points: &[ProjectedPoint],
) -> Option<ClusterVisualization> {
    let positions: HashMap<&str, (f32, f32)> = points
        .iter()
        .map(|p| (p.id.as_str(), (p.x, p.y)))
        .collect();

    let mut nodes = Vec::with_capacity(result.embedding_count());
    let mut circles = Vec::with_capacity(result.clusters.len());

    for cluster in &result.clusters {
        let mut placed = Vec::with_capacity(cluster.members.len());
        for member in &cluster.members {
            let &(x, y) = positions.get(member.as_str())?;
            placed.push((x, y));
            nodes.push(VisualNode {
                id: member.clone(),
                cluster_id: Some(cluster.id.clone()),
                x,
                y,
            });
        }

        let n = placed.len().max(1) as f32;
        let cx = placed.iter().map(|p| p.0).sum::<f32>() / n;
        let cy = placed.iter().map(|p| p.1).sum::<f32>() / n;
        let radius = placed
            .iter()
            .map(|&(x, y)| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt())
            .fold(0.0, f32::max);
        circles.push(ClusterCircle {
            cluster_id: cluster.id.clone(),
            x: cx,
            y: cy,
            radius,
            size: cluster.size,
        });
    }

    for id in &result.outliers {
        let &(x, y) = positions.get(id.as_str())?;
        nodes.push(VisualNode {
            id: id.clone(),
            cluster_id: None,
            x,
            y,
        });
    }

    Some(ClusterVisualization {
        nodes,
        clusters: circles,
        source: LayoutSource::Projection,
    })
}

/// Point `index` of `count` evenly spaced on a circle of `radius`.
fn polar(radius: f32, index: usize, count: usize) -> (f32, f32) {
    let angle = TAU * index as f32 / count.max(1) as f32;
    (radius * angle.cos(), radius * angle.sin())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::{Cluster, ClusteringMetadata};

    fn cluster(id: &str, members: &[&str]) -> Cluster {
        Cluster {
            id: id.into(),
            members: members.iter().map(|s| s.to_string()).collect(),
            centroid: None,
            size: members.len(),
            cohesion: 1.0,
        }
    }

    fn result(clusters: Vec<Cluster>, outliers: &[&str]) -> ClusteringResult {
        ClusteringResult {
            total_clusters: clusters.len(),
            clusters,
            outliers: outliers.iter().map(|s| s.to_string()).collect(),
            silhouette_score: None,
            metadata: ClusteringMetadata {
                algorithm: "kmeans".into(),
                elapsed_ms: 0.0,
                converged: true,
                iterations: 1,
                created_at: Utc::now(),
            },
        }
    }

    fn dist(a: (f32, f32), b: (f32, f32)) -> f32 {
        ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
    }

    #[test]
    fn fallback_positions_every_member() {
        let r = result(
            vec![cluster("c0", &["a", "b"]), cluster("c1", &["c", "d", "e"])],
            &["x"],
        );
        let vis = circular_layout(&r);
        assert_eq!(vis.source, LayoutSource::Fallback);
        assert_eq!(vis.nodes.len(), 6);
        for id in ["a", "b", "c", "d", "e", "x"] {
            assert!(vis.node(id).is_some(), "missing {id}");
        }
        assert_eq!(vis.node("x").unwrap().cluster_id, None);
        assert_eq!(vis.node("c").unwrap().cluster_id.as_deref(), Some("c1"));
    }

    #[test]
    fn fallback_geometry() {
        let r = result(
            vec![cluster("c0", &["a", "b"]), cluster("c1", &["c", "d", "e"])],
            &["x"],
        );
        let vis = circular_layout(&r);

        let c1 = &vis.clusters[1];
        assert!((dist((c1.x, c1.y), (0.0, 0.0)) - RING_RADIUS).abs() < 1e-3);
        assert!((c1.radius - 6.0).abs() < 1e-6);
        for id in ["c", "d", "e"] {
            let n = vis.node(id).unwrap();
            assert!((dist((n.x, n.y), (c1.x, c1.y)) - 6.0).abs() < 1e-3);
        }

        let x = vis.node("x").unwrap();
        let outlier_ring = dist((x.x, x.y), (0.0, 0.0));
        assert!((outlier_ring - (RING_RADIUS + 6.0 + OUTLIER_MARGIN)).abs() < 1e-3);
    }

    #[test]
    fn single_cluster_centered() {
        let vis = circular_layout(&result(vec![cluster("c0", &["a"])], &[]));
        assert_eq!((vis.clusters[0].x, vis.clusters[0].y), (0.0, 0.0));
        let a = vis.node("a").unwrap();
        assert!((a.x - 2.0).abs() < 1e-6 && a.y.abs() < 1e-6);
    }

    #[test]
    fn fallback_is_deterministic() {
        let r = result(vec![cluster("c0", &["a", "b", "c"]), cluster("c1", &["d"])], &[]);
        assert_eq!(circular_layout(&r), circular_layout(&r));
    }

    #[test]
    fn projection_layout() {
        let r = result(vec![cluster("c0", &["a", "b"])], &["x"]);
        let points = vec![
            ProjectedPoint { id: "a".into(), x: 0.0, y: 0.0 },
            ProjectedPoint { id: "b".into(), x: 2.0, y: 0.0 },
            ProjectedPoint { id: "x".into(), x: 9.0, y: 9.0 },
        ];
        let vis = from_projection(&r, &points).unwrap();
        assert_eq!(vis.source, LayoutSource::Projection);
        assert_eq!(vis.nodes.len(), 3);
        assert_eq!((vis.clusters[0].x, vis.clusters[0].y), (1.0, 0.0));
        assert_eq!(vis.clusters[0].radius, 1.0);
        assert_eq!(vis.node("x").unwrap().x, 9.0);
    }

    #[test]
    fn projection_missing_point_rejected() {
        let r = result(vec![cluster("c0", &["a", "b"])], &[]);
        let points = vec![ProjectedPoint { id: "a".into(), x: 0.0, y: 0.0 }];
        assert!(from_projection(&r, &points).is_none());
    }
}
