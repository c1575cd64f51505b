use serde::{Deserialize, Serialize};

use embedcluster_analytics::ThemeLabel;

use crate::types::Cluster;

/// A short description of what a cluster is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub cluster_id: String,
    pub label: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// In [0, 1]. Fallback themes use the cluster cohesion.
    pub confidence: f32,
    /// Members whose text was used to describe the cluster.
    #[serde(default)]
    pub representative_ids: Vec<String>,
    pub size: usize,
    /// True when no label could be generated.
    #[serde(default)]
    pub fallback: bool,
}

impl Theme {
    /// Theme built from a generated label.
    ///
    /// Keywords are capped at `max_keywords`. A missing or non-finite
    /// confidence falls back to the cluster cohesion.
    pub fn from_label(
        cluster: &Cluster,
        label: ThemeLabel,
        representative_ids: Vec<String>,
        max_keywords: usize,
    ) -> Self {
        let mut keywords = label.keywords;
        keywords.truncate(max_keywords);
        Self {
            cluster_id: cluster.id.clone(),
            label: label.label,
            keywords,
            confidence: label
                .confidence
                .filter(|c| c.is_finite())
                .unwrap_or(cluster.cohesion)
                .clamp(0.0, 1.0),
            representative_ids,
            size: cluster.size,
            fallback: false,
        }
    }

    /// Generic `"Theme {cluster id}"` theme.
    pub fn fallback(cluster: &Cluster, representative_ids: Vec<String>) -> Self {
        Self {
            cluster_id: cluster.id.clone(),
            label: format!("Theme {}", cluster.id),
            keywords: Vec::new(),
            confidence: cluster.cohesion.clamp(0.0, 1.0),
            representative_ids,
            size: cluster.size,
            fallback: true,
        }
    }
}
