use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::math::{average_pairwise_similarity, centroid};

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

/// A content vector with its source text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub id: String,
    pub vector: Vec<f32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
}

impl Embedding {
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.vector
    }
}

// ---------------------------------------------------------------------------
// Cluster
// ---------------------------------------------------------------------------

/// A group of embeddings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    /// Member embedding ids. Order carries no meaning.
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid: Option<Vec<f32>>,
    pub size: usize,
    /// Mean pairwise cosine similarity of members, clamped to [0, 1].
    /// Singletons have cohesion 1.0.
    pub cohesion: f32,
}

impl Cluster {
    /// Builds a cluster from a subset of `embeddings`, computing centroid and cohesion.
    pub fn from_indices(id: impl Into<String>, embeddings: &[Embedding], indices: &[usize]) -> Self {
        let vectors: Vec<&[f32]> = indices
            .iter()
            .map(|&i| embeddings[i].vector.as_slice())
            .collect();
        Self {
            id: id.into(),
            members: indices.iter().map(|&i| embeddings[i].id.clone()).collect(),
            centroid: Some(centroid(&vectors)),
            size: indices.len(),
            cohesion: average_pairwise_similarity(&vectors).clamp(0.0, 1.0),
        }
    }

    pub fn contains(&self, embedding_id: &str) -> bool {
        self.members.iter().any(|m| m == embedding_id)
    }
}

// ---------------------------------------------------------------------------
// ClusteringResult
// ---------------------------------------------------------------------------

/// How a clustering run went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringMetadata {
    /// "kmeans", "dbscan", "hierarchical", "gnn" or "similarity".
    pub algorithm: String,
    pub elapsed_ms: f64,
    /// False only when an iterative algorithm ran out of iterations.
    pub converged: bool,
    /// Refinement rounds; 0 for single-pass algorithms.
    pub iterations: usize,
    pub created_at: DateTime<Utc>,
}

/// Uniform output of every clustering algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub clusters: Vec<Cluster>,
    /// Embeddings assigned to no cluster.
    #[serde(default)]
    pub outliers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub silhouette_score: Option<f32>,
    pub total_clusters: usize,
    pub metadata: ClusteringMetadata,
}

impl ClusteringResult {
    /// The cluster containing `embedding_id`, if any.
    pub fn cluster_of(&self, embedding_id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.contains(embedding_id))
    }

    pub fn is_outlier(&self, embedding_id: &str) -> bool {
        self.outliers.iter().any(|o| o == embedding_id)
    }

    /// Number of embeddings covered, clustered or not.
    pub fn embedding_count(&self) -> usize {
        self.clusters.iter().map(|c| c.size).sum::<usize>() + self.outliers.len()
    }
}
