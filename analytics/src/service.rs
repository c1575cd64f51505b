use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AnalyticsError;

/// Remote analytics backend.
///
/// Every method is a single request/response exchange. Implementations
/// must be safe for concurrent use (Send + Sync) and must not retry on
/// their own behalf unless that is a documented property of the client.
#[async_trait::async_trait]
pub trait AnalyticsService: Send + Sync {
    /// Cluster the given embeddings with a GNN model.
    async fn gnn_cluster(
        &self,
        req: &GnnClusterRequest,
    ) -> Result<GnnClusterResponse, AnalyticsError>;

    /// Train (or retrain) a GNN model from labeled embeddings.
    async fn train_gnn(&self, req: &TrainRequest) -> Result<TrainResponse, AnalyticsError>;

    /// Project embeddings onto a 2D plane for display.
    async fn project_2d(&self, embedding_ids: &[String])
        -> Result<Vec<ProjectedPoint>, AnalyticsError>;

    /// Produce a short label and keywords describing a group of texts.
    async fn label_theme(&self, req: &ThemeRequest) -> Result<ThemeLabel, AnalyticsError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GnnClusterRequest {
    pub embedding_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Passed through to the backend unexamined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GnnClusterResponse {
    pub clusters: Vec<RemoteCluster>,
    #[serde(default)]
    pub outliers: Vec<String>,
    /// Model that produced the clustering, if the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

/// A cluster as reported by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCluster {
    pub id: String,
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centroid: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainRequest {
    pub examples: Vec<LabeledEmbedding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledEmbedding {
    pub embedding_id: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainResponse {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metrics: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub id: String,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeRequest {
    pub texts: Vec<String>,
    pub max_keywords: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeLabel {
    pub label: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}
