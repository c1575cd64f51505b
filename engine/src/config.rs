use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClusterError, Result};
use crate::kmeans::DEFAULT_MAX_ITERATIONS;

/// Clustering algorithm selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    KMeans,
    Hierarchical,
    Dbscan,
    /// Delegated to the remote analytics service.
    Gnn,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::KMeans => "kmeans",
            Algorithm::Hierarchical => "hierarchical",
            Algorithm::Dbscan => "dbscan",
            Algorithm::Gnn => "gnn",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kmeans" | "k-means" => Ok(Algorithm::KMeans),
            "hierarchical" => Ok(Algorithm::Hierarchical),
            "dbscan" => Ok(Algorithm::Dbscan),
            "gnn" => Ok(Algorithm::Gnn),
            other => Err(ClusterError::Config(format!("unknown algorithm {other:?}"))),
        }
    }
}

/// Per-request clustering options.
///
/// Field names follow the camelCase wire form (`numClusters`,
/// `minSimilarity`, `maxIterations`) when loaded from JSON or YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterConfig {
    pub algorithm: Algorithm,

    /// Target cluster count. Defaults to `clamp(floor(sqrt(n/2)), 3, 10)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_clusters: Option<usize>,

    /// Similarity threshold in [-1, 1]. DBSCAN uses `eps = 1 - min_similarity`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_similarity: Option<f32>,

    /// K-means iteration budget. Default: 100.
    pub max_iterations: usize,

    /// Seed for reproducible random choices. Entropy when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Opaque options forwarded to the remote GNN backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gnn: Option<Value>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::KMeans,
            num_clusters: None,
            min_similarity: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: None,
            gnn: None,
        }
    }
}

impl ClusterConfig {
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| ClusterError::Config(e.to_string()))?;
        Ok(cfg.with_defaults())
    }

    pub fn from_yaml(s: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(s).map_err(|e| ClusterError::Config(e.to_string()))?;
        Ok(cfg.with_defaults())
    }

    pub(crate) fn with_defaults(mut self) -> Self {
        if self.max_iterations == 0 {
            self.max_iterations = DEFAULT_MAX_ITERATIONS;
        }
        self
    }

    /// Rejects option values no algorithm can run with.
    pub fn validate(&self) -> Result<()> {
        if self.num_clusters == Some(0) {
            return Err(ClusterError::InvalidArgument(
                "numClusters must be positive".into(),
            ));
        }
        if let Some(s) = self.min_similarity {
            if !(-1.0..=1.0).contains(&s) {
                return Err(ClusterError::InvalidArgument(format!(
                    "minSimilarity must lie in [-1, 1], got {s}"
                )));
            }
        }
        Ok(())
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_num_clusters(mut self, k: usize) -> Self {
        self.num_clusters = Some(k);
        self
    }

    pub fn with_min_similarity(mut self, s: f32) -> Self {
        self.min_similarity = Some(s);
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_gnn_config(mut self, cfg: Value) -> Self {
        self.gnn = Some(cfg);
        self
    }
}

/// Options for theme discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThemeOptions {
    /// Clusters smaller than this get no theme. Default: 3.
    pub min_cluster_size: usize,
    /// Members nearest the centroid sent for labeling. Default: 5.
    pub representatives: usize,
    /// Keywords requested per theme. Default: 5.
    pub max_keywords: usize,
}

impl Default for ThemeOptions {
    fn default() -> Self {
        Self {
            min_cluster_size: 3,
            representatives: 5,
            max_keywords: 5,
        }
    }
}

impl ThemeOptions {
    pub(crate) fn with_defaults(mut self) -> Self {
        let d = Self::default();
        if self.representatives == 0 {
            self.representatives = d.representatives;
        }
        if self.max_keywords == 0 {
            self.max_keywords = d.max_keywords;
        }
        self
    }
}

/// Controls [`crate::ClusterEngine`] behavior.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on every remote analytics call. Default: 30s.
    pub remote_timeout: Duration,

    /// GNN model to use until a retrain replaces it. Lets several engines
    /// share one trained model.
    pub model_id: Option<String>,

    /// Representative members reported by cluster analysis. Default: 5.
    pub representatives: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(30),
            model_id: None,
            representatives: 5,
        }
    }
}

impl EngineConfig {
    pub(crate) fn with_defaults(mut self) -> Self {
        if self.remote_timeout.is_zero() {
            self.remote_timeout = Duration::from_secs(30);
        }
        if self.representatives == 0 {
            self.representatives = 5;
        }
        self
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    pub fn with_model_id(mut self, model_id: &str) -> Self {
        self.model_id = Some(model_id.to_string());
        self
    }

    pub fn with_representatives(mut self, n: usize) -> Self {
        self.representatives = n;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ClusterConfig::default();
        assert_eq!(cfg.algorithm, Algorithm::KMeans);
        assert_eq!(cfg.max_iterations, 100);
        assert!(cfg.num_clusters.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn json_camel_case() {
        let cfg = ClusterConfig::from_json(
            r#"{"algorithm":"dbscan","minSimilarity":0.8,"numClusters":4,"maxIterations":0}"#,
        )
        .unwrap();
        assert_eq!(cfg.algorithm, Algorithm::Dbscan);
        assert_eq!(cfg.min_similarity, Some(0.8));
        assert_eq!(cfg.num_clusters, Some(4));
        assert_eq!(cfg.max_iterations, 100, "zero normalized to default");
    }

    #[test]
    fn yaml_with_gnn_passthrough() {
        let yaml = r#"
algorithm: gnn
gnn:
  layers: 3
  aggregator: mean
"#;
        let cfg = ClusterConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.algorithm, Algorithm::Gnn);
        let gnn = cfg.gnn.unwrap();
        assert_eq!(gnn["layers"], 3);
        assert_eq!(gnn["aggregator"], "mean");
    }

    #[test]
    fn unknown_algorithm_rejected() {
        assert!(matches!(
            ClusterConfig::from_json(r#"{"algorithm":"spectral"}"#),
            Err(ClusterError::Config(_))
        ));
        assert!("spectral".parse::<Algorithm>().is_err());
        assert_eq!("K-Means".parse::<Algorithm>().unwrap(), Algorithm::KMeans);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cfg = ClusterConfig::default().with_num_clusters(0);
        assert!(cfg.validate().unwrap_err().is_invalid_argument());
        let cfg = ClusterConfig::default().with_min_similarity(1.5);
        assert!(cfg.validate().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn algorithm_display_roundtrip() {
        for a in [
            Algorithm::KMeans,
            Algorithm::Hierarchical,
            Algorithm::Dbscan,
            Algorithm::Gnn,
        ] {
            assert_eq!(a.to_string().parse::<Algorithm>().unwrap(), a);
            assert_eq!(serde_json::to_value(a).unwrap(), a.as_str());
        }
    }
}
