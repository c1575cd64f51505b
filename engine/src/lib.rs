//! Clustering of embedding vectors.
//!
//! Several interchangeable algorithms partition a set of embeddings into
//! groups of similar items: k-means with k-means++ seeding, DBSCAN,
//! a top-down hierarchical tree and a single-pass threshold clusterer.
//! Results carry cohesion and silhouette metrics, and can be turned into
//! 2D layouts and short theme labels.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use embedcluster_engine::{ClusterConfig, ClusterEngine, Embedding, EngineConfig, MemoryStore};
//!
//! # async fn run() -> embedcluster_engine::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! store.insert(Embedding::new("a", vec![0.0, 0.0]));
//! store.insert(Embedding::new("b", vec![0.0, 1.0]));
//! store.insert(Embedding::new("c", vec![10.0, 10.0]));
//!
//! let engine = ClusterEngine::new(store, EngineConfig::default());
//! let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
//! let result = engine
//!     .cluster(&ids, &ClusterConfig::default().with_num_clusters(2))
//!     .await?;
//!
//! // Falls back to a local circular layout without an analytics service.
//! let layout = engine.get_cluster_visualization(&result).await;
//! # let _ = layout;
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//!
//! [`ClusterEngine`] is the only type that talks to collaborators: an
//! [`EmbeddingStore`] for vectors and an optional
//! [`AnalyticsService`](embedcluster_analytics::AnalyticsService) for GNN
//! clustering, projection and labeling. The algorithms themselves are
//! synchronous and usable on their own.

mod analysis;
mod config;
mod dbscan;
mod engine;
mod error;
mod hierarchical;
mod kmeans;
pub mod math;
mod store;
mod themes;
mod threshold;
mod types;
mod visualize;

pub use analysis::{ClusterAnalysis, analyze};
pub use config::{Algorithm, ClusterConfig, EngineConfig, ThemeOptions};
pub use dbscan::{DEFAULT_EPS, DEFAULT_MIN_PTS, Dbscan, NOISE};
pub use engine::ClusterEngine;
pub use error::{ClusterError, Result};
pub use hierarchical::{ClusterTree, Hierarchical, HierarchicalCluster, NodeId};
pub use kmeans::{DEFAULT_MAX_ITERATIONS, KMeans, KMeansFit, default_k, silhouette_score};
pub use math::{cosine_similarity, euclidean_distance};
pub use store::{EmbeddingStore, MemoryStore};
pub use themes::Theme;
pub use threshold::cluster_by_similarity;
pub use types::{Cluster, ClusteringMetadata, ClusteringResult, Embedding};
pub use visualize::{
    ClusterCircle, ClusterVisualization, LayoutSource, VisualNode, circular_layout,
    from_projection,
};
