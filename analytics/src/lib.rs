//! Contract for the remote analytics backend used by the clustering engine.
//!
//! The backend performs work the engine does not do locally: GNN-based
//! clustering and model training, 2D projection of embeddings, and short
//! theme labels for groups of texts. [`AnalyticsService`] is the seam;
//! [`HttpAnalytics`] talks to a JSON-over-HTTP deployment of it.

pub mod config;
pub mod error;
pub mod http;
pub mod service;

pub use config::AnalyticsConfig;
pub use error::AnalyticsError;
pub use http::HttpAnalytics;
pub use service::{
    AnalyticsService, GnnClusterRequest, GnnClusterResponse, LabeledEmbedding, ProjectedPoint,
    RemoteCluster, ThemeLabel, ThemeRequest, TrainRequest, TrainResponse,
};
