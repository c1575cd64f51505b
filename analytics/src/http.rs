use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::AnalyticsConfig;
use crate::error::AnalyticsError;
use crate::service::{
    AnalyticsService, GnnClusterRequest, GnnClusterResponse, ProjectedPoint, ThemeLabel,
    ThemeRequest, TrainRequest, TrainResponse,
};

const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";

#[derive(Serialize)]
struct ProjectionRequest<'a> {
    embedding_ids: &'a [String],
}

#[derive(Deserialize)]
struct ProjectionResponse {
    points: Vec<ProjectedPoint>,
}

/// Analytics client for a JSON-over-HTTP backend.
///
/// Endpoints, relative to the base URL:
/// `POST /gnn/cluster`, `POST /gnn/train`, `POST /projection`, `POST /themes`.
pub struct HttpAnalytics {
    client: Client,
    api_key: String,
    base_url: String,
}

impl HttpAnalytics {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_config(cfg: AnalyticsConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: cfg.api_key,
            base_url: if cfg.base_url.is_empty() {
                DEFAULT_BASE_URL.to_string()
            } else {
                cfg.base_url
            },
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, AnalyticsError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned + Send,
    {
        let url = format!("{}{path}", self.base_url);
        let mut req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body);
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AnalyticsError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AnalyticsError::Api(format!("HTTP {status}: {body}")));
        }

        resp.json()
            .await
            .map_err(|e| AnalyticsError::InvalidResponse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl AnalyticsService for HttpAnalytics {
    async fn gnn_cluster(
        &self,
        req: &GnnClusterRequest,
    ) -> Result<GnnClusterResponse, AnalyticsError> {
        if req.embedding_ids.is_empty() {
            return Err(AnalyticsError::EmptyInput);
        }
        self.post_json("/gnn/cluster", req).await
    }

    async fn train_gnn(&self, req: &TrainRequest) -> Result<TrainResponse, AnalyticsError> {
        if req.examples.is_empty() {
            return Err(AnalyticsError::EmptyInput);
        }
        let resp: TrainResponse = self.post_json("/gnn/train", req).await?;
        if resp.model_id.is_empty() {
            return Err(AnalyticsError::InvalidResponse("empty model_id".into()));
        }
        Ok(resp)
    }

    async fn project_2d(
        &self,
        embedding_ids: &[String],
    ) -> Result<Vec<ProjectedPoint>, AnalyticsError> {
        if embedding_ids.is_empty() {
            return Err(AnalyticsError::EmptyInput);
        }
        let resp: ProjectionResponse = self
            .post_json("/projection", &ProjectionRequest { embedding_ids })
            .await?;
        Ok(resp.points)
    }

    async fn label_theme(&self, req: &ThemeRequest) -> Result<ThemeLabel, AnalyticsError> {
        if req.texts.is_empty() {
            return Err(AnalyticsError::EmptyInput);
        }
        let label: ThemeLabel = self.post_json("/themes", req).await?;
        if label.label.trim().is_empty() {
            return Err(AnalyticsError::InvalidResponse("empty theme label".into()));
        }
        Ok(label)
    }
}
