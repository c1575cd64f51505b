use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use embedcluster_analytics::{
    AnalyticsError, AnalyticsService, GnnClusterRequest, GnnClusterResponse, LabeledEmbedding,
    ThemeRequest, TrainRequest, TrainResponse,
};

use crate::analysis::{ClusterAnalysis, analyze, nearest_to_centroid};
use crate::config::{Algorithm, ClusterConfig, EngineConfig, ThemeOptions};
use crate::dbscan::{Dbscan, NOISE};
use crate::error::{ClusterError, Result};
use crate::hierarchical::{ClusterTree, Hierarchical};
use crate::kmeans::{KMeans, default_k, silhouette_score};
use crate::math::{centroid, check_dimensions};
use crate::store::EmbeddingStore;
use crate::themes::Theme;
use crate::threshold;
use crate::types::{Cluster, ClusteringMetadata, ClusteringResult, Embedding};
use crate::visualize::{self, ClusterVisualization};

/// Entry point for clustering embeddings.
///
/// Resolves embedding ids through an [`EmbeddingStore`], runs the selected
/// algorithm and derives layouts and themes from the result. GNN
/// clustering, 2D projection and theme labeling go through an optional
/// [`AnalyticsService`]; without one, GNN operations fail and layouts and
/// themes use their local fallbacks.
///
/// The only state kept between calls is the current GNN model id.
/// Safe for concurrent use.
pub struct ClusterEngine {
    store: Arc<dyn EmbeddingStore>,
    analytics: Option<Arc<dyn AnalyticsService>>,
    cfg: EngineConfig,
    model_id: RwLock<Option<String>>,
}

impl ClusterEngine {
    pub fn new(store: Arc<dyn EmbeddingStore>, cfg: EngineConfig) -> Self {
        let cfg = cfg.with_defaults();
        Self {
            store,
            analytics: None,
            model_id: RwLock::new(cfg.model_id.clone()),
            cfg,
        }
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsService>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// GNN model used by [`Self::gnn_cluster`], if any.
    pub fn model_id(&self) -> Option<String> {
        self.model_id.read().expect("lock poisoned").clone()
    }

    // -----------------------------------------------------------------------
    // Clustering
    // -----------------------------------------------------------------------

    /// Clusters the embeddings behind `ids` with `config.algorithm`.
    ///
    /// Duplicate ids are ignored. Unknown ids and inconsistent vector
    /// dimensions are invalid arguments.
    pub async fn cluster(&self, ids: &[String], config: &ClusterConfig) -> Result<ClusteringResult> {
        self.run_cluster(ids, config)
            .await
            .map_err(|e| ClusterError::normalize("cluster", e))
    }

    /// Clusters every embedding belonging to `document_ids`.
    pub async fn cluster_documents(
        &self,
        document_ids: &[String],
        config: &ClusterConfig,
    ) -> Result<ClusteringResult> {
        let run = async {
            if document_ids.is_empty() {
                return Err(ClusterError::InvalidArgument("no document ids".into()));
            }
            let ids = self.store.ids_by_documents(document_ids).await?;
            if ids.is_empty() {
                return Err(ClusterError::InvalidArgument(format!(
                    "no embeddings for {} documents",
                    document_ids.len()
                )));
            }
            self.run_cluster(&ids, config).await
        };
        run.await
            .map_err(|e| ClusterError::normalize("cluster_documents", e))
    }

    /// Clusters every embedding in `namespace`.
    pub async fn cluster_by_namespace(
        &self,
        namespace: &str,
        config: &ClusterConfig,
    ) -> Result<ClusteringResult> {
        let run = async {
            let ids = self.store.ids_by_namespace(namespace).await?;
            if ids.is_empty() {
                return Err(ClusterError::InvalidArgument(format!(
                    "namespace {namespace:?} has no embeddings"
                )));
            }
            self.run_cluster(&ids, config).await
        };
        run.await
            .map_err(|e| ClusterError::normalize("cluster_by_namespace", e))
    }

    /// Clusters `ids` with the remote GNN backend and the current model.
    ///
    /// `gnn_config` is forwarded unexamined.
    pub async fn gnn_cluster(
        &self,
        ids: &[String],
        gnn_config: Option<Value>,
    ) -> Result<ClusteringResult> {
        let mut config = ClusterConfig::default().with_algorithm(Algorithm::Gnn);
        config.gnn = gnn_config;
        self.run_cluster(ids, &config)
            .await
            .map_err(|e| ClusterError::normalize("gnn_cluster", e))
    }

    /// Trains a GNN model from labeled embeddings.
    ///
    /// On success the new model replaces the current one for later
    /// [`Self::gnn_cluster`] calls.
    pub async fn train_gnn_model(
        &self,
        examples: Vec<LabeledEmbedding>,
        config: Option<Value>,
    ) -> Result<TrainResponse> {
        let run = async {
            if examples.is_empty() {
                return Err(ClusterError::InvalidArgument("no training examples".into()));
            }
            let analytics = self.analytics()?;
            let req = TrainRequest { examples, config };
            let resp = self.call_remote(analytics.train_gnn(&req)).await?;

            let previous = self
                .model_id
                .write()
                .expect("lock poisoned")
                .replace(resp.model_id.clone());
            info!(
                model_id = %resp.model_id,
                previous = previous.as_deref().unwrap_or(""),
                examples = req.examples.len(),
                "cluster: gnn model trained"
            );
            Ok(resp)
        };
        run.await
            .map_err(|e| ClusterError::normalize("train_gnn_model", e))
    }

    /// Builds a cluster tree with about `num_clusters` leaves.
    pub async fn hierarchical_cluster(
        &self,
        ids: &[String],
        num_clusters: usize,
    ) -> Result<ClusterTree> {
        let run = async {
            let embeddings = self.resolve(ids).await?;
            Hierarchical::new(num_clusters).build(&embeddings)
        };
        run.await
            .map_err(|e| ClusterError::normalize("hierarchical_cluster", e))
    }

    /// Single-pass threshold clustering over `ids` in the given order.
    ///
    /// Every embedding lands in exactly one cluster; there are no outliers.
    pub async fn cluster_by_similarity(
        &self,
        ids: &[String],
        threshold: f32,
    ) -> Result<ClusteringResult> {
        let run = async {
            let started = Instant::now();
            let embeddings = self.resolve(ids).await?;
            let clusters = threshold::cluster_by_similarity(&embeddings, threshold)?;
            let result = Partition::single_pass(clusters).into_result("similarity", started);
            log_finished(&result, embeddings.len());
            Ok::<_, ClusterError>(result)
        };
        run.await
            .map_err(|e| ClusterError::normalize("cluster_by_similarity", e))
    }

    // -----------------------------------------------------------------------
    // Analysis
    // -----------------------------------------------------------------------

    /// Reports centroid, spread and representative members of `cluster`.
    pub async fn analyze_cluster(&self, cluster: &Cluster) -> Result<ClusterAnalysis> {
        let run = async {
            if cluster.members.is_empty() {
                return Err(ClusterError::InvalidArgument(format!(
                    "cluster {} has no members",
                    cluster.id
                )));
            }
            let members = self.resolve(&cluster.members).await?;
            Ok(analyze(cluster, &members, self.cfg.representatives))
        };
        run.await
            .map_err(|e| ClusterError::normalize("analyze_cluster", e))
    }

    /// Positions every member and outlier of `result` on a 2D plane.
    ///
    /// Uses the remote projection when it succeeds and covers every
    /// embedding; otherwise falls back to [`visualize::circular_layout`].
    /// Never fails.
    pub async fn get_cluster_visualization(&self, result: &ClusteringResult) -> ClusterVisualization {
        let Some(analytics) = &self.analytics else {
            debug!("cluster: no analytics service, using circular layout");
            return visualize::circular_layout(result);
        };

        let ids: Vec<String> = result
            .clusters
            .iter()
            .flat_map(|c| c.members.iter().cloned())
            .chain(result.outliers.iter().cloned())
            .collect();
        if ids.is_empty() {
            return visualize::circular_layout(result);
        }

        match self.call_remote(analytics.project_2d(&ids)).await {
            Ok(points) => match visualize::from_projection(result, &points) {
                Some(vis) => vis,
                None => {
                    warn!(
                        requested = ids.len(),
                        returned = points.len(),
                        "cluster: projection incomplete, using circular layout"
                    );
                    visualize::circular_layout(result)
                }
            },
            Err(e) => {
                warn!(error = %e, "cluster: projection failed, using circular layout");
                visualize::circular_layout(result)
            }
        }
    }

    /// Labels every cluster of `result` with at least
    /// `options.min_cluster_size` members.
    ///
    /// Store and labeling failures yield a fallback theme named after the
    /// cluster, so the call itself does not fail.
    pub async fn discover_themes(
        &self,
        result: &ClusteringResult,
        options: &ThemeOptions,
    ) -> Result<Vec<Theme>> {
        let opts = options.clone().with_defaults();
        let mut themes = Vec::new();

        for cluster in result
            .clusters
            .iter()
            .filter(|c| c.size >= opts.min_cluster_size)
        {
            let members = match self.store.get_embeddings(&cluster.members).await {
                Ok(members) => members,
                Err(e) => {
                    warn!(
                        cluster = %cluster.id,
                        error = %e,
                        "cluster: theme members unavailable, using fallback"
                    );
                    themes.push(Theme::fallback(cluster, Vec::new()));
                    continue;
                }
            };
            let center = match &cluster.centroid {
                Some(c) => c.clone(),
                None => centroid(&members),
            };
            let refs: Vec<&Embedding> = members.iter().collect();
            let reps = nearest_to_centroid(&center, &refs, opts.representatives);
            let rep_ids: Vec<String> = reps.iter().map(|e| e.id.clone()).collect();
            let texts: Vec<String> = reps
                .iter()
                .filter(|e| !e.text.trim().is_empty())
                .map(|e| e.text.clone())
                .collect();

            themes.push(self.label_cluster(cluster, texts, rep_ids, &opts).await);
        }

        debug!(
            clusters = result.clusters.len(),
            themes = themes.len(),
            fallbacks = themes.iter().filter(|t| t.fallback).count(),
            "cluster: themes discovered"
        );
        Ok(themes)
    }

    async fn label_cluster(
        &self,
        cluster: &Cluster,
        texts: Vec<String>,
        rep_ids: Vec<String>,
        opts: &ThemeOptions,
    ) -> Theme {
        let Some(analytics) = &self.analytics else {
            return Theme::fallback(cluster, rep_ids);
        };
        if texts.is_empty() {
            debug!(cluster = %cluster.id, "cluster: no member text, using fallback theme");
            return Theme::fallback(cluster, rep_ids);
        }

        let req = ThemeRequest {
            texts,
            max_keywords: opts.max_keywords,
        };
        match self.call_remote(analytics.label_theme(&req)).await {
            Ok(label) if !label.label.trim().is_empty() => {
                Theme::from_label(cluster, label, rep_ids, opts.max_keywords)
            }
            Ok(_) => {
                warn!(cluster = %cluster.id, "cluster: empty theme label, using fallback");
                Theme::fallback(cluster, rep_ids)
            }
            Err(e) => {
                warn!(cluster = %cluster.id, error = %e, "cluster: theme labeling failed, using fallback");
                Theme::fallback(cluster, rep_ids)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn run_cluster(&self, ids: &[String], config: &ClusterConfig) -> Result<ClusteringResult> {
        config.validate()?;
        let started = Instant::now();
        let algorithm = config.algorithm;
        info!(%algorithm, embeddings = ids.len(), "cluster: start");

        let embeddings = self.resolve(ids).await?;
        let partition = match algorithm {
            Algorithm::KMeans => run_kmeans(&embeddings, config)?,
            Algorithm::Hierarchical => run_hierarchical(&embeddings, config)?,
            Algorithm::Dbscan => run_dbscan(&embeddings, config)?,
            Algorithm::Gnn => self.run_gnn(&embeddings, config.gnn.clone()).await?,
        };

        let result = partition.into_result(algorithm.as_str(), started);
        log_finished(&result, embeddings.len());
        Ok(result)
    }

    async fn run_gnn(&self, embeddings: &[Embedding], gnn: Option<Value>) -> Result<Partition> {
        let analytics = self.analytics()?;
        let req = GnnClusterRequest {
            embedding_ids: embeddings.iter().map(|e| e.id.clone()).collect(),
            model_id: self.model_id(),
            config: gnn,
        };
        let resp = self.call_remote(analytics.gnn_cluster(&req)).await?;
        Ok(gnn_partition(embeddings, resp))
    }

    /// Fetches the embeddings for `ids` in request order.
    async fn resolve(&self, ids: &[String]) -> Result<Vec<Embedding>> {
        if ids.is_empty() {
            return Err(ClusterError::InvalidArgument("no embedding ids".into()));
        }

        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let mut found: HashMap<String, Embedding> = self
            .store
            .get_embeddings(&unique)
            .await?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();

        let mut embeddings = Vec::with_capacity(unique.len());
        let mut missing = Vec::new();
        for id in &unique {
            match found.remove(id) {
                Some(e) => embeddings.push(e),
                None => missing.push(id.as_str()),
            }
        }
        if !missing.is_empty() {
            return Err(ClusterError::InvalidArgument(format!(
                "{} unknown embedding ids: {}",
                missing.len(),
                missing.join(", ")
            )));
        }

        check_dimensions(&embeddings)?;
        Ok(embeddings)
    }

    fn analytics(&self) -> Result<&Arc<dyn AnalyticsService>> {
        self.analytics
            .as_ref()
            .ok_or(ClusterError::Remote(AnalyticsError::NotConfigured))
    }

    /// Runs a remote call under the configured timeout.
    async fn call_remote<T, F>(&self, fut: F) -> std::result::Result<T, AnalyticsError>
    where
        F: Future<Output = std::result::Result<T, AnalyticsError>>,
    {
        let limit = self.cfg.remote_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(res) => res,
            Err(_) => Err(AnalyticsError::Timeout(limit)),
        }
    }
}

fn log_finished(result: &ClusteringResult, embeddings: usize) {
    info!(
        algorithm = %result.metadata.algorithm,
        embeddings,
        clusters = result.total_clusters,
        outliers = result.outliers.len(),
        converged = result.metadata.converged,
        elapsed_ms = result.metadata.elapsed_ms,
        "cluster: done"
    );
}

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

/// Algorithm output before metadata is attached.
struct Partition {
    clusters: Vec<Cluster>,
    outliers: Vec<String>,
    silhouette: Option<f32>,
    converged: bool,
    iterations: usize,
}

impl Partition {
    fn single_pass(clusters: Vec<Cluster>) -> Self {
        Self {
            clusters,
            outliers: Vec::new(),
            silhouette: None,
            converged: true,
            iterations: 0,
        }
    }

    fn into_result(self, algorithm: &str, started: Instant) -> ClusteringResult {
        ClusteringResult {
            total_clusters: self.clusters.len(),
            clusters: self.clusters,
            outliers: self.outliers,
            silhouette_score: self.silhouette,
            metadata: ClusteringMetadata {
                algorithm: algorithm.to_string(),
                elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
                converged: self.converged,
                iterations: self.iterations,
                created_at: Utc::now(),
            },
        }
    }
}

/// Groups point indices by label, in ascending label order.
fn group_by<L: Ord + Copy>(labels: impl IntoIterator<Item = L>) -> BTreeMap<L, Vec<usize>> {
    let mut groups: BTreeMap<L, Vec<usize>> = BTreeMap::new();
    for (i, l) in labels.into_iter().enumerate() {
        groups.entry(l).or_default().push(i);
    }
    groups
}

fn run_kmeans(embeddings: &[Embedding], config: &ClusterConfig) -> Result<Partition> {
    let k = config
        .num_clusters
        .unwrap_or_else(|| default_k(embeddings.len()));
    let mut kmeans = KMeans::new(k).with_max_iterations(config.max_iterations);
    if let Some(seed) = config.seed {
        kmeans = kmeans.with_seed(seed);
    }
    let fit = kmeans.fit(embeddings)?;
    if !fit.converged {
        debug!(iterations = fit.iterations, "kmeans: iteration budget exhausted");
    }

    // Centroids that ended up empty are dropped.
    let clusters = group_by(fit.assignments.iter().copied())
        .into_values()
        .enumerate()
        .map(|(i, members)| Cluster::from_indices(format!("cluster-{i}"), embeddings, &members))
        .collect();

    Ok(Partition {
        clusters,
        outliers: Vec::new(),
        silhouette: Some(silhouette_score(embeddings, &fit.assignments)),
        converged: fit.converged,
        iterations: fit.iterations,
    })
}

fn run_dbscan(embeddings: &[Embedding], config: &ClusterConfig) -> Result<Partition> {
    let dbscan = Dbscan::from_min_similarity(config.min_similarity);
    let labels = dbscan.fit(embeddings)?;
    debug!(eps = dbscan.eps(), min_pts = dbscan.min_pts(), "dbscan: fitted");

    let mut groups = group_by(labels.iter().copied());
    let outliers = groups
        .remove(&NOISE)
        .unwrap_or_default()
        .into_iter()
        .map(|i| embeddings[i].id.clone())
        .collect();
    let clusters = groups
        .into_values()
        .enumerate()
        .map(|(i, members)| Cluster::from_indices(format!("cluster-{i}"), embeddings, &members))
        .collect();

    Ok(Partition {
        outliers,
        ..Partition::single_pass(clusters)
    })
}

fn run_hierarchical(embeddings: &[Embedding], config: &ClusterConfig) -> Result<Partition> {
    let k = config
        .num_clusters
        .unwrap_or_else(|| default_k(embeddings.len()));
    let tree = Hierarchical::new(k).build(embeddings)?;
    Ok(Partition::single_pass(tree.cut()))
}

/// Converts a remote clustering into a partition of `embeddings`.
///
/// Members the request did not contain are ignored, each embedding counts
/// for the first cluster claiming it, and unclaimed embeddings become
/// outliers.
fn gnn_partition(embeddings: &[Embedding], resp: GnnClusterResponse) -> Partition {
    let index: HashMap<&str, usize> = embeddings
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id.as_str(), i))
        .collect();
    let mut claimed = vec![false; embeddings.len()];
    let mut clusters = Vec::with_capacity(resp.clusters.len());
    let mut ignored = 0usize;

    for remote in resp.clusters {
        let mut members = Vec::with_capacity(remote.members.len());
        for id in &remote.members {
            match index.get(id.as_str()) {
                Some(&i) if !claimed[i] => {
                    claimed[i] = true;
                    members.push(i);
                }
                Some(_) => {}
                None => ignored += 1,
            }
        }
        if !members.is_empty() {
            clusters.push(Cluster::from_indices(remote.id, embeddings, &members));
        }
    }
    if ignored > 0 {
        warn!(ignored, "gnn: response named embeddings outside the request");
    }

    let outliers = claimed
        .iter()
        .enumerate()
        .filter(|(_, c)| !**c)
        .map(|(i, _)| embeddings[i].id.clone())
        .collect();

    Partition {
        outliers,
        ..Partition::single_pass(clusters)
    }
}

#[cfg(test)]
mod tests {
    use embedcluster_analytics::RemoteCluster;

    use super::*;

    fn embeddings(ids: &[&str]) -> Vec<Embedding> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| Embedding::new(*id, vec![1.0, i as f32]))
            .collect()
    }

    fn remote(id: &str, members: &[&str]) -> RemoteCluster {
        RemoteCluster {
            id: id.into(),
            members: members.iter().map(|s| s.to_string()).collect(),
            centroid: None,
            confidence: None,
        }
    }

    #[test]
    fn gnn_partition_first_claim_wins() {
        let emb = embeddings(&["a", "b", "c", "d"]);
        let resp = GnnClusterResponse {
            clusters: vec![
                remote("g1", &["a", "b", "zzz"]),
                remote("g2", &["b", "c"]),
                remote("g3", &["nope"]),
            ],
            outliers: vec!["d".into()],
            model_id: None,
        };
        let p = gnn_partition(&emb, resp);
        assert_eq!(p.clusters.len(), 2);
        assert_eq!(p.clusters[0].id, "g1");
        assert_eq!(p.clusters[0].members, vec!["a", "b"]);
        assert_eq!(p.clusters[1].members, vec!["c"]);
        assert_eq!(p.outliers, vec!["d"]);
    }

    #[test]
    fn group_by_orders_labels() {
        let groups = group_by([2, 0, 2, 1]);
        let keys: Vec<i32> = groups.keys().copied().collect();
        assert_eq!(keys, vec![0, 1, 2]);
        assert_eq!(groups[&2], vec![0, 2]);
    }

    #[test]
    fn dbscan_partition_collects_noise() {
        let emb = vec![
            Embedding::new("A", vec![0.0, 0.0]),
            Embedding::new("B", vec![0.0, 0.1]),
            Embedding::new("C", vec![0.0, 0.2]),
            Embedding::new("D", vec![0.1, 0.1]),
            Embedding::new("E", vec![50.0, 50.0]),
        ];
        let cfg = ClusterConfig::default()
            .with_algorithm(Algorithm::Dbscan)
            .with_min_similarity(0.8);
        let p = run_dbscan(&emb, &cfg).unwrap();
        assert_eq!(p.clusters.len(), 1);
        assert_eq!(p.clusters[0].id, "cluster-0");
        assert_eq!(p.clusters[0].size, 4);
        assert_eq!(p.outliers, vec!["E"]);
    }
}
