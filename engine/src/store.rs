use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Embedding;

/// Resolves identifiers, documents and namespaces to embeddings.
///
/// Implementations must be safe for concurrent use.
/// Use [`MemoryStore`] for in-memory storage (testing/ephemeral).
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Returns the embeddings for `ids`. Unknown ids are skipped, so the
    /// result may be shorter than the request.
    async fn get_embeddings(&self, ids: &[String]) -> Result<Vec<Embedding>>;

    /// Returns the ids of every embedding belonging to one of `document_ids`.
    async fn ids_by_documents(&self, document_ids: &[String]) -> Result<Vec<String>>;

    /// Returns the ids of every embedding in `namespace`.
    async fn ids_by_namespace(&self, namespace: &str) -> Result<Vec<String>>;
}

/// In-memory [`EmbeddingStore`] implementation.
/// Data is lost on restart. Suitable for testing or ephemeral use.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    embeddings: HashMap<String, Embedding>,
    order: Vec<String>,
    namespaces: HashMap<String, Vec<String>>,
}

impl MemoryStoreInner {
    fn put(&mut self, emb: Embedding) -> String {
        let id = emb.id.clone();
        if self.embeddings.insert(id.clone(), emb).is_none() {
            self.order.push(id.clone());
        }
        id
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Stores an embedding, replacing any previous one with the same id.
    pub fn insert(&self, emb: Embedding) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.put(emb);
    }

    /// Stores an embedding and adds it to `namespace`.
    pub fn insert_in_namespace(&self, namespace: &str, emb: Embedding) {
        let mut inner = self.inner.write().expect("lock poisoned");
        let id = inner.put(emb);
        let ids = inner.namespaces.entry(namespace.to_string()).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingStore for MemoryStore {
    async fn get_embeddings(&self, ids: &[String]) -> Result<Vec<Embedding>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| inner.embeddings.get(id).cloned())
            .collect())
    }

    async fn ids_by_documents(&self, document_ids: &[String]) -> Result<Vec<String>> {
        let wanted: HashSet<&str> = document_ids.iter().map(String::as_str).collect();
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner
            .order
            .iter()
            .filter(|id| {
                inner.embeddings[id.as_str()]
                    .document_id
                    .as_deref()
                    .is_some_and(|d| wanted.contains(d))
            })
            .cloned()
            .collect())
    }

    async fn ids_by_namespace(&self, namespace: &str) -> Result<Vec<String>> {
        let inner = self.inner.read().expect("lock poisoned");
        Ok(inner.namespaces.get(namespace).cloned().unwrap_or_default())
    }
}
