//! Vector index store
//!
//! Append-only documents with nearest-neighbour search over their
//! embeddings, persisted as a full snapshot after every append.
//!
//! Appends (embed, extend, persist, publish) are serialized by a single
//! writer lock. Readers clone the current `Arc<IndexState>` under a brief
//! read lock and rank against that copy, so a query always sees whole
//! batches and never waits on a persist.

pub mod embedding;
pub mod remote;
pub mod snapshot;

pub use embedding::{Embedder, HashingEmbedder, HttpEmbedder};
pub use remote::RemoteRetriever;
pub use snapshot::IndexState;

use crate::error::OrchestrationError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    pub documents: usize,
    pub dimension: usize,
}

/// Document index as seen by the orchestrator and the retriever API.
#[async_trait::async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Append a batch; returns how many documents were added.
    async fn add_documents(&self, docs: Vec<String>) -> Result<usize>;

    /// Up to `top_k` documents, nearest first.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>>;

    async fn stats(&self) -> Result<IndexStats>;
}

pub struct VectorStore {
    path: PathBuf,
    embedder: Arc<dyn Embedder>,
    current: RwLock<Arc<IndexState>>,
    writer: Mutex<()>,
}

impl VectorStore {
    /// Open the store at `path`, loading its snapshot if one is usable.
    ///
    /// Fails only when the snapshot directory cannot be created.
    pub async fn open(path: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        snapshot::prepare_dir(&path).await?;

        let state = snapshot::load(&path, embedder.dimension()).await;

        Ok(Self {
            path,
            embedder,
            current: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
        })
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshot().await.is_empty()
    }

    /// Consistent view of the index at this instant.
    pub async fn snapshot(&self) -> Arc<IndexState> {
        self.current.read().await.clone()
    }

    /// Append `docs` and persist the whole index before returning.
    ///
    /// If persisting fails nothing is published, so memory and disk agree.
    pub async fn add(&self, docs: Vec<String>) -> Result<usize> {
        if docs.is_empty() {
            return Err(OrchestrationError::Validation(
                "No documents provided.".to_string(),
            ));
        }

        let embeddings = self.embed_checked(&docs).await?;
        let count = docs.len();

        let _writer = self.writer.lock().await;

        let mut next = IndexState::clone(&*self.snapshot().await);
        next.vectors.extend(embeddings);
        next.documents.extend(docs);

        snapshot::persist(&self.path, &next).await?;

        let total = next.len();
        *self.current.write().await = Arc::new(next);

        info!(added = count, total, "Added documents to index");
        Ok(count)
    }

    /// Rank all documents by squared L2 distance to `text`.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<String>> {
        if top_k == 0 {
            return Err(OrchestrationError::Validation(
                "top_k must be at least 1".to_string(),
            ));
        }

        let state = self.snapshot().await;
        if state.is_empty() {
            return Err(OrchestrationError::EmptyIndex);
        }

        let query = self
            .embed_checked(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| OrchestrationError::Internal("Embedder returned no vector".into()))?;

        let mut ranked: Vec<(f32, usize)> = state
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, vector)| (squared_l2(vector, &query), idx))
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        debug!(top_k, candidates = ranked.len(), "Index query");

        Ok(ranked
            .into_iter()
            .take(top_k)
            .map(|(_, idx)| state.documents[idx].clone())
            .collect())
    }

    async fn embed_checked(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.embedder.embed(texts).await?;
        let dimension = self.embedder.dimension();

        if vectors.len() != texts.len() {
            return Err(OrchestrationError::Internal(format!(
                "Embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(OrchestrationError::Internal(format!(
                "Embedder returned a {}-dimensional vector, expected {}",
                bad.len(),
                dimension
            )));
        }

        Ok(vectors)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[async_trait::async_trait]
impl DocumentIndex for VectorStore {
    async fn add_documents(&self, docs: Vec<String>) -> Result<usize> {
        self.add(docs).await
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        self.query(query, top_k).await
    }

    async fn stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            documents: self.len().await,
            dimension: self.dimension(),
        })
    }
}

/// Stand-in for a store that failed to initialize at boot.
///
/// Every call fails fast with the boot error; the load is not retried.
pub struct UnavailableIndex {
    reason: String,
}

impl UnavailableIndex {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> OrchestrationError {
        OrchestrationError::Internal(format!("Vector store unavailable: {}", self.reason))
    }
}

#[async_trait::async_trait]
impl DocumentIndex for UnavailableIndex {
    async fn add_documents(&self, _docs: Vec<String>) -> Result<usize> {
        Err(self.error())
    }

    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<String>> {
        Err(self.error())
    }

    async fn stats(&self) -> Result<IndexStats> {
        Err(self.error())
    }
}
