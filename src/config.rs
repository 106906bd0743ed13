//! Runtime settings
//!
//! Read from the environment (after `.env` is loaded by the binaries).
//! Defaults match a single-host deployment of all services.

use crate::error::OrchestrationError;
use crate::generation::DEFAULT_GENERATION_TIMEOUT;
use crate::models::DateRange;
use crate::parser::ParserConfig;
use crate::store::embedding::DEFAULT_DIMENSION;
use crate::store::{
    DocumentIndex, Embedder, HashingEmbedder, HttpEmbedder, RemoteRetriever, UnavailableIndex,
    VectorStore,
};
use crate::Result;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct Settings {
    pub orchestrator_port: u16,
    pub retriever_port: u16,
    pub financial_api_url: String,
    pub scraper_url: String,
    /// `None` runs the vector store inside the orchestrator process.
    pub retriever_url: Option<String>,
    pub llm_url: String,
    pub tts_url: String,
    /// Snapshot owned by the `retriever` service.
    pub index_path: PathBuf,
    /// Snapshot owned by the orchestrator's in-process store. Kept apart from
    /// `index_path` so the two processes never rewrite the same file.
    pub embedded_index_path: PathBuf,
    /// `None` selects the offline hashing embedder.
    pub embedding_url: Option<String>,
    pub embedding_dim: usize,
    pub historical_range: DateRange,
    pub generation_timeout: Duration,
    pub parser: ParserConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup; `from_env` uses the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let orchestrator_port = match get("ORCHESTRATOR_PORT").or_else(|| get("PORT")) {
            Some(raw) => parse_value("ORCHESTRATOR_PORT", &raw)?,
            None => 8001,
        };

        let default_range = DateRange::default();
        let historical_range = DateRange::parse(
            &or("HISTORICAL_START", &default_range.start.to_string()),
            &or("HISTORICAL_END", &default_range.end.to_string()),
        )?;

        Ok(Self {
            orchestrator_port,
            retriever_port: parse_or(&get, "RETRIEVER_PORT", 8004)?,
            financial_api_url: or("FINANCIAL_API_BASE_URL", "http://127.0.0.1:8002"),
            scraper_url: or("SCRAPER_BASE_URL", "http://127.0.0.1:8003"),
            retriever_url: get("RETRIEVER_BASE_URL"),
            llm_url: or("LLM_BASE_URL", "http://127.0.0.1:8005"),
            tts_url: or("TTS_BASE_URL", "http://127.0.0.1:8006"),
            index_path: PathBuf::from(or("VECTOR_INDEX_PATH", "vector_index.json")),
            embedded_index_path: PathBuf::from(or(
                "EMBEDDED_INDEX_PATH",
                "orchestrator_index.json",
            )),
            embedding_url: get("EMBEDDING_URL"),
            embedding_dim: parse_or(&get, "EMBEDDING_DIM", DEFAULT_DIMENSION)?,
            historical_range,
            generation_timeout: Duration::from_secs(parse_or(
                &get,
                "GENERATION_TIMEOUT_SECS",
                DEFAULT_GENERATION_TIMEOUT.as_secs(),
            )?),
            parser: ParserConfig::from_lists(
                get("TICKER_DENYLIST").as_deref(),
                get("TICKER_ALLOWLIST").as_deref(),
            ),
        })
    }
}

impl Settings {
    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        match &self.embedding_url {
            Some(url) => {
                info!(%url, dimension = self.embedding_dim, "Using HTTP embedding service");
                Ok(Arc::new(HttpEmbedder::new(url, self.embedding_dim)?))
            }
            None => {
                info!(dimension = self.embedding_dim, "Using offline hashing embedder");
                Ok(Arc::new(HashingEmbedder::new(self.embedding_dim)))
            }
        }
    }

    /// The store served by the `retriever` binary.
    pub async fn retriever_index(&self) -> Arc<dyn DocumentIndex> {
        self.open_store(&self.index_path).await
    }

    /// Open a vector store at `path`.
    ///
    /// A failure is logged once and turned into an index that rejects every
    /// call, so the service still boots and reports the cause per request.
    async fn open_store(&self, path: &Path) -> Arc<dyn DocumentIndex> {
        let opened = match self.embedder() {
            Ok(embedder) => VectorStore::open(path, embedder).await,
            Err(e) => Err(e),
        };

        match opened {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Vector store failed to initialize");
                Arc::new(UnavailableIndex::new(e.to_string()))
            }
        }
    }

    /// Orchestrator index: the remote retriever when configured, otherwise an
    /// in-process store at `embedded_index_path`.
    pub async fn document_index(&self) -> Arc<dyn DocumentIndex> {
        if let Some(url) = &self.retriever_url {
            match RemoteRetriever::new(url) {
                Ok(remote) => {
                    info!(%url, "Using remote retriever");
                    return Arc::new(remote);
                }
                Err(e) => {
                    error!(%url, error = %e, "Remote retriever client failed to initialize");
                    return Arc::new(UnavailableIndex::new(e.to_string()));
                }
            }
        }
        self.open_store(&self.embedded_index_path).await
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        OrchestrationError::Validation(format!("Invalid {} '{}': {}", key, raw, e))
    })
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.orchestrator_port, 8001);
        assert_eq!(s.retriever_port, 8004);
        assert_eq!(s.financial_api_url, "http://127.0.0.1:8002");
        assert!(s.retriever_url.is_none());
        assert!(s.embedding_url.is_none());
        assert_eq!(s.embedding_dim, 384);
        assert_eq!(s.historical_range, DateRange::default());
        assert_eq!(s.generation_timeout, Duration::from_secs(300));
        assert!(s.parser.deny.is_empty());
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("PORT", "9000"),
            ("RETRIEVER_BASE_URL", "http://retriever:8004"),
            ("HISTORICAL_START", "2024-01-02"),
            ("HISTORICAL_END", "2024-03-04"),
            ("TICKER_DENYLIST", "I,A,CEO"),
            ("EMBEDDING_DIM", "768"),
        ])
        .unwrap();

        assert_eq!(s.orchestrator_port, 9000);
        assert_eq!(s.retriever_url.as_deref(), Some("http://retriever:8004"));
        assert_eq!(s.historical_range.start.to_string(), "2024-01-02");
        assert_eq!(s.embedding_dim, 768);
        assert!(s.parser.deny.contains("CEO"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(settings(&[("RETRIEVER_PORT", "eighty")]).is_err());
        assert!(settings(&[("HISTORICAL_START", "April 1st")]).is_err());
        assert!(settings(&[("GENERATION_TIMEOUT_SECS", "-1")]).is_err());
    }

    #[tokio::test]
    async fn test_unusable_index_path_yields_unavailable_index() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let mut s = settings(&[]).unwrap();
        s.index_path = blocker.join("index.json");
        s.embedded_index_path = blocker.join("embedded.json");

        for index in [s.retriever_index().await, s.document_index().await] {
            let err = index.stats().await.unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Internal);
        }
    }

    #[tokio::test]
    async fn test_local_index_uses_configured_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(&[("EMBEDDING_DIM", "32")]).unwrap();
        s.embedded_index_path = dir.path().join("index.json");

        let stats = s.document_index().await.stats().await.unwrap();
        assert_eq!(stats.dimension, 32);
        assert_eq!(stats.documents, 0);
    }

    #[test]
    fn test_embedded_and_retriever_snapshots_differ_by_default() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.index_path, PathBuf::from("vector_index.json"));
        assert_eq!(s.embedded_index_path, PathBuf::from("orchestrator_index.json"));
        assert_ne!(s.index_path, s.embedded_index_path);

        let s = settings(&[("EMBEDDED_INDEX_PATH", "/data/embedded.json")]).unwrap();
        assert_eq!(s.embedded_index_path, PathBuf::from("/data/embedded.json"));
    }

    #[tokio::test]
    async fn test_embedded_store_does_not_touch_retriever_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = settings(&[]).unwrap();
        s.index_path = dir.path().join("vector_index.json");
        s.embedded_index_path = dir.path().join("orchestrator_index.json");

        let embedded = s.document_index().await;
        embedded.add_documents(vec!["AAPL info".to_string()]).await.unwrap();

        assert!(s.embedded_index_path.exists());
        assert!(!s.index_path.exists());
        assert_eq!(s.retriever_index().await.stats().await.unwrap().documents, 0);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let s = settings(&[("RETRIEVER_BASE_URL", "  "), ("LLM_BASE_URL", "")]).unwrap();
        assert!(s.retriever_url.is_none());
        assert_eq!(s.llm_url, "http://127.0.0.1:8005");
    }
}
