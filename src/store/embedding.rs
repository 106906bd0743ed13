//! Embedding function seam
//!
//! The store only relies on the output dimension, never on how vectors are
//! produced.

use crate::error::OrchestrationError;
use crate::http::{JsonClient, DEFAULT_TIMEOUT};
use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_DIMENSION: usize = 384;

#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Embed a batch, one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Deterministic offline embedder.
///
/// Lowercased word tokens are hashed with SHA-256 into `dimension` signed
/// buckets and the result is L2-normalized. Texts sharing words land close
/// together, which is enough to run the service without a model server.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        let lowered = text.to_lowercase();
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign: f32 = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

#[async_trait::async_trait]
impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embedding model served over HTTP: `POST {texts} -> {embeddings}`.
pub struct HttpEmbedder {
    http: JsonClient,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(url: &str, dimension: usize) -> Result<Self> {
        Ok(Self {
            http: JsonClient::new(url, DEFAULT_TIMEOUT)?,
            dimension,
        })
    }
}

#[async_trait::async_trait]
impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = self
            .http
            .post("", Some(&EmbedRequest { texts }))
            .await?
            .into_success("embedding service")?;

        let parsed: EmbedResponse = serde_json::from_value(body).map_err(|e| {
            OrchestrationError::UpstreamUnavailable(format!(
                "Invalid embedding response: {}",
                e
            ))
        })?;

        Ok(parsed.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    #[tokio::test]
    async fn test_hashing_embedder_shape_and_determinism() {
        let embedder = HashingEmbedder::new(64);
        let texts = vec!["AAPL info".to_string(), "AAPL info".to_string(), String::new()];
        let vectors = embedder.embed(&texts).await.unwrap();

        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == 64));
        assert_eq!(vectors[0], vectors[1]);
        assert!(vectors[2].iter().all(|v| *v == 0.0));

        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_words_are_closer() {
        let embedder = HashingEmbedder::default();
        let texts = vec![
            "MSFT earnings report eps".to_string(),
            "what were MSFT earnings".to_string(),
            "TSLA historical close volume".to_string(),
        ];
        let v = embedder.embed(&texts).await.unwrap();
        assert!(distance(&v[0], &v[1]) < distance(&v[0], &v[2]));
    }
}
