//! On-disk snapshot of the vector index and its document list
//!
//! The whole index is rewritten after every append: serialized to a sibling
//! temp file, synced, then renamed over the snapshot path. Vectors are stored
//! as hex-encoded little-endian `f32` bytes so they reload bit-for-bit.

use crate::error::OrchestrationError;
use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// In-memory index contents. `vectors[i]` embeds `documents[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexState {
    pub dimension: usize,
    pub vectors: Vec<Vec<f32>>,
    pub documents: Vec<String>,
}

impl IndexState {
    pub fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            documents: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.dimension as u64).to_le_bytes());
        hasher.update((self.documents.len() as u64).to_le_bytes());
        for doc in &self.documents {
            hasher.update((doc.len() as u64).to_le_bytes());
            hasher.update(doc.as_bytes());
        }
        for vector in &self.vectors {
            for value in vector {
                hasher.update(value.to_le_bytes());
            }
        }
        hex::encode(hasher.finalize())
    }
}

#[derive(Serialize)]
struct SnapshotOut<'a> {
    dimension: usize,
    checksum: String,
    documents: &'a [String],
    vectors: Vec<String>,
}

#[derive(Deserialize)]
struct SnapshotIn {
    dimension: usize,
    checksum: String,
    documents: Vec<String>,
    vectors: Vec<String>,
}

fn encode_vector(vector: &[f32]) -> String {
    let bytes: Vec<u8> = vector.iter().flat_map(|v| v.to_le_bytes()).collect();
    hex::encode(bytes)
}

fn decode_vector(encoded: &str, dimension: usize) -> std::result::Result<Vec<f32>, String> {
    let bytes = hex::decode(encoded).map_err(|e| e.to_string())?;
    if bytes.len() != dimension * 4 {
        return Err(format!(
            "vector has {} bytes, expected {}",
            bytes.len(),
            dimension * 4
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn decode(raw: &[u8], dimension: usize) -> std::result::Result<IndexState, String> {
    let snapshot: SnapshotIn = serde_json::from_slice(raw).map_err(|e| e.to_string())?;

    if snapshot.dimension != dimension {
        return Err(format!(
            "snapshot dimension {} does not match embedder dimension {}",
            snapshot.dimension, dimension
        ));
    }
    if snapshot.vectors.len() != snapshot.documents.len() {
        return Err(format!(
            "{} vectors for {} documents",
            snapshot.vectors.len(),
            snapshot.documents.len()
        ));
    }

    let vectors = snapshot
        .vectors
        .iter()
        .map(|v| decode_vector(v, dimension))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let state = IndexState {
        dimension,
        vectors,
        documents: snapshot.documents,
    };

    if state.checksum() != snapshot.checksum {
        return Err("checksum mismatch".to_string());
    }

    Ok(state)
}

/// Load the snapshot at `path`, or an empty index when it is missing or
/// unusable. Never fails.
pub async fn load(path: &Path, dimension: usize) -> IndexState {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), dimension, "No snapshot found, initialized empty index");
            return IndexState::empty(dimension);
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Snapshot unreadable, starting with empty index");
            return IndexState::empty(dimension);
        }
    };

    match decode(&raw, dimension) {
        Ok(state) => {
            info!(path = %path.display(), documents = state.len(), "Loaded existing index and documents");
            state
        }
        Err(reason) => {
            warn!(path = %path.display(), %reason, "Snapshot corrupt, starting with empty index");
            IndexState::empty(dimension)
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Durably replace the snapshot at `path` with `state`.
pub async fn persist(path: &Path, state: &IndexState) -> Result<()> {
    let snapshot = SnapshotOut {
        dimension: state.dimension,
        checksum: state.checksum(),
        documents: &state.documents,
        vectors: state.vectors.iter().map(|v| encode_vector(v)).collect(),
    };
    let bytes = serde_json::to_vec(&snapshot).map_err(|e| {
        OrchestrationError::Internal(format!("Failed to encode index snapshot: {}", e))
    })?;

    let tmp = temp_path(path);
    let write = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await
    };

    write.await.map_err(|e| {
        OrchestrationError::Internal(format!(
            "Failed to persist index to {}: {}",
            path.display(),
            e
        ))
    })
}

/// Make sure the snapshot's directory exists.
pub async fn prepare_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                OrchestrationError::Internal(format!(
                    "Cannot create index directory {}: {}",
                    parent.display(),
                    e
                ))
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IndexState {
        IndexState {
            dimension: 3,
            vectors: vec![vec![0.1, -0.2, 0.3], vec![1.0 / 3.0, f32::MIN_POSITIVE, 7.5]],
            documents: vec!["AAPL info:\n{}".to_string(), "MSFT info:\n{}".to_string()],
        }
    }

    #[tokio::test]
    async fn test_persist_then_load_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        persist(&path, &sample()).await.unwrap();
        let loaded = load(&path, 3).await;

        assert_eq!(loaded, sample());
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load(&dir.path().join("absent.json"), 8).await;
        assert!(loaded.is_empty());
        assert_eq!(loaded.dimension, 8);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        tokio::fs::write(&path, b"{not json").await.unwrap();
        assert!(load(&path, 3).await.is_empty());

        // valid JSON, tampered document
        persist(&path, &sample()).await.unwrap();
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        tokio::fs::write(&path, raw.replace("MSFT", "MSFX")).await.unwrap();
        assert!(load(&path, 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        persist(&path, &sample()).await.unwrap();
        let loaded = load(&path, 384).await;
        assert!(loaded.is_empty());
        assert_eq!(loaded.dimension, 384);
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let tmp = temp_path(Path::new("/var/lib/fqo/index.json"));
        assert_eq!(tmp, PathBuf::from("/var/lib/fqo/index.json.tmp"));
    }
}
