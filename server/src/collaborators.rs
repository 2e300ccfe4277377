use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use common::{EmbeddingsData, UserEmbedding};
use liveness_core::collaborators::{EmbeddingRecord, EmbeddingStore, KeySource, ModelByteSource};
use liveness_core::{CoreError, CoreResult};
use tokio::sync::RwLock;

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Reads encrypted model bytes from `<model_dir>/<name>.enc` on disk — the
/// demo stand-in for a real deployment's secret-store-backed source (§6).
pub struct FileModelByteSource {
    model_dir: PathBuf,
}

impl FileModelByteSource {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }
}

#[async_trait]
impl ModelByteSource for FileModelByteSource {
    async fn get(&self, name: &str) -> CoreResult<Vec<u8>> {
        let path = self.model_dir.join(format!("{name}.enc"));
        tokio::fs::read(&path).await.map_err(|e| CoreError::ModelLoadFailed {
            name: name.to_string(),
            detail: format!("reading {}: {e}", path.display()),
        })
    }
}

/// Reads the raw 32-byte AES key from a single file path (§6).
pub struct FileKeySource {
    key_path: PathBuf,
}

impl FileKeySource {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
        }
    }
}

#[async_trait]
impl KeySource for FileKeySource {
    async fn get(&self) -> CoreResult<[u8; 32]> {
        let bytes = tokio::fs::read(&self.key_path)
            .await
            .map_err(|e| CoreError::Decryption(format!("reading key file: {e}")))?;
        if bytes.len() != 32 {
            return Err(CoreError::Decryption(format!(
                "key file must be exactly 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        Ok(key)
    }
}

/// JSON-file-backed embedding store (§6 persisted embedding-JSON format).
/// Loads the whole file into memory at construction and rewrites it on every
/// mutation, the way the reference `EmbeddingsDatabase` is loaded once at
/// boot from `config.embeddings_path`.
pub struct JsonEmbeddingStore {
    path: PathBuf,
    state: RwLock<Vec<(String, EmbeddingRecord)>>,
}

impl JsonEmbeddingStore {
    pub async fn load_from_file(path: impl Into<PathBuf>) -> CoreResult<Arc<Self>> {
        let path = path.into();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let data: EmbeddingsData = serde_json::from_str(&contents)
                    .map_err(|e| CoreError::InvalidImage(format!("malformed embeddings file: {e}")))?;
                data.embeddings
                    .into_iter()
                    .map(|u| {
                        (
                            u.user_id,
                            EmbeddingRecord {
                                name: u.name,
                                embedding: u.embedding,
                                image_blob: None,
                                timestamp_unix_ms: 0,
                                match_count: 0,
                                last_match_unix_ms: 0,
                            },
                        )
                    })
                    .collect()
            }
            Err(_) => Vec::new(),
        };
        Ok(Arc::new(Self {
            path,
            state: RwLock::new(records),
        }))
    }

    async fn persist(&self, records: &[(String, EmbeddingRecord)]) -> CoreResult<()> {
        let data = EmbeddingsData {
            embeddings: records
                .iter()
                .map(|(user_id, record)| UserEmbedding {
                    user_id: user_id.clone(),
                    name: record.name.clone(),
                    embedding: record.embedding.clone(),
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&data)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl EmbeddingStore for JsonEmbeddingStore {
    async fn put(
        &self,
        user_id: &str,
        name: &str,
        embedding: &[f64],
        image_blob: Option<Vec<u8>>,
    ) -> CoreResult<bool> {
        let mut records = self.state.write().await;
        records.retain(|(id, _)| id != user_id);
        records.push((
            user_id.to_string(),
            EmbeddingRecord {
                name: name.to_string(),
                embedding: embedding.to_vec(),
                image_blob,
                timestamp_unix_ms: now_unix_ms(),
                match_count: 0,
                last_match_unix_ms: 0,
            },
        ));
        self.persist(&records).await?;
        Ok(true)
    }

    async fn get(&self, user_id: &str) -> CoreResult<Option<EmbeddingRecord>> {
        let records = self.state.read().await;
        Ok(records
            .iter()
            .find(|(id, _)| id == user_id)
            .map(|(_, record)| record.clone()))
    }

    async fn list(&self) -> CoreResult<Vec<(String, EmbeddingRecord)>> {
        Ok(self.state.read().await.clone())
    }

    async fn delete(&self, user_id: &str) -> CoreResult<bool> {
        let mut records = self.state.write().await;
        let before = records.len();
        records.retain(|(id, _)| id != user_id);
        let removed = records.len() != before;
        if removed {
            self.persist(&records).await?;
        }
        Ok(removed)
    }

    // Match stats live in memory only; the on-disk schema (`UserEmbedding`) has
    // no counter field, so a restart resets them to zero.
    async fn increment_match(&self, user_id: &str) -> CoreResult<bool> {
        let mut records = self.state.write().await;
        let Some((_, record)) = records.iter_mut().find(|(id, _)| id == user_id) else {
            return Ok(false);
        };
        record.match_count += 1;
        record.last_match_unix_ms = now_unix_ms();
        self.persist(&records).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_empty_store_when_file_absent() {
        let store = JsonEmbeddingStore::load_from_file("/tmp/does-not-exist-liveness-test.json")
            .await
            .unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embeddings.json");
        let store = JsonEmbeddingStore::load_from_file(&path).await.unwrap();
        store
            .put("user-1", "Ada", &[0.1, 0.2, 0.3], None)
            .await
            .unwrap();
        let record = store.get("user-1").await.unwrap().unwrap();
        assert_eq!(record.name, "Ada");

        // Persisted to disk and reloadable.
        let reloaded = JsonEmbeddingStore::load_from_file(&path).await.unwrap();
        let record = reloaded.get("user-1").await.unwrap().unwrap();
        assert_eq!(record.embedding, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn file_key_source_rejects_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.key");
        tokio::fs::write(&path, b"too short").await.unwrap();
        let source = FileKeySource::new(&path);
        assert!(source.get().await.is_err());
    }
}
