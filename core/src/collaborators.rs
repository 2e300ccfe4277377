use async_trait::async_trait;

use crate::error::CoreResult;
use crate::image_buffer::ImageBuffer;

/// External face-crop collaborator (§6, step 2 of §4.10). The reference
/// implementation uses an external detector with 5 landmarks plus a tight
/// bbox, then resize-to-256 + center-crop-to-224; any replacement must
/// preserve that contract.
#[async_trait]
pub trait FaceCropProvider: Send + Sync {
    async fn crop(&self, image: &ImageBuffer) -> CoreResult<Option<ImageBuffer>>;
}

/// Source of encrypted model bytes (§6). Must yield ciphertext whose first
/// 16 bytes are the IV (§4.2, §6 file format).
#[async_trait]
pub trait ModelByteSource: Send + Sync {
    async fn get(&self, name: &str) -> CoreResult<Vec<u8>>;
}

/// Source of the 32-byte AES-256 key used to decrypt model bytes (§6).
#[async_trait]
pub trait KeySource: Send + Sync {
    async fn get(&self) -> CoreResult<[u8; 32]>;
}

/// A single persisted enrollment record (§6 `EmbeddingStore::get`).
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub name: String,
    pub embedding: Vec<f64>,
    pub image_blob: Option<Vec<u8>>,
    pub timestamp_unix_ms: i64,
    /// Bumped by `increment_match` on every successful `/verify` hit (§6).
    pub match_count: u64,
    /// Unix-ms timestamp of the most recent successful match, or `0` if never matched.
    pub last_match_unix_ms: i64,
}

/// Async key/value store of enrolled identities (§6 `EmbeddingStore`).
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    async fn put(
        &self,
        user_id: &str,
        name: &str,
        embedding: &[f64],
        image_blob: Option<Vec<u8>>,
    ) -> CoreResult<bool>;

    async fn get(&self, user_id: &str) -> CoreResult<Option<EmbeddingRecord>>;

    async fn list(&self) -> CoreResult<Vec<(String, EmbeddingRecord)>>;

    async fn delete(&self, user_id: &str) -> CoreResult<bool>;

    /// Atomic match counter + last-match timestamp bump (§6).
    async fn increment_match(&self, user_id: &str) -> CoreResult<bool>;
}

/// Outcome of an optional remote verification round-trip (§6 `RemoteVerifyAPI`).
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteVerifyOutcome {
    Match { similarity: f64 },
    Mismatch { similarity: f64 },
    Spoof,
    NotEnrolled,
}

/// Optional remote verification collaborator: multipart-POSTs an
/// aligned-face JPEG and maps the response payload's `code` field per §6:
/// 400/"spoof" → Spoof, 404 → NotEnrolled, 407 → Mismatch, 200/"success" → Match.
#[async_trait]
pub trait RemoteVerifyApi: Send + Sync {
    async fn verify(&self, aligned_face_jpeg: &[u8]) -> CoreResult<RemoteVerifyOutcome>;
}
