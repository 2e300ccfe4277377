//! Synthetic-image and fake-collaborator fixtures shared by core and server
//! tests, the way the reference `worker` integration suite builds its own
//! in-process fakes rather than talking to live infrastructure.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use liveness_core::collaborators::{
    EmbeddingRecord, EmbeddingStore, FaceCropProvider, KeySource, ModelByteSource,
    RemoteVerifyOutcome, RemoteVerifyApi,
};
use liveness_core::{CoreError, CoreResult};

/// RGBA bytes for a `w`×`h` solid-color image (§8 seed-test scenarios S1/S2).
pub fn solid_rgba(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
    let mut out = Vec::with_capacity((w * h * 4) as usize);
    for _ in 0..(w * h) {
        out.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
    }
    out
}

/// RGBA bytes for a checkerboard pattern, useful as a stand-in for a sharp
/// (non-blurry) image in quality-gate tests.
pub fn checkerboard_rgba(w: u32, h: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            let v = if (x + y) % 2 == 0 { 255 } else { 0 };
            out.extend_from_slice(&[v, v, v, 255]);
        }
    }
    out
}

/// Paints a `w`×`h` solid image with a rectangular patch of a different
/// color, the way §8's S4 scenario overwrites the lower face with a block.
pub fn solid_with_patch(
    w: u32,
    h: u32,
    base: [u8; 3],
    patch: [u8; 3],
    patch_x: u32,
    patch_y: u32,
    patch_w: u32,
    patch_h: u32,
) -> Vec<u8> {
    let mut out = solid_rgba(w, h, base);
    for y in patch_y..(patch_y + patch_h).min(h) {
        for x in patch_x..(patch_x + patch_w).min(w) {
            let idx = ((y * w + x) * 4) as usize;
            out[idx..idx + 3].copy_from_slice(&patch);
        }
    }
    out
}

/// A `ModelByteSource` that hands back pre-seeded ciphertext, or an error for
/// unknown names — stands in for the encrypted-file/secret-manager source a
/// real deployment uses.
#[derive(Default)]
pub struct FakeModelByteSource {
    bytes: HashMap<String, Vec<u8>>,
}

impl FakeModelByteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, name: &str, ciphertext: Vec<u8>) -> Self {
        self.bytes.insert(name.to_string(), ciphertext);
        self
    }
}

#[async_trait]
impl ModelByteSource for FakeModelByteSource {
    async fn get(&self, name: &str) -> CoreResult<Vec<u8>> {
        self.bytes
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::ModelLoadFailed {
                name: name.to_string(),
                detail: "no fixture registered for this model name".to_string(),
            })
    }
}

/// A `KeySource` that always returns the same fixed 32-byte key.
pub struct FakeKeySource(pub [u8; 32]);

impl Default for FakeKeySource {
    fn default() -> Self {
        Self([7u8; 32])
    }
}

#[async_trait]
impl KeySource for FakeKeySource {
    async fn get(&self) -> CoreResult<[u8; 32]> {
        Ok(self.0)
    }
}

/// A `FaceCropProvider` that always declines to crop, forcing the pipeline to
/// fall back to the original image (§4.10 step 2's failure path).
pub struct NoopFaceCropProvider;

#[async_trait]
impl FaceCropProvider for NoopFaceCropProvider {
    async fn crop(
        &self,
        _image: &liveness_core::image_buffer::ImageBuffer,
    ) -> CoreResult<Option<liveness_core::image_buffer::ImageBuffer>> {
        Ok(None)
    }
}

/// An in-memory `EmbeddingStore`, the in-process equivalent of the
/// reference's JSON-file-backed embeddings database.
#[derive(Default)]
pub struct InMemoryEmbeddingStore {
    records: Mutex<HashMap<String, EmbeddingRecord>>,
}

impl InMemoryEmbeddingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl EmbeddingStore for InMemoryEmbeddingStore {
    async fn put(
        &self,
        user_id: &str,
        name: &str,
        embedding: &[f64],
        image_blob: Option<Vec<u8>>,
    ) -> CoreResult<bool> {
        let record = EmbeddingRecord {
            name: name.to_string(),
            embedding: embedding.to_vec(),
            image_blob,
            timestamp_unix_ms: now_unix_ms(),
            match_count: 0,
            last_match_unix_ms: 0,
        };
        self.records
            .lock()
            .unwrap()
            .insert(user_id.to_string(), record);
        Ok(true)
    }

    async fn get(&self, user_id: &str) -> CoreResult<Option<EmbeddingRecord>> {
        Ok(self.records.lock().unwrap().get(user_id).cloned())
    }

    async fn list(&self) -> CoreResult<Vec<(String, EmbeddingRecord)>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }

    async fn delete(&self, user_id: &str) -> CoreResult<bool> {
        Ok(self.records.lock().unwrap().remove(user_id).is_some())
    }

    async fn increment_match(&self, user_id: &str) -> CoreResult<bool> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(user_id) {
            Some(record) => {
                record.match_count += 1;
                record.last_match_unix_ms = now_unix_ms();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// A `RemoteVerifyApi` that always returns a pre-configured outcome,
/// standing in for the optional remote verification round-trip.
pub struct FixedRemoteVerifyApi(pub RemoteVerifyOutcome);

#[async_trait]
impl RemoteVerifyApi for FixedRemoteVerifyApi {
    async fn verify(&self, _aligned_face_jpeg: &[u8]) -> CoreResult<RemoteVerifyOutcome> {
        Ok(self.0.clone())
    }
}
