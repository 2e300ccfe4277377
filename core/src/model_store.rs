use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use ort::session::Session;
use ort::value::TensorRef;

use crate::collaborators::{KeySource, ModelByteSource};
use crate::error::{CoreError, CoreResult};

type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// The seven named model slots the pipeline loads (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelName {
    PNet,
    RNet,
    ONet,
    Embedding,
    Occlusion,
    Liveness1_0x,
    Liveness0_5x,
}

impl ModelName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelName::PNet => "pnet",
            ModelName::RNet => "rnet",
            ModelName::ONet => "onet",
            ModelName::Embedding => "embedding",
            ModelName::Occlusion => "occlusion",
            ModelName::Liveness1_0x => "liveness_1_0x",
            ModelName::Liveness0_5x => "liveness_0_5x",
        }
    }
}

/// Decrypt `IV(16) ∥ AES-256-CBC-PKCS7(plaintext)` ciphertext (§6 file format,
/// §4.2). The IV is the first 16 bytes of `ciphertext`.
pub fn decrypt_model_bytes(ciphertext: &[u8], key: &[u8; 32]) -> CoreResult<Vec<u8>> {
    if ciphertext.len() < 16 {
        return Err(CoreError::Decryption(
            "ciphertext shorter than the 16-byte IV prefix".to_string(),
        ));
    }
    let (iv, body) = ciphertext.split_at(16);
    let mut buf = body.to_vec();
    let decryptor = Aes256CbcDec::new(key.into(), iv.into());
    let plaintext_len = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|e| CoreError::Decryption(e.to_string()))?
        .len();
    buf.truncate(plaintext_len);
    Ok(buf)
}

enum Backing {
    Session(Mutex<Session>),
    Placeholder,
}

/// A loaded inference session exposing ordered input/output names and a
/// locked `run` (§4.2, §5). Model bytes are decrypted by the caller;
/// `ModelSession` only ever sees plaintext ONNX bytes.
pub struct ModelSession {
    name: ModelName,
    backing: Backing,
    input_names: Vec<String>,
    output_names: Vec<String>,
    temp_path: Option<PathBuf>,
}

impl ModelSession {
    /// Build a session from decrypted ONNX bytes. Prefers the in-memory
    /// loader; falls back to a per-session temp file only if the runtime
    /// build requires a path (§4.2.1, §9's "bypass the temp file when the
    /// runtime allows it" guidance). The temp file, when used, is removed
    /// when the session drops.
    pub fn from_plaintext(name: ModelName, plaintext: &[u8]) -> CoreResult<Self> {
        let in_memory = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_memory(plaintext));

        match in_memory {
            Ok(session) => {
                let (input_names, output_names) = session_io_names(&session);
                Ok(Self {
                    name,
                    backing: Backing::Session(Mutex::new(session)),
                    input_names,
                    output_names,
                    temp_path: None,
                })
            }
            Err(_) => Self::from_plaintext_via_temp_file(name, plaintext),
        }
    }

    fn from_plaintext_via_temp_file(name: ModelName, plaintext: &[u8]) -> CoreResult<Self> {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "liveness-{}-{}-{}.onnx",
            name.as_str(),
            std::process::id(),
            plaintext.len()
        ));
        std::fs::write(&path, plaintext)?;

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(&path))
            .map_err(|e| {
                let _ = std::fs::remove_file(&path);
                CoreError::ModelLoadFailed {
                    name: name.as_str().to_string(),
                    detail: e.to_string(),
                }
            })?;
        let (input_names, output_names) = session_io_names(&session);
        Ok(Self {
            name,
            backing: Backing::Session(Mutex::new(session)),
            input_names,
            output_names,
            temp_path: Some(path),
        })
    }

    /// Dev/test-only session with no backing ONNX model (§8: every component
    /// that owns a `Session` supports construction from either a decrypted
    /// byte buffer or no buffer at all; this is never used when the real
    /// `ModelByteSource`/`KeySource` collaborators are wired in).
    pub fn placeholder(
        name: ModelName,
        input_names: Vec<String>,
        output_names: Vec<String>,
    ) -> Self {
        Self {
            name,
            backing: Backing::Placeholder,
            input_names,
            output_names,
            temp_path: None,
        }
    }

    pub fn name(&self) -> ModelName {
        self.name
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.backing, Backing::Placeholder)
    }

    /// Run inference with a single NCHW input tensor, returning each output
    /// as `(shape, data)` in the model's declared output order. Holds an
    /// exclusive lock on the session for preprocess→run→postprocess (§5).
    pub fn run(&self, input: &ndarray::ArrayD<f32>) -> CoreResult<Vec<(Vec<usize>, Vec<f32>)>> {
        let session_lock = match &self.backing {
            Backing::Placeholder => {
                return Err(CoreError::InferenceError(format!(
                    "{} has no backing session (placeholder mode)",
                    self.name.as_str()
                )))
            }
            Backing::Session(s) => s,
        };
        let mut session = session_lock
            .lock()
            .map_err(|_| CoreError::InferenceError("session mutex poisoned".to_string()))?;

        let standard = input.as_standard_layout();
        let view = standard.view();
        let input_ref = TensorRef::from_array_view(&view)
            .map_err(|e| CoreError::InferenceError(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![input_ref])
            .map_err(|e| CoreError::InferenceError(e.to_string()))?;

        let mut result = Vec::with_capacity(outputs.len());
        for i in 0..outputs.len() {
            let (shape, data) = outputs[i]
                .try_extract_tensor::<f32>()
                .map_err(|e| CoreError::InferenceError(e.to_string()))?;
            result.push((shape.iter().map(|&d| d as usize).collect(), data.to_vec()));
        }
        Ok(result)
    }
}

impl Drop for ModelSession {
    fn drop(&mut self) {
        if let Some(path) = &self.temp_path {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn session_io_names(session: &Session) -> (Vec<String>, Vec<String>) {
    let inputs = session.inputs.iter().map(|i| i.name.clone()).collect();
    let outputs = session.outputs.iter().map(|o| o.name.clone()).collect();
    (inputs, outputs)
}

/// Decrypts and caches inference sessions behind shared, immutable handles
/// (§4.2, §5). One `ModelStore` is constructed at boot and passed down; each
/// `load` either returns the cached `Arc<ModelSession>` or decrypts, loads,
/// and caches a new one.
#[derive(Default)]
pub struct ModelStore {
    cache: Mutex<HashMap<&'static str, Arc<ModelSession>>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(
        &self,
        name: ModelName,
        byte_source: &dyn ModelByteSource,
        key_source: &dyn KeySource,
    ) -> CoreResult<Arc<ModelSession>> {
        if let Some(cached) = self.cache.lock().unwrap().get(name.as_str()) {
            return Ok(Arc::clone(cached));
        }

        let ciphertext = byte_source.get(name.as_str()).await?;
        let key = key_source.get().await?;
        let plaintext = decrypt_model_bytes(&ciphertext, &key)?;
        let session = Arc::new(ModelSession::from_plaintext(name, &plaintext)?);

        self.cache
            .lock()
            .unwrap()
            .insert(name.as_str(), Arc::clone(&session));
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::{block_padding::Pkcs7 as EncPkcs7, BlockEncryptMut, KeyIvInit as EncKeyIvInit};

    type Aes256CbcEnc = cbc::Encryptor<Aes256>;

    fn encrypt(plaintext: &[u8], key: &[u8; 32], iv: &[u8; 16]) -> Vec<u8> {
        let encryptor = Aes256CbcEnc::new(key.into(), iv.into());
        let mut buf = plaintext.to_vec();
        buf.extend(std::iter::repeat(0u8).take(16));
        let ct_len = encryptor
            .encrypt_padded_mut::<EncPkcs7>(&mut buf, plaintext.len())
            .unwrap()
            .len();
        buf.truncate(ct_len);
        let mut out = iv.to_vec();
        out.extend_from_slice(&buf);
        out
    }

    #[test]
    fn decrypt_rejects_short_ciphertext() {
        let key = [0u8; 32];
        let err = decrypt_model_bytes(&[1, 2, 3], &key).unwrap_err();
        assert!(matches!(err, CoreError::Decryption(_)));
    }

    #[test]
    fn encrypt_then_decrypt_round_trips_exactly() {
        let key = [7u8; 32];
        let iv = [3u8; 16];
        let plaintext = b"fake onnx bytes, not a real model".to_vec();
        let ciphertext = encrypt(&plaintext, &key, &iv);
        let decrypted = decrypt_model_bytes(&ciphertext, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn model_name_as_str_matches_spec_slot_names() {
        assert_eq!(ModelName::Liveness1_0x.as_str(), "liveness_1_0x");
        assert_eq!(ModelName::Liveness0_5x.as_str(), "liveness_0_5x");
    }

    #[test]
    fn placeholder_session_reports_not_loaded() {
        let session = ModelSession::placeholder(
            ModelName::Occlusion,
            vec!["input".to_string()],
            vec!["output".to_string()],
        );
        assert!(session.is_placeholder());
        let input = ndarray::ArrayD::<f32>::zeros(ndarray::IxDyn(&[1, 3, 224, 224]));
        assert!(session.run(&input).is_err());
    }

    #[tokio::test]
    async fn model_store_load_decrypts_before_failing_on_non_onnx_plaintext() {
        // The fixture ciphertext decrypts to readable bytes, so a failure here
        // can only come from `Session::commit_from_memory`/`commit_from_file`
        // rejecting non-ONNX plaintext, proving `ModelStore::load` runs the
        // full byte-source -> key-source -> decrypt -> session chain (§4.2).
        let key = [7u8; 32];
        let iv = [3u8; 16];
        let plaintext = b"not a real onnx model".to_vec();
        let ciphertext = encrypt(&plaintext, &key, &iv);

        let byte_source = test_utils::FakeModelByteSource::new().with_model("pnet", ciphertext);
        let key_source = test_utils::FakeKeySource(key);
        let store = ModelStore::new();

        let err = store
            .load(ModelName::PNet, &byte_source, &key_source)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ModelLoadFailed { .. }));
    }

    #[tokio::test]
    async fn model_store_load_surfaces_missing_fixture_as_model_load_failed() {
        let byte_source = test_utils::FakeModelByteSource::new();
        let key_source = test_utils::FakeKeySource::default();
        let store = ModelStore::new();

        let err = store
            .load(ModelName::RNet, &byte_source, &key_source)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ModelLoadFailed { .. }));
    }
}
