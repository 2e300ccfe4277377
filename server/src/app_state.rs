use std::sync::Arc;

use liveness_core::collaborators::{EmbeddingStore, FaceCropProvider, RemoteVerifyApi};
use liveness_core::LivenessPipeline;

/// Shared handles every handler needs (§10 A4): the pipeline, the embedding
/// store, and the face-crop collaborator, all constructed once at boot in
/// `main` and threaded through via an `axum::Extension`, mirroring how the
/// reference `worker::server::start` layers `Config`/`EmbeddingsDatabase`/
/// `FaceModel`. `remote_verify` is `None` unless `REMOTE_VERIFY_ENDPOINT` is
/// configured, since the collaborator itself is optional (§6).
pub struct AppState {
    pub pipeline: Arc<LivenessPipeline>,
    pub embeddings: Arc<dyn EmbeddingStore>,
    pub face_crop: Arc<dyn FaceCropProvider>,
    pub remote_verify: Option<Arc<dyn RemoteVerifyApi>>,
}

/// Fixture builder shared by the handler test modules. Lives behind
/// `#[cfg(test)]` rather than in `test-utils` since it wires together
/// server-local fakes (`InMemoryEmbeddingStore`, `NoopFaceCropProvider`) with
/// an `AppState`, which `test-utils` itself doesn't know about.
#[cfg(test)]
pub(crate) mod tests_support {
    use super::AppState;
    use std::sync::Arc;

    use liveness_core::model_store::{ModelName, ModelSession};
    use liveness_core::{DetectorConfig, LivenessPipeline};
    use test_utils::{InMemoryEmbeddingStore, NoopFaceCropProvider};

    pub(crate) fn placeholder_state() -> Arc<AppState> {
        let placeholder = |name| Arc::new(ModelSession::placeholder(name, vec![], vec![]));
        let pipeline = Arc::new(LivenessPipeline::new(
            DetectorConfig::default(),
            placeholder(ModelName::PNet),
            placeholder(ModelName::RNet),
            placeholder(ModelName::ONet),
            placeholder(ModelName::Embedding),
            None,
            placeholder(ModelName::Liveness1_0x),
            placeholder(ModelName::Liveness0_5x),
        ));
        Arc::new(AppState {
            pipeline,
            embeddings: Arc::new(InMemoryEmbeddingStore::new()),
            face_crop: Arc::new(NoopFaceCropProvider),
            remote_verify: None,
        })
    }
}
