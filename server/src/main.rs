mod app_state;
mod collaborators;
mod config;
mod error;
mod face_crop;
mod handlers;
mod remote_verify;
mod server;

use std::sync::Arc;

use anyhow::Result;
use liveness_core::collaborators::RemoteVerifyApi;
use liveness_core::{LivenessPipeline, ModelName, ModelStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app_state::AppState;
use collaborators::{FileKeySource, FileModelByteSource, JsonEmbeddingStore};
use face_crop::CenterCropFaceProvider;
use remote_verify::ReqwestRemoteVerifyApi;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting liveness server");

    let config = config::ServiceConfig::from_env()?;

    let byte_source = FileModelByteSource::new(config.model_dir.clone());
    let key_source = FileKeySource::new(config.model_key_path.clone());
    let models = ModelStore::new();

    tracing::info!("Loading MTCNN and embedding models from {}", config.model_dir);
    let pnet = models.load(ModelName::PNet, &byte_source, &key_source).await?;
    let rnet = models.load(ModelName::RNet, &byte_source, &key_source).await?;
    let onet = models.load(ModelName::ONet, &byte_source, &key_source).await?;
    let embedding = models
        .load(ModelName::Embedding, &byte_source, &key_source)
        .await?;
    let liveness1 = models
        .load(ModelName::Liveness1_0x, &byte_source, &key_source)
        .await?;
    let liveness2 = models
        .load(ModelName::Liveness0_5x, &byte_source, &key_source)
        .await?;

    // Occlusion degrades open (§4.7): a missing or undecryptable model here
    // is logged and the pipeline runs without it rather than failing boot.
    let occlusion = match models
        .load(ModelName::Occlusion, &byte_source, &key_source)
        .await
    {
        Ok(session) => Some(session),
        Err(err) => {
            tracing::warn!(error = %err, "occlusion model unavailable, degrading open");
            None
        }
    };

    let pipeline = Arc::new(LivenessPipeline::new(
        config.detector.clone(),
        pnet,
        rnet,
        onet,
        embedding,
        occlusion,
        liveness1,
        liveness2,
    ));

    tracing::info!("Loading embeddings from {}", config.embeddings_path);
    let embeddings = JsonEmbeddingStore::load_from_file(&config.embeddings_path).await?;

    let remote_verify = config.remote_verify_endpoint.as_ref().map(|endpoint| {
        tracing::info!(endpoint, "remote verification collaborator configured");
        Arc::new(ReqwestRemoteVerifyApi::new(endpoint.clone())) as Arc<dyn RemoteVerifyApi>
    });

    let state = Arc::new(AppState {
        pipeline,
        embeddings,
        face_crop: Arc::new(CenterCropFaceProvider),
        remote_verify,
    });

    server::start(config, state).await
}
