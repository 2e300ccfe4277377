use std::sync::Arc;
use std::time::Instant;

use axum::{Extension, Json};
use base64::Engine;
use common::{DetectRequest, DetectResponse};
use liveness_core::image_buffer::ImageBuffer;
use liveness_core::CancellationToken;

use crate::app_state::AppState;
use crate::error::{ServerError, ServerResult};

/// `POST /detect-liveness`: run the full pipeline against a still image and
/// return its verdict, without touching the embedding store (§6 entry point).
pub async fn detect_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<DetectRequest>,
) -> ServerResult<Json<DetectResponse>> {
    let start = Instant::now();

    let image_bytes = base64::engine::general_purpose::STANDARD
        .decode(&req.image_base64)
        .map_err(|e| ServerError::InvalidInput(format!("invalid base64: {e}")))?;
    let image = ImageBuffer::decode(&image_bytes)?;

    let token = CancellationToken::new();
    let verdict = state
        .pipeline
        .detect_liveness(
            image.as_bytes(),
            image.width(),
            image.height(),
            Some(state.face_crop.as_ref()),
            &token,
        )
        .await?;

    let duration_ms = start.elapsed().as_millis() as u64;
    Ok(Json(DetectResponse { verdict, duration_ms }))
}
