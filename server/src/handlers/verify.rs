use std::sync::Arc;
use std::time::Instant;

use axum::{Extension, Json};
use base64::Engine;
use common::{VerifyRequest, VerifyResponse};
use liveness_core::embedding::cosine_similarity;
use liveness_core::image_buffer::ImageBuffer;
use liveness_core::CancellationToken;

use crate::app_state::AppState;
use crate::error::{ServerError, ServerResult};

/// `POST /verify`: run the pipeline, then on a `Live` verdict compare the
/// fresh embedding against the one stored for `user_id` (§4.9 `verify`,
/// cosine-threshold gate) and bump the match counter on a hit (§6
/// `increment_match`).
pub async fn verify_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> ServerResult<Json<VerifyResponse>> {
    let start = Instant::now();

    let image_bytes = base64::engine::general_purpose::STANDARD
        .decode(&req.image_base64)
        .map_err(|e| ServerError::InvalidInput(format!("invalid base64: {e}")))?;
    let image = ImageBuffer::decode(&image_bytes)?;

    let token = CancellationToken::new();
    let (verdict, embedding) = state
        .pipeline
        .detect_with_embedding(
            image.as_bytes(),
            image.width(),
            image.height(),
            Some(state.face_crop.as_ref()),
            &token,
        )
        .await?;

    let (matched, similarity) = match &embedding {
        Some(probe) => match state.embeddings.get(&req.user_id).await? {
            Some(record) => {
                let similarity = cosine_similarity(probe, &record.embedding);
                let is_match = similarity > state.pipeline.config().cosine_threshold;
                if is_match {
                    state.embeddings.increment_match(&req.user_id).await?;
                }
                (is_match, similarity)
            }
            None => (false, 0.0),
        },
        None => (false, 0.0),
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    Ok(Json(VerifyResponse {
        matched,
        similarity,
        verdict,
        duration_ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::tests_support::placeholder_state;

    #[tokio::test]
    async fn rejects_malformed_base64() {
        let state = Extension(placeholder_state());
        let req = Json(VerifyRequest {
            user_id: "user-1".to_string(),
            image_base64: "%%not base64%%".to_string(),
        });
        let err = verify_handler(state, req).await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidInput(_)));
    }
}
