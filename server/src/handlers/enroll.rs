use std::sync::Arc;
use std::time::Instant;

use axum::{Extension, Json};
use base64::Engine;
use common::{EnrollRequest, EnrollResponse};
use liveness_core::image_buffer::ImageBuffer;
use liveness_core::CancellationToken;

use crate::app_state::AppState;
use crate::error::{ServerError, ServerResult};

/// `POST /enroll`: run the pipeline and, on a `Live` verdict, persist the
/// resulting embedding against `user_id` via the `EmbeddingStore` (§6 `put`).
/// A non-live verdict is returned with `enrolled: false` and nothing is
/// written to the store.
pub async fn enroll_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<EnrollRequest>,
) -> ServerResult<Json<EnrollResponse>> {
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

    let enrolled = match &embedding {
        Some(vector) => {
            state
                .embeddings
                .put(&req.user_id, &req.name, vector, None)
                .await?
        }
        None => false,
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    Ok(Json(EnrollResponse {
        enrolled,
        verdict,
        duration_ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::tests_support::placeholder_state;

    #[tokio::test]
    async fn rejects_malformed_base64_without_touching_the_store() {
        let state = Extension(placeholder_state());
        let req = Json(EnrollRequest {
            user_id: "user-1".to_string(),
            name: "Ada".to_string(),
            image_base64: "%%not base64%%".to_string(),
        });
        let err = enroll_handler(state, req).await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidInput(_)));
    }
}
