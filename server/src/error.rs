use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use liveness_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] CoreError),

    #[error("Internal error: {0}")]
    #[allow(dead_code)]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ServerError::InvalidInput(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_input", msg.clone())
            }
            ServerError::Pipeline(CoreError::InvalidImage(msg)) => {
                (StatusCode::BAD_REQUEST, "invalid_image", msg.clone())
            }
            ServerError::Pipeline(CoreError::Cancelled) => {
                (StatusCode::SERVICE_UNAVAILABLE, "cancelled", self.to_string())
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                self.to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": error_code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
