use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::config::ServiceConfig;
use crate::handlers;

pub async fn start(config: ServiceConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let port = config.port;

    let app = Router::new()
        .route("/detect-liveness", post(handlers::detect_handler))
        .route("/enroll", post(handlers::enroll_handler))
        .route("/verify", post(handlers::verify_handler))
        .route("/health", get(handlers::health_handler))
        .route("/ready", get(handlers::ready_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Liveness server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
