use axum::Json;
use serde_json::{json, Value};

/// Returns ready only once called — the pipeline's sessions and embedding
/// store are already loaded by the time `main` starts serving, so there is
/// no separate lazy-init state to probe (unlike the reference `worker`,
/// which gates this on Kubernetes readiness for a pod pool this binary
/// doesn't have).
pub async fn ready_handler() -> Json<Value> {
    Json(json!({
        "status": "ready"
    }))
}
