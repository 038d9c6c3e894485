use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::json;

use crate::app_state::AppState;

/// Defines health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health/live", get(liveness_check))  // ✅ Liveness check
        .route("/health/ready", get(readiness_check)) // ✅ Readiness check
}

/// **Liveness Check (Basic Check)**  
/// - ✅ Verifies that the API is running  
/// - ❌ Does NOT touch the request store  
async fn liveness_check() -> Json<serde_json::Value> {
    Json(json!({ "success": true, "message": "API is live" }))
}

/// **Readiness Check (Store Reachability Check)**  
/// - ✅ Ensures the configured request store answers  
/// - ❌ Returns `503` if it does not  
async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    state.service.ping().await.map_err(|e| {
        tracing::error!("Readiness check failed: {}", e);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "error": "Request store unavailable" })),
        )
    })?;

    Ok(Json(json!({ "success": true, "message": "API is ready" })))
}
