// handlers/public/service.rs - Service banner and health check

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{json, Value};

use crate::api::AppState;
use crate::controller::models::MODELS;

/// GET /
pub async fn root() -> Json<Value> {
    let resources: Vec<String> = MODELS
        .iter()
        .map(|m| format!("/api/v1/{}", m.collection))
        .collect();

    Json(json!({
        "name": "Academy API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health (public)",
            "auth": "/api/v1/sign-up, /api/v1/sign-in, /api/v1/forgot-password, /api/v1/reset-password (public)",
            "account": "/api/v1/profile, /api/v1/verifyToken, /api/v1/logout, /api/v1/delete-account (token)",
            "payments": "/api/v1/payments (token)",
            "media": "/media/:mediatype/:ext, /api/v1/media/:id/playback (public)",
            "uploads": "/uploads/* (public)",
            "resources": resources,
        }
    }))
}

/// GET /health - 200 when the store answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "database": "ok",
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string(),
                })),
            )
        }
    }
}
