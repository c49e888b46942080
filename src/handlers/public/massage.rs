// handlers/public/massage.rs - POST /api/v1/send-massage
//
// Contact form: stored in the massages collection with no owner.

use axum::extract::State;
use serde_json::Value;

use crate::api::AppState;
use crate::controller::models::MASSAGES;
use crate::controller::ResourceController;
use crate::handlers::JsonBody;
use crate::middleware::ApiResult;

pub async fn send_massage(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Value> {
    ResourceController::new(MASSAGES).create_anonymous(&state, body).await
}
