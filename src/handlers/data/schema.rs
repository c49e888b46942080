// handlers/data/schema.rs - Collection-level resource operations

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Extension,
};
use serde_json::Value;

use crate::handlers::JsonBody;
use crate::api::AppState;
use crate::controller::ResourceController;
use crate::middleware::{ApiResult, AuthUser};
use crate::upload::Payload;

/// GET /api/v1/:resource - filtered, paged listing
pub async fn list(
    State(state): State<AppState>,
    Extension(controller): Extension<ResourceController>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(params) = query?;
    controller.get_items(&state, &params).await
}

/// POST /api/v1/:resource
pub async fn create(
    State(state): State<AppState>,
    Extension(controller): Extension<ResourceController>,
    user: AuthUser,
    payload: Payload,
) -> ApiResult<Value> {
    controller.create(&state, &user, payload).await
}

/// POST /api/v1/:resource/bulk - `{ items: [...] }`
pub async fn create_bulk(
    State(state): State<AppState>,
    Extension(controller): Extension<ResourceController>,
    user: AuthUser,
    payload: Payload,
) -> ApiResult<Value> {
    controller.create_many(&state, &user, payload).await
}

/// PUT|PATCH /api/v1/:resource/bulk - `{ ids: [...], data: {...} }`
pub async fn update_bulk(
    State(state): State<AppState>,
    Extension(controller): Extension<ResourceController>,
    user: AuthUser,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    controller.update_many(&state, &user, body).await
}

/// DELETE /api/v1/:resource/bulk - `{ ids: [...] }`
pub async fn delete_bulk(
    State(state): State<AppState>,
    Extension(controller): Extension<ResourceController>,
    user: AuthUser,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    controller.delete_many(&state, &user, body).await
}
