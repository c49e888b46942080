// handlers/data/record.rs - Single-record resource operations

use axum::{
    extract::{Path, State},
    Extension,
};
use serde_json::Value;

use crate::api::AppState;
use crate::controller::ResourceController;
use crate::middleware::{ApiResult, AuthUser};
use crate::upload::Payload;

/// GET /api/v1/:resource/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(controller): Extension<ResourceController>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    controller.get_item(&state, &id).await
}

/// GET /api/v1/:resource/slug/:slug
pub async fn get_by_slug(
    State(state): State<AppState>,
    Extension(controller): Extension<ResourceController>,
    Path(slug): Path<String>,
) -> ApiResult<Value> {
    controller.get_item_by_slug(&state, &slug).await
}

/// GET /api/v1/:resource/:key/:value
pub async fn get_by_field(
    State(state): State<AppState>,
    Extension(controller): Extension<ResourceController>,
    Path((key, value)): Path<(String, String)>,
) -> ApiResult<Value> {
    controller.get_item_by_field(&state, &key, &value).await
}

/// PUT|PATCH /api/v1/:resource/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(controller): Extension<ResourceController>,
    Path(id): Path<String>,
    user: AuthUser,
    payload: Payload,
) -> ApiResult<Value> {
    controller.update(&state, &user, &id, payload).await
}

/// DELETE /api/v1/:resource/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(controller): Extension<ResourceController>,
    Path(id): Path<String>,
    user: AuthUser,
) -> ApiResult<Value> {
    controller.delete(&state, &user, &id).await
}
