// handlers/public/media.rs - Media lookups
//
// GET /media/:mediatype/:ext          classify an extension
// GET /api/v1/media/:id/playback      media record plus a playable URL

use axum::extract::{Path, State};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use crate::api::AppState;
use crate::controller::models::MEDIA;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::upload::MediaType;

/// The first path segment is informational; only the extension decides
pub async fn media_type(Path((_media_type, ext)): Path<(String, String)>) -> ApiResult<Value> {
    let ext = if ext.starts_with('.') { ext } else { format!(".{}", ext) };
    match MediaType::from_extension(&ext) {
        MediaType::Unknown => Err(ApiError::validation_error("Unsupported file type")),
        media_type => Ok(ApiResponse::success(json!({ "mediaType": media_type }))),
    }
}

/// Video lives on remote storage and gets a short-lived signed URL; other
/// media is served from its stored URL
pub async fn playback(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let not_found = || ApiError::not_found(format!("{} not found", MEDIA.name));
    let id = Uuid::parse_str(&id).map_err(|_| not_found())?;
    let media = state
        .store
        .find_by_id(MEDIA.collection, id)
        .await?
        .ok_or_else(not_found)?;

    let url = media.text_field("url").unwrap_or_default();
    let signed_url = if media.text_field("mediaType").as_deref() == Some(MediaType::Video.as_str()) {
        let ttl = Duration::from_secs(state.config.upload.signed_url_ttl_secs);
        state.uploads.remote().signed_url(&url, ttl).await?
    } else {
        url
    };

    let mut view = MEDIA.render(&media);
    view["signedUrl"] = json!(signed_url);
    Ok(ApiResponse::success(view))
}
