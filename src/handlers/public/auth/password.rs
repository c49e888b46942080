// handlers/public/auth/password.rs - Password reset by emailed token
//
// POST /api/v1/forgot-password  { email }
// POST /api/v1/reset-password   { resetToken, newPassword, confirmNewPassword }

use axum::extract::State;
use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::api::AppState;
use crate::auth::password::{generate_reset_token, hash_password, hash_reset_token};
use crate::controller::models::USERS;
use crate::error::ApiError;
use crate::handlers::{text_field, JsonBody};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::email::{password_reset_email, send_best_effort};

pub async fn forgot_password(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Value> {
    let email = text_field(&body, "email").ok_or_else(|| ApiError::validation_error("email is required"))?;

    let store = state.store.as_ref();
    let user = store
        .find_one_by(USERS.collection, "email", &email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let (token, digest) = generate_reset_token();
    let expires_at = Utc::now().timestamp_millis() + state.config.security.reset_token_ttl_secs * 1000;

    let mut patch = Map::new();
    patch.insert("resetToken".into(), json!(digest));
    patch.insert("resetTokenExpiry".into(), json!(expires_at));
    store.update_by_id(USERS.collection, user.id, patch).await?;

    let reset_url = format!("{}?resetToken={}", state.config.security.reset_url_base, token);
    send_best_effort(state.email.as_ref(), password_reset_email(&email, &reset_url)).await;

    tracing::info!(user_id = %user.id, "Password reset requested");
    Ok(ApiResponse::message("Password reset email sent"))
}

pub async fn reset_password(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Value> {
    let (Some(token), Some(new_password)) = (text_field(&body, "resetToken"), text_field(&body, "newPassword")) else {
        return Err(ApiError::validation_error("resetToken and newPassword are required"));
    };
    if text_field(&body, "confirmNewPassword").as_deref() != Some(new_password.as_str()) {
        return Err(ApiError::validation_error("Passwords do not match"));
    }

    let store = state.store.as_ref();
    let now_ms = Utc::now().timestamp_millis();
    let user = store
        .find_one_by(USERS.collection, "resetToken", &hash_reset_token(&token))
        .await?
        .filter(|user| {
            user.data
                .get("resetTokenExpiry")
                .and_then(Value::as_i64)
                .is_some_and(|expiry| expiry > now_ms)
        })
        .ok_or_else(|| ApiError::validation_error("Invalid or expired password reset token"))?;

    let mut patch = Map::new();
    patch.insert("password".into(), json!(hash_password(&new_password)?));
    patch.insert("resetToken".into(), Value::Null);
    patch.insert("resetTokenExpiry".into(), Value::Null);
    store.update_by_id(USERS.collection, user.id, patch).await?;

    tracing::info!(user_id = %user.id, "Password reset completed");
    Ok(ApiResponse::message("Password reset successfully"))
}
