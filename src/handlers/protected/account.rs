// handlers/protected/account.rs - The signed-in user's own account
//
// GET    /api/v1/profile, /api/v1/verifyToken   { user }
// GET    /api/v1/users/me                       user view
// PUT    /api/v1/profile                        { message, user }
// POST   /api/v1/logout
// DELETE /api/v1/delete-account

use axum::extract::State;
use serde_json::{json, Map, Value};

use crate::api::AppState;
use crate::auth::password::hash_password;
use crate::controller::models::USERS;
use crate::database::Record;
use crate::error::ApiError;
use crate::handlers::{text_field, JsonBody};
use crate::middleware::unique_fields::check_unique_fields;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// Fields a user may change on their own profile
const PROFILE_FIELDS: &[&str] = &["firstName", "lastName", "userName", "email"];

/// The token may outlive the account
async fn load_user(state: &AppState, user: &AuthUser) -> Result<Record, ApiError> {
    state
        .store
        .find_by_id(USERS.collection, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

pub async fn profile_get(State(state): State<AppState>, user: AuthUser) -> ApiResult<Value> {
    let record = load_user(&state, &user).await?;
    Ok(ApiResponse::success(json!({ "user": USERS.render(&record) })))
}

pub async fn verify_token(State(state): State<AppState>, user: AuthUser) -> ApiResult<Value> {
    profile_get(State(state), user).await
}

pub async fn users_me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Value> {
    let record = load_user(&state, &user).await?;
    Ok(ApiResponse::success(USERS.render(&record)))
}

pub async fn profile_put(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    load_user(&state, &user).await?;
    let store = state.store.as_ref();

    let mut patch: Map<String, Value> = PROFILE_FIELDS
        .iter()
        .filter_map(|field| text_field(&body, field).map(|v| (field.to_string(), json!(v))))
        .collect();

    check_unique_fields(store, &USERS, &patch, Some(user.id)).await?;
    if let Some(user_name) = patch.get("userName").and_then(Value::as_str) {
        if store
            .exists_conflict(USERS.collection, "userName", user_name, Some(user.id))
            .await?
        {
            return Err(ApiError::conflict("Username already exists"));
        }
    }

    if let Some(password) = text_field(&body, "password") {
        patch.insert("password".into(), json!(hash_password(&password)?));
    }

    let updated = store
        .update_by_id(USERS.collection, user.id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(user_id = %user.id, "Profile updated");
    Ok(ApiResponse::success(json!({
        "message": "User updated successfully",
        "user": USERS.render(&updated),
    })))
}

/// Tokens are stateless; the client discards its copy
pub async fn logout(user: AuthUser) -> ApiResult<Value> {
    tracing::info!(user_id = %user.id, "User logged out");
    Ok(ApiResponse::message("Logout successful"))
}

pub async fn delete_account(State(state): State<AppState>, user: AuthUser) -> ApiResult<Value> {
    state
        .store
        .delete_by_id(USERS.collection, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(user_id = %user.id, "Account deleted");
    Ok(ApiResponse::message("User deleted successfully"))
}
