// handlers/public/auth/sign_in.rs - POST /api/v1/sign-in

use axum::extract::State;
use serde_json::{json, Value};

use super::issue_token;
use crate::api::AppState;
use crate::auth::password::verify_password;
use crate::controller::models::USERS;
use crate::error::ApiError;
use crate::handlers::{text_field, JsonBody};
use crate::middleware::{ApiResponse, ApiResult};

pub async fn sign_in(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Value> {
    let (Some(email), Some(password)) = (text_field(&body, "email"), text_field(&body, "password")) else {
        return Err(ApiError::validation_error("email and password are required"));
    };

    let user = state
        .store
        .find_one_by(USERS.collection, "email", &email)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let stored = user.text_field("password").unwrap_or_default();
    if stored.is_empty() || !verify_password(&password, &stored)? {
        tracing::warn!(user_id = %user.id, "Sign-in with invalid credentials");
        return Err(ApiError::validation_error("Invalid credentials"));
    }

    let token = issue_token(&state, &user)?;
    tracing::info!(user_id = %user.id, "User signed in");
    Ok(ApiResponse::success(json!({
        "message": "Login successful",
        "result": USERS.render(&user),
        "token": token,
    })))
}
