// handlers/public/auth/sign_up.rs - POST /api/v1/sign-up

use axum::extract::State;
use serde_json::{json, Value};

use super::issue_token;
use crate::api::AppState;
use crate::auth::password::hash_password;
use crate::auth::Role;
use crate::controller::models::USERS;
use crate::database::record::is_truthy;
use crate::database::Record;
use crate::error::ApiError;
use crate::handlers::{text_field, JsonBody};
use crate::middleware::{ApiResponse, ApiResult};

/// Creates an account with the `user` role and returns a token for it.
///
/// `userName`, `email` and `password` are required; any other profile
/// fields are stored as given. Asking for the admin role (`roles` containing
/// `admin`, or a truthy `isAdmin`) is refused unless admin sign-up is
/// enabled for the environment.
pub async fn sign_up(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Value> {
    let (Some(user_name), Some(email), Some(password)) = (
        text_field(&body, "userName"),
        text_field(&body, "email"),
        text_field(&body, "password"),
    ) else {
        return Err(ApiError::validation_error("userName, email and password are required"));
    };

    let wants_admin = body.get("isAdmin").is_some_and(is_truthy)
        || body
            .get("roles")
            .and_then(Value::as_array)
            .is_some_and(|roles| roles.iter().any(|r| r.as_str() == Some(Role::Admin.as_str())));
    if wants_admin && !state.config.security.allow_admin_signup {
        tracing::warn!(email = %email, "Refused admin sign-up");
        return Err(ApiError::forbidden("Admin accounts cannot be created through sign-up"));
    }

    let store = state.store.as_ref();
    if store.exists_conflict(USERS.collection, "email", &email, None).await? {
        return Err(ApiError::conflict("Email already exists"));
    }
    if store.exists_conflict(USERS.collection, "userName", &user_name, None).await? {
        return Err(ApiError::conflict("Username already exists"));
    }

    let mut data = Record::sanitize_input(Value::Object(body), USERS.protected_fields)?;
    data.remove("isAdmin");
    data.insert("userName".into(), json!(user_name));
    data.insert("email".into(), json!(email));
    data.insert("password".into(), json!(hash_password(&password)?));
    let roles = if wants_admin {
        vec![Role::User, Role::Admin]
    } else {
        vec![Role::User]
    };
    data.insert("roles".into(), json!(roles));

    let user = store.insert(USERS.collection, None, data).await?;
    let token = issue_token(&state, &user)?;
    tracing::info!(user_id = %user.id, "User signed up");

    Ok(ApiResponse::created(json!({
        "message": "User created successfully",
        "result": USERS.render(&user),
        "token": token,
    })))
}
