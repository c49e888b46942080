// handlers/public/auth/mod.rs - Account creation, sign-in and password reset

use serde_json::Value;

use crate::api::AppState;
use crate::auth::{generate_jwt, Claims, Role};
use crate::database::Record;
use crate::error::ApiError;

pub mod password;
pub mod sign_in;
pub mod sign_up;

pub use password::{forgot_password, reset_password};
pub use sign_in::sign_in;
pub use sign_up::sign_up;

/// Roles stored on a user record; unknown names are dropped
pub fn roles_of(user: &Record) -> Vec<Role> {
    user.data
        .get("roles")
        .and_then(Value::as_array)
        .map(|roles| roles.iter().filter_map(Value::as_str).filter_map(Role::parse).collect())
        .unwrap_or_default()
}

/// Signed token for a stored user
pub fn issue_token(state: &AppState, user: &Record) -> Result<String, ApiError> {
    let email = user.text_field("email").unwrap_or_default();
    let claims = Claims::new(user.id, email, roles_of(user), state.config.security.jwt_expiry_hours);
    Ok(generate_jwt(&claims, &state.config.security.jwt_secret)?)
}
