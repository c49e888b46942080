use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use crate::api::AppState;
use crate::auth::{validate_jwt, Claims, Role};
use crate::error::ApiError;

/// Authenticated identity extracted from the request token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub roles: Vec<Role>,
}

impl AuthUser {
    pub fn has_any_role(&self, required: &[Role]) -> bool {
        Role::permits(&self.roles, required)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            roles: claims.roles,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let Some(token) = extract_token(parts) else {
            tracing::warn!(path = %parts.uri.path(), "Authentication token not provided");
            return Err(ApiError::unauthorized("Authentication token is required."));
        };

        let claims = validate_jwt(&token, &state.config.security.jwt_secret).map_err(|e| {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Token verification failed");
            ApiError::unauthorized("Unauthorized: Invalid token.")
        })?;

        Ok(AuthUser::from(claims))
    }
}

/// Bearer token from the Authorization header, else the `token` query parameter
fn extract_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    from_header.or_else(|| {
        parts.uri.query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "token")
                .map(|(_, value)| value.into_owned())
                .filter(|t| !t.is_empty())
        })
    })
}
