// handlers/mod.rs - HTTP handlers
//
// data:      resource routes bound once per registered model
// public:    no token required (sign-up/sign-in, media lookups, service)
// protected: token required (account, payments)

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde_json::{Map, Value};

use crate::error::ApiError;

pub mod data;
pub mod protected;
pub mod public;

/// JSON object body; anything else is a 400 in the standard error shape
#[derive(Debug, Default)]
pub struct JsonBody(pub Map<String, Value>);

#[async_trait]
impl<S: Send + Sync> FromRequest<S> for JsonBody {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state).await?;
        match value {
            Value::Object(map) => Ok(JsonBody(map)),
            _ => Err(ApiError::validation_error("Request body must be a JSON object")),
        }
    }
}

/// Trimmed, non-empty string field
pub(crate) fn text_field(body: &Map<String, Value>, name: &str) -> Option<String> {
    body.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
