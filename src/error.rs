// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::types::Operation;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    ValidationError {
        message: String,
        detail: Option<String>,
    },

    // 400 Bad Request (uniqueness violation)
    Conflict(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // Storage, payment or email backend failure; status may be mapped
    Upstream {
        status: u16,
        message: String,
        detail: Option<String>,
        upstream_code: Option<i64>,
    },

    // 500 Internal Server Error
    InternalServerError {
        message: String,
        detail: Option<String>,
    },

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::ValidationError { .. } => 400,
            ApiError::Conflict(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Upstream { status, .. } => *status,
            ApiError::InternalServerError { .. } => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::ValidationError { message, .. } => message,
            ApiError::Conflict(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Upstream { message, .. } => message,
            ApiError::InternalServerError { message, .. } => message,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Underlying fault description, reported as `error` in the body
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::ValidationError { detail, .. }
            | ApiError::Upstream { detail, .. }
            | ApiError::InternalServerError { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Upstream { .. } => "UPSTREAM_ERROR",
            ApiError::InternalServerError { .. } => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "message": self.message(),
            "code": self.error_code(),
        });

        if let Some(detail) = self.detail() {
            response["error"] = json!(detail);
        }
        if let ApiError::Upstream { upstream_code: Some(code), .. } = self {
            response["error_code"] = json!(code);
        }

        response
    }

    /// Rewrites an unexpected fault into the operation-level message
    /// ("Error creating Article"), keeping the fault description as detail.
    /// Classified errors pass through untouched.
    pub fn during(self, operation: Operation, model_name: &str) -> Self {
        match self {
            ApiError::InternalServerError { message, detail } => {
                tracing::error!(
                    operation = operation.verb(),
                    model = model_name,
                    "{}: {}",
                    message,
                    detail.as_deref().unwrap_or("")
                );
                ApiError::InternalServerError {
                    message: format!("Error {} {}", operation.verb(), model_name),
                    detail: detail.or(Some(message)),
                }
            }
            other => other,
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation_error(message: impl Into<String>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            detail: None,
        }
    }

    pub fn validation_error_with(message: impl Into<String>, detail: impl Into<String>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn upstream(status: u16, message: impl Into<String>, detail: Option<String>) -> Self {
        ApiError::Upstream {
            status,
            message: message.into(),
            detail,
            upstream_code: None,
        }
    }

    pub fn internal_with(message: impl Into<String>, detail: impl Into<String>) -> Self {
        ApiError::InternalServerError {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<crate::database::StoreError> for ApiError {
    fn from(err: crate::database::StoreError) -> Self {
        use crate::database::StoreError;
        match err {
            StoreError::Conflict { collection, field } => match crate::controller::models::find(&collection) {
                Some(model) => crate::middleware::unique_fields::conflict(model, &field),
                None => ApiError::conflict(format!("{} with this {} already exists", collection, field)),
            },
            StoreError::InvalidName(name) => {
                ApiError::validation_error(format!("Invalid field or collection name: {}", name))
            }
            StoreError::Filter(e) => e.into(),
            StoreError::Connection(msg) => {
                tracing::error!("Database connection error: {}", msg);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            StoreError::Sqlx(sqlx_err) => {
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_with("Database error occurred", sqlx_err.to_string())
            }
            StoreError::Serialization(e) => {
                ApiError::internal_with("Failed to decode stored record", e.to_string())
            }
        }
    }
}

impl From<crate::database::record::RecordError> for ApiError {
    fn from(err: crate::database::record::RecordError) -> Self {
        ApiError::validation_error(err.to_string())
    }
}

impl From<crate::filter::FilterError> for ApiError {
    fn from(err: crate::filter::FilterError) -> Self {
        ApiError::validation_error_with("Invalid query", err.to_string())
    }
}

impl From<crate::upload::UploadError> for ApiError {
    fn from(err: crate::upload::UploadError) -> Self {
        use crate::upload::UploadError;
        match err {
            UploadError::Storage(e) => {
                tracing::error!("Upload storage failure: {}", e);
                ApiError::upstream(500, "File upload failed.", Some(e.to_string()))
            }
            UploadError::Store(e) => e.into(),
            other => ApiError::validation_error_with("File upload error", other.to_string()),
        }
    }
}

impl From<crate::upload::StorageError> for ApiError {
    fn from(err: crate::upload::StorageError) -> Self {
        tracing::error!("Storage backend error: {}", err);
        ApiError::upstream(500, "Storage backend failure", Some(err.to_string()))
    }
}

impl From<crate::auth::JwtError> for ApiError {
    fn from(err: crate::auth::JwtError) -> Self {
        tracing::error!("Token generation error: {}", err);
        ApiError::internal_with("Failed to issue token", err.to_string())
    }
}

impl From<crate::auth::password::PasswordError> for ApiError {
    fn from(err: crate::auth::password::PasswordError) -> Self {
        ApiError::internal_with("Password processing failed", err.to_string())
    }
}

impl From<crate::services::payment::GatewayError> for ApiError {
    fn from(err: crate::services::payment::GatewayError) -> Self {
        tracing::error!("Payment gateway error: {}", err);
        ApiError::upstream(500, "Payment processing failed", Some(err.to_string()))
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        ApiError::validation_error_with("Invalid JSON body", rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        ApiError::validation_error_with("Invalid query string", rejection.body_text())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {}", self.message(), detail),
            None => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
