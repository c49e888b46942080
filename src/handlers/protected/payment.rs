// handlers/protected/payment.rs - POST /api/v1/payments
//
// Charges a card for one course and enrols the payer on success.

use axum::extract::State;
use chrono::{Datelike, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::api::AppState;
use crate::controller::models::COURSES;
use crate::error::ApiError;
use crate::handlers::JsonBody;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::payment::{map_error_code, ChargeItem, ChargeRequest};

/// Furthest card expiry accepted, in years from now
const MAX_EXPIRY_YEARS: i32 = 20;

/// Validated payment form
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub course: Uuid,
    pub expire_month: u32,
    pub expire_year: i32,
    pub cvv: String,
    pub card_holder_id: String,
    pub card_number: String,
}

impl PaymentRequest {
    /// Numbers may arrive as JSON numbers or numeric strings
    pub fn from_body(body: &Map<String, Value>, current_year: i32) -> Result<Self, ApiError> {
        let course = match body.get("course").and_then(as_text) {
            Some(course) if !course.is_empty() => course,
            _ => return Err(ApiError::validation_error("Invalid or missing course ID.")),
        };
        let course = Uuid::parse_str(&course).map_err(|_| ApiError::validation_error("Invalid Course ID format."))?;

        let expire_month = body
            .get("expire_month")
            .and_then(as_text)
            .and_then(|m| m.parse::<u32>().ok())
            .filter(|m| (1..=12).contains(m))
            .ok_or_else(|| ApiError::validation_error("Invalid expire_month."))?;

        let expire_year = body
            .get("expire_year")
            .and_then(as_text)
            .and_then(|y| y.parse::<i32>().ok())
            .filter(|y| (current_year..=current_year + MAX_EXPIRY_YEARS).contains(y))
            .ok_or_else(|| ApiError::validation_error("Invalid expire_year."))?;

        let cvv = digits(body.get("cvv"), 3..=4).ok_or_else(|| ApiError::validation_error("Invalid CVV."))?;
        let card_holder_id =
            digits(body.get("card_holder_id"), 9..=9).ok_or_else(|| ApiError::validation_error("Invalid card_holder_id."))?;
        let card_number =
            digits(body.get("card_number"), 8..=19).ok_or_else(|| ApiError::validation_error("Invalid card_number."))?;

        Ok(Self {
            course,
            expire_month,
            expire_year,
            cvv,
            card_holder_id,
            card_number,
        })
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn digits(value: Option<&Value>, len: std::ops::RangeInclusive<usize>) -> Option<String> {
    value
        .and_then(as_text)
        .filter(|s| len.contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit()))
}

pub async fn create_payment(
    State(state): State<AppState>,
    user: AuthUser,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    let request = PaymentRequest::from_body(&body, Utc::now().year())?;
    let store = state.store.as_ref();

    let course = store
        .find_by_id(COURSES.collection, request.course)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Course not found: {}", request.course)))?;

    if course.text_field("status").as_deref() != Some("published") {
        tracing::warn!(course_id = %course.id, "Attempt to purchase unpublished course");
        return Err(ApiError::validation_error("Cannot purchase unpublished courses."));
    }
    let cost = course
        .data
        .get("cost")
        .and_then(Value::as_f64)
        .filter(|c| *c > 0.0)
        .ok_or_else(|| ApiError::validation_error("Invalid course cost."))?;
    let title = course.text_field("title").unwrap_or_default();

    let charge = ChargeRequest {
        expire_month: request.expire_month,
        expire_year: request.expire_year,
        cvv: request.cvv,
        card_holder_id: request.card_holder_id,
        card_number: request.card_number,
        items: vec![ChargeItem {
            name: title.clone(),
            kind: "C".to_string(),
            unit_price: cost,
            units_number: 1,
        }],
    };

    let response = state.payments.charge(&charge).await?;

    match (response.error_code, response.transaction_result) {
        (Some(code), _) if code != 0 => {
            let (status, fallback) = map_error_code(code);
            let message = response.message.unwrap_or_else(|| fallback.to_string());
            tracing::error!(course_id = %course.id, error_code = code, message = %message, "Payment declined");
            Err(ApiError::Upstream {
                status,
                message,
                detail: None,
                upstream_code: Some(code),
            })
        }
        (Some(0), Some(transaction_result)) => {
            enrol(&state, course.id, &course.data, user.id).await?;
            tracing::info!(course_id = %course.id, user_id = %user.id, "Payment successful");
            Ok(ApiResponse::success(json!({
                "message": "Payment successful. You have been enrolled in the course.",
                "transaction_result": transaction_result,
                "course": {
                    "id": course.id.to_string(),
                    "title": title,
                    "cost": cost,
                },
            })))
        }
        _ => {
            tracing::error!(course_id = %course.id, "Unexpected payment gateway response");
            Err(ApiError::internal_with(
                "Unexpected error occurred during payment processing.",
                response.message.unwrap_or_else(|| "Unknown error from payment gateway.".to_string()),
            ))
        }
    }
}

/// Adds the payer to `participants` unless already present
async fn enrol(state: &AppState, course_id: Uuid, data: &Map<String, Value>, user_id: Uuid) -> Result<(), ApiError> {
    let mut participants = data
        .get("participants")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let user = json!(user_id.to_string());
    if participants.contains(&user) {
        return Ok(());
    }
    participants.push(user);

    let mut patch = Map::new();
    patch.insert("participants".into(), Value::Array(participants));
    state.store.update_by_id(COURSES.collection, course_id, patch).await?;
    Ok(())
}
