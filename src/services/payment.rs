use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 80;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),

    #[error("Gateway configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChargeItem {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub unit_price: f64,
    pub units_number: u32,
}

/// Card data plus the purchased items
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub expire_month: u32,
    pub expire_year: i32,
    pub cvv: String,
    pub card_holder_id: String,
    pub card_number: String,
    pub items: Vec<ChargeItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayResponse {
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub transaction_result: Option<Value>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayResponse, GatewayError>;
}

/// Application error codes the gateway reports, mapped to HTTP statuses
pub fn map_error_code(code: i64) -> (u16, &'static str) {
    match code {
        20111 => (400, "Provided token check failure"),
        20112 => (404, "Original transaction not found"),
        21100 => (400, "Transaction index mismatch"),
        21101 => (400, "Provided index was empty"),
        22101 => (400, "Empty authorization number"),
        22100 => (400, "Authorization number mismatch"),
        22103 => (400, "Invalid DCdisable"),
        _ => (400, "Unknown application error"),
    }
}

/// Hex HMAC-SHA256 of the public key, keyed by private key + time + nonce
pub fn access_token(public_key: &str, private_key: &str, time: &str, nonce: &str) -> Result<String, GatewayError> {
    let key = format!("{}{}{}", private_key, time, nonce);
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).map_err(|e| GatewayError::Config(e.to_string()))?;
    mac.update(public_key.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn generate_nonce() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

#[derive(Serialize)]
struct TranzilaPayload<'a> {
    terminal_name: &'a str,
    #[serde(flatten)]
    request: &'a ChargeRequest,
}

pub struct TranzilaGateway {
    client: reqwest::Client,
    url: String,
    terminal_name: String,
    public_key: String,
    private_key: String,
}

impl TranzilaGateway {
    pub fn new(config: &PaymentConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        let base = if config.base_url.contains("://") {
            config.base_url.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", config.base_url.trim_end_matches('/'))
        };

        Ok(Self {
            client,
            url: format!("{}{}", base, config.endpoint),
            terminal_name: config.terminal_name.clone(),
            public_key: config.public_key.clone(),
            private_key: config.private_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentGateway for TranzilaGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayResponse, GatewayError> {
        let time = chrono::Utc::now().timestamp().to_string();
        let nonce = generate_nonce();
        let token = access_token(&self.public_key, &self.private_key, &time, &nonce)?;

        let payload = TranzilaPayload {
            terminal_name: &self.terminal_name,
            request,
        };

        let response = self
            .client
            .post(&self.url)
            .header("X-tranzila-api-app-key", &self.public_key)
            .header("X-tranzila-api-request-time", &time)
            .header("X-tranzila-api-nonce", &nonce)
            .header("X-tranzila-api-access-token", token)
            .json(&payload)
            .send()
            .await?;

        let body = response.text().await?;
        serde_json::from_str::<GatewayResponse>(&body)
            .map_err(|_| GatewayError::InvalidResponse(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_table_maps_known_and_unknown_codes() {
        assert_eq!(map_error_code(20111), (400, "Provided token check failure"));
        assert_eq!(map_error_code(20112), (404, "Original transaction not found"));
        assert_eq!(map_error_code(22103).0, 400);
        assert_eq!(map_error_code(99999), (400, "Unknown application error"));
    }

    #[test]
    fn access_token_is_keyed_by_private_time_and_nonce() {
        let a = access_token("pub", "priv", "100", "n1").unwrap();
        let b = access_token("pub", "priv", "100", "n2").unwrap();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(a, access_token("pub", "priv", "100", "n1").unwrap());
    }

    #[test]
    fn nonce_is_eighty_alphanumerics() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), NONCE_LEN);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn payload_flattens_card_data_beside_terminal() {
        let request = ChargeRequest {
            expire_month: 1,
            expire_year: 2030,
            cvv: "123".into(),
            card_holder_id: "123456789".into(),
            card_number: "4111111111111111".into(),
            items: vec![ChargeItem {
                name: "Course".into(),
                kind: "C".into(),
                unit_price: 10.0,
                units_number: 1,
            }],
        };
        let value = serde_json::to_value(TranzilaPayload {
            terminal_name: "term",
            request: &request,
        })
        .unwrap();
        assert_eq!(value["terminal_name"], "term");
        assert_eq!(value["items"][0]["type"], "C");
        assert_eq!(value["cvv"], "123");
    }
}
