//! In-process application for unit tests: in-memory store, temp-dir local
//! storage, in-memory remote storage, and recording fakes for email and
//! payments.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use bytes::Bytes;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use crate::api::{self, AppState};
use crate::auth::{generate_jwt, Claims, Role};
use crate::config::{AppConfig, StoreBackend};
use crate::database::MemoryStore;
use crate::middleware::AuthUser;
use crate::services::email::{EmailError, EmailMessage, EmailSender};
use crate::services::payment::{ChargeRequest, GatewayError, GatewayResponse, PaymentGateway};
use crate::upload::storage::StorageResult;
use crate::upload::{BlobStorage, LocalStorage, ObjectStoreStorage, StorageError, UploadService};

pub const TEST_SECRET: &str = "test-secret";

#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl EmailSender for RecordingEmail {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Answers every charge with the configured response
pub struct FakeGateway {
    pub response: Mutex<GatewayResponse>,
    pub charges: Mutex<Vec<ChargeRequest>>,
}

impl FakeGateway {
    fn approving() -> Self {
        Self {
            response: Mutex::new(GatewayResponse {
                error_code: Some(0),
                message: None,
                transaction_result: Some(serde_json::json!({"processor_response_code": "000"})),
            }),
            charges: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayResponse, GatewayError> {
        self.charges.lock().unwrap().push(request.clone());
        Ok(self.response.lock().unwrap().clone())
    }
}

/// Refuses every write
pub struct FailingStorage;

#[async_trait]
impl BlobStorage for FailingStorage {
    async fn put(&self, key: &str, _content_type: &str, _bytes: Bytes) -> StorageResult<String> {
        Err(StorageError::UploadFailed(format!("refusing {}", key)))
    }

    async fn signed_url(&self, url: &str, _expires_in: Duration) -> StorageResult<String> {
        Ok(url.to_string())
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

pub struct TestApp {
    pub state: AppState,
    pub email: Arc<RecordingEmail>,
    pub gateway: Arc<FakeGateway>,
    _uploads: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let uploads = tempfile::tempdir().unwrap();

        let mut config = AppConfig::development();
        config.database.backend = StoreBackend::Memory;
        config.security.jwt_secret = TEST_SECRET.to_string();
        config.security.allow_admin_signup = false;
        config.upload.local_dir = uploads.path().display().to_string();
        config.upload.public_base_url = "http://localhost/uploads".to_string();

        let local = LocalStorage::new(uploads.path(), config.upload.public_base_url.clone())
            .await
            .unwrap();
        let remote = ObjectStoreStorage::in_memory("memory://videos".to_string());

        let store = Arc::new(MemoryStore::new());
        api::bootstrap(store.as_ref()).await.unwrap();

        let email = Arc::new(RecordingEmail::default());
        let gateway = Arc::new(FakeGateway::approving());

        let state = AppState {
            store,
            uploads: UploadService::new(Arc::new(local), Arc::new(remote)),
            email: email.clone(),
            payments: gateway.clone(),
            config: Arc::new(config),
        };

        Self {
            state,
            email,
            gateway,
            _uploads: uploads,
        }
    }

    /// Every upload backend fails from now on
    pub fn fail_storage(&mut self) {
        self.state.uploads = UploadService::new(Arc::new(FailingStorage), Arc::new(FailingStorage));
    }

    /// Applies `change` to the configuration routes are built from
    pub fn configure(&mut self, change: impl FnOnce(&mut AppConfig)) {
        let mut config = (*self.state.config).clone();
        change(&mut config);
        self.state.config = Arc::new(config);
    }

    /// Identity that exists only in the token
    pub fn user(&self, roles: Vec<Role>) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", Uuid::new_v4().simple()),
            roles,
        }
    }

    pub fn token_for(&self, user: &AuthUser) -> String {
        let claims = Claims::new(user.id, user.email.clone(), user.roles.clone(), 1);
        generate_jwt(&claims, TEST_SECRET).unwrap()
    }

    /// Sends one request through the full router
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = api::app(self.state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }
}
