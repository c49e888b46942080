pub mod format;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::{AppConfig, StoreBackend};
use crate::controller::models::{self, MEDIA, USERS};
use crate::database::{DatabaseManager, MemoryStore, PgStore, RecordStore, StoreResult};
use crate::handlers::{data::resource_routes, protected, public};
use crate::services::{EmailSender, LogEmailSender, PaymentGateway, SmtpEmailSender, TranzilaGateway};
use crate::upload::{LocalStorage, ObjectStoreStorage, UploadLimits, UploadService};

/// Multipart framing on top of the largest accepted file
const BODY_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Everything a handler can reach
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub uploads: UploadService,
    pub email: Arc<dyn EmailSender>,
    pub payments: Arc<dyn PaymentGateway>,
    pub config: Arc<AppConfig>,
}

impl FromRef<AppState> for UploadLimits {
    fn from_ref(state: &AppState) -> Self {
        UploadLimits {
            max_video_bytes: state.config.upload.max_video_bytes,
            max_file_bytes: state.config.upload.max_file_bytes,
        }
    }
}

impl AppState {
    /// Connects the store and storage backends described by `config`
    pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
        if config.security.jwt_secret.is_empty() {
            anyhow::bail!("JWT_SECRET must be set");
        }

        let store: Arc<dyn RecordStore> = match config.database.backend {
            StoreBackend::Postgres => {
                let pool = DatabaseManager::connect(&config.database)
                    .await
                    .context("connecting to the database")?;
                Arc::new(PgStore::new(pool))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory store; records are lost on restart");
                Arc::new(MemoryStore::new())
            }
        };

        let upload = &config.upload;
        let local = LocalStorage::new(&upload.local_dir, upload.public_base_url.clone())
            .await
            .context("preparing local upload storage")?;
        let remote = match &upload.remote_bucket {
            Some(bucket) => ObjectStoreStorage::google_cloud(
                bucket,
                upload.remote_service_account_key.as_deref(),
                upload.remote_public_base_url.clone(),
            )
            .context("configuring remote object storage")?,
            None => {
                tracing::warn!("No remote bucket configured; video uploads stay in process memory");
                ObjectStoreStorage::in_memory(
                    upload
                        .remote_public_base_url
                        .clone()
                        .unwrap_or_else(|| "memory://videos".to_string()),
                )
            }
        };

        let email: Arc<dyn EmailSender> = match &config.smtp.host {
            Some(host) => Arc::new(SmtpEmailSender::from_config(host, &config.smtp).context("configuring SMTP")?),
            None => Arc::new(LogEmailSender),
        };

        let payments = Arc::new(TranzilaGateway::new(&config.payment).context("configuring payment gateway")?);

        Ok(Self {
            store,
            uploads: UploadService::new(Arc::new(local), Arc::new(remote)),
            email,
            payments,
            config: Arc::new(config),
        })
    }
}

/// Creates every registered collection and its unique indexes
pub async fn bootstrap(store: &dyn RecordStore) -> StoreResult<()> {
    for model in models::MODELS {
        store.ensure_collection(model.collection, model.unique_fields).await?;
    }
    tracing::info!(collections = models::MODELS.len(), "Collections ready");
    Ok(())
}

pub fn app(state: AppState) -> Router {
    let config = state.config.clone();
    let body_limit = config.upload.max_video_bytes.max(config.upload.max_file_bytes) + BODY_OVERHEAD_BYTES;

    let mut api = Router::new()
        .route("/sign-up", post(public::auth::sign_up))
        .route("/sign-in", post(public::auth::sign_in))
        .route("/forgot-password", post(public::auth::forgot_password))
        .route("/reset-password", post(public::auth::reset_password))
        .route(
            "/profile",
            get(protected::account::profile_get).put(protected::account::profile_put),
        )
        .route("/verifyToken", get(protected::account::verify_token))
        .route("/logout", post(protected::account::logout))
        .route("/delete-account", axum::routing::delete(protected::account::delete_account))
        .route("/send-massage", post(public::massage::send_massage))
        .route("/payments", post(protected::payment::create_payment));

    for model in models::MODELS {
        let mut routes = resource_routes(*model);
        if model.collection == USERS.collection {
            routes = routes.route("/me", get(protected::account::users_me));
        }
        if model.collection == MEDIA.collection {
            routes = routes.route("/:id/playback", get(public::media::playback));
        }
        api = api.nest(&format!("/{}", model.collection), routes);
    }

    Router::new()
        .route("/", get(public::service::root))
        .route("/health", get(public::service::health))
        .route("/media/:mediatype/:ext", get(public::media::media_type))
        .nest("/api/v1", api)
        .nest_service("/uploads", ServeDir::new(&config.upload.local_dir))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(usize::try_from(body_limit).unwrap_or(usize::MAX)))
        .layer(cors_layer(&config.security.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}
