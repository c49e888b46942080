use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Byte storage that hands back a durable URL for every object.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store `bytes` under `key` and return the URL they are reachable at
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> StorageResult<String>;

    /// Time-limited read URL for an object previously returned by `put`.
    /// Backends without signing return the stored URL unchanged.
    async fn signed_url(&self, url: &str, expires_in: Duration) -> StorageResult<String>;

    fn backend_name(&self) -> &'static str;
}

/// Local filesystem storage, served back over HTTP from `base_url`
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path, base_url })
    }

    /// Convert storage key to filesystem path, refusing anything that could
    /// leave the base directory
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        let key_path = Path::new(storage_key);
        let safe = !storage_key.is_empty()
            && key_path
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(storage_key.to_string()));
        }
        Ok(self.base_path.join(key_path))
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl BlobStorage for LocalStorage {
    async fn put(&self, key: &str, _content_type: &str, bytes: Bytes) -> StorageResult<String> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &bytes).await?;

        tracing::info!(key = %key, size_bytes = bytes.len(), "Stored file locally");
        Ok(self.generate_url(key))
    }

    async fn signed_url(&self, url: &str, _expires_in: Duration) -> StorageResult<String> {
        Ok(url.to_string())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

/// Remote object storage (Google Cloud Storage in deployment, in-memory in
/// tests) with optional URL signing
#[derive(Clone)]
pub struct ObjectStoreStorage {
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    public_base_url: String,
}

impl ObjectStoreStorage {
    pub fn new(store: Arc<dyn ObjectStore>, signer: Option<Arc<dyn Signer>>, public_base_url: String) -> Self {
        Self {
            store,
            signer,
            public_base_url,
        }
    }

    /// Bucket-backed storage using a service account key, signing enabled
    pub fn google_cloud(bucket: &str, service_account_key: Option<&str>, public_base_url: Option<String>) -> StorageResult<Self> {
        let mut builder = object_store::gcp::GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket);
        if let Some(key) = service_account_key {
            builder = builder.with_service_account_key(key);
        }
        let gcs = Arc::new(
            builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?,
        );
        let base = public_base_url.unwrap_or_else(|| format!("https://storage.googleapis.com/{}", bucket));
        Ok(Self::new(gcs.clone(), Some(gcs as Arc<dyn Signer>), base))
    }

    /// Process-local object store without signing
    pub fn in_memory(public_base_url: String) -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), None, public_base_url)
    }

    fn generate_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }

    fn key_from_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.public_base_url.trim_end_matches('/'))
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

#[async_trait]
impl BlobStorage for ObjectStoreStorage {
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> StorageResult<String> {
        let location = ObjectPath::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))?;
        let size = bytes.len();
        let start = std::time::Instant::now();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(bytes), options)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        tracing::info!(
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object upload successful"
        );
        Ok(self.generate_url(key))
    }

    async fn signed_url(&self, url: &str, expires_in: Duration) -> StorageResult<String> {
        let (Some(signer), Some(key)) = (&self.signer, self.key_from_url(url)) else {
            return Ok(url.to_string());
        };
        let location = ObjectPath::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))?;
        let signed = signer
            .signed_url(Method::GET, &location, expires_in)
            .await
            .map_err(|e| StorageError::SigningFailed(e.to_string()))?;
        Ok(signed.to_string())
    }

    fn backend_name(&self) -> &'static str {
        "object-store"
    }
}
