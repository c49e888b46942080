pub mod media_type;
pub mod multipart;
pub mod storage;

use chrono::Utc;
use rand::{distr::Alphanumeric, Rng};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::database::{Record, RecordStore, StoreError};
pub use media_type::MediaType;
pub use multipart::{Payload, UploadLimits, UploadedFile, LINKED_OBJECT_PREFIX};
pub use storage::{BlobStorage, LocalStorage, ObjectStoreStorage, StorageError};

/// Collection holding media records
pub const MEDIA_COLLECTION: &str = "media";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid file type or MIME type. ({file_name}, {content_type})")]
    InvalidType { file_name: String, content_type: String },

    #[error("File too large: limit is {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Unexpected field: {0}")]
    UnexpectedField(String),

    #[error("Malformed multipart body: {0}")]
    Multipart(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Routes uploaded bytes by media class: video goes to remote object
/// storage, everything else to local storage. There is no fallback between
/// the two.
#[derive(Clone)]
pub struct UploadService {
    local: Arc<dyn BlobStorage>,
    remote: Arc<dyn BlobStorage>,
}

impl UploadService {
    pub fn new(local: Arc<dyn BlobStorage>, remote: Arc<dyn BlobStorage>) -> Self {
        Self { local, remote }
    }

    pub fn backend_for(&self, media_type: MediaType) -> &Arc<dyn BlobStorage> {
        match media_type {
            MediaType::Video => &self.remote,
            _ => &self.local,
        }
    }

    pub fn remote(&self) -> &Arc<dyn BlobStorage> {
        &self.remote
    }

    /// Stores the file, then upserts its media record keyed by URL. The
    /// record is only written once the bytes are confirmed stored.
    pub async fn persist(
        &self,
        store: &dyn RecordStore,
        file: UploadedFile,
        body: &Map<String, Value>,
        owner: Option<Uuid>,
    ) -> Result<Record, UploadError> {
        let now_ms = Utc::now().timestamp_millis();
        let key = storage_key(file.media_type, &file.file_name, now_ms);
        let backend = self.backend_for(file.media_type);

        let url = backend.put(&key, &file.content_type, file.bytes).await?;
        tracing::info!(
            backend = backend.backend_name(),
            media_type = %file.media_type,
            url = %url,
            "Upload stored"
        );

        let file_name = body
            .get("fileName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(&file.file_name)
            .to_string();
        let alt_text = body
            .get("altText")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut data = Map::new();
        data.insert("fileName".into(), Value::String(file_name));
        data.insert("altText".into(), Value::String(alt_text));
        data.insert("slug".into(), Value::String(media_slug(file.media_type, now_ms)));
        data.insert("url".into(), Value::String(url.clone()));
        data.insert("mediaType".into(), Value::String(file.media_type.to_string()));

        let media = store
            .upsert_by_key(MEDIA_COLLECTION, "url", &url, data, owner)
            .await?;
        Ok(media)
    }
}

/// Object key: `media/videos/<ms>-<name>` for video, `<class>/<ms>-<name>` otherwise
pub fn storage_key(media_type: MediaType, file_name: &str, now_ms: i64) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(file_name.as_bytes()).collect();
    match media_type {
        MediaType::Video => format!("media/videos/{}-{}", now_ms, encoded),
        other => format!("{}/{}-{}", other, now_ms, encoded),
    }
}

/// `<mediaType>-<timestamp>-<random>`
pub fn media_slug(media_type: MediaType, now_ms: i64) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}-{}-{}", media_type, now_ms, suffix)
}
