use axum::{
    async_trait,
    extract::{FromRef, FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use bytes::{Bytes, BytesMut};
use serde_json::{Map, Value};

use super::media_type::MediaType;
use super::UploadError;
use crate::error::ApiError;

/// Body keys carrying embedded sub-objects
pub const LINKED_OBJECT_PREFIX: &str = "linkedObject_";

/// Multipart text fields that carry JSON rather than plain strings
const JSON_TEXT_FIELDS: &[&str] = &["items", "ids", "data"];

/// Per-class upload ceilings
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_video_bytes: u64,
    pub max_file_bytes: u64,
}

impl UploadLimits {
    pub fn ceiling_for(&self, media_type: MediaType) -> u64 {
        match media_type {
            MediaType::Video => self.max_video_bytes,
            _ => self.max_file_bytes,
        }
    }
}

/// One accepted file part
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub media_type: MediaType,
    pub bytes: Bytes,
}

/// Request body for create/update routes: either a JSON document or a
/// multipart form carrying at most one file under the field named by
/// `fieldName` (default `file`).
#[derive(Debug, Clone, Default)]
pub struct Payload {
    pub body: Map<String, Value>,
    pub file: Option<UploadedFile>,
}

#[async_trait]
impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
    UploadLimits: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let limits = UploadLimits::from_ref(state);
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| UploadError::Multipart(e.body_text()))?;
            return Ok(read_multipart(multipart, limits).await?);
        }

        let Json(value) = Json::<Value>::from_request(req, state).await?;
        match value {
            Value::Object(body) => Ok(Payload { body, file: None }),
            _ => Err(ApiError::validation_error("Request body must be a JSON object")),
        }
    }
}

async fn read_multipart(mut multipart: Multipart, limits: UploadLimits) -> Result<Payload, UploadError> {
    let mut body = Map::new();
    let mut files: Vec<UploadedFile> = vec![];

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let text = field
                .text()
                .await
                .map_err(|e| UploadError::Multipart(e.body_text()))?;
            body.insert(name.clone(), text_field_value(&name, text));
            continue;
        };

        let content_type = field.content_type().unwrap_or_default().to_string();
        let media_type = MediaType::from_file_name(&file_name);
        if media_type == MediaType::Unknown || !media_type.accepts_mime(&content_type) {
            return Err(UploadError::InvalidType { file_name, content_type });
        }

        let limit = limits.ceiling_for(media_type);
        let mut buffer = BytesMut::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| UploadError::Multipart(e.body_text()))?
        {
            if (buffer.len() + chunk.len()) as u64 > limit {
                return Err(UploadError::TooLarge { limit });
            }
            buffer.extend_from_slice(&chunk);
        }

        files.push(UploadedFile {
            field_name: name,
            file_name,
            content_type,
            media_type,
            bytes: buffer.freeze(),
        });
    }

    let wanted = body
        .get("fieldName")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("file")
        .to_string();

    let mut file = None;
    for candidate in files {
        if candidate.field_name == wanted && file.is_none() {
            file = Some(candidate);
        } else {
            return Err(UploadError::UnexpectedField(candidate.field_name));
        }
    }

    Ok(Payload { body, file })
}

/// Linked objects and bulk fields arrive as JSON text inside forms
fn text_field_value(name: &str, text: String) -> Value {
    if name.starts_with(LINKED_OBJECT_PREFIX) || JSON_TEXT_FIELDS.contains(&name) {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    } else {
        Value::String(text)
    }
}
