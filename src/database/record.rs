use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::filter::matcher::FieldSource;

/// Keys the store owns; stripped from any client payload
const SYSTEM_FIELDS: &[&str] = &[
    "id",
    "_id",
    "owner",
    "createdAt",
    "updatedAt",
    "created_at",
    "updated_at",
    "__v",
];

/// Request-control keys that never reach storage
const CONTROL_FIELDS: &[&str] = &["fieldName"];

/// Errors that can occur while reading client input into a record body
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
}

/// One persisted row of any collection
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: Uuid,
    /// Set once at creation, never changed by updates
    pub owner: Option<Uuid>,
    pub data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    pub fn new(owner: Option<Uuid>, data: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Flat JSON document: data fields plus `id`, `owner`, timestamps
    pub fn to_document(&self) -> Map<String, Value> {
        let mut doc = self.data.clone();
        doc.insert("id".into(), Value::String(self.id.to_string()));
        doc.insert(
            "owner".into(),
            self.owner
                .map(|o| Value::String(o.to_string()))
                .unwrap_or(Value::Null),
        );
        doc.insert("createdAt".into(), Value::String(self.created_at.to_rfc3339()));
        doc.insert("updatedAt".into(), Value::String(self.updated_at.to_rfc3339()));
        doc
    }

    /// Shallow merge of `patch` into the data document
    pub fn apply_patch(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            self.data.insert(key, value);
        }
        self.updated_at = Utc::now();
    }

    /// Text form of a field, used for natural-key and by-field lookups
    pub fn text_field(&self, name: &str) -> Option<String> {
        self.field(name).as_ref().and_then(key_text)
    }

    /// Reads a client body, dropping store-owned keys and `protected` fields.
    pub fn sanitize_input(input: Value, protected: &[&str]) -> Result<Map<String, Value>, RecordError> {
        match input {
            Value::Object(map) => Ok(map
                .into_iter()
                .filter(|(key, _)| {
                    !SYSTEM_FIELDS.contains(&key.as_str())
                        && !CONTROL_FIELDS.contains(&key.as_str())
                        && !protected.contains(&key.as_str())
                })
                .collect()),
            _ => Err(RecordError::InvalidJson("Expected JSON object".to_string())),
        }
    }
}

impl FieldSource for Record {
    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" | "_id" => Some(Value::String(self.id.to_string())),
            "owner" => self.owner.map(|o| Value::String(o.to_string())),
            "createdAt" => Some(Value::String(self.created_at.to_rfc3339())),
            "updatedAt" => Some(Value::String(self.updated_at.to_rfc3339())),
            _ => self.data.get(name).cloned(),
        }
    }
}

/// Text used to compare key values; `None` for null, objects and arrays
pub fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// JavaScript-style truthiness, used where a client value may be "empty"
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Parses a list of record ids, rejecting anything that is not a UUID
pub fn parse_ids(value: Option<&Value>) -> Result<Vec<Uuid>, RecordError> {
    let items = value
        .and_then(Value::as_array)
        .ok_or_else(|| RecordError::InvalidJson("Expected 'ids' array".to_string()))?;
    if items.is_empty() {
        return Err(RecordError::InvalidJson("'ids' must not be empty".to_string()));
    }
    let mut ids: Vec<Uuid> = Vec::with_capacity(items.len());
    for item in items {
        let id = item
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| RecordError::InvalidId(item.to_string()))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}
