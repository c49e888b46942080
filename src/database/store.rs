use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::record::Record;
use crate::filter::{FilterError, FilterExpr};

/// Errors from record stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate value for '{field}' in {collection}")]
    Conflict { collection: String, field: String },

    #[error("Invalid collection or field name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Collection-oriented persistence used by every resource.
///
/// Records are addressed by collection name and id. `find_one_by` and the
/// natural-key methods compare the text form of a field, which is also what
/// the per-field unique indexes cover.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Creates the collection if needed, with one unique index per field
    async fn ensure_collection(&self, collection: &str, unique_fields: &[&str]) -> StoreResult<()>;

    async fn find_by_id(&self, collection: &str, id: Uuid) -> StoreResult<Option<Record>>;

    async fn find_by_ids(&self, collection: &str, ids: &[Uuid]) -> StoreResult<Vec<Record>>;

    async fn find_one_by(&self, collection: &str, field: &str, value: &str) -> StoreResult<Option<Record>>;

    /// True if a record other than `exclude` has `field` equal to `value`
    async fn exists_conflict(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        exclude: Option<Uuid>,
    ) -> StoreResult<bool>;

    /// Matching records in creation order
    async fn find_page(&self, collection: &str, filter: &FilterExpr, skip: i64, limit: i64) -> StoreResult<Vec<Record>>;

    async fn count(&self, collection: &str, filter: &FilterExpr) -> StoreResult<i64>;

    async fn insert(&self, collection: &str, owner: Option<Uuid>, data: Map<String, Value>) -> StoreResult<Record>;

    /// Shallow-merges `patch` into the record; `None` if it does not exist
    async fn update_by_id(&self, collection: &str, id: Uuid, patch: Map<String, Value>) -> StoreResult<Option<Record>>;

    async fn update_many(&self, collection: &str, ids: &[Uuid], patch: Map<String, Value>) -> StoreResult<u64>;

    async fn delete_by_id(&self, collection: &str, id: Uuid) -> StoreResult<Option<Record>>;

    async fn delete_many(&self, collection: &str, ids: &[Uuid]) -> StoreResult<u64>;

    /// Atomically merges `data` into the record whose `field` equals `value`,
    /// or inserts a new one owned by `owner`.
    async fn upsert_by_key(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        data: Map<String, Value>,
        owner: Option<Uuid>,
    ) -> StoreResult<Record>;

    /// Atomically returns the record whose `field` equals `value`, inserting
    /// `data` when there is none.
    async fn find_or_insert(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        data: Map<String, Value>,
        owner: Option<Uuid>,
    ) -> StoreResult<Record>;

    async fn health_check(&self) -> StoreResult<()>;
}

/// Collection names become table names: lowercase letters, digits, `_`, `-`
pub fn validate_collection_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 48
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

pub fn validate_field(name: &str) -> StoreResult<()> {
    crate::filter::query::validate_field_name(name).map_err(|_| StoreError::InvalidName(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names() {
        assert!(validate_collection_name("static-pages").is_ok());
        assert!(validate_collection_name("media").is_ok());
        assert!(validate_collection_name("Users").is_err());
        assert!(validate_collection_name("a\"; DROP").is_err());
        assert!(validate_collection_name("").is_err());
    }
}
