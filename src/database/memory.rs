use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::record::Record;
use super::store::{validate_collection_name, validate_field, RecordStore, StoreError, StoreResult};
use crate::filter::{matcher, FilterExpr};

#[derive(Debug, Default)]
struct Collection {
    unique_fields: Vec<String>,
    records: Vec<Record>,
}

impl Collection {
    /// Unique-index check for `candidate` against every other record
    fn check_unique(&self, name: &str, candidate: &Record) -> StoreResult<()> {
        for field in &self.unique_fields {
            let Some(value) = candidate.text_field(field) else {
                continue;
            };
            let taken = self
                .records
                .iter()
                .any(|r| r.id != candidate.id && r.text_field(field).as_deref() == Some(value.as_str()));
            if taken {
                return Err(StoreError::Conflict {
                    collection: name.to_string(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    fn position_by_key(&self, field: &str, value: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.text_field(field).as_deref() == Some(value))
    }
}

/// Process-local store with the same semantics as the Postgres one.
/// A single write lock makes every mutation, including the natural-key
/// upserts, atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn ensure_collection(&self, collection: &str, unique_fields: &[&str]) -> StoreResult<()> {
        validate_collection_name(collection)?;
        for field in unique_fields {
            validate_field(field)?;
        }
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        for field in unique_fields {
            if !entry.unique_fields.iter().any(|f| f == field) {
                entry.unique_fields.push(field.to_string());
            }
        }
        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: Uuid) -> StoreResult<Option<Record>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.records.iter().find(|r| r.id == id).cloned()))
    }

    async fn find_by_ids(&self, collection: &str, ids: &[Uuid]) -> StoreResult<Vec<Record>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| c.records.iter().filter(|r| ids.contains(&r.id)).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_one_by(&self, collection: &str, field: &str, value: &str) -> StoreResult<Option<Record>> {
        validate_field(field)?;
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| {
            c.records
                .iter()
                .find(|r| r.text_field(field).as_deref() == Some(value))
                .cloned()
        }))
    }

    async fn exists_conflict(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        exclude: Option<Uuid>,
    ) -> StoreResult<bool> {
        validate_field(field)?;
        let collections = self.collections.read().await;
        Ok(collections.get(collection).is_some_and(|c| {
            c.records
                .iter()
                .any(|r| Some(r.id) != exclude && r.text_field(field).as_deref() == Some(value))
        }))
    }

    async fn find_page(&self, collection: &str, filter: &FilterExpr, skip: i64, limit: i64) -> StoreResult<Vec<Record>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| {
                c.records
                    .iter()
                    .filter(|r| matcher::matches(filter, *r))
                    .skip(skip.max(0) as usize)
                    .take(limit.max(0) as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, collection: &str, filter: &FilterExpr) -> StoreResult<i64> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| c.records.iter().filter(|r| matcher::matches(filter, *r)).count() as i64)
            .unwrap_or(0))
    }

    async fn insert(&self, collection: &str, owner: Option<Uuid>, data: Map<String, Value>) -> StoreResult<Record> {
        validate_collection_name(collection)?;
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        let record = Record::new(owner, data);
        entry.check_unique(collection, &record)?;
        entry.records.push(record.clone());
        Ok(record)
    }

    async fn update_by_id(&self, collection: &str, id: Uuid, patch: Map<String, Value>) -> StoreResult<Option<Record>> {
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(index) = entry.records.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let mut updated = entry.records[index].clone();
        updated.apply_patch(patch);
        entry.check_unique(collection, &updated)?;
        entry.records[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn update_many(&self, collection: &str, ids: &[Uuid], patch: Map<String, Value>) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(0);
        };

        // Validate every candidate first so a conflict leaves nothing half-applied
        let mut staged = vec![];
        for (index, record) in entry.records.iter().enumerate() {
            if ids.contains(&record.id) {
                let mut updated = record.clone();
                updated.apply_patch(patch.clone());
                staged.push((index, updated));
            }
        }
        for (_, updated) in &staged {
            entry.check_unique(collection, updated)?;
            for (_, other) in &staged {
                if other.id != updated.id {
                    for field in &entry.unique_fields {
                        if updated.text_field(field).is_some() && updated.text_field(field) == other.text_field(field) {
                            return Err(StoreError::Conflict {
                                collection: collection.to_string(),
                                field: field.clone(),
                            });
                        }
                    }
                }
            }
        }

        let count = staged.len() as u64;
        for (index, updated) in staged {
            entry.records[index] = updated;
        }
        Ok(count)
    }

    async fn delete_by_id(&self, collection: &str, id: Uuid) -> StoreResult<Option<Record>> {
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(None);
        };
        Ok(entry
            .records
            .iter()
            .position(|r| r.id == id)
            .map(|index| entry.records.remove(index)))
    }

    async fn delete_many(&self, collection: &str, ids: &[Uuid]) -> StoreResult<u64> {
        let mut collections = self.collections.write().await;
        let Some(entry) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = entry.records.len();
        entry.records.retain(|r| !ids.contains(&r.id));
        Ok((before - entry.records.len()) as u64)
    }

    async fn upsert_by_key(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        data: Map<String, Value>,
        owner: Option<Uuid>,
    ) -> StoreResult<Record> {
        validate_collection_name(collection)?;
        validate_field(field)?;
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();

        if let Some(index) = entry.position_by_key(field, value) {
            let mut updated = entry.records[index].clone();
            updated.apply_patch(data);
            entry.check_unique(collection, &updated)?;
            entry.records[index] = updated.clone();
            return Ok(updated);
        }

        let mut record = Record::new(owner, data);
        record.data.insert(field.to_string(), Value::String(value.to_string()));
        entry.check_unique(collection, &record)?;
        entry.records.push(record.clone());
        Ok(record)
    }

    async fn find_or_insert(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        data: Map<String, Value>,
        owner: Option<Uuid>,
    ) -> StoreResult<Record> {
        validate_collection_name(collection)?;
        validate_field(field)?;
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();

        if let Some(index) = entry.position_by_key(field, value) {
            return Ok(entry.records[index].clone());
        }

        let mut record = Record::new(owner, data);
        record.data.insert(field.to_string(), Value::String(value.to_string()));
        entry.check_unique(collection, &record)?;
        entry.records.push(record.clone());
        Ok(record)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Condition;
    use serde_json::json;

    fn data(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicates_but_not_self_updates() {
        let store = MemoryStore::new();
        store.ensure_collection("articles", &["slug"]).await.unwrap();

        let first = store.insert("articles", None, data(json!({"slug": "a"}))).await.unwrap();
        let err = store.insert("articles", None, data(json!({"slug": "a"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref field, .. } if field == "slug"));

        let updated = store
            .update_by_id("articles", first.id, data(json!({"slug": "a", "title": "t"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.data["title"], "t");
        assert_eq!(updated.owner, None);
    }

    #[tokio::test]
    async fn paging_and_counting_follow_the_filter() {
        let store = MemoryStore::new();
        for i in 0..25 {
            store.insert("dogs", None, data(json!({"age": i}))).await.unwrap();
        }
        let filter = FilterExpr::default();
        let page = store.find_page("dogs", &filter, 10, 10).await.unwrap();
        assert_eq!(page.len(), 10);
        assert_eq!(page[0].data["age"], 10);
        assert_eq!(store.count("dogs", &filter).await.unwrap(), 25);

        let old = FilterExpr::default().with_condition("age", Condition::Range { gte: Some(20.0), lte: None });
        assert_eq!(store.count("dogs", &old).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn upsert_by_key_never_duplicates() {
        let store = MemoryStore::new();
        store.ensure_collection("media", &["url"]).await.unwrap();
        let a = store
            .upsert_by_key("media", "url", "u1", data(json!({"altText": "x"})), None)
            .await
            .unwrap();
        let b = store
            .upsert_by_key("media", "url", "u1", data(json!({"altText": "y"})), None)
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.data["altText"], "y");
        assert_eq!(store.count("media", &FilterExpr::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn find_or_insert_keeps_existing() {
        let store = MemoryStore::new();
        let a = store
            .find_or_insert("lessons", "fileName", "intro.mp4", data(json!({"title": "one"})), None)
            .await
            .unwrap();
        let b = store
            .find_or_insert("lessons", "fileName", "intro.mp4", data(json!({"title": "two"})), None)
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.data["title"], "one");
    }

    #[tokio::test]
    async fn bulk_mutations_report_counts() {
        let store = MemoryStore::new();
        let a = store.insert("tags", None, data(json!({"name": "a"}))).await.unwrap();
        let b = store.insert("tags", None, data(json!({"name": "b"}))).await.unwrap();
        let n = store
            .update_many("tags", &[a.id, b.id], data(json!({"color": "red"})))
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(store.delete_many("tags", &[a.id, Uuid::new_v4()]).await.unwrap(), 1);
        assert!(store.find_by_id("tags", a.id).await.unwrap().is_none());
        assert!(store.delete_by_id("tags", b.id).await.unwrap().is_some());
    }
}
