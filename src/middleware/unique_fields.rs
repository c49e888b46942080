use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

use crate::controller::ModelDescriptor;
use crate::database::record::{is_truthy, key_text};
use crate::database::RecordStore;
use crate::error::ApiError;

/// Rejects a body whose unique-field values already belong to another record.
///
/// Fields are checked in declaration order; absent or falsy values are
/// skipped. `exclude` is the record being updated, which may keep its own
/// values.
pub async fn check_unique_fields(
    store: &dyn RecordStore,
    model: &ModelDescriptor,
    body: &Map<String, Value>,
    exclude: Option<Uuid>,
) -> Result<(), ApiError> {
    for field in model.unique_fields {
        let Some(value) = unique_value(body, field) else {
            continue;
        };

        let taken = store
            .exists_conflict(model.collection, field, &value, exclude)
            .await
            .map_err(|e| {
                tracing::error!(model = model.name, field = *field, error = %e, "Unique field check failed");
                ApiError::internal_with(format!("Failed to check unique fields for {}", model.name), e.to_string())
            })?;

        if taken {
            tracing::debug!(model = model.name, field = *field, "Unique field conflict");
            return Err(conflict(model, field));
        }
    }
    Ok(())
}

/// Rejects a batch in which two items share a unique-field value
pub fn check_batch_unique(model: &ModelDescriptor, items: &[Map<String, Value>]) -> Result<(), ApiError> {
    for field in model.unique_fields {
        let mut seen = HashSet::new();
        for item in items {
            if let Some(value) = unique_value(item, field) {
                if !seen.insert(value) {
                    return Err(conflict(model, field));
                }
            }
        }
    }
    Ok(())
}

fn unique_value(body: &Map<String, Value>, field: &str) -> Option<String> {
    body.get(field).filter(|v| is_truthy(v)).and_then(key_text)
}

pub fn conflict(model: &ModelDescriptor, field: &str) -> ApiError {
    ApiError::conflict(format!("{} with this {} already exists", model.name, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::models::ARTICLES;
    use crate::database::MemoryStore;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    async fn store_with_article(slug: &str) -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        store.ensure_collection("articles", &["slug"]).await.unwrap();
        let record = store
            .insert("articles", None, body(json!({"title": "A", "slug": slug})))
            .await
            .unwrap();
        (store, record.id)
    }

    #[tokio::test]
    async fn conflicting_value_names_the_field() {
        let (store, _) = store_with_article("five-chars").await;
        let err = check_unique_fields(&store, &ARTICLES, &body(json!({"slug": "five-chars"})), None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.message(), "Article with this slug already exists");
    }

    #[tokio::test]
    async fn record_may_keep_its_own_value_on_update() {
        let (store, id) = store_with_article("five-chars").await;
        check_unique_fields(&store, &ARTICLES, &body(json!({"slug": "five-chars"})), Some(id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn falsy_values_are_not_checked() {
        let (store, _) = store_with_article("").await;
        check_unique_fields(&store, &ARTICLES, &body(json!({"slug": ""})), None)
            .await
            .unwrap();
    }

    #[test]
    fn duplicates_inside_a_batch_conflict() {
        let items = vec![body(json!({"slug": "a"})), body(json!({"slug": "a"}))];
        assert!(check_batch_unique(&ARTICLES, &items).is_err());
        let items = vec![body(json!({"slug": "a"})), body(json!({"slug": "b"}))];
        assert!(check_batch_unique(&ARTICLES, &items).is_ok());
    }
}
