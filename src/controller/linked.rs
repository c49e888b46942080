use futures::future::try_join_all;
use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

use super::ModelDescriptor;
use crate::database::record::{is_truthy, Record};
use crate::database::{RecordStore, StoreError};
use crate::error::ApiError;
use crate::middleware::unique_fields::{check_batch_unique, check_unique_fields};
use crate::upload::LINKED_OBJECT_PREFIX;

/// Replaces every `linkedObject_*` entry of `body` with the id (or ids) of a
/// record in the model's collection.
///
/// The returned map holds the same keys as the linked entries; callers merge
/// it over the body. Arrays resolve concurrently but keep input order.
pub async fn resolve_linked_objects(
    store: &dyn RecordStore,
    model: &ModelDescriptor,
    body: &Map<String, Value>,
    owner: Option<Uuid>,
) -> Result<Map<String, Value>, ApiError> {
    let mut resolved = Map::new();

    for (key, value) in body.iter().filter(|(k, _)| k.starts_with(LINKED_OBJECT_PREFIX)) {
        let id = match value {
            Value::Array(items) => Value::Array(
                try_join_all(items.iter().map(|item| resolve_one(store, model, item, owner))).await?,
            ),
            single => resolve_one(store, model, single, owner).await?,
        };
        resolved.insert(key.clone(), id);
    }

    Ok(resolved)
}

/// Rejects linked objects that would be written with a unique-field value
/// already taken in the store, by the parent body, or by another linked
/// object. Runs before anything is written.
pub async fn check_linked_objects(
    store: &dyn RecordStore,
    model: &ModelDescriptor,
    body: &Map<String, Value>,
) -> Result<(), ApiError> {
    if model.unique_fields.is_empty() {
        return Ok(());
    }

    let mut file_names = HashSet::new();
    let mut batch = vec![body.clone()];

    for item in linked_items(body) {
        let Some(object) = pending_object(model, item)? else {
            continue;
        };
        if let Some(file_name) = file_name_of(&object) {
            if !file_names.insert(file_name.to_string()) {
                continue;
            }
            // Existing records are reused, not written
            if store.find_one_by(model.collection, "fileName", file_name).await?.is_some() {
                continue;
            }
        }
        check_unique_fields(store, model, &object, None).await?;
        batch.push(object);
    }

    check_batch_unique(model, &batch)
}

fn linked_items(body: &Map<String, Value>) -> impl Iterator<Item = &Value> {
    body.iter()
        .filter(|(k, _)| k.starts_with(LINKED_OBJECT_PREFIX))
        .flat_map(|(_, value)| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            single => vec![single],
        })
}

/// The sanitized object a linked entry would write, if it writes one
fn pending_object(model: &ModelDescriptor, item: &Value) -> Result<Option<Map<String, Value>>, ApiError> {
    let Value::Object(object) = item else {
        return Ok(None);
    };
    if !is_truthy(item) || ["_id", "id"].iter().any(|k| object.get(*k).is_some_and(is_truthy)) {
        return Ok(None);
    }
    Ok(Some(Record::sanitize_input(item.clone(), model.protected_fields)?))
}

fn file_name_of(object: &Map<String, Value>) -> Option<&str> {
    object.get("fileName").and_then(Value::as_str).filter(|s| !s.is_empty())
}

async fn resolve_one(
    store: &dyn RecordStore,
    model: &ModelDescriptor,
    item: &Value,
    owner: Option<Uuid>,
) -> Result<Value, ApiError> {
    if !is_truthy(item) {
        return Ok(Value::String(String::new()));
    }

    let Value::Object(object) = item else {
        // Already an id
        return Ok(item.clone());
    };

    if let Some(id) = ["_id", "id"].iter().find_map(|k| object.get(*k).filter(|v| is_truthy(v))) {
        return Ok(id.clone());
    }

    let data = Record::sanitize_input(item.clone(), model.protected_fields)?;
    let record = match file_name_of(&data) {
        Some(file_name) => {
            store
                .find_or_insert(model.collection, "fileName", file_name, data.clone(), owner)
                .await
        }
        None => store.insert(model.collection, owner, data).await,
    }
    .map_err(|e| match e {
        conflict @ StoreError::Conflict { .. } => ApiError::from(conflict),
        e => {
            tracing::error!(model = model.name, error = %e, "Linked object resolution failed");
            ApiError::internal_with("Failed to process linked objects", e.to_string())
        }
    })?;

    Ok(Value::String(record.id.to_string()))
}
