use std::collections::BTreeSet;
use uuid::Uuid;

use crate::controller::ModelDescriptor;
use crate::database::{Record, RecordStore, StoreError};
use crate::error::ApiError;
use crate::middleware::AuthUser;

/// Loads the target and permits the action only for its owner or a holder
/// of one of the model's required roles.
pub async fn authorize_owner_or_role(
    store: &dyn RecordStore,
    model: &ModelDescriptor,
    id: Uuid,
    user: &AuthUser,
    action: &str,
) -> Result<Record, ApiError> {
    let record = store
        .find_by_id(model.collection, id)
        .await
        .map_err(|e| lookup_failed(model, e))?
        .ok_or_else(|| ApiError::not_found(format!("{} not found", model.name)))?;

    ensure_permitted(&record, model, user, action)?;
    Ok(record)
}

/// Bulk form: every id must exist and every record must be permitted
pub async fn authorize_many(
    store: &dyn RecordStore,
    model: &ModelDescriptor,
    ids: &[Uuid],
    user: &AuthUser,
    action: &str,
) -> Result<Vec<Record>, ApiError> {
    let wanted: BTreeSet<Uuid> = ids.iter().copied().collect();
    let records = store
        .find_by_ids(model.collection, ids)
        .await
        .map_err(|e| lookup_failed(model, e))?;

    if records.len() != wanted.len() {
        return Err(ApiError::not_found(format!("{} not found", model.name)));
    }
    for record in &records {
        ensure_permitted(record, model, user, action)?;
    }
    Ok(records)
}

pub fn ensure_permitted(record: &Record, model: &ModelDescriptor, user: &AuthUser, action: &str) -> Result<(), ApiError> {
    let is_owner = record.owner == Some(user.id);
    let has_role = user.has_any_role(model.required_roles);

    if is_owner || has_role {
        tracing::debug!(model = model.name, record_id = %record.id, user_id = %user.id, is_owner, has_role, "Action authorized");
        return Ok(());
    }

    tracing::warn!(model = model.name, record_id = %record.id, user_id = %user.id, action, "Action forbidden");
    Err(ApiError::forbidden(format!("Forbidden: You are not authorized to {} this item", action)))
}

fn lookup_failed(model: &ModelDescriptor, err: StoreError) -> ApiError {
    tracing::error!(model = model.name, error = %err, "Authorization lookup failed");
    ApiError::internal_with(format!("Error authorizing action for {}", model.name), err.to_string())
}
