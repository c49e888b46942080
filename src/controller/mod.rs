//! Generic resource controller.
//!
//! A [`ModelDescriptor`] names a collection, its unique fields and its public
//! view; [`ResourceController`] turns it into the nine resource operations.
//! Each write runs the same pipeline: authenticate, parse the upload,
//! check uniqueness, persist the upload, resolve linked objects, persist
//! the record.

pub mod linked;
pub mod models;

use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::api::format;
use crate::api::AppState;
use crate::auth::Role;
use crate::database::record::{parse_ids, Record};
use crate::error::ApiError;
use crate::filter::ListQuery;
use crate::middleware::ownership::{authorize_many, authorize_owner_or_role};
use crate::middleware::unique_fields::{check_batch_unique, check_unique_fields, conflict};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::types::Operation;
use crate::upload::{Payload, MEDIA_COLLECTION};

pub use linked::{check_linked_objects, resolve_linked_objects};

/// Public serialization of one record
pub type ViewFn = fn(&Record) -> Value;

/// Static description of one resource
#[derive(Debug, Clone, Copy)]
pub struct ModelDescriptor {
    /// Display name used in messages ("Article")
    pub name: &'static str,
    pub collection: &'static str,
    /// Checked in order before every write
    pub unique_fields: &'static [&'static str],
    /// Fields accepted by the by-field lookup; `None` accepts any field
    pub queryable_fields: Option<&'static [&'static str]>,
    /// Roles that may modify records they do not own
    pub required_roles: &'static [Role],
    /// Never written through the generic paths and never queryable
    pub protected_fields: &'static [&'static str],
    pub view: ViewFn,
}

impl ModelDescriptor {
    pub const fn new(name: &'static str, collection: &'static str) -> Self {
        Self {
            name,
            collection,
            unique_fields: &[],
            queryable_fields: None,
            required_roles: &[Role::Admin],
            protected_fields: &[],
            view: format::document_view,
        }
    }

    pub const fn unique(mut self, fields: &'static [&'static str]) -> Self {
        self.unique_fields = fields;
        self
    }

    pub const fn queryable(mut self, fields: &'static [&'static str]) -> Self {
        self.queryable_fields = Some(fields);
        self
    }

    pub const fn protected(mut self, fields: &'static [&'static str]) -> Self {
        self.protected_fields = fields;
        self
    }

    pub const fn view(mut self, view: ViewFn) -> Self {
        self.view = view;
        self
    }

    pub fn render(&self, record: &Record) -> Value {
        (self.view)(record)
    }

    /// Media uploads to the media resource are the record itself
    pub fn is_media(&self) -> bool {
        self.collection == MEDIA_COLLECTION
    }

    pub fn allows_query_on(&self, field: &str) -> bool {
        if self.protected_fields.contains(&field) {
            return false;
        }
        match self.queryable_fields {
            Some(allowed) => allowed.contains(&field),
            None => true,
        }
    }

    fn not_found(&self) -> ApiError {
        ApiError::not_found(format!("{} not found", self.name))
    }

    fn sanitize(&self, body: Map<String, Value>) -> Result<Map<String, Value>, ApiError> {
        Ok(Record::sanitize_input(Value::Object(body), self.protected_fields)?)
    }
}

/// Unparseable ids cannot name a record
fn parse_path_id(model: &ModelDescriptor, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| model.not_found())
}

/// The nine resource operations for one model
#[derive(Debug, Clone, Copy)]
pub struct ResourceController {
    model: ModelDescriptor,
}

impl ResourceController {
    pub fn new(model: ModelDescriptor) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &ModelDescriptor {
        &self.model
    }

    pub async fn create(&self, state: &AppState, user: &AuthUser, payload: Payload) -> ApiResult<Value> {
        self.create_record(state, Some(user), payload)
            .await
            .map_err(|e| e.during(Operation::Create, self.model.name))
    }

    /// Create without an acting identity: no upload, no owner
    pub async fn create_anonymous(&self, state: &AppState, body: Map<String, Value>) -> ApiResult<Value> {
        self.create_record(state, None, Payload { body, file: None })
            .await
            .map_err(|e| e.during(Operation::Create, self.model.name))
    }

    async fn create_record(&self, state: &AppState, user: Option<&AuthUser>, payload: Payload) -> ApiResult<Value> {
        let model = &self.model;
        let store = state.store.as_ref();
        let owner = user.map(|u| u.id);
        let Payload { body, file } = payload;

        let mut body = model.sanitize(body)?;
        check_unique_fields(store, model, &body, None).await?;
        check_linked_objects(store, model, &body).await?;

        let media = match file {
            Some(file) => Some(state.uploads.persist(store, file, &body, owner).await?),
            None => None,
        };

        let linked = resolve_linked_objects(store, model, &body, owner).await?;
        body.extend(linked);

        let record = match media {
            Some(media) if model.is_media() => {
                for key in ["url", "slug", "mediaType"] {
                    body.remove(key);
                }
                store
                    .update_by_id(model.collection, media.id, body)
                    .await?
                    .ok_or_else(|| model.not_found())?
            }
            Some(media) => {
                body.insert("media".into(), Value::String(media.id.to_string()));
                store.insert(model.collection, owner, body).await?
            }
            None => store.insert(model.collection, owner, body).await?,
        };

        tracing::info!(model = model.name, record_id = %record.id, "Record created");
        Ok(ApiResponse::created(json!({
            "message": format!("{} created successfully", model.name),
            "data": model.render(&record),
        })))
    }

    /// `{ items: [...] }`; every item is validated before the first write,
    /// then items are persisted one at a time in order
    pub async fn create_many(&self, state: &AppState, user: &AuthUser, payload: Payload) -> ApiResult<Value> {
        self.create_many_records(state, user, payload)
            .await
            .map_err(|e| e.during(Operation::CreateMany, self.model.name))
    }

    async fn create_many_records(&self, state: &AppState, user: &AuthUser, payload: Payload) -> ApiResult<Value> {
        let model = &self.model;
        let store = state.store.as_ref();
        let Payload { mut body, file } = payload;

        let raw_items = match body.remove("items") {
            Some(Value::Array(items)) if !items.is_empty() => items,
            _ => return Err(ApiError::validation_error("Expected a non-empty 'items' array")),
        };
        let mut items = Vec::with_capacity(raw_items.len());
        for item in raw_items {
            match item {
                Value::Object(map) => items.push(model.sanitize(map)?),
                _ => return Err(ApiError::validation_error("Each item must be a JSON object")),
            }
        }

        for item in &items {
            check_unique_fields(store, model, item, None).await?;
            check_linked_objects(store, model, item).await?;
        }
        check_batch_unique(model, &items)?;

        let media = match file {
            Some(file) => Some(state.uploads.persist(store, file, &body, Some(user.id)).await?),
            None => None,
        };

        let mut created = Vec::with_capacity(items.len());
        for mut item in items {
            let linked = resolve_linked_objects(store, model, &item, Some(user.id)).await?;
            item.extend(linked);
            if let Some(media) = &media {
                item.insert("media".into(), Value::String(media.id.to_string()));
            }
            let record = store.insert(model.collection, Some(user.id), item).await?;
            created.push(model.render(&record));
        }

        tracing::info!(model = model.name, count = created.len(), "Records created");
        Ok(ApiResponse::created(json!({
            "message": format!("{}s created successfully", model.name),
            "data": created,
        })))
    }

    pub async fn get_items(&self, state: &AppState, params: &[(String, String)]) -> ApiResult<Value> {
        self.list_records(state, params)
            .await
            .map_err(|e| e.during(Operation::Select, self.model.name))
    }

    async fn list_records(&self, state: &AppState, params: &[(String, String)]) -> ApiResult<Value> {
        let model = &self.model;
        let query = ListQuery::from_params(params, &state.config.filter)?;
        if let Some(field) = query
            .filter
            .conditions
            .keys()
            .find(|field| model.protected_fields.contains(&field.as_str()))
        {
            return Err(ApiError::validation_error(format!(
                "Field '{}' cannot be queried on {}",
                field, model.name
            )));
        }

        let records = state
            .store
            .find_page(model.collection, &query.filter, query.skip(), query.limit)
            .await?;
        let total = state.store.count(model.collection, &query.filter).await?;

        Ok(ApiResponse::success(format::page_view(
            records.iter().map(|r| model.render(r)).collect(),
            total,
            query.page,
            query.limit,
        )))
    }

    pub async fn get_item(&self, state: &AppState, id: &str) -> ApiResult<Value> {
        self.fetch_record(state, id)
            .await
            .map_err(|e| e.during(Operation::Select, self.model.name))
    }

    async fn fetch_record(&self, state: &AppState, id: &str) -> ApiResult<Value> {
        let model = &self.model;
        let id = parse_path_id(model, id)?;
        let record = state
            .store
            .find_by_id(model.collection, id)
            .await?
            .ok_or_else(|| model.not_found())?;
        Ok(ApiResponse::success(model.render(&record)))
    }

    pub async fn get_item_by_slug(&self, state: &AppState, slug: &str) -> ApiResult<Value> {
        self.find_by_field("slug", slug)
            .run(state)
            .await
            .map_err(|e| e.during(Operation::Select, self.model.name))
    }

    pub async fn get_item_by_field(&self, state: &AppState, key: &str, value: &str) -> ApiResult<Value> {
        let model = &self.model;
        if !model.allows_query_on(key) {
            return Err(ApiError::validation_error(format!(
                "Field '{}' cannot be queried on {}",
                key, model.name
            )));
        }
        self.find_by_field(key, value)
            .run(state)
            .await
            .map_err(|e| e.during(Operation::Select, model.name))
    }

    fn find_by_field<'a>(&'a self, field: &'a str, value: &'a str) -> FieldLookup<'a> {
        FieldLookup {
            model: &self.model,
            field,
            value,
        }
    }

    pub async fn update(&self, state: &AppState, user: &AuthUser, id: &str, payload: Payload) -> ApiResult<Value> {
        self.update_record(state, user, id, payload)
            .await
            .map_err(|e| e.during(Operation::Update, self.model.name))
    }

    async fn update_record(&self, state: &AppState, user: &AuthUser, id: &str, payload: Payload) -> ApiResult<Value> {
        let model = &self.model;
        let store = state.store.as_ref();
        let id = parse_path_id(model, id)?;
        authorize_owner_or_role(store, model, id, user, "update").await?;

        let Payload { body, file } = payload;
        let mut patch = model.sanitize(body)?;
        check_unique_fields(store, model, &patch, Some(id)).await?;
        check_linked_objects(store, model, &patch).await?;

        let media = match file {
            Some(file) => Some(state.uploads.persist(store, file, &patch, Some(user.id)).await?),
            None => None,
        };

        let linked = resolve_linked_objects(store, model, &patch, Some(user.id)).await?;
        patch.extend(linked);
        if let Some(media) = &media {
            patch.insert("media".into(), Value::String(media.id.to_string()));
        }

        let record = store
            .update_by_id(model.collection, id, patch)
            .await?
            .ok_or_else(|| model.not_found())?;

        tracing::info!(model = model.name, record_id = %record.id, "Record updated");
        Ok(ApiResponse::success(json!({
            "message": format!("{} updated successfully", model.name),
            "data": model.render(&record),
        })))
    }

    /// `{ ids: [...], data: {...} }`
    pub async fn update_many(&self, state: &AppState, user: &AuthUser, body: Map<String, Value>) -> ApiResult<Value> {
        self.update_records(state, user, body)
            .await
            .map_err(|e| e.during(Operation::UpdateMany, self.model.name))
    }

    async fn update_records(&self, state: &AppState, user: &AuthUser, body: Map<String, Value>) -> ApiResult<Value> {
        let model = &self.model;
        let store = state.store.as_ref();
        let ids = parse_ids(body.get("ids"))?;
        let patch = match body.get("data") {
            Some(Value::Object(data)) => model.sanitize(data.clone())?,
            _ => return Err(ApiError::validation_error("Expected a 'data' object")),
        };

        authorize_many(store, model, &ids, user, "update").await?;

        // One value cannot be unique across several records
        if ids.len() > 1 {
            if let Some(field) = model.unique_fields.iter().find(|f| patch.contains_key(**f)) {
                return Err(conflict(model, field));
            }
        }
        if let [only] = ids.as_slice() {
            check_unique_fields(store, model, &patch, Some(*only)).await?;
        }

        let count = store.update_many(model.collection, &ids, patch).await?;
        tracing::info!(model = model.name, count, "Records updated");
        Ok(ApiResponse::with_data(
            format!("{} {} updated successfully", count, model.name),
            json!({ "count": count }),
        ))
    }

    pub async fn delete(&self, state: &AppState, user: &AuthUser, id: &str) -> ApiResult<Value> {
        self.delete_record(state, user, id)
            .await
            .map_err(|e| e.during(Operation::Delete, self.model.name))
    }

    async fn delete_record(&self, state: &AppState, user: &AuthUser, id: &str) -> ApiResult<Value> {
        let model = &self.model;
        let store = state.store.as_ref();
        let id = parse_path_id(model, id)?;
        authorize_owner_or_role(store, model, id, user, "delete").await?;

        store
            .delete_by_id(model.collection, id)
            .await?
            .ok_or_else(|| model.not_found())?;

        tracing::info!(model = model.name, record_id = %id, "Record deleted");
        Ok(ApiResponse::message(format!("{} deleted successfully", model.name)))
    }

    /// `{ ids: [...] }`
    pub async fn delete_many(&self, state: &AppState, user: &AuthUser, body: Map<String, Value>) -> ApiResult<Value> {
        self.delete_records(state, user, body)
            .await
            .map_err(|e| e.during(Operation::DeleteMany, self.model.name))
    }

    async fn delete_records(&self, state: &AppState, user: &AuthUser, body: Map<String, Value>) -> ApiResult<Value> {
        let model = &self.model;
        let store = state.store.as_ref();
        let ids = parse_ids(body.get("ids"))?;
        authorize_many(store, model, &ids, user, "delete").await?;

        let count = store.delete_many(model.collection, &ids).await?;
        tracing::info!(model = model.name, count, "Records deleted");
        Ok(ApiResponse::with_data(
            format!("{} {} deleted successfully", count, model.name),
            json!({ "count": count }),
        ))
    }
}

/// Lookup of the first record whose field equals a value
struct FieldLookup<'a> {
    model: &'a ModelDescriptor,
    field: &'a str,
    value: &'a str,
}

impl FieldLookup<'_> {
    async fn run(self, state: &AppState) -> ApiResult<Value> {
        let record = state
            .store
            .find_one_by(self.model.collection, self.field, self.value)
            .await?
            .ok_or_else(|| self.model.not_found())?;
        Ok(ApiResponse::success(self.model.render(&record)))
    }
}

#[cfg(test)]
mod tests {
    use super::models::{ARTICLES, MEDIA, USERS};
    use super::*;
    use crate::testing::TestApp;
    use crate::upload::{MediaType, UploadedFile};
    use bytes::Bytes;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn payload(value: Value) -> Payload {
        Payload {
            body: body(value),
            file: None,
        }
    }

    fn image(name: &str) -> UploadedFile {
        UploadedFile {
            field_name: "file".into(),
            file_name: name.into(),
            content_type: "image/png".into(),
            media_type: MediaType::Image,
            bytes: Bytes::from_static(b"png"),
        }
    }

    #[test]
    fn by_field_lookup_honours_allow_list_and_protected_fields() {
        assert!(ARTICLES.allows_query_on("title"));
        assert!(USERS.allows_query_on("email"));
        assert!(!USERS.allows_query_on("password"));
        assert!(!USERS.allows_query_on("resetToken"));
        assert!(!USERS.allows_query_on("lastLogin"));
    }

    #[tokio::test]
    async fn create_sets_owner_and_strips_client_owner() {
        let app = TestApp::new().await;
        let user = app.user(vec![Role::User]);
        let controller = ResourceController::new(ARTICLES);

        let response = controller
            .create(&app.state, &user, payload(json!({"title": "Five Chars", "slug": "five-chars", "owner": "someone"})))
            .await
            .unwrap();
        assert_eq!(response.status_code, Some(axum::http::StatusCode::CREATED));
        assert_eq!(response.data["message"], "Article created successfully");
        assert_eq!(response.data["data"]["owner"], user.id.to_string());

        let err = controller
            .create(&app.state, &user, payload(json!({"title": "Other", "slug": "five-chars"})))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Article with this slug already exists");
    }

    #[tokio::test]
    async fn upload_attaches_media_to_the_record() {
        let app = TestApp::new().await;
        let user = app.user(vec![Role::User]);
        let controller = ResourceController::new(ARTICLES);

        let response = controller
            .create(
                &app.state,
                &user,
                Payload {
                    body: body(json!({"title": "With cover", "altText": "cover"})),
                    file: Some(image("cover.png")),
                },
            )
            .await
            .unwrap();

        let media_id = response.data["data"]["media"].as_str().unwrap().to_string();
        let media = app
            .state
            .store
            .find_by_id("media", Uuid::parse_str(&media_id).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(media.data["altText"], "cover");
        assert_eq!(media.owner, Some(user.id));
    }

    #[tokio::test]
    async fn media_upload_to_media_resource_creates_one_record() {
        let app = TestApp::new().await;
        let user = app.user(vec![Role::User]);
        let controller = ResourceController::new(MEDIA);

        let response = controller
            .create(
                &app.state,
                &user,
                Payload {
                    body: body(json!({"fileName": "Logo"})),
                    file: Some(image("logo.png")),
                },
            )
            .await
            .unwrap();
        assert_eq!(response.data["data"]["fileName"], "Logo");
        assert_eq!(response.data["data"]["mediaType"], "image");

        let total = app.state.store.count("media", &Default::default()).await.unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn update_never_changes_owner_and_is_guarded() {
        let app = TestApp::new().await;
        let owner = app.user(vec![Role::User]);
        let stranger = app.user(vec![Role::User]);
        let controller = ResourceController::new(ARTICLES);

        let created = controller
            .create(&app.state, &owner, payload(json!({"title": "Mine", "slug": "mine"})))
            .await
            .unwrap();
        let id = created.data["data"]["id"].as_str().unwrap().to_string();

        let err = controller
            .update(&app.state, &stranger, &id, payload(json!({"title": "Theirs"})))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        let updated = controller
            .update(&app.state, &owner, &id, payload(json!({"title": "Still mine", "slug": "mine", "owner": stranger.id.to_string()})))
            .await
            .unwrap();
        assert_eq!(updated.data["data"]["title"], "Still mine");
        assert_eq!(updated.data["data"]["owner"], owner.id.to_string());
    }

    #[tokio::test]
    async fn create_many_validates_the_whole_batch_first() {
        let app = TestApp::new().await;
        let user = app.user(vec![Role::User]);
        let controller = ResourceController::new(ARTICLES);

        let err = controller
            .create_many(
                &app.state,
                &user,
                payload(json!({"items": [{"title": "A", "slug": "same"}, {"title": "B", "slug": "same"}]})),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(app.state.store.count("articles", &Default::default()).await.unwrap(), 0);

        let created = controller
            .create_many(
                &app.state,
                &user,
                payload(json!({"items": [{"title": "A", "slug": "a"}, {"title": "B", "slug": "b"}]})),
            )
            .await
            .unwrap();
        let data = created.data["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["title"], "A");
        assert_eq!(data[1]["title"], "B");
    }

    #[tokio::test]
    async fn bulk_update_and_delete_report_counts() {
        let app = TestApp::new().await;
        let user = app.user(vec![Role::User]);
        let controller = ResourceController::new(ARTICLES);

        let mut ids = vec![];
        for slug in ["a", "b"] {
            let created = controller
                .create(&app.state, &user, payload(json!({"title": slug, "slug": slug})))
                .await
                .unwrap();
            ids.push(created.data["data"]["id"].clone());
        }

        let updated = controller
            .update_many(&app.state, &user, body(json!({"ids": ids, "data": {"status": "published"}})))
            .await
            .unwrap();
        assert_eq!(updated.data["data"]["count"], 2);

        let err = controller
            .update_many(&app.state, &user, body(json!({"ids": ids, "data": {"slug": "same"}})))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let repeated = json!([ids[0], ids[0]]);
        let updated = controller
            .update_many(&app.state, &user, body(json!({"ids": repeated, "data": {"slug": "renamed"}})))
            .await
            .unwrap();
        assert_eq!(updated.data["data"]["count"], 1);

        let deleted = controller
            .delete_many(&app.state, &user, body(json!({"ids": ids})))
            .await
            .unwrap();
        assert_eq!(deleted.data["data"]["count"], 2);
    }

    #[tokio::test]
    async fn linked_conflict_is_rejected_before_anything_is_written() {
        let app = TestApp::new().await;
        let user = app.user(vec![Role::User]);
        let controller = ResourceController::new(ARTICLES);
        controller
            .create(&app.state, &user, payload(json!({"title": "Taken", "slug": "taken"})))
            .await
            .unwrap();

        let err = controller
            .create(
                &app.state,
                &user,
                Payload {
                    body: body(json!({
                        "slug": "fresh",
                        "linkedObject_related": [
                            {"fileName": "first", "slug": "first"},
                            {"fileName": "second", "slug": "taken"}
                        ]
                    })),
                    file: Some(image("cover.png")),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 400);
        assert_eq!(err.message(), "Article with this slug already exists");
        assert_eq!(app.state.store.count("articles", &Default::default()).await.unwrap(), 1);
        assert_eq!(app.state.store.count("media", &Default::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn storage_failure_aborts_without_a_media_record() {
        let mut app = TestApp::new().await;
        app.fail_storage();
        let user = app.user(vec![Role::User]);

        for model in [ARTICLES, MEDIA] {
            let err = ResourceController::new(model)
                .create(
                    &app.state,
                    &user,
                    Payload {
                        body: body(json!({"title": "Lost"})),
                        file: Some(image("lost.png")),
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), 500);
        }

        assert_eq!(app.state.store.count("media", &Default::default()).await.unwrap(), 0);
        assert_eq!(app.state.store.count("articles", &Default::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let app = TestApp::new().await;
        let user = app.user(vec![Role::Admin]);
        let controller = ResourceController::new(ARTICLES);

        let missing = Uuid::new_v4().to_string();
        for id in ["not-a-uuid", missing.as_str()] {
            assert_eq!(controller.get_item(&app.state, id).await.unwrap_err().status_code(), 404);
            assert_eq!(controller.delete(&app.state, &user, id).await.unwrap_err().status_code(), 404);
        }
    }

    #[tokio::test]
    async fn protected_fields_cannot_be_filtered() {
        let app = TestApp::new().await;
        let controller = ResourceController::new(USERS);
        let params = vec![("password".to_string(), "abc".to_string())];
        let err = controller.get_items(&app.state, &params).await.unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
