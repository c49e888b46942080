// handlers/data/mod.rs - Resource routes, bound once per registered model
//
// GET    /                  list (filters + paging)
// POST   /                  create (JSON or multipart)
// POST   /bulk              create many
// PUT    /bulk, PATCH /bulk update many
// DELETE /bulk              delete many
// GET    /slug/:slug        by slug
// GET    /:id               by id
// GET    /:id/:value        by field (first segment names the field)
// PUT    /:id, PATCH /:id   update
// DELETE /:id              delete
//
// Reads are public; every write requires a token.

use axum::{routing::get, Extension, Router};

use crate::api::AppState;
use crate::controller::{ModelDescriptor, ResourceController};

pub mod record;
pub mod schema;

pub fn resource_routes(model: ModelDescriptor) -> Router<AppState> {
    Router::new()
        .route("/", get(schema::list).post(schema::create))
        .route(
            "/bulk",
            axum::routing::post(schema::create_bulk)
                .put(schema::update_bulk)
                .patch(schema::update_bulk)
                .delete(schema::delete_bulk),
        )
        .route("/slug/:slug", get(record::get_by_slug))
        .route(
            "/:id",
            get(record::get)
                .put(record::update)
                .patch(record::update)
                .delete(record::delete),
        )
        .route("/:id/:value", get(record::get_by_field))
        .layer(Extension(ResourceController::new(model)))
}
