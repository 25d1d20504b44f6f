use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, routing::post, Router};

use crate::features::admin::handlers;
use crate::features::admin::services::AdminService;

/// Create routes for the admin form
///
/// `body_limit` caps the whole multipart body; per-file limits are checked
/// while the form is read.
pub fn routes(admin_service: Arc<AdminService>, body_limit: usize) -> Router {
    Router::new()
        .route("/admin/categories", post(handlers::create_category))
        .route("/admin/categories/{id}", post(handlers::update_category))
        .route("/admin/items", post(handlers::create_item))
        .route("/admin/items/{id}", post(handlers::update_item))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(admin_service)
}
