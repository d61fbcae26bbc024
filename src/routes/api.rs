use crate::{handlers::*, state::AppState};
use axum::{routing::get, Router};

/// Create API routes
pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/diagnostics", get(diagnostics))
        .route("/documents", get(list_documents).post(create_document))
        .route("/documents/:doc_id", get(get_document).put(update_document))
}
