use crate::{
    db::StoreError,
    models::{CreateDocumentRequest, Document, DocumentSummary, DocumentUpdate, ErrorResponse},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info};
use uuid::Uuid;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn parse_doc_id(doc_id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(doc_id).map_err(|e| {
        error!("Invalid document UUID '{}': {}", doc_id, e);
        ErrorResponse::with_status(StatusCode::BAD_REQUEST, format!("Invalid document UUID '{}'", doc_id))
    })
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(id) => {
            ErrorResponse::with_status(StatusCode::NOT_FOUND, format!("Document '{}' not found", id))
        }
        StoreError::StorageFailure(message) => {
            error!("Storage failure: {}", message);
            ErrorResponse::with_status(StatusCode::INTERNAL_SERVER_ERROR, "Storage failure")
        }
    }
}

/// List all documents, most recently modified first.
///
/// A storage failure yields an empty list instead of an error.
pub async fn list_documents(State(state): State<AppState>) -> Json<Vec<DocumentSummary>> {
    match state.store.list().await {
        Ok(documents) => Json(documents),
        Err(e) => {
            error!("Failed to list documents, returning empty list: {}", e);
            Json(Vec::new())
        }
    }
}

/// Create a new document
pub async fn create_document(
    State(state): State<AppState>,
    payload: Option<Json<CreateDocumentRequest>>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let title = payload.and_then(|Json(request)| request.title);
    let doc = state.store.create(title).await.map_err(store_error)?;
    info!("Document '{}' created", doc.id);
    Ok((StatusCode::OK, Json(doc)))
}

/// Fetch a document
pub async fn get_document(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let doc_uuid = parse_doc_id(&doc_id)?;
    let doc = state.store.get(doc_uuid).await.map_err(store_error)?;
    Ok((StatusCode::OK, Json(doc)))
}

/// Update the title and/or content of a document
pub async fn update_document(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
    Json(update): Json<DocumentUpdate>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    let doc_uuid = parse_doc_id(&doc_id)?;
    let doc = state.store.update(doc_uuid, update).await.map_err(store_error)?;
    Ok((StatusCode::OK, Json(doc)))
}
