use utoipa::OpenApi;
use crate::models::*;

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

/// Readiness check endpoint
#[utoipa::path(
    get,
    path = "/api/ready",
    responses(
        (status = 200, description = "Document storage reachable", body = HealthResponse),
        (status = 503, description = "Document storage unavailable", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

/// Live session counts and resource usage
#[utoipa::path(
    get,
    path = "/api/diagnostics",
    responses(
        (status = 200, description = "Diagnostics snapshot", body = DiagnosticsResponse)
    )
)]
#[allow(dead_code)]
pub async fn diagnostics_doc() {}

/// List documents, most recently modified first
#[utoipa::path(
    get,
    path = "/api/documents",
    responses(
        (status = 200, description = "Document summaries; empty if storage is unavailable", body = [DocumentSummary])
    )
)]
#[allow(dead_code)]
pub async fn list_documents_doc() {}

/// Create a new document
#[utoipa::path(
    post,
    path = "/api/documents",
    request_body = CreateDocumentRequest,
    responses(
        (status = 200, description = "Document created", body = Document),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn create_document_doc() {}

/// Fetch a document
#[utoipa::path(
    get,
    path = "/api/documents/{doc_id}",
    params(
        ("doc_id" = String, Path, description = "Document UUID")
    ),
    responses(
        (status = 200, description = "The document", body = Document),
        (status = 400, description = "Malformed document id", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn get_document_doc() {}

/// Update the title and/or content of a document
#[utoipa::path(
    put,
    path = "/api/documents/{doc_id}",
    params(
        ("doc_id" = String, Path, description = "Document UUID")
    ),
    request_body = DocumentUpdate,
    responses(
        (status = 200, description = "The updated document", body = Document),
        (status = 400, description = "Malformed document id", body = ErrorResponse),
        (status = 404, description = "Document not found", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn update_document_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check_doc,
        ready_check_doc,
        diagnostics_doc,
        list_documents_doc,
        create_document_doc,
        get_document_doc,
        update_document_doc,
    ),
    components(
        schemas(
            HealthResponse,
            DiagnosticsResponse,
            Document,
            DocumentSummary,
            CreateDocumentRequest,
            DocumentUpdate,
            ErrorResponse
        )
    ),
    tags(
        (name = "api", description = "Document API endpoints")
    )
)]
pub struct ApiDoc;
