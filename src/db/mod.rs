pub mod filedocs;
pub mod pgdocs;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{Document, DocumentSummary};
use filedocs::FileRepository;
use pgdocs::PgRepository;

/// Failures surfaced by the document store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document {0} not found")]
    NotFound(Uuid),

    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::StorageFailure(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::StorageFailure(format!("malformed record: {}", e))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::StorageFailure(e.to_string())
    }
}

pub type RepoFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Durable record storage keyed by document id.
///
/// Implementations only move records in and out; merging, timestamps and
/// per-id serialization belong to [`crate::services::doc_store::DocumentStore`].
pub trait DocumentRepository: Send + Sync {
    /// Load one record, `None` when no record exists for `id`
    fn load(&self, id: Uuid) -> RepoFuture<'_, Option<Document>>;

    /// Insert or replace the record for `doc.id`
    fn save(&self, doc: Document) -> RepoFuture<'_, ()>;

    /// Summaries of every record, in no particular order
    fn load_all(&self) -> RepoFuture<'_, Vec<DocumentSummary>>;
}

/// Open the configured storage backend.
///
/// PostgreSQL is used when a database URL is configured and reachable,
/// otherwise documents are kept as JSON files in the documents directory.
pub async fn open_repository(config: &Config) -> Result<Arc<dyn DocumentRepository>, StoreError> {
    if let Some(db_url) = &config.db_url {
        match PgRepository::connect(db_url).await {
            Ok(repo) => {
                info!("Database initialized successfully");
                return Ok(Arc::new(repo));
            }
            Err(e) => {
                error!("Failed to initialize database: {}", e);
                warn!("Falling back to file storage in '{}'", config.documents_dir);
            }
        }
    } else {
        info!("No database URL configured - using file storage in '{}'", config.documents_dir);
    }

    let repo = FileRepository::open(&config.documents_dir).await?;
    Ok(Arc::new(repo))
}
