use std::sync::Arc;
use uuid::Uuid;

use crate::db::filedocs::FileRepository;
use crate::db::{DocumentRepository, RepoFuture, StoreError};
use crate::models::{Document, DocumentSummary};
use crate::services::DocumentStore;
use crate::state::AppState;

/// Repository whose every call fails
pub struct BrokenRepository;

impl DocumentRepository for BrokenRepository {
    fn load(&self, _id: Uuid) -> RepoFuture<'_, Option<Document>> {
        Box::pin(async { Err(StoreError::StorageFailure("disk unplugged".to_string())) })
    }

    fn save(&self, _doc: Document) -> RepoFuture<'_, ()> {
        Box::pin(async { Err(StoreError::StorageFailure("disk unplugged".to_string())) })
    }

    fn load_all(&self) -> RepoFuture<'_, Vec<DocumentSummary>> {
        Box::pin(async { Err(StoreError::StorageFailure("disk unplugged".to_string())) })
    }
}

/// App state over a fresh temporary directory; keep the directory alive
pub async fn file_state() -> (AppState, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let repo = FileRepository::open(temp_dir.path()).await.unwrap();
    (AppState::new(DocumentStore::new(Arc::new(repo))), temp_dir)
}

pub fn broken_state() -> AppState {
    AppState::new(DocumentStore::new(Arc::new(BrokenRepository)))
}
