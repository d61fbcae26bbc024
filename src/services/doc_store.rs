use chrono::{DateTime, Duration as ChronoDuration, SubsecRound, Utc};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::db::{DocumentRepository, StoreError};
use crate::models::{Document, DocumentSummary, DocumentUpdate, DEFAULT_TITLE};
use crate::utils::KeyedLocks;

/// Durable CRUD for document records.
///
/// Mutations of one document are serialized through a per-id lock, so a
/// read-modify-write never interleaves with another for the same id while
/// unrelated documents proceed concurrently. Reads are served through a
/// small cache that is only written while that lock is held.
#[derive(Clone)]
pub struct DocumentStore {
    repo: Arc<dyn DocumentRepository>,
    cache: Cache<Uuid, Document>,
    locks: KeyedLocks<Uuid>,
}

impl DocumentStore {
    pub fn new(repo: Arc<dyn DocumentRepository>) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(Duration::from_secs(300))
            .build();
        Self {
            repo,
            cache,
            locks: KeyedLocks::new(),
        }
    }

    /// Create and persist an empty document
    pub async fn create(&self, title: Option<String>) -> Result<Document, StoreError> {
        let now = now_micros();
        let doc = Document {
            id: Uuid::new_v4(),
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            content: String::new(),
            created_at: now,
            last_modified: now,
            collaborators: Vec::new(),
        };

        self.repo.save(doc.clone()).await.map_err(|e| {
            error!("Failed to create document {}: {}", doc.id, e);
            e
        })?;
        self.cache.insert(doc.id, doc.clone()).await;

        info!("Created document {} ('{}')", doc.id, doc.title);
        Ok(doc)
    }

    /// Fetch one document
    pub async fn get(&self, id: Uuid) -> Result<Document, StoreError> {
        if let Some(doc) = self.cache.get(&id).await {
            return Ok(doc);
        }
        let _guard = self.locks.lock(id).await;
        self.load_locked(id).await
    }

    /// Cache fill; callers hold the lock for `id` so a stale read never
    /// overwrites a newer cached record
    async fn load_locked(&self, id: Uuid) -> Result<Document, StoreError> {
        if let Some(doc) = self.cache.get(&id).await {
            return Ok(doc);
        }
        let doc = self.repo.load(id).await?.ok_or(StoreError::NotFound(id))?;
        self.cache.insert(id, doc.clone()).await;
        Ok(doc)
    }

    /// Merge the supplied fields into the stored record and persist it.
    ///
    /// The write runs as its own task: once started, the save and the cache
    /// refresh both complete even if the caller is dropped midway.
    pub async fn update(&self, id: Uuid, update: DocumentUpdate) -> Result<Document, StoreError> {
        let store = self.clone();
        tokio::spawn(async move { store.update_locked(id, update).await })
            .await
            .map_err(|e| StoreError::StorageFailure(format!("update of {} did not complete: {}", id, e)))?
    }

    async fn update_locked(&self, id: Uuid, update: DocumentUpdate) -> Result<Document, StoreError> {
        let _guard = self.locks.lock(id).await;

        let mut doc = self.load_locked(id).await?;
        update.apply_to(&mut doc);
        doc.last_modified = next_modified(doc.last_modified);

        // A save that fails after committing must not leave the old record cached
        self.cache.invalidate(&id).await;
        self.repo.save(doc.clone()).await.map_err(|e| {
            error!("Failed to persist document {}: {}", id, e);
            e
        })?;
        self.cache.insert(id, doc.clone()).await;

        debug!("Updated document {} ({} bytes)", id, doc.content.len());
        Ok(doc)
    }

    /// Every document, most recently modified first, ties ordered by id
    pub async fn list(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let mut summaries = self.repo.load_all().await?;
        summaries.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(summaries)
    }
}

/// Current time at the precision every backend can store
fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A modification stamp strictly after `previous`, even if the clock has not moved
fn next_modified(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now_micros();
    if now > previous {
        now
    } else {
        previous + ChronoDuration::microseconds(1)
    }
}
