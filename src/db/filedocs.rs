use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DocumentRepository, RepoFuture, StoreError};
use crate::models::{Document, DocumentSummary};

/// Stores each document as `<id>.json` inside one directory
#[derive(Debug, Clone)]
pub struct FileRepository {
    dir: PathBuf,
}

impl FileRepository {
    /// Open the repository, creating the directory if needed
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        info!("File storage ready at {}", dir.display());
        Ok(Self { dir })
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn staging_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!(".{}.json.tmp", id))
    }
}

impl DocumentRepository for FileRepository {
    fn load(&self, id: Uuid) -> RepoFuture<'_, Option<Document>> {
        Box::pin(async move {
            match tokio::fs::read(self.record_path(id)).await {
                Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn save(&self, doc: Document) -> RepoFuture<'_, ()> {
        Box::pin(async move {
            let bytes = serde_json::to_vec_pretty(&doc)?;

            // Write aside and rename so readers never see a partial record
            let staging = self.staging_path(doc.id);
            tokio::fs::write(&staging, &bytes).await?;
            tokio::fs::rename(&staging, self.record_path(doc.id)).await?;

            debug!("Saved document {} ({} bytes)", doc.id, bytes.len());
            Ok(())
        })
    }

    fn load_all(&self) -> RepoFuture<'_, Vec<DocumentSummary>> {
        Box::pin(async move {
            let mut summaries = Vec::new();
            let mut entries = tokio::fs::read_dir(&self.dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }
                let bytes = tokio::fs::read(&path).await?;
                let doc: Document = serde_json::from_slice(&bytes).map_err(|e| {
                    warn!("Unreadable document record {}: {}", path.display(), e);
                    StoreError::from(e)
                })?;
                summaries.push(doc.summary());
            }
            Ok(summaries)
        })
    }
}
