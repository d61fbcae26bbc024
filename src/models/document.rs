use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Title given to documents created without one.
pub const DEFAULT_TITLE: &str = "Untitled Document";

/// A persisted document record
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    /// Opaque serialized editor content, never interpreted by the server
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    /// Reserved, not populated by any operation
    #[serde(default)]
    pub collaborators: Vec<String>,
}

impl Document {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id,
            title: self.title.clone(),
            created_at: self.created_at,
            last_modified: self.last_modified,
        }
    }
}

/// Listing projection of a document
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// Request body for creating a document
#[derive(Serialize, Deserialize, ToSchema, Debug, Default)]
pub struct CreateDocumentRequest {
    pub title: Option<String>,
}

/// Partial update of a document. Absent fields are left untouched.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl DocumentUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), content: None }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self { title: None, content: Some(content.into()) }
    }

    /// Merge the supplied fields into `doc`
    pub fn apply_to(self, doc: &mut Document) {
        if let Some(title) = self.title {
            doc.title = title;
        }
        if let Some(content) = self.content {
            doc.content = content;
        }
    }
}
