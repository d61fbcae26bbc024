use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Error as SqlxError;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{DocumentRepository, RepoFuture};
use crate::models::{Document, DocumentSummary};

/// Document Row from database
#[derive(Debug, Clone, sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    collaborators: Json<Vec<String>>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            title: row.title,
            content: row.content,
            created_at: row.created_at,
            last_modified: row.last_modified,
            collaborators: row.collaborators.0,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SummaryRow {
    id: Uuid,
    title: String,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

impl From<SummaryRow> for DocumentSummary {
    fn from(row: SummaryRow) -> Self {
        DocumentSummary {
            id: row.id,
            title: row.title,
            created_at: row.created_at,
            last_modified: row.last_modified,
        }
    }
}

/// PostgreSQL-backed document records
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Create the connection pool and make sure the schema exists
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    pub async fn connect(database_url: &str) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        let repo = Self { pool };
        repo.ensure_schema().await?;
        Ok(repo)
    }

    async fn ensure_schema(&self) -> Result<(), SqlxError> {
        let schema_sql = r#"
            CREATE TABLE IF NOT EXISTS documents (
                id UUID PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                last_modified TIMESTAMPTZ NOT NULL,
                collaborators JSONB NOT NULL DEFAULT '[]'
            );
        "#;
        sqlx::query(schema_sql).execute(&self.pool).await?;
        Ok(())
    }
}

impl DocumentRepository for PgRepository {
    fn load(&self, id: Uuid) -> RepoFuture<'_, Option<Document>> {
        Box::pin(async move {
            let query_sql = r#"
                SELECT id, title, content, created_at, last_modified, collaborators
                FROM documents
                WHERE id = $1
            "#;
            let row = sqlx::query_as::<_, DocumentRow>(query_sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(Document::from))
        })
    }

    fn save(&self, doc: Document) -> RepoFuture<'_, ()> {
        Box::pin(async move {
            let query_sql = r#"
                INSERT INTO documents (id, title, content, created_at, last_modified, collaborators)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE
                SET title = EXCLUDED.title,
                    content = EXCLUDED.content,
                    last_modified = EXCLUDED.last_modified,
                    collaborators = EXCLUDED.collaborators;
            "#;
            sqlx::query(query_sql)
                .bind(doc.id)
                .bind(&doc.title)
                .bind(&doc.content)
                .bind(doc.created_at)
                .bind(doc.last_modified)
                .bind(Json(&doc.collaborators))
                .execute(&self.pool)
                .await?;

            debug!("Document row saved: {}", doc.id);
            Ok(())
        })
    }

    fn load_all(&self) -> RepoFuture<'_, Vec<DocumentSummary>> {
        Box::pin(async move {
            let query_sql = r#"
                SELECT id, title, created_at, last_modified
                FROM documents
                ORDER BY last_modified DESC, id ASC
            "#;
            let rows = sqlx::query_as::<_, SummaryRow>(query_sql)
                .fetch_all(&self.pool)
                .await?;
            Ok(rows.into_iter().map(DocumentSummary::from).collect())
        })
    }
}
