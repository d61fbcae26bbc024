use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::error::ClientError;
use crate::models::{CreateDocumentRequest, Document, DocumentSummary, DocumentUpdate, ErrorResponse};

/// HTTP client for the document API
#[derive(Debug, Clone)]
pub struct DocumentApiClient {
    client: Client,
    base_url: String,
}

impl DocumentApiClient {
    /// `base_url` points at the API root, e.g. `http://localhost:5000/api`
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>, ClientError> {
        let url = format!("{}/documents", self.base_url);
        let response = self.client.get(&url).send().await?;
        decode(response, None).await
    }

    pub async fn create_document(&self, title: Option<String>) -> Result<Document, ClientError> {
        let url = format!("{}/documents", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CreateDocumentRequest { title })
            .send()
            .await?;
        decode(response, None).await
    }

    pub async fn get_document(&self, id: Uuid) -> Result<Document, ClientError> {
        let url = format!("{}/documents/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;
        decode(response, Some(id)).await
    }

    pub async fn update_document(&self, id: Uuid, update: &DocumentUpdate) -> Result<Document, ClientError> {
        let url = format!("{}/documents/{}", self.base_url, id);
        debug!("PUT {}", url);
        let response = self.client.put(&url).json(update).send().await?;
        decode(response, Some(id)).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response, id: Option<Uuid>) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    if let (StatusCode::NOT_FOUND, Some(id)) = (status, id) {
        return Err(ClientError::NotFound(id));
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}
