use uuid::Uuid;

use crate::db::StoreError;

/// Failures seen by a collaboration client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("document {0} not found")]
    NotFound(Uuid),

    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("channel closed")]
    ChannelClosed,
}

impl From<StoreError> for ClientError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ClientError::NotFound(id),
            StoreError::StorageFailure(message) => ClientError::Storage(message),
        }
    }
}
