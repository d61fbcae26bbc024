use std::sync::Arc;

use crate::services::doc_store::DocumentStore;
use crate::ws::BroadcastGateway;

/// Shared state handed to every request and socket handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub gateway: Arc<BroadcastGateway>,
}

impl AppState {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            store: Arc::new(store),
            gateway: Arc::new(BroadcastGateway::new()),
        }
    }
}
