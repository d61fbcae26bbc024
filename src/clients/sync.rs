//! Client side of the collaboration protocol.
//!
//! [`DocumentSync`] holds one participant's view of a document and applies
//! the rules every client has to follow for snapshot broadcasting to work:
//!
//! - a local edit is applied at once, broadcast as a full snapshot, and
//!   persisted only after a quiet period, so a burst of keystrokes costs a
//!   single durable write;
//! - title edits are persisted the same way, on their own schedule;
//! - a remote snapshot replaces the local content without being broadcast
//!   or persisted again, which would otherwise echo between peers forever.
//!
//! Concurrent editors are not merged. Whatever snapshot a peer applies last
//! is what that peer shows.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::api_client::DocumentApiClient;
use super::debounce::Debouncer;
use super::error::ClientError;
use crate::models::{
    ChangeMessage, ClientMessage, ConnectionId, CursorMessage, CursorPosition, Document,
    DocumentUpdate, JoinMessage, LeaveMessage, Operation, ServerMessage, UserInfo,
};
use crate::services::DocumentStore;

/// Quiet period before a local edit is persisted
pub const DEFAULT_SAVE_DELAY: Duration = Duration::from_secs(1);

pub type PersistFuture<'a> = Pin<Box<dyn Future<Output = Result<Document, ClientError>> + Send + 'a>>;

/// Where debounced edits are written
pub trait DocumentPersister: Send + Sync + 'static {
    fn persist(&self, id: Uuid, update: DocumentUpdate) -> PersistFuture<'_>;
}

impl DocumentPersister for DocumentApiClient {
    fn persist(&self, id: Uuid, update: DocumentUpdate) -> PersistFuture<'_> {
        Box::pin(async move { self.update_document(id, &update).await })
    }
}

impl DocumentPersister for DocumentStore {
    fn persist(&self, id: Uuid, update: DocumentUpdate) -> PersistFuture<'_> {
        Box::pin(async move { Ok(self.update(id, update).await?) })
    }
}

/// Another participant in the same document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Peer {
    pub user: Option<UserInfo>,
    pub cursor: Option<CursorPosition>,
}

/// Last values known to be durable
#[derive(Debug, Default)]
struct Saved {
    title: String,
    content: String,
}

pub struct DocumentSync {
    document_id: Uuid,
    title: String,
    content: String,
    cursor: CursorPosition,
    peers: HashMap<ConnectionId, Peer>,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
    persister: Arc<dyn DocumentPersister>,
    saved: Arc<Mutex<Saved>>,
    content_saves: Debouncer,
    title_saves: Debouncer,
}

fn lock_saved(saved: &Mutex<Saved>) -> MutexGuard<'_, Saved> {
    saved.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DocumentSync {
    /// Start from a freshly loaded document
    pub fn new(
        document: &Document,
        outgoing: mpsc::UnboundedSender<ClientMessage>,
        persister: Arc<dyn DocumentPersister>,
    ) -> Self {
        Self::with_save_delay(document, outgoing, persister, DEFAULT_SAVE_DELAY)
    }

    pub fn with_save_delay(
        document: &Document,
        outgoing: mpsc::UnboundedSender<ClientMessage>,
        persister: Arc<dyn DocumentPersister>,
        save_delay: Duration,
    ) -> Self {
        Self {
            document_id: document.id,
            title: document.title.clone(),
            content: document.content.clone(),
            cursor: CursorPosition::default(),
            peers: HashMap::new(),
            outgoing,
            persister,
            saved: Arc::new(Mutex::new(Saved {
                title: document.title.clone(),
                content: document.content.clone(),
            })),
            content_saves: Debouncer::new(save_delay),
            title_saves: Debouncer::new(save_delay),
        }
    }

    pub fn document_id(&self) -> Uuid {
        self.document_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cursor(&self) -> CursorPosition {
        self.cursor
    }

    /// Participants currently present, keyed by connection
    pub fn peers(&self) -> &HashMap<ConnectionId, Peer> {
        &self.peers
    }

    pub fn has_pending_save(&self) -> bool {
        self.content_saves.is_pending() || self.title_saves.is_pending()
    }

    fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        self.outgoing.send(message).map_err(|_| ClientError::ChannelClosed)
    }

    /// Enter the document's room
    pub fn join(&self, user: Option<UserInfo>) -> Result<(), ClientError> {
        self.send(ClientMessage::Join(JoinMessage {
            document_id: self.document_id,
            user,
        }))
    }

    /// Leave the room while keeping the channel open
    pub fn leave(&mut self) -> Result<(), ClientError> {
        self.peers.clear();
        self.send(ClientMessage::Leave(LeaveMessage {
            document_id: self.document_id,
        }))
    }

    /// Apply a local edit, broadcast the snapshot and schedule its persistence
    pub fn local_edit(&mut self, content: impl Into<String>) -> Result<(), ClientError> {
        self.local_edit_with(content, Operation::Update)
    }

    pub fn local_edit_with(&mut self, content: impl Into<String>, operation: Operation) -> Result<(), ClientError> {
        self.content = content.into();
        self.send(ClientMessage::Change(ChangeMessage {
            document_id: self.document_id,
            content: self.content.clone(),
            operation,
        }))?;
        self.schedule_content_save();
        Ok(())
    }

    /// Rename locally and schedule its persistence; titles are not broadcast
    pub fn local_title_edit(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.schedule_title_save();
    }

    /// Move the local caret and tell the others
    pub fn local_cursor(&mut self, position: CursorPosition) -> Result<(), ClientError> {
        self.cursor = position;
        self.send(ClientMessage::Cursor(CursorMessage {
            document_id: self.document_id,
            position,
        }))
    }

    /// Fold a server event into local state.
    ///
    /// Remote snapshots replace the content silently: nothing is sent and no
    /// save is scheduled. Returns `true` when the content changed.
    pub fn apply_remote(&mut self, event: ServerMessage) -> bool {
        match event {
            ServerMessage::Update(update) => {
                debug!("Applying snapshot from {} ({} bytes)", update.sender_id, update.content.len());
                self.content = update.content;
                self.cursor = clamp_cursor(self.cursor, &self.content);
                true
            }
            ServerMessage::Joined(joined) => {
                self.peers.entry(joined.connection_id).or_default().user = joined.user;
                false
            }
            ServerMessage::Left(left) => {
                self.peers.remove(&left.connection_id);
                false
            }
            ServerMessage::CursorUpdate(cursor) => {
                self.peers.entry(cursor.sender_id).or_default().cursor = Some(cursor.position);
                false
            }
            ServerMessage::Connected(_) | ServerMessage::Pong(_) => false,
        }
    }

    /// Persist anything still waiting for its quiet period, right now
    pub async fn flush(&mut self) -> Result<(), ClientError> {
        self.content_saves.cancel();
        self.title_saves.cancel();

        let (content_dirty, title_dirty) = {
            let saved = lock_saved(&self.saved);
            (saved.content != self.content, saved.title != self.title)
        };
        if !content_dirty && !title_dirty {
            return Ok(());
        }

        let update = DocumentUpdate {
            title: title_dirty.then(|| self.title.clone()),
            content: content_dirty.then(|| self.content.clone()),
        };
        let stored = self.persister.persist(self.document_id, update).await?;

        let mut saved = lock_saved(&self.saved);
        if content_dirty {
            saved.content = stored.content;
        }
        if title_dirty {
            saved.title = stored.title;
        }
        Ok(())
    }

    fn schedule_content_save(&mut self) {
        let persister = self.persister.clone();
        let saved = self.saved.clone();
        let id = self.document_id;
        let content = self.content.clone();

        self.content_saves.schedule(async move {
            let unchanged = lock_saved(&saved).content == content;
            if unchanged {
                return;
            }
            match persister.persist(id, DocumentUpdate::content(content.clone())).await {
                Ok(_) => {
                    debug!("Saved content of document {}", id);
                    lock_saved(&saved).content = content;
                }
                Err(e) => warn!("Failed to save content of document {}: {}", id, e),
            }
        });
    }

    fn schedule_title_save(&mut self) {
        let persister = self.persister.clone();
        let saved = self.saved.clone();
        let id = self.document_id;
        let title = self.title.clone();

        self.title_saves.schedule(async move {
            let unchanged = lock_saved(&saved).title == title;
            if unchanged {
                return;
            }
            match persister.persist(id, DocumentUpdate::title(title.clone())).await {
                Ok(_) => {
                    debug!("Saved title of document {}", id);
                    lock_saved(&saved).title = title;
                }
                Err(e) => warn!("Failed to save title of document {}: {}", id, e),
            }
        });
    }
}

/// Keep a caret inside `content`, measured in characters
fn clamp_cursor(cursor: CursorPosition, content: &str) -> CursorPosition {
    let len = content.chars().count();
    let index = cursor.index.min(len);
    CursorPosition {
        index,
        length: cursor.length.min(len - index),
    }
}
