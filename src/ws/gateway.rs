use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::registry::SessionRegistry;
use crate::models::{
    ClientMessage, ConnectedMessage, ConnectionId, CursorPosition, CursorUpdateMessage,
    JoinedMessage, LeftMessage, Operation, PongMessage, ServerMessage, UpdateMessage, UserInfo,
};

/// Outbound queue of one connection, drained by its socket writer
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    /// Joined, holding the most recently joined document
    Joined(Uuid),
}

struct ConnectionHandle {
    outbox: Outbox,
    user: Option<UserInfo>,
    current_document: Option<Uuid>,
}

/// Fans connection events out to the other members of a document's room.
///
/// Every connection owns an unbounded outbox. A sender's events are pushed
/// into each recipient's outbox in the order the sender's handler processes
/// them, which keeps per-sender order at every recipient. Nothing orders
/// events from different senders: two editors changing the same document
/// close together reach each peer in whatever order they arrive, and every
/// peer keeps whichever full snapshot it applied last.
#[derive(Default)]
pub struct BroadcastGateway {
    registry: SessionRegistry,
    connections: DashMap<ConnectionId, ConnectionHandle>,
}

impl BroadcastGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Open a connection. The returned receiver yields everything addressed
    /// to it, starting with its own `connected` event.
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let connection_id = ConnectionId::new();
        let (outbox, inbox) = mpsc::unbounded_channel();

        // The receiver is still in hand, so this cannot fail
        let _ = outbox.send(ServerMessage::Connected(ConnectedMessage { connection_id }));

        self.connections.insert(
            connection_id,
            ConnectionHandle {
                outbox,
                user: None,
                current_document: None,
            },
        );
        info!("Connection {} opened", connection_id);
        (connection_id, inbox)
    }

    /// Route one inbound event from `connection_id`
    pub fn dispatch(&self, connection_id: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::Join(join) => self.on_join(connection_id, join.document_id, join.user),
            ClientMessage::Leave(leave) => self.on_leave(connection_id, leave.document_id),
            ClientMessage::Change(change) => {
                self.on_change(connection_id, change.document_id, change.content, change.operation)
            }
            ClientMessage::Cursor(cursor) => {
                self.on_cursor(connection_id, cursor.document_id, cursor.position)
            }
            ClientMessage::Ping => self.on_ping(connection_id),
        }
    }

    /// Register membership, then announce the newcomer to the rest of the room
    pub fn on_join(&self, connection_id: ConnectionId, document_id: Uuid, user: Option<UserInfo>) {
        let user = {
            let Some(mut handle) = self.connections.get_mut(&connection_id) else {
                warn!("Join from unknown connection {} ignored", connection_id);
                return;
            };
            if user.is_some() {
                handle.user = user;
            }
            handle.current_document = Some(document_id);
            handle.user.clone()
        };

        if !self.registry.join(connection_id, document_id) {
            debug!("Connection {} already joined document {}", connection_id, document_id);
            return;
        }

        let joined = ServerMessage::Joined(JoinedMessage { connection_id, user });
        let notified = self.send_to_others(document_id, connection_id, &joined);
        info!(
            "Connection {} joined document {} ({} other members notified)",
            connection_id, document_id, notified
        );
    }

    /// Explicit leave without closing the channel, e.g. when switching documents
    pub fn on_leave(&self, connection_id: ConnectionId, document_id: Uuid) {
        if !self.registry.leave(connection_id, document_id) {
            debug!("Connection {} was not in document {}", connection_id, document_id);
            return;
        }

        if let Some(mut handle) = self.connections.get_mut(&connection_id) {
            if handle.current_document == Some(document_id) {
                handle.current_document = None;
            }
        }

        let left = ServerMessage::Left(LeftMessage { connection_id });
        self.send_to_others(document_id, connection_id, &left);
        info!("Connection {} left document {}", connection_id, document_id);
    }

    /// Relay a full content snapshot to the other members
    pub fn on_change(
        &self,
        connection_id: ConnectionId,
        document_id: Uuid,
        content: String,
        operation: Operation,
    ) {
        let update = ServerMessage::Update(UpdateMessage {
            content,
            operation,
            sender_id: connection_id,
        });
        let delivered = self.send_to_others(document_id, connection_id, &update);
        debug!(
            "Change from {} on document {} delivered to {} members",
            connection_id, document_id, delivered
        );
    }

    /// Relay an ephemeral caret position to the other members
    pub fn on_cursor(&self, connection_id: ConnectionId, document_id: Uuid, position: CursorPosition) {
        let cursor = ServerMessage::CursorUpdate(CursorUpdateMessage {
            sender_id: connection_id,
            position,
        });
        self.send_to_others(document_id, connection_id, &cursor);
    }

    /// Answer a keepalive on the connection's own queue
    pub fn on_ping(&self, connection_id: ConnectionId) {
        let pong = ServerMessage::Pong(PongMessage { date: Utc::now().to_rfc3339() });
        if let Some(handle) = self.connections.get(&connection_id) {
            let _ = handle.outbox.send(pong);
        }
    }

    /// Forget the connection and tell every room it was in that it left.
    ///
    /// Returns the documents it was removed from.
    pub fn on_disconnect(&self, connection_id: ConnectionId) -> Vec<Uuid> {
        self.connections.remove(&connection_id);

        let documents = self.registry.drop_connection(connection_id);
        let left = ServerMessage::Left(LeftMessage { connection_id });
        for document_id in &documents {
            self.send_to_others(*document_id, connection_id, &left);
        }

        info!(
            "Connection {} closed (removed from {} documents)",
            connection_id,
            documents.len()
        );
        documents
    }

    pub fn session_state(&self, connection_id: ConnectionId) -> SessionState {
        match self.connections.get(&connection_id) {
            None => SessionState::Disconnected,
            Some(handle) => match handle.current_document {
                Some(document_id) => SessionState::Joined(document_id),
                None => SessionState::Connected,
            },
        }
    }

    /// Number of open connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn send_to_others(&self, document_id: Uuid, sender: ConnectionId, message: &ServerMessage) -> usize {
        let members = self.registry.members_of(document_id);
        let mut delivered = 0;
        for member in members.into_iter().filter(|member| *member != sender) {
            match self.connections.get(&member) {
                Some(handle) if handle.outbox.send(message.clone()).is_ok() => delivered += 1,
                // Closed channels are cleaned up by their own disconnect
                _ => debug!("Skipping closed connection {} in document {}", member, document_id),
            }
        }
        delivered
    }
}
