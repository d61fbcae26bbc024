use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::models::ConnectionId;

/// Room membership: which connections are joined to which document.
///
/// Starts empty and lives as long as its owner; nothing is persisted, so a
/// restarted process begins with no rooms. All state sits behind one mutex,
/// which makes every operation atomic with respect to every other. Rooms
/// left without members are removed immediately.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    rooms: Mutex<HashMap<Uuid, HashSet<ConnectionId>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, HashSet<ConnectionId>>> {
        // Membership updates never leave the map half-written, so a poisoned lock is still usable
        self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add `connection_id` to the room of `document_id`.
    ///
    /// Returns `true` if the connection was not already a member.
    pub fn join(&self, connection_id: ConnectionId, document_id: Uuid) -> bool {
        let added = self
            .rooms()
            .entry(document_id)
            .or_default()
            .insert(connection_id);
        debug!("join {} -> {} (new: {})", connection_id, document_id, added);
        added
    }

    /// Remove `connection_id` from the room of `document_id`.
    ///
    /// Returns `true` if the connection was a member.
    pub fn leave(&self, connection_id: ConnectionId, document_id: Uuid) -> bool {
        let mut rooms = self.rooms();
        let Some(members) = rooms.get_mut(&document_id) else {
            return false;
        };
        let removed = members.remove(&connection_id);
        if members.is_empty() {
            rooms.remove(&document_id);
        }
        removed
    }

    /// Remove `connection_id` from every room it appears in.
    ///
    /// Returns the documents it was removed from, in no particular order.
    pub fn drop_connection(&self, connection_id: ConnectionId) -> Vec<Uuid> {
        let mut rooms = self.rooms();
        let mut removed_from = Vec::new();
        rooms.retain(|document_id, members| {
            if members.remove(&connection_id) {
                removed_from.push(*document_id);
            }
            !members.is_empty()
        });
        removed_from
    }

    /// Current members of a document's room, including any acting connection
    pub fn members_of(&self, document_id: Uuid) -> HashSet<ConnectionId> {
        self.rooms().get(&document_id).cloned().unwrap_or_default()
    }

    /// Documents that currently have at least one member
    pub fn room_count(&self) -> usize {
        self.rooms().len()
    }

    /// Sum of all room sizes
    pub fn membership_count(&self) -> usize {
        self.rooms().values().map(HashSet::len).sum()
    }
}
