//! In-memory presence registry.
//!
//! Sole owner of the "who is present" set. Keyed by connection id in an
//! insertion-ordered map so the roster lists participants in join order.
//! The registry never broadcasts; the router owns all fan-out.

use indexmap::IndexMap;

use crate::relay::ConnectionId;

/// A connected, identified participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub display_name: String,
}

/// Live mapping of connection id -> participant.
#[derive(Debug, Default)]
pub struct Registry {
    participants: IndexMap<ConnectionId, Participant>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            participants: IndexMap::new(),
        }
    }

    /// Store a participant under `id`, generating a default display name if
    /// the requested one is empty. Always succeeds; registering the same id
    /// twice overwrites the stored name.
    pub fn register(&mut self, id: ConnectionId, requested_name: &str) -> Participant {
        let display_name = if requested_name.is_empty() {
            default_name(id)
        } else {
            requested_name.to_string()
        };

        let participant = Participant {
            connection_id: id,
            display_name,
        };
        self.participants.insert(id, participant.clone());
        participant
    }

    /// Remove and return the participant for `id`. Returns `None` if the
    /// connection never registered (disconnect before join).
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Participant> {
        // shift_remove keeps the remaining entries in join order
        self.participants.shift_remove(&id)
    }

    pub fn display_name(&self, id: ConnectionId) -> Option<&str> {
        self.participants
            .get(&id)
            .map(|p| p.display_name.as_str())
    }

    /// Snapshot of all display names in insertion order.
    pub fn list(&self) -> Vec<String> {
        self.participants
            .values()
            .map(|p| p.display_name.clone())
            .collect()
    }
}

/// Default display name policy: `Player_` + first 4 characters of the
/// connection id's string form.
fn default_name(id: ConnectionId) -> String {
    let id = id.to_string();
    format!("Player_{}", &id[..4])
}
