pub mod registry;
pub mod router;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque server-assigned identifier for one WebSocket connection.
/// Assigned at upgrade time, never reused for the lifetime of the process
/// (a reconnect gets a fresh one). Serialized as the hyphenated UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
