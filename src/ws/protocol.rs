//! JSON wire protocol: serde-tagged event enums.
//!
//! Negotiation payloads (SDP offers/answers, ICE candidates) stay opaque
//! `serde_json::Value` blobs; the relay forwards them without inspection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::relay::ConnectionId;

/// Events a client may send over its WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Announce identity. An empty name gets a generated default.
    Join {
        #[serde(default)]
        name: String,
    },
    /// Text chat, broadcast to everyone (including the sender).
    Chat { text: String },
    /// Relay an opaque negotiation blob to one specific peer.
    Signal {
        target: ConnectionId,
        payload: Value,
    },
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full roster snapshot, display names in join order.
    Roster { names: Vec<String> },
    /// A chat line, either user-authored or a system notice.
    Chat {
        author: String,
        text: String,
        category: ChatCategory,
    },
    /// A new peer joined and can be dialed for a voice session.
    PeerAvailable { connection_id: ConnectionId },
    /// A peer disconnected; tear down any session with it.
    PeerGone { connection_id: ConnectionId },
    /// A negotiation blob relayed from `sender`.
    Signal {
        sender: ConnectionId,
        payload: Value,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatCategory {
    System,
    User,
}
