//! Delivery primitives: serialize a server event once, fan the frame out.
//! Sends are fire-and-forget; a closed receiver just means the connection
//! is already tearing down.

use crate::relay::ConnectionId;
use crate::ws::protocol::ServerEvent;
use crate::ws::ConnectionRegistry;

/// Broadcast a server event to every live connection.
pub fn broadcast_to_all(registry: &ConnectionRegistry, event: &ServerEvent) {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize server event");
            return;
        }
    };
    let msg = axum::extract::ws::Message::Text(text.into());

    for entry in registry.iter() {
        let _ = entry.value().send(msg.clone());
    }
}

/// Broadcast a server event to every live connection except `skip`.
/// Used for peer availability notices, which never go to the peer itself.
pub fn broadcast_to_others(registry: &ConnectionRegistry, skip: ConnectionId, event: &ServerEvent) {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize server event");
            return;
        }
    };
    let msg = axum::extract::ws::Message::Text(text.into());

    for entry in registry.iter() {
        if *entry.key() != skip {
            let _ = entry.value().send(msg.clone());
        }
    }
}

/// Send a server event to one specific connection, if it is still live.
/// Returns whether a live connection with that id existed.
pub fn send_to(registry: &ConnectionRegistry, id: ConnectionId, event: &ServerEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize server event");
            return false;
        }
    };

    match registry.get(&id) {
        Some(sender) => {
            let _ = sender.send(axum::extract::ws::Message::Text(text.into()));
            true
        }
        None => false,
    }
}
