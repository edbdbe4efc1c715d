//! Message router: the relay's protocol state machine.
//!
//! All relay state (the presence registry and each connection's phase) is
//! owned by a single task draining a `RouterEvent` queue. Every inbound
//! event is processed to completion before the next, so registry mutation
//! and broadcast enqueue are atomic relative to other events and no locking
//! is needed.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::relay::registry::Registry;
use crate::relay::ConnectionId;
use crate::ws::broadcast::{broadcast_to_all, broadcast_to_others, send_to};
use crate::ws::protocol::{ChatCategory, ClientEvent, ServerEvent};
use crate::ws::ConnectionRegistry;

/// Events fed to the router task by the transport layer.
///
/// `Disconnected` is emitted on every exit path of a connection actor, so
/// abrupt network loss reaches the router the same way a clean close does.
#[derive(Debug)]
pub enum RouterEvent {
    Connected { id: ConnectionId },
    Inbound { id: ConnectionId, event: ClientEvent },
    Disconnected { id: ConnectionId },
}

/// Lifecycle phase of one connection. A connection only becomes `Joined`
/// after announcing itself; chat from an `Unjoined` connection is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unjoined,
    Joined,
}

pub struct Router {
    registry: Registry,
    phases: HashMap<ConnectionId, Phase>,
    connections: ConnectionRegistry,
}

impl Router {
    pub fn new(connections: ConnectionRegistry) -> Self {
        Self {
            registry: Registry::new(),
            phases: HashMap::new(),
            connections,
        }
    }

    /// Drive the router until the transport side drops its sender.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RouterEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event);
        }
        tracing::debug!("Router queue closed, dispatch task exiting");
    }

    /// Process one event to completion.
    pub fn handle(&mut self, event: RouterEvent) {
        match event {
            RouterEvent::Connected { id } => {
                self.phases.insert(id, Phase::Unjoined);
            }
            RouterEvent::Inbound { id, event } => match event {
                ClientEvent::Join { name } => self.on_join(id, &name),
                ClientEvent::Chat { text } => self.on_chat(id, text),
                ClientEvent::Signal { target, payload } => self.on_signal(id, target, payload),
            },
            RouterEvent::Disconnected { id } => self.on_disconnect(id),
        }
    }

    /// Join: register, broadcast the new roster and a system notice, and
    /// tell every other connection a new peer is available for negotiation.
    fn on_join(&mut self, id: ConnectionId, requested_name: &str) {
        match self.phases.get(&id) {
            Some(Phase::Unjoined) => {}
            Some(Phase::Joined) => {
                // One join notice per connection; a repeat join is dropped.
                tracing::debug!(conn_id = %id, "Ignoring join from already-joined connection");
                return;
            }
            None => {
                tracing::debug!(conn_id = %id, "Ignoring join from unknown connection");
                return;
            }
        }

        let participant = self.registry.register(id, requested_name);
        self.phases.insert(id, Phase::Joined);

        tracing::info!(
            conn_id = %id,
            display_name = %participant.display_name,
            "Participant joined"
        );

        broadcast_to_all(
            &self.connections,
            &ServerEvent::Roster {
                names: self.registry.list(),
            },
        );
        broadcast_to_all(
            &self.connections,
            &system_chat(format!("{} joined", participant.display_name)),
        );

        broadcast_to_others(
            &self.connections,
            id,
            &ServerEvent::PeerAvailable { connection_id: id },
        );
    }

    /// Chat: only a joined connection may speak; the broadcast includes the
    /// sender so clients never need a local optimistic echo.
    fn on_chat(&mut self, id: ConnectionId, text: String) {
        let author = match self.registry.display_name(id) {
            Some(name) => name.to_string(),
            None => {
                tracing::debug!(conn_id = %id, "Dropping chat from unjoined connection");
                return;
            }
        };

        broadcast_to_all(
            &self.connections,
            &ServerEvent::Chat {
                author,
                text,
                category: ChatCategory::User,
            },
        );
    }

    /// Signal: forward the opaque payload to the addressed peer only.
    /// Allowed in any phase; an unknown target is dropped silently.
    fn on_signal(&mut self, id: ConnectionId, target: ConnectionId, payload: Value) {
        let delivered = send_to(
            &self.connections,
            target,
            &ServerEvent::Signal {
                sender: id,
                payload,
            },
        );
        if !delivered {
            tracing::debug!(
                conn_id = %id,
                target = %target,
                "Dropping signal for unknown target"
            );
        }
    }

    /// Disconnect: clean up, and if the connection had joined, broadcast
    /// the shrunken roster, a system notice, and `peer_gone` to the rest.
    fn on_disconnect(&mut self, id: ConnectionId) {
        self.phases.remove(&id);

        let participant = match self.registry.unregister(id) {
            Some(participant) => participant,
            None => return, // never joined, nothing was announced
        };

        tracing::info!(
            conn_id = %id,
            display_name = %participant.display_name,
            "Participant left"
        );

        broadcast_to_all(
            &self.connections,
            &ServerEvent::Roster {
                names: self.registry.list(),
            },
        );
        broadcast_to_all(
            &self.connections,
            &system_chat(format!("{} left", participant.display_name)),
        );

        broadcast_to_others(
            &self.connections,
            id,
            &ServerEvent::PeerGone { connection_id: id },
        );
    }
}

fn system_chat(text: String) -> ServerEvent {
    ServerEvent::Chat {
        author: "System".to_string(),
        text,
        category: ChatCategory::System,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::new_connection_registry;
    use axum::extract::ws::Message;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Attach a fake connection: outbound frames land in the returned receiver.
    fn connect(
        router: &mut Router,
        connections: &ConnectionRegistry,
    ) -> (ConnectionId, UnboundedReceiver<Message>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        connections.insert(id, tx);
        router.handle(RouterEvent::Connected { id });
        (id, rx)
    }

    /// Drain all pending frames into parsed JSON values.
    fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<serde_json::Value> {
        let mut events = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Message::Text(text) = msg {
                events.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        events
    }

    fn join(router: &mut Router, id: ConnectionId, name: &str) {
        router.handle(RouterEvent::Inbound {
            id,
            event: ClientEvent::Join {
                name: name.to_string(),
            },
        });
    }

    #[test]
    fn join_broadcasts_roster_notice_and_peer_available_to_others() {
        let connections = new_connection_registry();
        let mut router = Router::new(connections.clone());
        let (_a, mut rx_a) = connect(&mut router, &connections);
        let (b, mut rx_b) = connect(&mut router, &connections);
        join(&mut router, _a, "Alice");
        drain(&mut rx_a);
        drain(&mut rx_b);

        join(&mut router, b, "Bob");

        let seen_by_a: Vec<String> = drain(&mut rx_a)
            .iter()
            .map(|e| e["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(seen_by_a, vec!["roster", "chat", "peer_available"]);

        // The joiner gets roster and notice but no peer_available for itself
        let seen_by_b: Vec<String> = drain(&mut rx_b)
            .iter()
            .map(|e| e["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(seen_by_b, vec!["roster", "chat"]);
    }

    #[test]
    fn chat_from_unjoined_connection_is_dropped() {
        let connections = new_connection_registry();
        let mut router = Router::new(connections.clone());
        let (a, mut rx_a) = connect(&mut router, &connections);
        let (lurker, mut rx_lurker) = connect(&mut router, &connections);
        join(&mut router, a, "Alice");
        drain(&mut rx_a);
        drain(&mut rx_lurker);

        router.handle(RouterEvent::Inbound {
            id: lurker,
            event: ClientEvent::Chat {
                text: "hello?".to_string(),
            },
        });

        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_lurker).is_empty());
    }

    #[test]
    fn chat_echoes_back_to_the_sender() {
        let connections = new_connection_registry();
        let mut router = Router::new(connections.clone());
        let (a, mut rx_a) = connect(&mut router, &connections);
        join(&mut router, a, "Alice");
        drain(&mut rx_a);

        router.handle(RouterEvent::Inbound {
            id: a,
            event: ClientEvent::Chat {
                text: "hi all".to_string(),
            },
        });

        let events = drain(&mut rx_a);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["author"], "Alice");
        assert_eq!(events[0]["text"], "hi all");
        assert_eq!(events[0]["category"], "user");
    }

    #[test]
    fn signal_reaches_only_the_addressed_peer() {
        let connections = new_connection_registry();
        let mut router = Router::new(connections.clone());
        let (a, mut rx_a) = connect(&mut router, &connections);
        let (b, mut rx_b) = connect(&mut router, &connections);
        let (c, mut rx_c) = connect(&mut router, &connections);
        join(&mut router, a, "Alice");
        join(&mut router, b, "Bob");
        join(&mut router, c, "Carol");
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        router.handle(RouterEvent::Inbound {
            id: a,
            event: ClientEvent::Signal {
                target: b,
                payload: serde_json::json!({"kind": "offer", "sdp": "v=0"}),
            },
        });

        let to_b = drain(&mut rx_b);
        assert_eq!(to_b.len(), 1);
        assert_eq!(to_b[0]["type"], "signal");
        assert_eq!(to_b[0]["sender"], a.to_string());
        assert_eq!(to_b[0]["payload"]["kind"], "offer");
        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_c).is_empty());
    }

    #[test]
    fn signal_to_unknown_target_is_dropped() {
        let connections = new_connection_registry();
        let mut router = Router::new(connections.clone());
        let (a, mut rx_a) = connect(&mut router, &connections);
        join(&mut router, a, "Alice");
        drain(&mut rx_a);

        router.handle(RouterEvent::Inbound {
            id: a,
            event: ClientEvent::Signal {
                target: ConnectionId::new(),
                payload: serde_json::json!({}),
            },
        });

        assert!(drain(&mut rx_a).is_empty());
    }

    #[test]
    fn disconnect_of_joined_peer_broadcasts_departure_set() {
        let connections = new_connection_registry();
        let mut router = Router::new(connections.clone());
        let (a, mut rx_a) = connect(&mut router, &connections);
        let (b, mut rx_b) = connect(&mut router, &connections);
        join(&mut router, a, "Alice");
        join(&mut router, b, "Bob");
        drain(&mut rx_a);
        drain(&mut rx_b);

        connections.remove(&b);
        drop(rx_b);
        router.handle(RouterEvent::Disconnected { id: b });

        let events = drain(&mut rx_a);
        let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["roster", "chat", "peer_gone"]);
        assert_eq!(events[0]["names"], serde_json::json!(["Alice"]));
        assert!(events[1]["text"].as_str().unwrap().contains("Bob"));
        assert_eq!(events[1]["category"], "system");
        assert_eq!(events[2]["connection_id"], b.to_string());
    }

    #[test]
    fn disconnect_before_join_broadcasts_nothing() {
        let connections = new_connection_registry();
        let mut router = Router::new(connections.clone());
        let (a, mut rx_a) = connect(&mut router, &connections);
        let (lurker, rx_lurker) = connect(&mut router, &connections);
        join(&mut router, a, "Alice");
        drain(&mut rx_a);

        connections.remove(&lurker);
        drop(rx_lurker);
        router.handle(RouterEvent::Disconnected { id: lurker });

        assert!(drain(&mut rx_a).is_empty());
    }

    #[test]
    fn repeat_join_does_not_rebroadcast() {
        let connections = new_connection_registry();
        let mut router = Router::new(connections.clone());
        let (a, mut rx_a) = connect(&mut router, &connections);
        join(&mut router, a, "Alice");
        drain(&mut rx_a);

        join(&mut router, a, "Alice2");

        assert!(drain(&mut rx_a).is_empty());
    }
}
