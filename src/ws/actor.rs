use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::relay::router::RouterEvent;
use crate::relay::ConnectionId;
use crate::state::AppState;
use crate::ws::protocol::ClientEvent;

/// Ping interval: server sends a WebSocket ping every 30 seconds so dead
/// connections are noticed even when the client vanishes without a close.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if no pong arrives within 10 seconds of a ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for one WebSocket.
///
/// Splits the socket into reader and writer halves:
/// - Writer task: owns the sink, forwards frames from an mpsc channel
/// - Reader loop: decodes inbound JSON events and queues them for the router
///
/// The mpsc sender is registered in the live-connection map so the router
/// can push broadcasts and relayed signals to this client. Every exit path
/// deregisters the connection and emits a synthetic `Disconnected` event.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let id = ConnectionId::new();
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Register the outbound channel before the router learns about us, so a
    // join broadcast can never race a missing sender.
    state.connections.insert(id, tx.clone());

    if state
        .router_tx
        .send(RouterEvent::Connected { id })
        .is_err()
    {
        // Router task is gone, the server is shutting down
        state.connections.remove(&id);
        return;
    }

    tracing::info!(conn_id = %id, "WebSocket actor started");

    // Spawn writer task: forwards mpsc messages to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!(conn_id = %id, "Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                    Ok(event) => {
                        let _ = state.router_tx.send(RouterEvent::Inbound { id, event });
                    }
                    Err(e) => {
                        // Malformed events are dropped, never bounced back
                        tracing::debug!(
                            conn_id = %id,
                            error = %e,
                            "Dropping malformed client event"
                        );
                    }
                },
                Message::Binary(_) => {
                    tracing::debug!(conn_id = %id, "Ignoring binary frame (protocol is JSON text)");
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(conn_id = %id, reason = ?frame, "Client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(conn_id = %id, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                tracing::info!(conn_id = %id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort helper tasks, deregister, surface the disconnect
    writer_handle.abort();
    ping_handle.abort();

    state.connections.remove(&id);
    let _ = state.router_tx.send(RouterEvent::Disconnected { id });

    tracing::info!(conn_id = %id, "WebSocket actor stopped");
}

/// Writer task: receives messages from the mpsc channel and forwards them to
/// the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
