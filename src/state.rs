use tokio::sync::mpsc;

use crate::relay::router::RouterEvent;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Live WebSocket connections, one outbound sender per connection
    pub connections: ConnectionRegistry,
    /// Queue into the single-owner router task
    pub router_tx: mpsc::UnboundedSender<RouterEvent>,
}
