//! Sketchboard WebSocket Relay Server
//!
//! Keeps the authoritative, ordered stroke history of every room and fans
//! changes out to all participants.
//!
//! ## Protocol
//!
//! Clients connect to `/ws?room=<name>` and exchange JSON frames:
//! ```json
//! { "event": "join", "data": { "name": "Ann", "color": "#e33" } }
//! { "event": "finalizeStroke", "data": { "tool": "brush", "color": "#e33", "width": 4, "points": [{ "x": 1, "y": 2 }] } }
//! { "event": "undo" }
//! ```
//! The first frame a client receives is `initHistory` with the room's full
//! history.
//!
//! All state is held in memory. Restarting the process loses every room.

pub mod config;
pub mod error;
pub mod registry;
pub mod router;
pub mod session;

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

pub use config::ServerConfig;
pub use error::{ConfigError, ServerError};
pub use registry::{Room, RoomGuard, RoomRegistry};
pub use router::{BroadcastRouter, Outbox};
pub use session::{Session, SessionManager};

/// Query parameters of the WebSocket endpoint.
#[derive(Debug, Default, Deserialize)]
struct WsParams {
    room: Option<String>,
}

/// Build the HTTP router for a configuration.
pub fn app(config: &ServerConfig) -> Router {
    let registry = Arc::new(RoomRegistry::new(config.live_capacity));
    router(Arc::new(SessionManager::new(
        registry,
        config.default_room.clone(),
    )))
}

/// Build the HTTP router around an existing session manager.
pub fn router(sessions: Arc<SessionManager>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(sessions)
}

/// Index page
async fn index() -> &'static str {
    "Sketchboard Relay Server - Connect via WebSocket at /ws?room=<name>"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(sessions): State<Arc<SessionManager>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, sessions, params.room))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, sessions: Arc<SessionManager>, room: Option<String>) {
    let (mut session, mut outbox) = sessions.open(room.as_deref()).await;
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ignore binary, ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", session.id(), e);
                        break;
                    }
                }
            }

            // Forward room events to the client
            outgoing = outbox.recv() => {
                let Some(server_msg) = outgoing else {
                    break;
                };
                match server_msg.encode() {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to encode event for {}: {}", session.id(), e),
                }
            }
        }
    }

    info!("Connection closed: {}", session.id());
    session.close().await;
}
