//! herdwatch-server — the viewer-facing HTTP surface.
//!
//! Two routes: `/` serves the embedded dashboard page, `/ws` upgrades to a
//! WebSocket and hands the connection to a [`session`]. Sessions subscribe
//! to the shared snapshot broadcast; the server holds no other state and
//! sessions never touch each other's sockets.

pub mod session;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use tokio::sync::broadcast;
use tracing::debug;

use herdwatch_model::ClusterSnapshot;

/// Shared state for the viewer routes.
#[derive(Clone)]
pub struct ServerState {
    /// Publish side of the snapshot feed; each session subscribes.
    pub snapshots: broadcast::Sender<ClusterSnapshot>,
}

/// Build the viewer router.
pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    // Subscribe before the upgrade completes so no snapshot published
    // during the handshake is missed.
    let snapshots = state.snapshots.subscribe();
    debug!("viewer connecting");
    ws.on_upgrade(move |socket| session::run(socket, snapshots))
}

async fn home() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}
