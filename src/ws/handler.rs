//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::Hub;

/// `GET /ws` — Upgrade an authenticated HTTP connection to WebSocket.
///
/// Requests without valid credentials are rejected with 401 by the
/// [`AuthUser`] extractor before the hub is touched. Inbound frames are
/// capped at the configured maximum frame size.
pub async fn ws_handler(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let config = state.session;
    let hub: Hub = state.hub.clone();
    tracing::debug!(user_id = %identity.user_id, "websocket upgrade accepted");

    ws.max_message_size(config.max_frame_size)
        .max_frame_size(config.max_frame_size)
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| run_connection(socket, identity, hub, config))
}
