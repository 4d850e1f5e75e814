use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
/// WebSocket upgrade endpoint. Spawns an actor for the connection.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| actor::run_connection(socket, state))
}
