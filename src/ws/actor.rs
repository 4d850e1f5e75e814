use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use uuid::Uuid;

use crate::state::AppState;
use crate::ws::protocol;
use crate::ws::writer::ConnectionWriter;

/// Ping interval: server sends WebSocket ping every 30 seconds so
/// abruptly dropped peers don't leak registry entries.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for an upgraded WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, drains the session's bounded outbound channel
/// - Reader loop: dispatches inbound text frames to the protocol layer
///
/// Every exit path (client close, transport error, stream end) funnels
/// into `SessionRegistry::terminate`, which is idempotent, so a close
/// callback racing a transport error cannot double-release.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let session_id = Uuid::now_v7().to_string();
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<WsMessage>(state.outbound_buffer);

    let writer = ConnectionWriter::new(session_id.clone(), tx.clone(), state.send_timeout);
    state.sessions.store(writer);

    tracing::info!(session_id = %session_id, "Connection established");

    // Spawn writer task: forwards buffered frames to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::channel::<()>(1);

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            // A jammed buffer also lands in the pong-timeout branch below
            let _ = ping_tx.try_send(WsMessage::Ping(vec![1, 2, 3, 4].into()));

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.try_send(WsMessage::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket frames
    loop {
        match ws_receiver.next().await {
            Some(Ok(frame)) => match frame {
                WsMessage::Text(payload) => {
                    protocol::handle_text_frame(payload.as_str(), &session_id, &state).await;
                }
                WsMessage::Binary(_) => {
                    tracing::debug!(
                        session_id = %session_id,
                        "Ignoring binary frame on text protocol"
                    );
                }
                WsMessage::Ping(data) => {
                    let _ = tx.try_send(WsMessage::Pong(data));
                }
                WsMessage::Pong(_) => {
                    let _ = pong_tx.try_send(());
                }
                WsMessage::Close(frame) => {
                    tracing::info!(
                        session_id = %session_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::error!(
                    session_id = %session_id,
                    error = %e,
                    "Transport error"
                );
                break;
            }
            None => {
                tracing::info!(session_id = %session_id, "Connection stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks, then release the registry entry
    writer_handle.abort();
    ping_handle.abort();
    state.sessions.terminate(&session_id);

    tracing::info!(session_id = %session_id, "Connection actor stopped");
}

/// Writer task: receives frames from the bounded channel and forwards
/// them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, WsMessage>,
    mut rx: mpsc::Receiver<WsMessage>,
) {
    while let Some(frame) = rx.recv().await {
        if ws_sender.send(frame).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
