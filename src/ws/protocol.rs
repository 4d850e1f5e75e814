//! Inbound frame dispatch.
//!
//! State-free per-frame parser: history commands are answered to the
//! sender only, everything else goes down the write path. No failure
//! here ever reaches the transport layer — the worst a sender sees is
//! the system error reply.

use crate::message::service;
use crate::message::Message;
use crate::state::AppState;

/// Dispatch one inbound text frame from `sender_id`.
pub async fn handle_text_frame(payload: &str, sender_id: &str, state: &AppState) {
    tracing::info!(sender_id = %sender_id, payload = %payload, "Received frame");

    if payload == "/last" {
        // Absence is silent: an empty log is not an error
        if let Some(message) = service::get_last_message(state).await {
            service::send_to_session(state, sender_id, &message).await;
        }
    } else if payload.contains("/get") {
        // ex: /get {sequence}; a bare "/get" stays silent
        let Some(raw_id) = payload.split_whitespace().nth(1) else {
            return;
        };

        let reply = match raw_id.parse::<i64>() {
            Ok(sequence) => service::get_message(state, sequence).await,
            Err(_) => None,
        };

        match reply {
            Some(message) => service::send_to_session(state, sender_id, &message).await,
            None => {
                tracing::warn!(
                    sender_id = %sender_id,
                    raw_id = %raw_id,
                    "Get request failed"
                );
                service::send_to_session(
                    state,
                    sender_id,
                    &Message::system(service::INVALID_PROTOCOL),
                )
                .await;
            }
        }
    } else {
        service::send_message_to_all(state, sender_id, payload).await;
    }
}
