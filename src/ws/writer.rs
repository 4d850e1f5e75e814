//! Per-connection outbound writer.
//!
//! Each connection owns a bounded channel drained by a single writer
//! task, so concurrent `send` calls from fan-out tasks collapse into
//! one FIFO outbound stream — two sends to the same connection are
//! never interleaved or reordered.

use axum::extract::ws::{CloseFrame, Message as WsMessage};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::message::Message;

/// Why an outbound send was refused.
#[derive(Debug)]
pub enum SendError {
    /// The outbound buffer stayed full past the send timeout
    BufferFull,
    /// The connection's writer task has already shut down
    Closed,
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BufferFull => write!(f, "Outbound buffer full past send timeout"),
            Self::Closed => write!(f, "Connection writer closed"),
        }
    }
}

/// Serialized sender half of one live connection.
///
/// A full buffer past the timeout means the peer has stopped reading;
/// the policy is to drop the whole connection, never individual frames,
/// and the caller is responsible for removing it from the registry.
#[derive(Clone)]
pub struct ConnectionWriter {
    id: String,
    outbound: mpsc::Sender<WsMessage>,
    send_timeout: Duration,
}

impl ConnectionWriter {
    pub fn new(id: String, outbound: mpsc::Sender<WsMessage>, send_timeout: Duration) -> Self {
        Self {
            id,
            outbound,
            send_timeout,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Enqueue a message for delivery, waiting at most the configured
    /// timeout for buffer space. Never blocks the caller beyond that.
    pub async fn send(&self, message: &Message) -> Result<(), SendError> {
        let Ok(text) = serde_json::to_string(message) else {
            // A plain struct of strings cannot fail to serialize
            return Ok(());
        };

        match self
            .outbound
            .send_timeout(WsMessage::Text(text.into()), self.send_timeout)
            .await
        {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(SendError::BufferFull),
            Err(SendTimeoutError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// Best-effort close: enqueue a Close frame without waiting. The
    /// writer task shuts down once every sender clone is dropped.
    pub fn close(&self) {
        let frame = WsMessage::Close(Some(CloseFrame {
            code: 1000,
            reason: "terminated".into(),
        }));
        let _ = self.outbound.try_send(frame);
    }
}
