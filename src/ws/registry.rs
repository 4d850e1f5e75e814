//! Live-session registry and fan-out.

use dashmap::DashMap;
use std::sync::Arc;

use crate::message::Message;
use crate::ws::writer::{ConnectionWriter, SendError};

/// Concurrent map of live sessions keyed by connection id.
///
/// Presence of an entry is the sole authority for "this session is
/// open": terminating an absent id is a no-op, which makes the close
/// and transport-error callbacks safe to race.
pub struct SessionRegistry {
    sessions: DashMap<String, ConnectionWriter>,
}

impl SessionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
        })
    }

    /// Register a new live connection. Ids are unique per live
    /// connection; a duplicate means the connect lifecycle is broken
    /// upstream, so the displaced writer is closed and the mistake is
    /// loud in the logs.
    pub fn store(&self, writer: ConnectionWriter) {
        let id = writer.id().to_string();
        if let Some(previous) = self.sessions.insert(id.clone(), writer) {
            tracing::error!(session_id = %id, "Duplicate session id, closing the displaced connection");
            previous.close();
        }
    }

    /// Remove a session and close its writer. Idempotent.
    pub fn terminate(&self, id: &str) {
        if let Some((_, writer)) = self.sessions.remove(id) {
            writer.close();
            tracing::info!(session_id = %id, "Session terminated");
        }
    }

    /// Fan a message out to every live session except `exclude_id`.
    ///
    /// Delivery works on a point-in-time snapshot: sessions joining
    /// mid-iteration may or may not receive the message, and a failed
    /// send terminates only that session — the rest still get theirs.
    pub async fn broadcast(&self, exclude_id: &str, message: &Message) {
        let snapshot: Vec<ConnectionWriter> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for writer in snapshot {
            if writer.id() == exclude_id {
                continue;
            }
            if let Err(e) = writer.send(message).await {
                tracing::warn!(
                    session_id = %writer.id(),
                    error = %e,
                    "Broadcast send failed, terminating session"
                );
                self.terminate(writer.id());
            }
        }
    }

    /// Send to a single session. An absent id is a no-op; a send
    /// failure is returned so the caller can terminate the session.
    pub async fn send_to(&self, id: &str, message: &Message) -> Result<(), SendError> {
        let writer = self.sessions.get(id).map(|entry| entry.value().clone());
        match writer {
            Some(writer) => writer.send(message).await,
            None => Ok(()),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
