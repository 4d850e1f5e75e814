//! Read and write orchestration for the relay.
//!
//! Reads route to the replica pool and go through the TTL cache where
//! the lookup is id-keyed. The write path persists inside a transaction
//! on the primary, evicts the cache namespace, then fans the message
//! out to every other live session. All failures are absorbed here; the
//! only thing a client ever sees is the system error reply.

use tokio::task;

use crate::db::{store, AccessIntent};
use crate::message::{Message, StoredMessage, WriteError};
use crate::state::AppState;

/// Cache namespace for id-keyed message lookups.
const MESSAGE_CACHE: &str = "message";

/// Content marker that forces a rollback, used to exercise
/// partial-failure handling end to end.
const FAILURE_MARKER: &str = "/exception";

/// The only error detail ever sent to a client.
pub const INVALID_PROTOCOL: &str = "Invalid protocol";

/// Fetch the most recently persisted message. Never cached — every
/// write changes the answer.
pub async fn get_last_message(state: &AppState) -> Option<Message> {
    let pool = state.db.pool_for(AccessIntent::ReadOnly);
    let found = task::spawn_blocking(move || {
        let conn = pool.lock().ok()?;
        store::find_latest(&conn).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Last-message lookup failed");
            None
        })
    })
    .await
    .ok()
    .flatten();

    found.map(StoredMessage::into_reply)
}

/// Fetch a message by sequence id, cache-aside: a cache hit never
/// touches the store, a miss reads through the replica and populates
/// the cache only when a row was found.
pub async fn get_message(state: &AppState, sequence: i64) -> Option<Message> {
    if let Some(cached) = state.cache.get(MESSAGE_CACHE, sequence) {
        return Some(cached);
    }

    let pool = state.db.pool_for(AccessIntent::ReadOnly);
    let found = task::spawn_blocking(move || {
        let conn = pool.lock().ok()?;
        store::find_by_id(&conn, sequence).unwrap_or_else(|e| {
            tracing::warn!(sequence, error = %e, "Message lookup failed");
            None
        })
    })
    .await
    .ok()
    .flatten()
    .map(StoredMessage::into_reply);

    // Absent results are never written back; only a found message is cached
    if let Some(message) = &found {
        state.cache.put(MESSAGE_CACHE, sequence, message.clone());
    }

    found
}

/// Write path: parse the payload, persist it transactionally, then
/// invalidate the cache and broadcast to every session except the
/// sender. On any failure nothing is broadcast and the sender gets a
/// single system error reply.
pub async fn send_message_to_all(state: &AppState, sender_id: &str, payload: &str) {
    match persist_message(state, payload).await {
        Ok(message) => {
            state.cache.evict_all(MESSAGE_CACHE);
            state.sessions.broadcast(sender_id, &message).await;
        }
        Err(e) => {
            tracing::error!(
                sender_id = %sender_id,
                payload = %payload,
                error = %e,
                "Write path failed"
            );
            send_to_session(state, sender_id, &Message::system(INVALID_PROTOCOL)).await;
        }
    }
}

/// Parse and persist one message inside a write transaction on the
/// primary, returning the message as parsed. A payload carrying the
/// failure marker is saved and then rolled back, so the row must not be
/// visible afterward.
async fn persist_message(state: &AppState, payload: &str) -> Result<Message, WriteError> {
    let message: Message = serde_json::from_str(payload).map_err(WriteError::Malformed)?;
    let simulate_failure = message.content.contains(FAILURE_MARKER);

    let pool = state.db.pool_for(AccessIntent::ReadWrite);
    let stored = message.clone();
    task::spawn_blocking(move || {
        let mut conn = pool.lock().map_err(|_| WriteError::StoreUnavailable)?;
        let mut ctx = store::WriteContext::begin(&mut conn)?;
        let sequence = ctx.save(&stored.username, &stored.content)?;

        if simulate_failure {
            ctx.mark_rollback_only();
            ctx.finish()?;
            return Err(WriteError::SimulatedFailure);
        }

        ctx.finish()?;
        tracing::info!(sequence, username = %stored.username, "Message persisted");
        Ok(())
    })
    .await
    .map_err(|_| WriteError::StoreUnavailable)??;

    Ok(message)
}

/// Reply to one session. A session whose send fails (buffer full past
/// the timeout, or writer gone) is terminated as a whole rather than
/// losing individual frames.
pub async fn send_to_session(state: &AppState, session_id: &str, message: &Message) {
    if let Err(e) = state.sessions.send_to(session_id, message).await {
        tracing::warn!(
            session_id = %session_id,
            error = %e,
            "Send failed, terminating session"
        );
        state.sessions.terminate(session_id);
    }
}
