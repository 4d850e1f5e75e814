//! Tests for the session registry, the TTL cache, and the read/write
//! orchestration: idempotent termination, snapshot fan-out, the
//! overflow-terminates policy, cache-aside behavior, and primary/replica
//! routing.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message as WsFrame;
use tokio::sync::mpsc;

use relay_server::cache::TtlCache;
use relay_server::db::{store, AccessIntent};
use relay_server::message::{service, Message};
use relay_server::state::AppState;
use relay_server::ws::{ConnectionWriter, SessionRegistry};

/// Build a writer backed by a plain channel so tests can observe the
/// outbound frames directly.
fn test_writer(id: &str, capacity: usize) -> (ConnectionWriter, mpsc::Receiver<WsFrame>) {
    let (tx, rx) = mpsc::channel(capacity);
    let writer = ConnectionWriter::new(id.to_string(), tx, Duration::from_millis(100));
    (writer, rx)
}

/// App state over a fresh temp-dir database with an empty registry.
fn test_state(dir: &tempfile::TempDir) -> AppState {
    let data_dir = dir.path().to_str().unwrap();
    let db = relay_server::db::init_db(data_dir).expect("Failed to init DB");
    AppState {
        db,
        cache: Arc::new(TtlCache::new(Duration::from_secs(600))),
        sessions: SessionRegistry::new(),
        outbound_buffer: 16,
        send_timeout: Duration::from_millis(200),
    }
}

fn expect_text(frame: WsFrame) -> Message {
    match frame {
        WsFrame::Text(text) => {
            serde_json::from_str(text.as_str()).expect("Frame should be a JSON message")
        }
        other => panic!("Expected text frame, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_terminate_twice_leaves_registry_unchanged() {
    let registry = SessionRegistry::new();
    let (writer, mut rx) = test_writer("a", 8);
    registry.store(writer);
    assert!(registry.contains("a"));

    registry.terminate("a");
    registry.terminate("a");

    assert!(!registry.contains("a"));
    assert!(registry.is_empty());

    // Exactly one close frame was pushed, then the channel ended
    assert!(matches!(rx.recv().await, Some(WsFrame::Close(_))));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_broadcast_skips_the_sender() {
    let registry = SessionRegistry::new();
    let (wa, mut rx_a) = test_writer("a", 8);
    let (wb, mut rx_b) = test_writer("b", 8);
    let (wc, mut rx_c) = test_writer("c", 8);
    registry.store(wa);
    registry.store(wb);
    registry.store(wc);

    let message = Message {
        username: "a".to_string(),
        content: "hi".to_string(),
    };
    registry.broadcast("a", &message).await;

    assert_eq!(expect_text(rx_b.recv().await.unwrap()), message);
    assert_eq!(expect_text(rx_c.recv().await.unwrap()), message);
    assert!(rx_a.try_recv().is_err(), "Sender must not receive its own broadcast");
}

#[tokio::test]
async fn test_broadcast_terminates_only_the_stalled_session() {
    let registry = SessionRegistry::new();
    // Capacity 1 and nobody draining: the second broadcast overflows
    let (slow, _rx_slow) = test_writer("slow", 1);
    let (ok, mut rx_ok) = test_writer("ok", 8);
    registry.store(slow);
    registry.store(ok);

    let first = Message {
        username: "x".to_string(),
        content: "one".to_string(),
    };
    let second = Message {
        username: "x".to_string(),
        content: "two".to_string(),
    };

    registry.broadcast("sender", &first).await;
    assert!(registry.contains("slow"));

    registry.broadcast("sender", &second).await;
    assert!(
        !registry.contains("slow"),
        "A session whose buffer stays full past the timeout is dropped"
    );
    assert!(registry.contains("ok"));

    // The healthy session received both messages in order
    assert_eq!(expect_text(rx_ok.recv().await.unwrap()), first);
    assert_eq!(expect_text(rx_ok.recv().await.unwrap()), second);
}

#[tokio::test]
async fn test_cache_hit_does_not_requery_the_store() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let state = test_state(&dir);

    service::send_message_to_all(&state, "nobody", r#"{"username":"a","content":"hi"}"#).await;

    let first = service::get_message(&state, 1).await.expect("Message 1 should exist");
    assert_eq!(first.content, "1:hi");

    // Delete the row behind the cache's back; a true cache hit cannot notice
    {
        let pool = state.db.pool_for(AccessIntent::ReadWrite);
        let conn = pool.lock().unwrap();
        conn.execute("DELETE FROM messages WHERE sequence = 1", [])
            .unwrap();
    }
    assert_eq!(service::get_message(&state, 1).await, Some(first));

    // The next successful write evicts the namespace; with the row gone
    // the lookup now misses for real
    service::send_message_to_all(&state, "nobody", r#"{"username":"b","content":"later"}"#).await;
    assert_eq!(service::get_message(&state, 1).await, None);
}

#[tokio::test]
async fn test_absent_lookup_is_not_cached() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let state = test_state(&dir);

    assert_eq!(service::get_message(&state, 7).await, None);

    service::send_message_to_all(&state, "nobody", r#"{"username":"a","content":"hi"}"#).await;
    // Sequence 1 exists now; the earlier miss for 7 must not have pinned anything
    assert_eq!(
        service::get_message(&state, 1).await.map(|m| m.content),
        Some("1:hi".to_string())
    );
    assert_eq!(service::get_message(&state, 7).await, None);
}

#[tokio::test]
async fn test_last_message_tracks_the_newest_write() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let state = test_state(&dir);

    assert_eq!(service::get_last_message(&state).await, None);

    service::send_message_to_all(&state, "nobody", r#"{"username":"a","content":"first"}"#).await;
    service::send_message_to_all(&state, "nobody", r#"{"username":"b","content":"second"}"#).await;

    let last = service::get_last_message(&state).await.expect("Log is not empty");
    assert_eq!(last.username, "b");
    assert_eq!(last.content, "2:second");

    service::send_message_to_all(&state, "nobody", r#"{"username":"c","content":"third"}"#).await;
    let last = service::get_last_message(&state).await.unwrap();
    assert_eq!(last.content, "3:third");
}

#[tokio::test]
async fn test_simulated_failure_rolls_the_row_back() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let state = test_state(&dir);

    service::send_message_to_all(&state, "nobody", r#"{"username":"a","content":"kept"}"#).await;
    service::send_message_to_all(
        &state,
        "nobody",
        r#"{"username":"a","content":"boom /exception"}"#,
    )
    .await;

    // The rolled-back row is not visible by id or as the latest message
    assert_eq!(service::get_message(&state, 2).await, None);
    assert_eq!(
        service::get_last_message(&state).await.map(|m| m.content),
        Some("1:kept".to_string())
    );
}

#[tokio::test]
async fn test_replica_pool_rejects_writes() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let state = test_state(&dir);

    let pool = state.db.pool_for(AccessIntent::ReadOnly);
    let conn = pool.lock().unwrap();
    let result = conn.execute(
        "INSERT INTO messages (username, content) VALUES ('x', 'y')",
        [],
    );
    assert!(result.is_err(), "Replica connection must be read-only");
}

#[tokio::test]
async fn test_replica_sees_committed_writes() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let state = test_state(&dir);

    service::send_message_to_all(&state, "nobody", r#"{"username":"a","content":"hi"}"#).await;

    let pool = state.db.pool_for(AccessIntent::ReadOnly);
    let conn = pool.lock().unwrap();
    let found = store::find_by_id(&conn, 1).unwrap().expect("Row should be visible");
    assert_eq!(found.username, "a");
    assert_eq!(found.content, "hi");
}

#[tokio::test]
async fn test_cache_entries_expire_after_ttl() {
    let cache = TtlCache::new(Duration::from_millis(50));
    let message = Message {
        username: "a".to_string(),
        content: "1:hi".to_string(),
    };

    cache.put("message", 1, message.clone());
    assert_eq!(cache.get("message", 1), Some(message));

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(cache.get("message", 1), None);
}

#[tokio::test]
async fn test_evict_all_clears_only_the_namespace() {
    let cache = TtlCache::new(Duration::from_secs(600));
    let message = Message {
        username: "a".to_string(),
        content: "1:hi".to_string(),
    };

    cache.put("message", 1, message.clone());
    cache.put("message", 2, message.clone());
    cache.put("other", 1, message.clone());

    cache.evict_all("message");

    assert_eq!(cache.get("message", 1), None);
    assert_eq!(cache.get("message", 2), None);
    assert_eq!(cache.get("other", 1), Some(message));
}
