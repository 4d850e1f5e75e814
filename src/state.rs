use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::db::DbRouter;
use crate::ws::SessionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Primary/replica SQLite pools behind intent-based routing
    pub db: DbRouter,
    /// TTL cache for id-keyed message lookups
    pub cache: Arc<TtlCache>,
    /// Live WebSocket sessions
    pub sessions: Arc<SessionRegistry>,
    /// Outbound buffer capacity per connection, in frames
    pub outbound_buffer: usize,
    /// How long a send may wait for buffer space before the connection is dropped
    pub send_timeout: Duration,
}
