pub mod migrations;
pub mod store;

use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Type alias for a shared database connection.
/// rusqlite is synchronous — we wrap in Arc<Mutex> for thread safety
/// with tokio::task::spawn_blocking for DB operations.
pub type DbPool = Arc<Mutex<Connection>>;

/// Declared intent of a unit of work, decided before any connection is
/// acquired. Read-only work routes to the replica, everything else to
/// the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessIntent {
    ReadOnly,
    ReadWrite,
}

/// Routes units of work between the read-write primary and the
/// read-only replica. Callers pick a pool only once their transaction
/// intent is known; acquiring earlier would misroute reads to the
/// primary.
#[derive(Clone)]
pub struct DbRouter {
    primary: DbPool,
    replica: DbPool,
}

impl DbRouter {
    pub fn pool_for(&self, intent: AccessIntent) -> DbPool {
        match intent {
            AccessIntent::ReadOnly => self.replica.clone(),
            AccessIntent::ReadWrite => self.primary.clone(),
        }
    }
}

/// Initialize the SQLite database: create the data directory if needed,
/// open (or create) the database file, enable WAL mode, run migrations,
/// and open a read-only replica connection over the same file.
pub fn init_db(data_dir: &str) -> Result<DbRouter, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;

    let db_path = Path::new(data_dir).join("relay.db");
    let mut primary = Connection::open(&db_path)?;

    // Enable WAL mode so replica reads don't block primary writes
    primary.pragma_update(None, "journal_mode", "WAL")?;

    let migrations = migrations::migrations();
    migrations.to_latest(&mut primary)?;

    let replica = Connection::open_with_flags(
        &db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    // Run one throwaway read at startup so the replica is warm before
    // the first request arrives
    replica.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    tracing::info!("Init replica connection");

    tracing::info!("Database initialized at {}", db_path.display());

    Ok(DbRouter {
        primary: Arc::new(Mutex::new(primary)),
        replica: Arc::new(Mutex::new(replica)),
    })
}
