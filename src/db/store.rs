//! Message persistence: an append-only log keyed by a store-assigned
//! monotonic sequence.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::message::StoredMessage;

/// An open write transaction on the message log.
///
/// The caller must finish the context exactly once: `finish` commits
/// unless the context has been marked rollback-only, in which case the
/// saved rows do not survive. Dropping without `finish` rolls back via
/// rusqlite's transaction drop behavior.
pub struct WriteContext<'conn> {
    tx: Transaction<'conn>,
    rollback_only: bool,
}

impl<'conn> WriteContext<'conn> {
    pub fn begin(conn: &'conn mut Connection) -> rusqlite::Result<Self> {
        Ok(Self {
            tx: conn.transaction()?,
            rollback_only: false,
        })
    }

    /// Append a message and return its store-assigned sequence.
    pub fn save(&self, username: &str, content: &str) -> rusqlite::Result<i64> {
        self.tx.execute(
            "INSERT INTO messages (username, content, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![username, content, Utc::now().to_rfc3339()],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    /// Flag the unit of work so `finish` rolls back even if no further
    /// error occurs.
    pub fn mark_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// Commit unless marked rollback-only. Returns whether the
    /// transaction committed.
    pub fn finish(self) -> rusqlite::Result<bool> {
        if self.rollback_only {
            self.tx.rollback()?;
            Ok(false)
        } else {
            self.tx.commit()?;
            Ok(true)
        }
    }
}

pub fn find_by_id(conn: &Connection, sequence: i64) -> rusqlite::Result<Option<StoredMessage>> {
    conn.query_row(
        "SELECT sequence, username, content FROM messages WHERE sequence = ?1",
        rusqlite::params![sequence],
        |row| {
            Ok(StoredMessage {
                sequence: row.get(0)?,
                username: row.get(1)?,
                content: row.get(2)?,
            })
        },
    )
    .optional()
}

pub fn find_latest(conn: &Connection) -> rusqlite::Result<Option<StoredMessage>> {
    conn.query_row(
        "SELECT sequence, username, content FROM messages ORDER BY sequence DESC LIMIT 1",
        [],
        |row| {
            Ok(StoredMessage {
                sequence: row.get(0)?,
                username: row.get(1)?,
                content: row.get(2)?,
            })
        },
    )
    .optional()
}
