pub mod service;

use serde::{Deserialize, Serialize};

/// The wire and logical unit exchanged between clients. Immutable once
/// constructed; unknown JSON fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Message {
    pub username: String,
    pub content: String,
}

impl Message {
    /// Server-originated message, used for the error reply to a sender.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            username: "system".to_string(),
            content: content.into(),
        }
    }
}

/// A message as recorded by the store, with its assigned sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub sequence: i64,
    pub username: String,
    pub content: String,
}

impl StoredMessage {
    /// Wire form for history lookups: the sequence is prefixed onto the
    /// content so replies keep their ordering metadata.
    pub fn into_reply(self) -> Message {
        Message {
            username: self.username,
            content: format!("{}:{}", self.sequence, self.content),
        }
    }
}

/// Errors on the write path.
#[derive(Debug)]
pub enum WriteError {
    /// Payload did not deserialize into a message
    Malformed(serde_json::Error),
    /// Content carried the failure marker; the transaction was rolled back
    SimulatedFailure,
    /// Store rejected the write
    Store(rusqlite::Error),
    /// Store connection could not be acquired
    StoreUnavailable,
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "Malformed payload: {}", e),
            Self::SimulatedFailure => write!(f, "Simulated write failure"),
            Self::Store(e) => write!(f, "Store error: {}", e),
            Self::StoreUnavailable => write!(f, "Store connection unavailable"),
        }
    }
}

impl From<rusqlite::Error> for WriteError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e)
    }
}
