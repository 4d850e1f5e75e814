//! In-memory TTL cache for message lookups.
//!
//! Namespace-scoped key/value store (DashMap per namespace) with lazy
//! expiry on read and whole-namespace eviction on write. Values are
//! owned messages, so an absent lookup result can never be cached.

use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::message::Message;

struct CacheEntry {
    value: Message,
    expires_at: Instant,
}

pub struct TtlCache {
    namespaces: DashMap<String, DashMap<i64, CacheEntry>>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            namespaces: DashMap::new(),
            ttl,
        }
    }

    /// Look up a cached value. An entry past its TTL counts as a miss
    /// and is removed.
    pub fn get(&self, namespace: &str, key: i64) -> Option<Message> {
        let entries = self.namespaces.get(namespace)?;
        let expired = match entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(&key);
        }
        None
    }

    pub fn put(&self, namespace: &str, key: i64, value: Message) {
        self.namespaces.entry(namespace.to_string()).or_default().insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop every entry in the namespace. A write may change what any
    /// id or last-message lookup should return, so nothing survives.
    pub fn evict_all(&self, namespace: &str) {
        self.namespaces.remove(namespace);
    }
}
