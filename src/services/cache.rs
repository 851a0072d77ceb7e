// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process TTL cache mirroring durable game state.
//!
//! Values are stored as JSON strings. A corrupt or expired entry is
//! discarded on read so callers fall back to the durable copy instead of
//! acting on bad state.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::models::GameType;

/// Default entry lifetime (30 minutes, matching a game session's span).
const DEFAULT_TTL_SECS: i64 = 30 * 60;

#[derive(Clone)]
struct CacheEntry {
    json: String,
    expires_at: DateTime<Utc>,
}

/// Shared TTL cache.
#[derive(Clone)]
pub struct TtlCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECS)
    }
}

impl TtlCache {
    pub fn new(default_ttl_secs: i64) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            default_ttl: Duration::seconds(default_ttl_secs),
        }
    }

    /// Cache key for a session's game state.
    pub fn session_key(session_id: &str, game_type: GameType) -> String {
        format!("session:{session_id}:{game_type}")
    }

    /// Get and deserialize a value. Expired and corrupt entries are
    /// removed and read as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.entries.get(key)?;

        if Utc::now() >= entry.expires_at {
            drop(entry);
            self.entries.remove(key);
            return None;
        }

        match serde_json::from_str(&entry.json) {
            Ok(value) => Some(value),
            Err(e) => {
                drop(entry);
                tracing::warn!(key, error = %e, "Discarding corrupt cache entry");
                self.entries.remove(key);
                None
            }
        }
    }

    /// Serialize and store a value with the default TTL.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_string(value) {
            Ok(json) => {
                self.entries.insert(
                    key.to_string(),
                    CacheEntry {
                        json,
                        expires_at: Utc::now() + ttl,
                    },
                );
            }
            Err(e) => {
                // A cache write failure only costs a regeneration later
                tracing::warn!(key, error = %e, "Failed to serialize cache value");
            }
        }
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Raw insert used by tests to simulate corruption.
    #[cfg(test)]
    pub fn insert_raw(&self, key: &str, json: &str, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                json: json.to_string(),
                expires_at: Utc::now() + ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Payload {
        n: u32,
        label: String,
    }

    #[test]
    fn test_round_trip() {
        let cache = TtlCache::default();
        let value = Payload {
            n: 7,
            label: "seven".to_string(),
        };
        cache.set("k", &value);
        assert_eq!(cache.get::<Payload>("k"), Some(value));
    }

    #[test]
    fn test_expired_entry_is_miss() {
        let cache = TtlCache::default();
        cache.set_with_ttl("k", &Payload { n: 1, label: "x".to_string() }, Duration::seconds(-1));
        assert_eq!(cache.get::<Payload>("k"), None);
        // And the entry is gone
        assert!(cache.entries.get("k").is_none());
    }

    #[test]
    fn test_corrupt_entry_is_discarded() {
        let cache = TtlCache::default();
        cache.insert_raw("k", "{not json", Duration::seconds(60));
        assert_eq!(cache.get::<Payload>("k"), None);
        assert!(cache.entries.get("k").is_none());
    }

    #[test]
    fn test_remove() {
        let cache = TtlCache::default();
        cache.set("k", &Payload { n: 1, label: "x".to_string() });
        cache.remove("k");
        assert_eq!(cache.get::<Payload>("k"), None);
    }

    #[test]
    fn test_session_key_scheme() {
        assert_eq!(
            TtlCache::session_key("abc", GameType::Crossword),
            "session:abc:crossword"
        );
    }
}
