use crate::logic::run::QueryResponse;
use crate::model::EngineError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Cache entry for an executed query, keyed by request-details hash.
#[derive(Clone, Debug)]
struct CacheEntry {
    outcome: Result<QueryResponse, EngineError>,
    expires_at: Instant,
}

/// In-memory cache of query outcomes with per-entry TTL.
///
/// Failed executions are cached alongside successes so a misbehaving upstream
/// is not hammered on every render.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get a cached outcome if present and not expired.
    pub async fn get(&self, key: &str) -> Option<Result<QueryResponse, EngineError>> {
        let mut entries = self.entries.write().await;

        if let Some(entry) = entries.get(key) {
            if entry.expires_at <= Instant::now() {
                entries.remove(key);
                return None;
            }
            return Some(entry.outcome.clone());
        }

        None
    }

    pub async fn put(
        &self,
        key: &str,
        outcome: Result<QueryResponse, EngineError>,
        ttl: Duration,
    ) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                outcome,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Clear all expired entries.
    pub async fn clear_expired(&self) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }
}
