use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::models::CacheKey;

/// In-memory guard against re-sending the same reminder during rapid
/// successive runs. Reads share the lock; `mark_sent` takes it exclusively
/// and sweeps stale entries on every write.
pub struct DedupCache {
    entries: RwLock<HashMap<CacheKey, DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    horizon: Duration,
}

impl DedupCache {
    pub fn new(clock: Arc<dyn Clock>, cooldown: Duration, horizon: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            cooldown,
            horizon,
        }
    }

    pub async fn is_recently_sent(&self, key: &CacheKey) -> bool {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(sent_at) => self.clock.now() - *sent_at < self.cooldown,
            None => false,
        }
    }

    pub async fn mark_sent(&self, key: CacheKey) {
        let now = self.clock.now();
        let cutoff = now - self.horizon;
        let mut entries = self.entries.write().await;
        entries.insert(key, now);

        let before = entries.len();
        entries.retain(|_, sent_at| *sent_at >= cutoff);
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = entries.len(), "evicted stale dedup entries");
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
