//! Process-local [`MetadataCache`] backed by a [`DashMap`].
//!
//! Used when `cache.backend: memory` is configured (single replica, no
//! KeyDB) and as the cache fake in tests.  Expired entries are dropped on
//! read, and every `SWEEP_EVERY` writes the whole map is swept.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use dashmap::DashMap;
use tracing::trace;

use super::MetadataCache;

const SWEEP_EVERY: usize = 256;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, Entry>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn sweep(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        trace!(
            removed = before.saturating_sub(self.entries.len()),
            "swept expired cache entries"
        );
    }

    /// Number of stored entries, expired ones included.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl MetadataCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        // The read guard must be released before `remove_if` takes the shard
        // write lock.
        let hit = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if hit {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.sweep();
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
