//! Metadata cache for resolved default branches and entry paths.
//!
//! Two namespaces share one key-value store:
//!
//! - `{prefix}:branch:{user}/{repo}` → default branch (or tag) name
//! - `{prefix}:path:{user}/{repo}/{dir}` → entry file path (`dir` is empty
//!   for the repository root)
//!
//! Entries are only ever written after a successful discovery and only ever
//! removed by TTL expiry.  A stale entry costs at most one extra round trip,
//! so no invalidation API exists.

pub mod keydb;
pub mod memory;

use std::time::Duration;

use anyhow::Result;

pub use keydb::KeyDbCache;
pub use memory::MemoryCache;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Best-effort key-value store with per-entry expiry.
#[async_trait::async_trait]
pub trait MetadataCache: Send + Sync {
    /// Returns `Ok(None)` on a miss or an expired entry.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Connectivity check for `/healthz`.
    async fn ping(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Composite cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey<'a> {
    Branch {
        user: &'a str,
        repo: &'a str,
    },
    Path {
        user: &'a str,
        repo: &'a str,
        dir: &'a str,
    },
}

impl CacheKey<'_> {
    /// Render the key under `prefix`.
    pub fn render(&self, prefix: &str) -> String {
        match self {
            CacheKey::Branch { user, repo } => format!("{prefix}:branch:{user}/{repo}"),
            CacheKey::Path { user, repo, dir } => format!("{prefix}:path:{user}/{repo}/{dir}"),
        }
    }
}
