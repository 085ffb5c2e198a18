//! Request → [`ResolvedTarget`] orchestration.
//!
//! Ref: explicit version (normalized) → branch cache → metadata API →
//! CDN probing fallback when the API is rate-limited.
//!
//! Path: explicit file → path cache → first existing entry file in the
//! requested directory.
//!
//! Cache write-backs are spawned on a [`TaskTracker`] and never awaited on
//! the request path; their failures are logged and counted, not returned.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, MetadataCache};
use crate::config::CacheConfig;
use crate::forge::{RepoMetadataSource, UpstreamError};
use crate::metrics::{CacheKind, MetricsRegistry};

use super::error::ResolutionError;
use super::{fallback, version, ResolutionRequest, ResolvedTarget};

/// Probe order for directory requests.
pub const ENTRY_FILE_CANDIDATES: [&str; 4] = ["index.ts", "mod.ts", "index.js", "mod.js"];

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CacheTtls {
    pub prefix: String,
    pub branch: Duration,
    pub path: Duration,
}

impl From<&CacheConfig> for CacheTtls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            prefix: config.key_prefix.clone(),
            branch: Duration::from_secs(config.branch_ttl_secs),
            path: Duration::from_secs(config.path_ttl_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

pub struct Resolver {
    cache: Arc<dyn MetadataCache>,
    source: Arc<dyn RepoMetadataSource>,
    ttls: CacheTtls,
    metrics: MetricsRegistry,
    write_backs: TaskTracker,
}

impl Resolver {
    pub fn new(
        cache: Arc<dyn MetadataCache>,
        source: Arc<dyn RepoMetadataSource>,
        ttls: CacheTtls,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            cache,
            source,
            ttls,
            metrics,
            write_backs: TaskTracker::new(),
        }
    }

    /// Resolve `request` to an exact CDN location.
    ///
    /// `credential` is the caller's `Authorization` header, forwarded to the
    /// metadata API and the CDN probes.
    pub async fn resolve(
        &self,
        request: &ResolutionRequest,
        credential: Option<&str>,
    ) -> Result<ResolvedTarget, ResolutionError> {
        let git_ref = self.resolve_ref(request, credential).await?;
        let path = self.resolve_path(request, &git_ref, credential).await?;

        debug!(
            user = %request.user,
            repo = %request.repo,
            %git_ref,
            %path,
            "resolved"
        );

        Ok(ResolvedTarget {
            user: request.user.clone(),
            repo: request.repo.clone(),
            git_ref,
            path,
        })
    }

    /// Wait for every pending cache write-back to finish.
    pub async fn drain(&self) {
        self.write_backs.close();
        self.write_backs.wait().await;
        self.write_backs.reopen();
    }

    // -----------------------------------------------------------------------
    // Ref
    // -----------------------------------------------------------------------

    async fn resolve_ref(
        &self,
        request: &ResolutionRequest,
        credential: Option<&str>,
    ) -> Result<String, ResolutionError> {
        if let Some(token) = request.version_token.as_deref() {
            return Ok(version::normalize(token));
        }

        let (user, repo) = (request.user.as_str(), request.repo.as_str());
        let key = CacheKey::Branch { user, repo }.render(&self.ttls.prefix);

        if let Some(branch) = self.cached(&key, CacheKind::Branch).await {
            return Ok(branch);
        }

        let branch = match self.source.fetch_repo_metadata(user, repo, credential).await {
            Ok(metadata) => metadata.default_branch,
            Err(UpstreamError::RateLimited { retry_after_secs }) => {
                self.metrics.metrics.rate_limit_fallbacks.inc();
                info!(%user, %repo, "metadata API rate-limited, probing conventional branches");
                fallback::infer_default_branch(
                    self.source.as_ref(),
                    user,
                    repo,
                    fallback::probe_path(request),
                    credential,
                    retry_after_secs,
                )
                .await?
            }
            Err(UpstreamError::Status { status, body }) => {
                return Err(ResolutionError::Upstream {
                    user: user.to_string(),
                    repo: repo.to_string(),
                    status,
                    body,
                });
            }
            Err(UpstreamError::Transport(err)) => return Err(ResolutionError::Internal(err)),
        };

        self.write_back(key, branch.clone(), self.ttls.branch);
        Ok(branch)
    }

    // -----------------------------------------------------------------------
    // Path
    // -----------------------------------------------------------------------

    async fn resolve_path(
        &self,
        request: &ResolutionRequest,
        git_ref: &str,
        credential: Option<&str>,
    ) -> Result<String, ResolutionError> {
        if let Some(path) = request.file_path() {
            return Ok(path.to_string());
        }

        let (user, repo) = (request.user.as_str(), request.repo.as_str());
        let dir = request.directory().unwrap_or("");
        let key = CacheKey::Path { user, repo, dir }.render(&self.ttls.prefix);

        if let Some(path) = self.cached(&key, CacheKind::Path).await {
            return Ok(path);
        }

        for candidate in ENTRY_FILE_CANDIDATES {
            let path = join_path(dir, candidate);
            if self
                .source
                .probe_exists(user, repo, git_ref, &path, credential)
                .await
            {
                debug!(%user, %repo, %git_ref, %path, "discovered entry file");
                self.write_back(key, path.clone(), self.ttls.path);
                return Ok(path);
            }
        }

        Err(ResolutionError::PathUndiscoverable {
            user: user.to_string(),
            repo: repo.to_string(),
            git_ref: git_ref.to_string(),
            directory: dir.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Cache helpers
    // -----------------------------------------------------------------------

    /// Cache read where an error counts as a miss.
    async fn cached(&self, key: &str, kind: CacheKind) -> Option<String> {
        let value = match self.cache.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "metadata cache read failed, treating as miss");
                None
            }
        };
        self.metrics.metrics.record_cache_lookup(kind, value.is_some());
        value
    }

    fn write_back(&self, key: String, value: String, ttl: Duration) {
        let cache = Arc::clone(&self.cache);
        let metrics = self.metrics.clone();
        self.write_backs.spawn(async move {
            if let Err(e) = cache.set(&key, &value, ttl).await {
                metrics.metrics.cache_write_failures.inc();
                warn!(%key, error = %e, "metadata cache write failed");
            }
        });
    }
}

fn join_path(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
