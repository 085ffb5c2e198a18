//! Upstream metadata client abstraction.
//!
//! Provides the [`RepoMetadataSource`] trait that encapsulates every call the
//! resolver makes to the outside world apart from the cache: the
//! repository-metadata API and `HEAD` probes against the raw-content CDN.
//! No URL construction or response classification leaks outside this module.

pub mod github;
pub mod rate_limit;

use reqwest::StatusCode;
use serde::Deserialize;

pub use github::GitHubClient;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The subset of `GET /repos/{owner}/{repo}` the resolver needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoMetadata {
    pub default_branch: String,
}

/// Classified metadata API failure.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// `403` with zero remaining quota.  Triggers the CDN probing fallback.
    #[error("metadata API rate limit exhausted")]
    RateLimited {
        /// Seconds until the quota resets, when the API said so.
        retry_after_secs: Option<u64>,
    },
    /// Any other non-2xx answer.
    #[error("metadata API returned {status}")]
    Status { status: StatusCode, body: String },
    /// The request never produced a usable answer.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Repository metadata and content-existence lookups.
///
/// `credential` is the caller's raw `Authorization` header value.  It is
/// forwarded verbatim when present and never stored.
#[async_trait::async_trait]
pub trait RepoMetadataSource: Send + Sync {
    /// Look up the repository's default branch.
    async fn fetch_repo_metadata(
        &self,
        user: &str,
        repo: &str,
        credential: Option<&str>,
    ) -> Result<RepoMetadata, UpstreamError>;

    /// `HEAD` the CDN URL for `path` at `git_ref`.  Any failure, including
    /// transport errors, reads as "does not exist".
    async fn probe_exists(
        &self,
        user: &str,
        repo: &str,
        git_ref: &str,
        path: &str,
        credential: Option<&str>,
    ) -> bool;
}
