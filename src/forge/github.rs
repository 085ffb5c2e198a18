//! GitHub implementation of [`RepoMetadataSource`].
//!
//! Metadata comes from `GET {api_url}/repos/{user}/{repo}`; existence probes
//! are `HEAD {raw_url}/{user}/{repo}/{ref}/{path}`.

use anyhow::Context;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::metrics::{Endpoint, MetricsRegistry};

use super::rate_limit::{self, RateLimitState};
use super::{RepoMetadata, RepoMetadataSource, UpstreamError};

const GITHUB_V3_ACCEPT: &str = "application/vnd.github.v3+json";

// ---------------------------------------------------------------------------
// Client struct
// ---------------------------------------------------------------------------

pub struct GitHubClient {
    http_client: reqwest::Client,
    api_url: String,
    raw_url: String,
    rate_limit: RateLimitState,
    metrics: MetricsRegistry,
}

impl GitHubClient {
    /// `http_client` should already carry the service `User-Agent` and
    /// request timeout.
    pub fn new(
        config: &UpstreamConfig,
        http_client: reqwest::Client,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            http_client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            raw_url: config.raw_url.trim_end_matches('/').to_string(),
            rate_limit: RateLimitState::new(),
            metrics,
        }
    }

    #[cfg(test)]
    pub fn rate_limit(&self) -> &RateLimitState {
        &self.rate_limit
    }

    fn record_quota(&self, headers: &reqwest::header::HeaderMap) {
        self.rate_limit.update_from_headers(headers);
        if let Some(remaining) = rate_limit::remaining(headers) {
            self.metrics
                .metrics
                .upstream_api_rate_limit_remaining
                .set(i64::try_from(remaining).unwrap_or(i64::MAX));
        }
    }
}

// ---------------------------------------------------------------------------
// Trait implementation
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
impl RepoMetadataSource for GitHubClient {
    async fn fetch_repo_metadata(
        &self,
        user: &str,
        repo: &str,
        credential: Option<&str>,
    ) -> Result<RepoMetadata, UpstreamError> {
        let url = format!("{}/repos/{user}/{repo}", self.api_url);

        let mut request = self.http_client.get(&url).header(ACCEPT, GITHUB_V3_ACCEPT);
        if let Some(credential) = credential {
            request = request.header(AUTHORIZATION, credential);
        }

        self.metrics.metrics.record_upstream_call(Endpoint::RepoMetadata);
        let resp = request
            .send()
            .await
            .context("metadata API request failed")?;

        self.record_quota(resp.headers());
        let status = resp.status();

        if rate_limit::is_exhausted(status, resp.headers()) {
            // A bare 403 falls back to the reset time of an earlier response.
            let retry_after_secs = rate_limit::retry_after_secs(resp.headers())
                .or_else(|| self.rate_limit.retry_after_secs());
            warn!(%user, %repo, ?retry_after_secs, "metadata API rate limit exhausted");
            return Err(UpstreamError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| String::from("<unreadable>"));
            warn!(%user, %repo, %status, "metadata API returned non-success");
            return Err(UpstreamError::Status { status, body });
        }

        let metadata: RepoMetadata = resp
            .json()
            .await
            .context("failed to parse metadata API response")?;
        debug!(%user, %repo, default_branch = %metadata.default_branch, "fetched repo metadata");
        Ok(metadata)
    }

    async fn probe_exists(
        &self,
        user: &str,
        repo: &str,
        git_ref: &str,
        path: &str,
        credential: Option<&str>,
    ) -> bool {
        let url = format!("{}/{user}/{repo}/{git_ref}/{path}", self.raw_url);

        let mut request = self.http_client.head(&url);
        if let Some(credential) = credential {
            request = request.header(AUTHORIZATION, credential);
        }

        self.metrics.metrics.record_upstream_call(Endpoint::RawHead);
        match request.send().await {
            Ok(resp) => {
                let found = resp.status().is_success();
                debug!(%url, status = %resp.status(), found, "CDN probe");
                found
            }
            Err(e) => {
                warn!(%url, error = %e, "CDN probe failed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
