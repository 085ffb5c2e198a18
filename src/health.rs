use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::cache::MetadataCache;
use crate::config::Config;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub cache: CheckResult,
    pub upstream: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn healthy() -> Self {
        Self {
            ok: true,
            detail: None,
        }
    }

    fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: Some(detail.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state expected by the handler
// ---------------------------------------------------------------------------

/// Subset of `AppState` the health handler needs.
#[derive(Clone)]
pub struct HealthState {
    pub config: Arc<Config>,
    pub cache: Arc<dyn MetadataCache>,
    pub http_client: reqwest::Client,
}

// ---------------------------------------------------------------------------
// Individual checks
// ---------------------------------------------------------------------------

async fn check_cache(cache: &dyn MetadataCache) -> CheckResult {
    match cache.ping().await {
        Ok(()) => CheckResult::healthy(),
        Err(e) => CheckResult::unhealthy(format!("ping failed: {e:#}")),
    }
}

/// `GET {api_url}/rate_limit` is exempt from GitHub's REST quota, so polling
/// it does not eat into the unauthenticated budget the resolver relies on.
async fn check_upstream(client: &reqwest::Client, api_url: &str) -> CheckResult {
    let url = format!("{}/rate_limit", api_url.trim_end_matches('/'));
    match client.get(&url).send().await {
        // Any non-5xx answer means the API is reachable.
        Ok(resp) if !resp.status().is_server_error() => CheckResult::healthy(),
        Ok(resp) => CheckResult::unhealthy(format!("GET {url} returned {}", resp.status())),
        Err(e) => CheckResult::unhealthy(format!("GET {url} failed: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Aggregate status
// ---------------------------------------------------------------------------

fn aggregate_status(checks: &HealthChecks) -> HealthStatus {
    if !checks.cache.ok {
        HealthStatus::Unhealthy
    } else if !checks.upstream.ok {
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    }
}

// ---------------------------------------------------------------------------
// Axum handler
// ---------------------------------------------------------------------------

/// `GET /healthz` handler.  Returns 200 on Ok/Degraded, 503 on Unhealthy.
pub async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let (cache, upstream) = tokio::join!(
        check_cache(state.cache.as_ref()),
        check_upstream(&state.http_client, &state.config.upstream.api_url),
    );

    let checks = HealthChecks { cache, upstream };
    let status = aggregate_status(&checks);
    let body = HealthResponse { status, checks };

    let http_status = match status {
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (http_status, Json(body))
}
