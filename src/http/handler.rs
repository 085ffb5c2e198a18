//! Main axum router and HTTP request handlers.
//!
//! Routes:
//! - `GET  /favicon.ico`                          - Empty 200
//! - `GET  /healthz`                              - Health check
//! - `GET  /metrics`                              - Prometheus metrics
//! - `GET  /:user/:repo{@:version}?/:path(.*)`    - Resolve, then redirect
//!   (`307`) or render a preview page for `text/html` clients

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tracing::{error, info, instrument, warn};

use crate::metrics::Outcome;
use crate::resolve::ResolutionError;
use crate::AppState;

use super::accept::prefers_html;
use super::preview::{error_page, preview_page};
use super::request::parse_request_path;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum [`Router`] with all HTTP routes and shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/favicon.ico", get(handle_favicon))
        .route("/healthz", get(handle_health))
        .route("/metrics", get(handle_metrics))
        // Everything else is a resolution request (or malformed).
        .fallback(handle_resolve)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /:user/:repo{@:version}?/:path(.*)`
///
/// Resolves the request and answers with a temporary redirect to the CDN, or
/// with a preview page when the client prefers `text/html`.
#[instrument(skip_all, fields(%method, path = %uri.path()))]
async fn handle_resolve(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD")],
            "Method Not Allowed",
        )
            .into_response();
    }

    let html = wants_html(&headers);
    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let result = match parse_request_path(uri.path()) {
        Ok(request) => state.resolver.resolve(&request, credential).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(target) => {
            state.metrics.metrics.record_outcome(Outcome::Resolved);
            let raw_url = target.raw_url(&state.config.upstream.raw_url);
            info!(%raw_url, html, "resolved");
            if html {
                Html(preview_page(&target, &raw_url)).into_response()
            } else {
                Redirect::temporary(&raw_url).into_response()
            }
        }
        Err(error) => {
            state.metrics.metrics.record_outcome(error.outcome());
            AppError { error, html }.into_response()
        }
    }
}

/// `GET /favicon.ico`
async fn handle_favicon() -> StatusCode {
    StatusCode::OK
}

/// `GET /healthz`
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health_state = crate::health::HealthState {
        config: Arc::clone(&state.config),
        cache: Arc::clone(&state.cache),
        http_client: state.http_client.clone(),
    };
    crate::health::health_handler(State(health_state)).await
}

/// `GET /metrics`
///
/// Returns Prometheus metrics collected by the service.
async fn handle_metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.encode() {
        Ok(buf) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )],
            buf,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Browsers get HTML; `fetch`, `curl` and module loaders (`*/*`) get the
/// redirect.
fn wants_html(headers: &HeaderMap) -> bool {
    prefers_html(headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()))
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A [`ResolutionError`] rendered for the negotiated content type.
#[derive(Debug)]
pub struct AppError {
    error: ResolutionError,
    html: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.error.status();
        match &self.error {
            ResolutionError::Internal(err) => error!(error = %err, "resolution failed"),
            ResolutionError::Upstream { .. } => warn!(%status, "upstream error passed through"),
            other => info!(%status, reason = %other, "request rejected"),
        }

        let message = self.error.user_message();
        if self.html {
            (status, Html(error_page(&message))).into_response()
        } else {
            (status, message).into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use reqwest::StatusCode as UpstreamStatus;
    use tower::ServiceExt;

    use super::*;
    use crate::cache::{MemoryCache, MetadataCache};
    use crate::config::parse_config;
    use crate::forge::RepoMetadataSource;
    use crate::metrics::MetricsRegistry;
    use crate::resolve::testing::ScriptedSource;
    use crate::resolve::{CacheTtls, Resolver};

    fn router(source: ScriptedSource) -> (Router, Arc<AppState>) {
        let config = Arc::new(parse_config("cache:\n  backend: memory\n").unwrap());
        let metrics = MetricsRegistry::new();
        let cache: Arc<dyn MetadataCache> = Arc::new(MemoryCache::new());
        let source: Arc<dyn RepoMetadataSource> = Arc::new(source);
        let resolver = Resolver::new(
            Arc::clone(&cache),
            source,
            CacheTtls::from(&config.cache),
            metrics.clone(),
        );
        let state = Arc::new(AppState {
            config,
            cache,
            metrics,
            http_client: reqwest::Client::new(),
            resolver: Arc::new(resolver),
        });
        (create_router(Arc::clone(&state)), state)
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let resp = router.oneshot(request).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn redirects_to_raw_url() {
        let (app, _) = router(ScriptedSource::with_default_branch("main"));

        let (status, headers, _) = send(app, get("/acme/lib@1.2.3/src/mod.ts")).await;

        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            headers.get(header::LOCATION).unwrap(),
            "https://raw.githubusercontent.com/acme/lib/v1.2.3/src/mod.ts"
        );
    }

    #[tokio::test]
    async fn resolves_default_branch_and_entry_file() {
        let (app, state) = router(
            ScriptedSource::with_default_branch("main").with_file("main", "mod.ts"),
        );

        let (status, headers, _) = send(app, get("/acme/lib")).await;
        state.resolver.drain().await;

        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            headers.get(header::LOCATION).unwrap(),
            "https://raw.githubusercontent.com/acme/lib/main/mod.ts"
        );
        assert_eq!(
            state.cache.get("ghuc:path:acme/lib/").await.unwrap().as_deref(),
            Some("mod.ts")
        );
    }

    #[tokio::test]
    async fn browsers_get_preview_page() {
        let (app, _) = router(ScriptedSource::with_default_branch("main"));
        let request = Request::get("/acme/lib@main/mod.ts")
            .header(header::ACCEPT, "text/html,application/xhtml+xml,*/*;q=0.8")
            .body(Body::empty())
            .unwrap();

        let (status, headers, body) = send(app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert!(headers
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        assert!(body.contains("Showing contents for:"));
        assert!(body.contains("https://raw.githubusercontent.com/acme/lib/main/mod.ts"));
    }

    #[tokio::test]
    async fn html_with_zero_weight_gets_redirect() {
        let (app, _) = router(ScriptedSource::with_default_branch("main"));
        let request = Request::get("/acme/lib@main/mod.ts")
            .header(header::ACCEPT, "text/html;q=0, */*")
            .body(Body::empty())
            .unwrap();

        let (status, headers, _) = send(app, request).await;

        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            headers.get(header::LOCATION).unwrap(),
            "https://raw.githubusercontent.com/acme/lib/main/mod.ts"
        );
    }

    #[tokio::test]
    async fn malformed_path_is_bad_request() {
        let (app, state) = router(ScriptedSource::with_default_branch("main"));

        let (status, _, body) = send(app, get("/just-a-user")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("/:user/:repo{@:version}?/:path(.*)"));
        let metrics = state.metrics.encode().unwrap();
        assert!(metrics.contains("ghuc_resolutions_total{outcome=\"Malformed\"} 1"));
    }

    #[tokio::test]
    async fn malformed_path_for_browser_is_html() {
        let (app, _) = router(ScriptedSource::with_default_branch("main"));
        let request = Request::get("/just-a-user")
            .header(header::ACCEPT, "text/html")
            .body(Body::empty())
            .unwrap();

        let (status, _, body) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("<html>"));
        assert!(body.contains("needs to match pattern"));
    }

    #[tokio::test]
    async fn rate_limit_without_fallback_is_forbidden() {
        let (app, _) = router(ScriptedSource::rate_limited());

        let (status, _, body) = send(app, get("/acme/lib/mod.ts")).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("rate limit"));
        assert!(body.contains("Authorization"));
    }

    #[tokio::test]
    async fn upstream_status_and_body_pass_through() {
        let (app, _) = router(ScriptedSource::failing(
            UpstreamStatus::NOT_FOUND,
            r#"{"message":"Not Found"}"#,
        ));

        let (status, _, body) = send(app, get("/acme/missing/mod.ts")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, r#"{"message":"Not Found"}"#);
    }

    #[tokio::test]
    async fn credential_is_forwarded() {
        let source = Arc::new(ScriptedSource::with_default_branch("main"));
        let config = Arc::new(parse_config("cache:\n  backend: memory\n").unwrap());
        let cache: Arc<dyn MetadataCache> = Arc::new(MemoryCache::new());
        let metrics = MetricsRegistry::new();
        let resolver = Resolver::new(
            Arc::clone(&cache),
            Arc::clone(&source) as Arc<dyn RepoMetadataSource>,
            CacheTtls::from(&config.cache),
            metrics.clone(),
        );
        let app = create_router(Arc::new(AppState {
            config,
            cache,
            metrics,
            http_client: reqwest::Client::new(),
            resolver: Arc::new(resolver),
        }));
        let request = Request::get("/acme/private/mod.ts")
            .header(header::AUTHORIZATION, "token s3cret")
            .body(Body::empty())
            .unwrap();

        let (status, _, _) = send(app, request).await;

        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(source.last_credential().as_deref(), Some("token s3cret"));
    }

    #[tokio::test]
    async fn non_get_is_rejected() {
        let (app, _) = router(ScriptedSource::with_default_branch("main"));
        let request = Request::post("/acme/lib/mod.ts")
            .body(Body::empty())
            .unwrap();

        let (status, headers, _) = send(app, request).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(headers.get(header::ALLOW).unwrap(), "GET, HEAD");
    }

    #[tokio::test]
    async fn favicon_is_empty_ok() {
        let (app, _) = router(ScriptedSource::with_default_branch("main"));

        let (status, _, body) = send(app, get("/favicon.ico")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_openmetrics() {
        let (app, _) = router(ScriptedSource::with_default_branch("main"));

        let (status, headers, body) = send(app, get("/metrics")).await;

        assert_eq!(status, StatusCode::OK);
        assert!(headers
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("application/openmetrics-text"));
        assert!(body.contains("ghuc_cache_write_failures_total"));
    }
}
