mod cache;
mod config;
mod forge;
mod health;
mod http;
mod metrics;
mod resolve;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::cache::{KeyDbCache, MemoryCache, MetadataCache};
use crate::config::{CacheBackend, Config};
use crate::forge::{GitHubClient, RepoMetadataSource};
use crate::metrics::MetricsRegistry;
use crate::resolve::{CacheTtls, Resolver};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "ghuc", about = "Short-path redirector for raw GitHub files")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "/etc/ghuc/config.yaml")]
    config: String,
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Global state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<dyn MetadataCache>,
    pub metrics: MetricsRegistry,
    /// Plain client for health checks; the resolver owns its own handle.
    pub http_client: reqwest::Client,
    pub resolver: Arc<Resolver>,
}

// ---------------------------------------------------------------------------
// Cache setup
// ---------------------------------------------------------------------------

async fn build_cache(config: &Config) -> Result<Arc<dyn MetadataCache>> {
    match config.cache.backend {
        CacheBackend::Keydb => {
            let keydb = config
                .keydb
                .as_ref()
                .context("cache.backend is keydb but no keydb section is configured")?;
            let cache = KeyDbCache::connect(keydb).await?;
            tracing::info!(endpoint = %keydb.endpoint, "KeyDB metadata cache initialised");
            Ok(Arc::new(cache))
        }
        CacheBackend::Memory => {
            tracing::warn!("using in-process metadata cache; entries are lost on restart");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP server (axum)
// ---------------------------------------------------------------------------

async fn run_http_server(state: AppState) -> Result<()> {
    let app = http::handler::create_router(Arc::new(state.clone()));

    let listen_addr: std::net::SocketAddr = state
        .config
        .proxy
        .http_listen
        .parse()
        .context("invalid http_listen address")?;

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {listen_addr}"))?;

    tracing::info!(%listen_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Graceful shutdown
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // ---- CLI ----
    let cli = Cli::parse();

    // ---- Config ----
    let config = config::load_config(&cli.config)?;
    let config = Arc::new(config);

    // ---- Tracing ----
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!(config_path = %cli.config, "starting ghuc");

    // ---- Infrastructure clients ----
    let cache = build_cache(&config).await?;

    let http_client = reqwest::Client::builder()
        .user_agent(&config.upstream.user_agent)
        .timeout(config.upstream.request_timeout())
        .build()
        .context("failed to build reqwest client")?;

    // ---- Metrics ----
    let metrics = MetricsRegistry::new();

    // ---- Upstream + resolver ----
    let source: Arc<dyn RepoMetadataSource> = Arc::new(GitHubClient::new(
        &config.upstream,
        http_client.clone(),
        metrics.clone(),
    ));
    tracing::info!(api_url = %config.upstream.api_url, raw_url = %config.upstream.raw_url, "upstream client initialised");

    let resolver = Arc::new(Resolver::new(
        Arc::clone(&cache),
        source,
        CacheTtls::from(&config.cache),
        metrics.clone(),
    ));

    // ---- App state ----
    let state = AppState {
        config: Arc::clone(&config),
        cache,
        metrics,
        http_client,
        resolver,
    };

    // ---- Serve until shutdown, then flush pending cache write-backs ----
    serve(state).await?;

    tracing::info!("ghuc shut down cleanly");
    Ok(())
}

/// Run the HTTP server, drain write-backs, then report the server's result so
/// a failed bind exits non-zero.
async fn serve(state: AppState) -> Result<()> {
    let resolver = Arc::clone(&state.resolver);
    let served = run_http_server(state).await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "HTTP server failed");
    }
    resolver.drain().await;
    served
}
