use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Required when `cache.backend` is `keydb`.
    #[serde(default)]
    pub keydb: Option<KeyDbConfig>,
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Root of the repository-metadata API (e.g. `https://api.github.com`).
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Root of the raw-content CDN used for probes and redirect targets.
    #[serde(default = "default_raw_url")]
    pub raw_url: String,
    /// `User-Agent` sent with every upstream request.  GitHub rejects
    /// API calls without one.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-request timeout (seconds) for metadata calls and CDN probes.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            raw_url: default_raw_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_raw_url() -> String {
    "https://raw.githubusercontent.com".to_string()
}

fn default_user_agent() -> String {
    concat!("ghuc/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_request_timeout() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// Proxy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    /// Socket address for the HTTP listener (e.g. `0.0.0.0:8080`).
    #[serde(default = "default_http_listen")]
    pub http_listen: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            http_listen: default_http_listen(),
        }
    }
}

fn default_http_listen() -> String {
    "0.0.0.0:8080".to_string()
}

// ---------------------------------------------------------------------------
// Metadata cache
// ---------------------------------------------------------------------------

/// Where resolved default branches and entry paths are remembered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Shared KeyDB / Redis instance.
    #[default]
    Keydb,
    /// Process-local map.  Lost on restart and not shared between replicas.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    /// TTL (seconds) of `(user, repo) -> default branch` entries.
    #[serde(default = "default_metadata_ttl")]
    pub branch_ttl_secs: u64,
    /// TTL (seconds) of `(user, repo, dir) -> entry file` entries.
    #[serde(default = "default_metadata_ttl")]
    pub path_ttl_secs: u64,
    /// Namespace prepended to every cache key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            branch_ttl_secs: default_metadata_ttl(),
            path_ttl_secs: default_metadata_ttl(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// Two weeks.
fn default_metadata_ttl() -> u64 {
    14 * 24 * 60 * 60
}

fn default_key_prefix() -> String {
    "ghuc".to_string()
}

// ---------------------------------------------------------------------------
// KeyDB / Redis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct KeyDbConfig {
    /// Connection string (e.g. `rediss://keydb.local:6380`).
    pub endpoint: String,
    /// Enable TLS for the KeyDB connection.
    #[serde(default = "bool_true")]
    pub tls: bool,
    /// Name of the environment variable that holds the KeyDB auth token.
    #[serde(default = "default_keydb_auth_env")]
    pub auth_token_env: String,
}

fn bool_true() -> bool {
    true
}

fn default_keydb_auth_env() -> String {
    "KEYDB_AUTH_TOKEN".to_string()
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load and validate a [`Config`] from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    parse_config(&contents)
        .with_context(|| format!("failed to load config file: {}", path.display()))
}

/// Parse and validate a YAML config document.
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = serde_yaml::from_str(contents).context("invalid config YAML")?;
    validate_config(&config)?;
    Ok(config)
}

/// Basic sanity checks that cannot be expressed purely with serde.
fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(
        config.upstream.request_timeout_secs > 0,
        "upstream.request_timeout_secs must be greater than 0"
    );
    anyhow::ensure!(
        config.cache.branch_ttl_secs > 0 && config.cache.path_ttl_secs > 0,
        "cache TTLs must be greater than 0"
    );
    anyhow::ensure!(
        !config.cache.key_prefix.is_empty(),
        "cache.key_prefix must not be empty"
    );
    for (name, url) in [
        ("upstream.api_url", &config.upstream.api_url),
        ("upstream.raw_url", &config.upstream.raw_url),
    ] {
        anyhow::ensure!(
            url.starts_with("http://") || url.starts_with("https://"),
            "{name} must be an http(s) URL, got {url:?}"
        );
    }
    if config.cache.backend == CacheBackend::Keydb {
        anyhow::ensure!(
            config.keydb.is_some(),
            "a `keydb` section is required when cache.backend is keydb"
        );
    }
    Ok(())
}
