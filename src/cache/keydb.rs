//! KeyDB / Redis backed [`MetadataCache`].
//!
//! `keydb.endpoint` may be `host`, `host:port`, `host:port/db` or a full
//! `redis://` / `rediss://` URL; fred's URL parser fills in the rest.

use std::time::Duration;

use anyhow::{Context, Result};
use fred::clients::Pool;
use fred::interfaces::{ClientLike, KeysInterface};
use fred::types::config::{Config as FredConfig, ReconnectPolicy, TlsConnector};
use fred::types::{Builder, Expiration};
use tracing::{info, trace};

use crate::config::KeyDbConfig;

use super::MetadataCache;

const POOL_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct KeyDbCache {
    pool: Pool,
}

impl KeyDbCache {
    /// Open a pool against `config.endpoint` and fail unless it answers
    /// `PING`.
    pub async fn connect(config: &KeyDbConfig) -> Result<Self> {
        let mut builder = Builder::from_config(fred_config(config)?);
        // Retry forever, backing off from 100ms up to 30s.
        builder.set_policy(ReconnectPolicy::new_exponential(0, 100, 30_000, 2));

        let pool = builder
            .build_pool(POOL_SIZE)
            .context("failed to build KeyDB pool")?;
        pool.init()
            .await
            .with_context(|| format!("failed to connect to KeyDB at {}", config.endpoint))?;

        let cache = Self { pool };
        cache.ping().await?;
        info!(endpoint = %config.endpoint, tls = config.tls, pool_size = POOL_SIZE, "KeyDB reachable");
        Ok(cache)
    }
}

#[async_trait::async_trait]
impl MetadataCache for KeyDbCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let val: Option<String> = self.pool.get(key).await.context("KeyDB GET failed")?;
        if val.is_some() {
            trace!(key, "metadata cache hit");
        }
        Ok(val)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl_secs = ttl.as_secs().max(1);
        let _: () = self
            .pool
            .set(
                key,
                value,
                Some(Expiration::EX(ttl_secs as i64)),
                None,
                false,
            )
            .await
            .context("KeyDB SET failed")?;
        trace!(key, ttl_secs, "metadata cache set");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let _: String = self.pool.ping(None).await.context("KeyDB PING failed")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Connection settings
// ---------------------------------------------------------------------------

/// Translate [`KeyDbConfig`] into a fred client config.  TLS follows
/// `keydb.tls`, not the URL scheme; the password comes from the environment.
fn fred_config(config: &KeyDbConfig) -> Result<FredConfig> {
    let url = endpoint_url(&config.endpoint);
    let mut fred_config = FredConfig::from_url(&url)
        .with_context(|| format!("invalid keydb.endpoint {:?}", config.endpoint))?;

    fred_config.tls = if config.tls {
        Some(TlsConnector::default_rustls()?.into())
    } else {
        None
    };
    if let Ok(token) = std::env::var(&config.auth_token_env) {
        fred_config.password = Some(token);
    }
    Ok(fred_config)
}

/// Normalize an endpoint to a plain `redis://` URL.
fn endpoint_url(endpoint: &str) -> String {
    let bare = endpoint
        .strip_prefix("rediss://")
        .or_else(|| endpoint.strip_prefix("redis://"))
        .unwrap_or(endpoint);
    format!("redis://{bare}")
}

#[cfg(test)]
mod tests {
    use fred::types::config::ServerConfig;

    use super::*;

    fn keydb(endpoint: &str) -> KeyDbConfig {
        KeyDbConfig {
            endpoint: endpoint.to_string(),
            tls: false,
            auth_token_env: "GHUC_TEST_KEYDB_TOKEN_UNSET".to_string(),
        }
    }

    fn host_port(config: &FredConfig) -> (String, u16) {
        match &config.server {
            ServerConfig::Centralized { server } => (server.host.to_string(), server.port),
            other => panic!("expected centralized server, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_schemes_are_normalized() {
        assert_eq!(endpoint_url("keydb.local:6380"), "redis://keydb.local:6380");
        assert_eq!(endpoint_url("redis://keydb.local"), "redis://keydb.local");
        assert_eq!(endpoint_url("rediss://keydb.local:6380"), "redis://keydb.local:6380");
    }

    #[test]
    fn explicit_port() {
        let config = fred_config(&keydb("keydb.local:6380")).unwrap();
        assert_eq!(host_port(&config), ("keydb.local".to_string(), 6380));
        assert!(config.tls.is_none());
        assert!(config.password.is_none());
    }

    #[test]
    fn default_port() {
        let config = fred_config(&keydb("rediss://keydb.local")).unwrap();
        assert_eq!(host_port(&config), ("keydb.local".to_string(), 6379));
    }

    #[test]
    fn database_index() {
        let config = fred_config(&keydb("keydb.local:6381/2")).unwrap();
        assert_eq!(host_port(&config), ("keydb.local".to_string(), 6381));
        assert_eq!(config.database, Some(2));
    }

    #[test]
    fn bad_port_is_rejected() {
        assert!(fred_config(&keydb("keydb.local:nope")).is_err());
    }
}
