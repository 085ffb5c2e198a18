use std::sync::Arc;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: Outcome,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Resolved,
    Upstream,
    Forbidden,
    PathUndiscoverable,
    Malformed,
    Internal,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CacheLabels {
    pub kind: CacheKind,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum CacheKind {
    Branch,
    Path,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct EndpointLabels {
    pub endpoint: Endpoint,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Endpoint {
    RepoMetadata,
    RawHead,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Central container for every Prometheus metric exposed by the service.
pub struct Metrics {
    pub resolutions_total: Family<OutcomeLabels, Counter>,

    pub cache_hits: Family<CacheLabels, Counter>,
    pub cache_misses: Family<CacheLabels, Counter>,
    pub cache_write_failures: Counter,

    pub upstream_api_calls: Family<EndpointLabels, Counter>,
    pub rate_limit_fallbacks: Counter,
    pub upstream_api_rate_limit_remaining: Gauge,
}

impl Metrics {
    /// Create a new [`Metrics`] instance and register every metric with the
    /// supplied `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let resolutions_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "ghuc_resolutions",
            "Resolution requests by outcome",
            resolutions_total.clone(),
        );

        let cache_hits = Family::<CacheLabels, Counter>::default();
        registry.register(
            "ghuc_cache_hits",
            "Metadata cache hits by kind",
            cache_hits.clone(),
        );

        let cache_misses = Family::<CacheLabels, Counter>::default();
        registry.register(
            "ghuc_cache_misses",
            "Metadata cache misses by kind",
            cache_misses.clone(),
        );

        let cache_write_failures = Counter::default();
        registry.register(
            "ghuc_cache_write_failures",
            "Background metadata cache writes that failed",
            cache_write_failures.clone(),
        );

        let upstream_api_calls = Family::<EndpointLabels, Counter>::default();
        registry.register(
            "ghuc_upstream_api_calls",
            "Upstream calls by endpoint",
            upstream_api_calls.clone(),
        );

        let rate_limit_fallbacks = Counter::default();
        registry.register(
            "ghuc_rate_limit_fallbacks",
            "Default-branch lookups answered by CDN probing after an API rate limit",
            rate_limit_fallbacks.clone(),
        );

        let upstream_api_rate_limit_remaining: Gauge = Gauge::default();
        registry.register(
            "ghuc_upstream_api_rate_limit_remaining",
            "Remaining metadata API calls reported by the last response",
            upstream_api_rate_limit_remaining.clone(),
        );

        Self {
            resolutions_total,
            cache_hits,
            cache_misses,
            cache_write_failures,
            upstream_api_calls,
            rate_limit_fallbacks,
            upstream_api_rate_limit_remaining,
        }
    }

    pub fn record_outcome(&self, outcome: Outcome) {
        self.resolutions_total
            .get_or_create(&OutcomeLabels { outcome })
            .inc();
    }

    pub fn record_cache_lookup(&self, kind: CacheKind, hit: bool) {
        let family = if hit {
            &self.cache_hits
        } else {
            &self.cache_misses
        };
        family.get_or_create(&CacheLabels { kind }).inc();
    }

    pub fn record_upstream_call(&self, endpoint: Endpoint) {
        self.upstream_api_calls
            .get_or_create(&EndpointLabels { endpoint })
            .inc();
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Thread-safe wrapper for the metrics registry, used in [`crate::AppState`].
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    /// Build a fresh registry and pre-register all metrics.
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }

    /// Render the registry in OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        prometheus_client::encoding::text::encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}
