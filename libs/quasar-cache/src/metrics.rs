//! Cache metrics for observability

use prometheus::{CounterVec, Opts, Registry};
use std::sync::OnceLock;

static METRICS: OnceLock<CacheMetricsInner> = OnceLock::new();

struct CacheMetricsInner {
    hits: CounterVec,
    misses: CounterVec,
    writes: CounterVec,
}

impl CacheMetricsInner {
    fn new() -> Self {
        Self {
            hits: CounterVec::new(
                Opts::new("quasar_cache_hits_total", "Total cache hits"),
                &["prefix"],
            )
            .expect("valid metric definition"),
            misses: CounterVec::new(
                Opts::new("quasar_cache_misses_total", "Total cache misses"),
                &["prefix"],
            )
            .expect("valid metric definition"),
            writes: CounterVec::new(
                Opts::new("quasar_cache_writes_total", "Total cache writes"),
                &["prefix"],
            )
            .expect("valid metric definition"),
        }
    }
}

/// Process-wide cache counters, labelled by key prefix.
#[derive(Clone, Default)]
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Register the counters with a Prometheus registry.
    pub fn register(registry: &Registry) -> prometheus::Result<()> {
        let inner = METRICS.get_or_init(CacheMetricsInner::new);
        registry.register(Box::new(inner.hits.clone()))?;
        registry.register(Box::new(inner.misses.clone()))?;
        registry.register(Box::new(inner.writes.clone()))?;
        Ok(())
    }

    pub fn record_hit(&self, key: &str) {
        let inner = METRICS.get_or_init(CacheMetricsInner::new);
        inner.hits.with_label_values(&[Self::prefix(key)]).inc();
    }

    pub fn record_miss(&self, key: &str) {
        let inner = METRICS.get_or_init(CacheMetricsInner::new);
        inner.misses.with_label_values(&[Self::prefix(key)]).inc();
    }

    pub fn record_write(&self, key: &str) {
        let inner = METRICS.get_or_init(CacheMetricsInner::new);
        inner.writes.with_label_values(&[Self::prefix(key)]).inc();
    }

    fn prefix(key: &str) -> &str {
        key.split(':').next().unwrap_or(key)
    }
}
