use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static DESCRIBED: OnceCell<()> = OnceCell::new();

/// Register help text for every collector series. Safe to call repeatedly.
pub fn ensure_metrics_described() {
    DESCRIBED.get_or_init(|| {
        describe_counter!("collector_cache_hits_total", "Bundles served from the cache");
        describe_counter!("collector_cache_misses_total", "Requests that had to collect");
        describe_counter!("collector_cache_writes_total", "Bundles published to the cache");
        describe_counter!("collector_attempts_total", "Batch attempts dispatched");
        describe_counter!("collector_retries_total", "Batch attempts beyond the first");
        describe_counter!(
            "collector_source_results_total",
            "Per-source outcomes by kind and outcome"
        );
        describe_histogram!(
            "collector_batch_duration_ms",
            Unit::Milliseconds,
            "Wall time of one batch attempt"
        );
        describe_histogram!(
            "collector_bundle_confidence",
            "Overall confidence of assembled bundles"
        );
        describe_gauge!(
            "collector_cache_ttl_seconds",
            Unit::Seconds,
            "Configured absolute cache TTL"
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the cache TTL gauge.
    pub fn init(ttl_secs: u64) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("installing prometheus recorder")?;

        ensure_metrics_described();
        gauge!("collector_cache_ttl_seconds").set(ttl_secs as f64);

        Ok(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus text format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
