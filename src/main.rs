//! Market intelligence collector, binary entrypoint.
//! Loads config, wires the HTTP adapters, cache and collector, and serves
//! the Axum router.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use market_intel_collector::api::{self, AppState};
use market_intel_collector::cache::{spawn_sweeper, TtlCache};
use market_intel_collector::config::AppConfig;
use market_intel_collector::metrics::Metrics;
use market_intel_collector::sources::build_http_adapters;
use market_intel_collector::IntelligenceCollector;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Compact logs by default, JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("collector=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading collector config")?;

    // Recorder first, so series descriptions land in the exporter.
    let metrics = Metrics::init(cfg.collector.cache_ttl_seconds)?;

    let cache = Arc::new(TtlCache::new(
        cfg.collector.cache_ttl(),
        cfg.collector.cache_max_entries,
    ));
    let _sweeper = spawn_sweeper(Arc::clone(&cache), cfg.collector.cache_ttl() / 4);

    let adapters = build_http_adapters(&cfg.sources).context("building source adapters")?;
    let collector = IntelligenceCollector::new(cfg.collector.clone(), cache, adapters)
        .context("wiring collector")?;

    let state = AppState::new(Arc::new(collector));
    let shutdown = state.shutdown.clone();
    let app = api::router(state).merge(metrics.router());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(target: "collector", %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!(target: "collector", "shutting down");
            shutdown.cancel();
        })
        .await
        .context("serving http")?;
    Ok(())
}
