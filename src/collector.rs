// src/collector.rs
//! # Intelligence collector
//! Entry point for callers: validate input, consult the cache, and on a miss
//! run the retry coordinator, aggregate, assemble a bundle and publish it to
//! the cache when enough sources contributed.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;

use crate::aggregate::aggregate;
use crate::cache::{BundleCache, CacheKey};
use crate::config::CollectorConfig;
use crate::dispatch::Dispatcher;
use crate::metrics::ensure_metrics_described;
use crate::retry::{self, RetryPolicy};
use crate::sources::DynAdapter;
use crate::types::{IntelligenceBundle, SourceKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectError {
    #[error("industry must not be empty")]
    EmptyIndustry,
    #[error("no source adapters registered")]
    NoAdapters,
    #[error("adapter kind registered twice: {0}")]
    DuplicateAdapter(SourceKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

pub struct IntelligenceCollector {
    config: CollectorConfig,
    cache: Arc<dyn BundleCache>,
    adapters: Vec<DynAdapter>,
    dispatcher: Dispatcher,
    policy: RetryPolicy,
}

impl IntelligenceCollector {
    pub fn new(
        mut config: CollectorConfig,
        cache: Arc<dyn BundleCache>,
        adapters: Vec<DynAdapter>,
    ) -> Result<Self, CollectError> {
        if adapters.is_empty() {
            return Err(CollectError::NoAdapters);
        }
        let mut seen = BTreeSet::new();
        for a in &adapters {
            let kind = a.kind();
            if !seen.insert(kind.clone()) {
                return Err(CollectError::DuplicateAdapter(kind));
            }
        }

        config.sanitize();
        if config.min_successful_sources > adapters.len() {
            tracing::warn!(
                target: "collector",
                configured = config.min_successful_sources,
                adapters = adapters.len(),
                "min_successful_sources exceeds adapter count, clamping"
            );
            config.min_successful_sources = adapters.len();
        }

        ensure_metrics_described();

        let dispatcher = Dispatcher::new(
            config.max_concurrent_sources,
            config.per_source_timeout(),
            config.batch_deadline(),
        );
        let policy = RetryPolicy::from_config(&config);

        Ok(Self {
            config,
            cache,
            adapters,
            dispatcher,
            policy,
        })
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn adapter_kinds(&self) -> Vec<SourceKind> {
        self.adapters.iter().map(|a| a.kind()).collect()
    }

    pub async fn collect_intelligence(
        &self,
        cancel: &CancellationToken,
        industry: &str,
        competitors: &[String],
    ) -> Result<Arc<IntelligenceBundle>, CollectError> {
        self.collect_with_status(cancel, industry, competitors)
            .await
            .map(|(bundle, _)| bundle)
    }

    /// Same as [`collect_intelligence`](Self::collect_intelligence) but also
    /// reports whether the bundle came from the cache.
    pub async fn collect_with_status(
        &self,
        cancel: &CancellationToken,
        industry: &str,
        competitors: &[String],
    ) -> Result<(Arc<IntelligenceBundle>, CacheStatus), CollectError> {
        let industry = industry.trim();
        if industry.is_empty() {
            return Err(CollectError::EmptyIndustry);
        }
        let competitors = normalize_competitors(competitors);
        let key = CacheKey::new(industry, &competitors);

        if let Some(hit) = self.cache.get(&key) {
            counter!("collector_cache_hits_total").increment(1);
            tracing::debug!(target: "collector", key = %key, "cache hit");
            return Ok((hit, CacheStatus::Hit));
        }
        counter!("collector_cache_misses_total").increment(1);
        tracing::info!(
            target: "collector",
            key = %key,
            competitors = competitors.len(),
            adapters = self.adapters.len(),
            "cache miss, collecting"
        );

        let attempt = retry::collect(
            cancel,
            &self.dispatcher,
            &self.adapters,
            industry,
            &competitors,
            &self.policy,
        )
        .await;

        let agg = aggregate(&attempt, &self.config.source_weights);
        histogram!("collector_bundle_confidence").record(agg.confidence);

        let bundle = Arc::new(IntelligenceBundle::new(
            industry.to_string(),
            competitors,
            agg.payloads,
            agg.confidence,
            agg.usable,
            Utc::now(),
            attempt.attempt,
        ));

        if bundle.usable_sources() >= self.config.min_sources_to_cache {
            self.cache.put(key.clone(), Arc::clone(&bundle));
            counter!("collector_cache_writes_total").increment(1);
        } else {
            tracing::warn!(
                target: "collector",
                key = %key,
                usable = bundle.usable_sources(),
                needed = self.config.min_sources_to_cache,
                "degraded bundle, not cached"
            );
        }

        tracing::info!(
            target: "collector",
            key = %key,
            usable = bundle.usable_sources(),
            confidence = bundle.confidence(),
            attempts = bundle.attempts(),
            "bundle assembled"
        );
        Ok((bundle, CacheStatus::Miss))
    }
}

/// Trim, drop blanks and case-insensitive duplicates; first spelling wins.
fn normalize_competitors(raw: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    raw.iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty() && seen.insert(c.to_lowercase()))
        .map(str::to_string)
        .collect()
}
