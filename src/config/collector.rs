// src/config/collector.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::SourceKind;

/// Collector tuning knobs. Every field has a default, so partial files work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Cache entry lifetime.
    pub cache_ttl_seconds: u64,
    /// Overall per-attempt timeout.
    pub batch_deadline_seconds: u64,
    /// Individual adapter timeout.
    pub per_source_timeout_seconds: u64,
    /// Dispatcher worker ceiling.
    pub max_concurrent_sources: usize,
    /// Retry trigger threshold.
    pub min_successful_sources: usize,
    /// Retry ceiling (total attempts, including the first).
    pub max_attempts: u32,
    /// First inter-attempt delay; doubles on every further retry.
    pub retry_backoff_seconds: u64,
    /// Publishing threshold for cache writes.
    pub min_sources_to_cache: usize,
    /// Optional ceiling on cached entries (oldest evicted first).
    pub cache_max_entries: Option<usize>,
    /// Keep earlier successes and only re-run failed sources on retry.
    pub merge_partial_successes: bool,
    /// Per-kind weights for the confidence mean (missing kinds weigh 1.0).
    pub source_weights: BTreeMap<SourceKind, f64>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 1800,
            batch_deadline_seconds: 30,
            per_source_timeout_seconds: 10,
            max_concurrent_sources: 6,
            min_successful_sources: 3,
            max_attempts: 3,
            retry_backoff_seconds: 1,
            min_sources_to_cache: 3,
            cache_max_entries: None,
            merge_partial_successes: false,
            source_weights: BTreeMap::new(),
        }
    }
}

impl CollectorConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn batch_deadline(&self) -> Duration {
        Duration::from_secs(self.batch_deadline_seconds)
    }

    pub fn per_source_timeout(&self) -> Duration {
        Duration::from_secs(self.per_source_timeout_seconds)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_seconds)
    }

    /// Replace nonsensical values with defaults and keep timeouts nested.
    pub fn sanitize(&mut self) {
        let d = Self::default();
        if self.cache_ttl_seconds == 0 {
            self.cache_ttl_seconds = d.cache_ttl_seconds;
        }
        if self.batch_deadline_seconds == 0 {
            self.batch_deadline_seconds = d.batch_deadline_seconds;
        }
        if self.per_source_timeout_seconds == 0 {
            self.per_source_timeout_seconds = d.per_source_timeout_seconds;
        }
        if self.per_source_timeout_seconds > self.batch_deadline_seconds {
            self.per_source_timeout_seconds = self.batch_deadline_seconds;
        }
        if self.max_concurrent_sources == 0 {
            self.max_concurrent_sources = d.max_concurrent_sources;
        }
        if self.max_attempts == 0 {
            self.max_attempts = d.max_attempts;
        }
        if self.cache_max_entries == Some(0) {
            self.cache_max_entries = None;
        }
        self.source_weights
            .retain(|_, w| w.is_finite() && *w >= 0.0);
    }

    /// Apply `COLLECTOR_*` env overrides on top of file values.
    /// Unparsable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        override_from_env("COLLECTOR_CACHE_TTL_SECONDS", &mut self.cache_ttl_seconds);
        override_from_env(
            "COLLECTOR_BATCH_DEADLINE_SECONDS",
            &mut self.batch_deadline_seconds,
        );
        override_from_env(
            "COLLECTOR_PER_SOURCE_TIMEOUT_SECONDS",
            &mut self.per_source_timeout_seconds,
        );
        override_from_env(
            "COLLECTOR_MAX_CONCURRENT_SOURCES",
            &mut self.max_concurrent_sources,
        );
        override_from_env(
            "COLLECTOR_MIN_SUCCESSFUL_SOURCES",
            &mut self.min_successful_sources,
        );
        override_from_env("COLLECTOR_MAX_ATTEMPTS", &mut self.max_attempts);
        override_from_env(
            "COLLECTOR_RETRY_BACKOFF_SECONDS",
            &mut self.retry_backoff_seconds,
        );
        override_from_env(
            "COLLECTOR_MIN_SOURCES_TO_CACHE",
            &mut self.min_sources_to_cache,
        );
        override_from_env(
            "COLLECTOR_MERGE_PARTIAL_SUCCESSES",
            &mut self.merge_partial_successes,
        );
        if let Ok(raw) = std::env::var("COLLECTOR_CACHE_MAX_ENTRIES") {
            match raw.trim().parse::<usize>() {
                Ok(n) => self.cache_max_entries = Some(n),
                Err(_) => tracing::warn!(
                    var = "COLLECTOR_CACHE_MAX_ENTRIES",
                    value = %raw,
                    "ignoring unparsable env override"
                ),
            }
        }
    }
}

fn override_from_env<T: std::str::FromStr>(var: &str, slot: &mut T) {
    let Ok(raw) = std::env::var(var) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(var, value = %raw, "ignoring unparsable env override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = CollectorConfig::default();
        assert_eq!(c.cache_ttl(), Duration::from_secs(1800));
        assert_eq!(c.batch_deadline(), Duration::from_secs(30));
        assert_eq!(c.per_source_timeout(), Duration::from_secs(10));
        assert_eq!(c.max_concurrent_sources, 6);
        assert_eq!(c.min_successful_sources, 3);
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.retry_backoff(), Duration::from_secs(1));
        assert_eq!(c.min_sources_to_cache, 3);
        assert!(!c.merge_partial_successes);
    }

    #[test]
    fn sanitize_fixes_zeroes_and_nesting() {
        let mut c = CollectorConfig {
            cache_ttl_seconds: 0,
            batch_deadline_seconds: 5,
            per_source_timeout_seconds: 20,
            max_concurrent_sources: 0,
            max_attempts: 0,
            cache_max_entries: Some(0),
            ..CollectorConfig::default()
        };
        c.source_weights.insert(SourceKind::News, f64::NAN);
        c.source_weights.insert(SourceKind::Stock, 2.0);
        c.sanitize();
        assert_eq!(c.cache_ttl_seconds, 1800);
        assert_eq!(c.per_source_timeout_seconds, 5);
        assert_eq!(c.max_concurrent_sources, 6);
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.cache_max_entries, None);
        assert_eq!(c.source_weights.len(), 1);
    }
}
