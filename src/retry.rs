// src/retry.rs
//! # Retry coordinator
//! Re-runs whole batches until enough sources succeed or the attempt
//! budget is spent. Exhaustion is not an error: the last attempt is
//! returned and the caller builds a degraded bundle from it.

use std::time::Duration;

use metrics::counter;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::CollectorConfig;
use crate::dispatch::Dispatcher;
use crate::sources::DynAdapter;
use crate::types::BatchAttempt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub min_successful_sources: usize,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    /// Keep successes from earlier attempts and only re-run failed kinds.
    pub merge_partial_successes: bool,
}

impl RetryPolicy {
    pub fn from_config(cfg: &CollectorConfig) -> Self {
        Self {
            min_successful_sources: cfg.min_successful_sources,
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: cfg.retry_backoff(),
            merge_partial_successes: cfg.merge_partial_successes,
        }
    }

    /// Delay before retry number `retry` (0-based): `initial * 2^retry`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }
}

/// Run batches until `ok_count >= min_successful_sources` or attempts run out.
pub async fn collect(
    cancel: &CancellationToken,
    dispatcher: &Dispatcher,
    adapters: &[DynAdapter],
    industry: &str,
    competitors: &[String],
    policy: &RetryPolicy,
) -> BatchAttempt {
    let started = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt_no = 1u32;

    let mut last = dispatcher
        .run_batch(cancel, attempt_no, adapters, industry, competitors)
        .await;
    counter!("collector_attempts_total").increment(1);

    loop {
        let ok = last.ok_count();
        if ok >= policy.min_successful_sources {
            break;
        }
        if attempt_no >= max_attempts {
            tracing::warn!(
                target: "collector",
                attempts = attempt_no,
                ok,
                needed = policy.min_successful_sources,
                "retry budget exhausted, returning partial batch"
            );
            break;
        }

        let delay = policy.backoff_for(attempt_no - 1);
        tracing::info!(
            target: "collector",
            attempt = attempt_no,
            ok,
            needed = policy.min_successful_sources,
            delay_ms = delay.as_millis() as u64,
            "too few sources succeeded, retrying"
        );
        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(delay) => false,
        };
        if cancelled {
            break;
        }

        attempt_no += 1;
        counter!("collector_attempts_total").increment(1);
        counter!("collector_retries_total").increment(1);

        last = if policy.merge_partial_successes {
            rerun_failed(cancel, dispatcher, adapters, industry, competitors, attempt_no, last)
                .await
        } else {
            dispatcher
                .run_batch(cancel, attempt_no, adapters, industry, competitors)
                .await
        };
    }

    if policy.merge_partial_successes {
        last.duration = started.elapsed();
    }
    last
}

/// Dispatch only the kinds that failed in `prev`, carrying its successes forward.
async fn rerun_failed(
    cancel: &CancellationToken,
    dispatcher: &Dispatcher,
    adapters: &[DynAdapter],
    industry: &str,
    competitors: &[String],
    attempt_no: u32,
    prev: BatchAttempt,
) -> BatchAttempt {
    let failed = prev.failed_kinds();
    let subset: Vec<DynAdapter> = adapters
        .iter()
        .filter(|a| failed.contains(&a.kind()))
        .cloned()
        .collect();

    let fresh = dispatcher
        .run_batch(cancel, attempt_no, &subset, industry, competitors)
        .await;

    let mut results = prev.results;
    results.extend(fresh.results);
    BatchAttempt {
        attempt: attempt_no,
        duration: fresh.duration,
        results,
    }
}
