// src/dispatch.rs
//! # Bounded fan-out dispatcher
//! Runs every adapter of one batch concurrently under a worker ceiling,
//! records results as they land and marks stragglers as timed out when
//! the batch deadline fires. The dispatcher itself never fails.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::sources::{DynAdapter, FetchContext};
use crate::types::{BatchAttempt, SourceError, SourceKind, SourceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatcher {
    max_concurrent: usize,
    per_source_timeout: Duration,
    batch_deadline: Duration,
}

impl Dispatcher {
    pub fn new(max_concurrent: usize, per_source_timeout: Duration, batch_deadline: Duration) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            per_source_timeout,
            batch_deadline,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run one batch. Returns exactly one result per distinct adapter kind;
    /// if two adapters share a kind, the first one registered wins.
    pub async fn run_batch(
        &self,
        cancel: &CancellationToken,
        attempt: u32,
        adapters: &[DynAdapter],
        industry: &str,
        competitors: &[String],
    ) -> BatchAttempt {
        let started = Instant::now();
        let batch_deadline = started + self.batch_deadline;
        let batch_token = cancel.child_token();
        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let industry: Arc<str> = Arc::from(industry);
        let competitors: Arc<[String]> = Arc::from(competitors.to_vec());

        let mut pending: BTreeSet<SourceKind> = BTreeSet::new();
        let mut task_kinds: HashMap<tokio::task::Id, SourceKind> = HashMap::new();
        let mut set: JoinSet<(SourceKind, SourceResult)> = JoinSet::new();

        for adapter in adapters {
            let kind = adapter.kind();
            if !pending.insert(kind.clone()) {
                tracing::warn!(target: "dispatch", %kind, "duplicate adapter kind ignored");
                continue;
            }
            let adapter = Arc::clone(adapter);
            let permits = Arc::clone(&permits);
            let token = batch_token.clone();
            let industry = Arc::clone(&industry);
            let competitors = Arc::clone(&competitors);
            let per_source = self.per_source_timeout;
            let task_kind = kind.clone();

            let handle = set.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return (task_kind, Err(SourceError::Timeout("cancelled before start".into())));
                    }
                    p = permits.acquire_owned() => match p {
                        Ok(p) => p,
                        Err(_) => {
                            return (task_kind, Err(SourceError::Timeout("worker pool closed".into())));
                        }
                    },
                };
                // The unit's own clock starts once it holds a worker slot.
                let (deadline, budget) = unit_budget(Instant::now(), per_source, batch_deadline);
                let ctx = FetchContext::new(deadline, token);
                let res = match tokio::time::timeout_at(
                    deadline,
                    adapter.fetch(&ctx, &industry, &competitors),
                )
                .await
                {
                    Ok(r) => r,
                    Err(_) => Err(SourceError::Timeout(format!(
                        "no answer within {}ms",
                        budget.as_millis()
                    ))),
                };
                (task_kind, res)
            });
            task_kinds.insert(handle.id(), kind);
        }

        let mut results: BTreeMap<SourceKind, SourceResult> = BTreeMap::new();
        let deadline_sleep = tokio::time::sleep_until(batch_deadline);
        tokio::pin!(deadline_sleep);

        while !set.is_empty() {
            tokio::select! {
                joined = set.join_next_with_id() => {
                    match joined {
                        Some(Ok((_, (kind, res)))) => {
                            record(&mut results, kind, res);
                        }
                        Some(Err(e)) => {
                            // A panicking adapter becomes a transport failure.
                            if let Some(kind) = task_kinds.get(&e.id()).cloned() {
                                let msg = if e.is_panic() { "adapter panicked" } else { "adapter task aborted" };
                                record(&mut results, kind, Err(SourceError::Transport(msg.into())));
                            }
                        }
                        None => break,
                    }
                }
                _ = &mut deadline_sleep => {
                    tracing::warn!(
                        target: "dispatch",
                        attempt,
                        outstanding = set.len(),
                        "batch deadline elapsed"
                    );
                    break;
                }
                _ = cancel.cancelled() => {
                    tracing::info!(target: "dispatch", attempt, "batch cancelled by caller");
                    break;
                }
            }
        }

        // Abandon stragglers; anything they return later is dropped with the set.
        batch_token.cancel();
        set.abort_all();
        drop(set);

        for kind in pending {
            if !results.contains_key(&kind) {
                let reason = if cancel.is_cancelled() {
                    "cancelled"
                } else {
                    "batch deadline elapsed"
                };
                record(&mut results, kind, Err(SourceError::Timeout(reason.into())));
            }
        }

        let duration = started.elapsed();
        histogram!("collector_batch_duration_ms").record(duration.as_secs_f64() * 1_000.0);

        let attempt = BatchAttempt {
            attempt,
            duration,
            results,
        };
        tracing::debug!(
            target: "dispatch",
            attempt = attempt.attempt,
            ok = attempt.ok_count(),
            total = attempt.results.len(),
            ms = duration.as_millis() as u64,
            "batch finished"
        );
        attempt
    }
}

/// Deadline for one unit started at `start`, and the budget it actually got.
fn unit_budget(start: Instant, per_source: Duration, batch_deadline: Instant) -> (Instant, Duration) {
    let deadline = (start + per_source).min(batch_deadline);
    (deadline, deadline.saturating_duration_since(start))
}

fn record(results: &mut BTreeMap<SourceKind, SourceResult>, kind: SourceKind, res: SourceResult) {
    let outcome = match &res {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(target: "dispatch", %kind, error = %e, "source failed");
            e.label()
        }
    };
    counter!(
        "collector_source_results_total",
        "kind" => kind.as_str().to_string(),
        "outcome" => outcome
    )
    .increment(1);
    results.entry(kind).or_insert(res);
}
