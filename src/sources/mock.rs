// src/sources/mock.rs
//! Deterministic adapters for tests and local runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::sources::{FetchContext, SourceAdapter};
use crate::types::{SourceError, SourceKind, SourcePayload, SourceResult};

/// Returns scripted results (then a fixed fallback) after an optional delay.
/// Counts calls and records when each call started.
pub struct StaticAdapter {
    kind: SourceKind,
    fallback: SourceResult,
    script: Mutex<VecDeque<SourceResult>>,
    delay: Duration,
    calls: AtomicUsize,
    started: Mutex<Vec<Instant>>,
}

impl StaticAdapter {
    pub fn new(kind: SourceKind, result: SourceResult) -> Self {
        Self {
            kind,
            fallback: result,
            script: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(kind: SourceKind, confidence: f64) -> Self {
        let data = serde_json::json!({ "source": kind.as_str() });
        Self::new(kind, Ok(SourcePayload::new(data, confidence)))
    }

    pub fn failing(kind: SourceKind, err: SourceError) -> Self {
        Self::new(kind, Err(err))
    }

    /// Sleep this long before answering (cancellation still wins).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Results returned by the first calls, in order, before the fallback.
    pub fn with_script(self, results: Vec<SourceResult>) -> Self {
        if let Ok(mut q) = self.script.lock() {
            q.extend(results);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_starts(&self) -> Vec<Instant> {
        self.started.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    fn kind(&self) -> SourceKind {
        self.kind.clone()
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        _industry: &str,
        _competitors: &[String],
    ) -> SourceResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut v) = self.started.lock() {
            v.push(Instant::now());
        }
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| self.fallback.clone());

        if !self.delay.is_zero() {
            ctx.run(tokio::time::sleep(self.delay)).await?;
        }
        next
    }
}
