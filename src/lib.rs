// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod cache;
pub mod collector;
pub mod config;
pub mod dispatch;
pub mod metrics;
pub mod retry;
pub mod sources;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::cache::{BundleCache, CacheKey, TtlCache};
pub use crate::collector::{CacheStatus, CollectError, IntelligenceCollector};
pub use crate::config::{AppConfig, CollectorConfig, SourcesConfig};
pub use crate::sources::{DynAdapter, FetchContext, SourceAdapter};
pub use crate::types::{
    BatchAttempt, IntelligenceBundle, SourceError, SourceKind, SourcePayload, SourceResult,
};
