// src/sources/mod.rs
//! Source adapters: one pluggable unit per intelligence category.

pub mod competitor;
pub mod funding;
pub mod mock;
pub mod news;
pub mod social;
pub mod stock;
pub mod text;
pub mod web;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::sources::SourcesConfig;
use crate::types::{SourceError, SourceKind, SourceResult};

/// Per-call context: deadline plus cancellation signal.
#[derive(Debug, Clone)]
pub struct FetchContext {
    deadline: Instant,
    cancel: CancellationToken,
}

impl FetchContext {
    pub fn new(deadline: Instant, cancel: CancellationToken) -> Self {
        Self { deadline, cancel }
    }

    /// Context with a timeout from now and a fresh token (handy in tests).
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Instant::now() + timeout, CancellationToken::new())
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Race `fut` against cancellation and the deadline.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, SourceError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SourceError::Timeout("cancelled".into())),
            _ = tokio::time::sleep_until(self.deadline) => {
                Err(SourceError::Timeout("per-source deadline elapsed".into()))
            }
            out = fut => Ok(out),
        }
    }
}

/// Uniform interface every intelligence source implements.
///
/// Implementations must return promptly on cancellation and convert every
/// internal failure into `Err(SourceError)`.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch(
        &self,
        ctx: &FetchContext,
        industry: &str,
        competitors: &[String],
    ) -> SourceResult;
}

pub type DynAdapter = Arc<dyn SourceAdapter>;

/// Shared HTTP client for adapters that talk to remote endpoints.
pub(crate) fn http_client(user_agent: &str) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(4))
        .build()
        .map_err(|e| SourceError::Transport(format!("client build: {e}")))
}

/// GET `url` and return the body text; non-2xx is a transport error.
pub(crate) async fn get_text(
    ctx: &FetchContext,
    client: &reqwest::Client,
    url: &str,
) -> Result<String, SourceError> {
    let req = client.get(url).timeout(ctx.remaining()).send();
    let resp = ctx
        .run(req)
        .await?
        .map_err(|e| classify_reqwest(&e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::Transport(format!("{url}: HTTP {status}")));
    }
    ctx.run(resp.text())
        .await?
        .map_err(|e| classify_reqwest(&e))
}

fn classify_reqwest(e: &reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout(e.to_string())
    } else {
        SourceError::Transport(e.to_string())
    }
}

/// Fill `{query}`, `{industry}`, `{slug}` placeholders with URL-safe values.
pub(crate) fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{name}}}"), &urlencoding::encode(value));
    }
    out
}

/// Build the default HTTP-backed adapter set from configuration.
pub fn build_http_adapters(cfg: &SourcesConfig) -> anyhow::Result<Vec<DynAdapter>> {
    let directory = match cfg.competitor_directory_path.as_deref() {
        Some(p) => competitor::CompetitorDirectory::load_from_file(p)?,
        None => competitor::CompetitorDirectory::default(),
    };
    let adapters: Vec<DynAdapter> = vec![
        Arc::new(stock::StockAdapter::from_config(cfg)?),
        Arc::new(news::NewsAdapter::from_config(cfg)?),
        Arc::new(social::SocialAdapter::from_config(cfg)?),
        Arc::new(competitor::CompetitorAdapter::new(directory)),
        Arc::new(funding::FundingAdapter::new()),
        Arc::new(web::WebScrapeAdapter::from_config(cfg)?),
    ];
    Ok(adapters)
}
