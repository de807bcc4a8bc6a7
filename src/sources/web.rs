// src/sources/web.rs
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::collections::HashMap;

use crate::config::sources::SourcesConfig;
use crate::sources::text::{normalize_text, slug};
use crate::sources::{fill_template, get_text, http_client, FetchContext, SourceAdapter};
use crate::types::{SourceError, SourceKind, SourcePayload, SourceResult};

static RE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex"));
static RE_META_DESC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\s+[^>]*name\s*=\s*["']description["'][^>]*content\s*=\s*["']([^"']*)["']"#)
        .expect("meta regex")
});
static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<h[12][^>]*>(.*?)</h[12]>").expect("heading regex"));

/// Signals pulled from one landing page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageSignals {
    pub title: Option<String>,
    pub description: Option<String>,
    pub headings: Vec<String>,
}

impl PageSignals {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.headings.is_empty()
    }
}

pub fn extract_signals(html: &str) -> PageSignals {
    let clean = |s: &str| {
        let t = normalize_text(s);
        if t.is_empty() {
            None
        } else {
            Some(t)
        }
    };
    PageSignals {
        title: RE_TITLE.captures(html).and_then(|c| clean(&c[1])),
        description: RE_META_DESC.captures(html).and_then(|c| clean(&c[1])),
        headings: RE_HEADING
            .captures_iter(html)
            .filter_map(|c| clean(&c[1]))
            .take(5)
            .collect(),
    }
}

enum Mode {
    /// Slug -> canned HTML.
    Fixture(HashMap<String, String>),
    Http {
        client: reqwest::Client,
        url_template: String,
    },
}

/// Scrapes competitor landing pages for positioning signals.
pub struct WebScrapeAdapter {
    mode: Mode,
}

impl WebScrapeAdapter {
    pub fn from_config(cfg: &SourcesConfig) -> Result<Self, SourceError> {
        Ok(Self {
            mode: Mode::Http {
                client: http_client(&cfg.user_agent)?,
                url_template: cfg.web_url_template.clone(),
            },
        })
    }

    pub fn from_fixture(pages: HashMap<String, String>) -> Self {
        Self {
            mode: Mode::Fixture(pages),
        }
    }

    async fn page(&self, ctx: &FetchContext, name: &str) -> Result<String, SourceError> {
        let s = slug(name);
        match &self.mode {
            Mode::Fixture(pages) => pages
                .get(&s)
                .cloned()
                .ok_or_else(|| SourceError::Transport(format!("{s}: no fixture"))),
            Mode::Http {
                client,
                url_template,
            } => {
                let url = fill_template(url_template, &[("slug", s.as_str())]);
                get_text(ctx, client, &url).await
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for WebScrapeAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::WebScrape
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        _industry: &str,
        competitors: &[String],
    ) -> SourceResult {
        if competitors.is_empty() {
            return Err(SourceError::PartialData("no competitors to scrape".into()));
        }

        let mut pages = Vec::new();
        let mut failed = Vec::new();
        let mut last_err = None;
        for name in competitors {
            match self.page(ctx, name).await {
                Ok(html) => {
                    let sig = extract_signals(&html);
                    if sig.is_empty() {
                        failed.push(name.clone());
                        continue;
                    }
                    pages.push(json!({
                        "competitor": name,
                        "title": sig.title,
                        "description": sig.description,
                        "headings": sig.headings,
                    }));
                }
                Err(e @ SourceError::Timeout(_)) => return Err(e),
                Err(e) => {
                    tracing::debug!(target: "sources", competitor = %name, error = %e, "scrape failed");
                    failed.push(name.clone());
                    last_err = Some(e);
                }
            }
        }

        if pages.is_empty() {
            return Err(last_err.unwrap_or_else(|| {
                SourceError::PartialData("no readable signals on any page".into())
            }));
        }

        let confidence = 0.9 * pages.len() as f64 / competitors.len() as f64;
        Ok(SourcePayload::new(
            json!({ "pages": pages, "failed": failed }),
            confidence,
        ))
    }
}
