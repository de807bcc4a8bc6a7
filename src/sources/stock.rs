// src/sources/stock.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use crate::config::sources::SourcesConfig;
use crate::sources::{fill_template, get_text, http_client, FetchContext, SourceAdapter};
use crate::types::{SourceError, SourceKind, SourcePayload, SourceResult};

#[derive(Debug, Deserialize)]
struct ChartResp {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    currency: Option<String>,
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
struct Quote {
    price: f64,
    previous_close: Option<f64>,
    currency: Option<String>,
}

fn parse_quote(body: &str) -> Result<Quote, SourceError> {
    let resp: ChartResp = serde_json::from_str(body)
        .map_err(|e| SourceError::PartialData(format!("quote json: {e}")))?;
    let meta = resp
        .chart
        .result
        .and_then(|mut v| if v.is_empty() { None } else { Some(v.remove(0)) })
        .map(|r| r.meta)
        .ok_or_else(|| SourceError::PartialData("quote json: empty result".into()))?;
    let price = meta
        .regular_market_price
        .ok_or_else(|| SourceError::PartialData("quote json: missing price".into()))?;
    Ok(Quote {
        price,
        previous_close: meta.chart_previous_close,
        currency: meta.currency,
    })
}

enum Mode {
    /// Symbol -> canned response body.
    Fixture(HashMap<String, String>),
    Http {
        client: reqwest::Client,
        url_template: String,
    },
}

/// Quotes for competitors that map to a listed ticker.
pub struct StockAdapter {
    cfg: SourcesConfig,
    mode: Mode,
}

impl StockAdapter {
    pub fn from_config(cfg: &SourcesConfig) -> Result<Self, SourceError> {
        Ok(Self {
            cfg: cfg.clone(),
            mode: Mode::Http {
                client: http_client(&cfg.user_agent)?,
                url_template: cfg.stock_quote_url.clone(),
            },
        })
    }

    /// Offline mode: `bodies` maps ticker symbol to a chart response body.
    pub fn from_fixture(cfg: &SourcesConfig, bodies: HashMap<String, String>) -> Self {
        Self {
            cfg: cfg.clone(),
            mode: Mode::Fixture(bodies),
        }
    }

    async fn quote(&self, ctx: &FetchContext, symbol: &str) -> Result<Quote, SourceError> {
        match &self.mode {
            Mode::Fixture(bodies) => {
                let body = bodies
                    .get(symbol)
                    .ok_or_else(|| SourceError::Transport(format!("{symbol}: no fixture")))?;
                parse_quote(body)
            }
            Mode::Http {
                client,
                url_template,
            } => {
                let url = fill_template(url_template, &[("symbol", symbol)]);
                let body = get_text(ctx, client, &url).await?;
                parse_quote(&body)
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for StockAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Stock
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        _industry: &str,
        competitors: &[String],
    ) -> SourceResult {
        let mut quotes = Vec::new();
        let mut unresolved = Vec::new();
        let mut last_err: Option<SourceError> = None;
        let mut resolved = 0usize;

        for name in competitors {
            let Some(symbol) = self.cfg.ticker_for(name) else {
                unresolved.push(name.clone());
                continue;
            };
            resolved += 1;
            if ctx.is_cancelled() {
                return Err(SourceError::Timeout("cancelled".into()));
            }
            match self.quote(ctx, symbol).await {
                Ok(q) => {
                    let change_pct = q
                        .previous_close
                        .filter(|p| *p > 0.0)
                        .map(|p| (q.price - p) / p * 100.0);
                    quotes.push(json!({
                        "competitor": name,
                        "symbol": symbol,
                        "price": q.price,
                        "previous_close": q.previous_close,
                        "change_pct": change_pct,
                        "currency": q.currency,
                    }));
                }
                Err(e @ SourceError::Timeout(_)) => return Err(e),
                Err(e) => {
                    tracing::debug!(target: "sources", symbol, error = %e, "quote failed");
                    last_err = Some(e);
                }
            }
        }

        if resolved == 0 {
            return Err(SourceError::PartialData(
                "no competitor maps to a known ticker".into(),
            ));
        }
        if quotes.is_empty() {
            return Err(last_err
                .unwrap_or_else(|| SourceError::PartialData("no quotes returned".into())));
        }

        let confidence = 0.95 * quotes.len() as f64 / competitors.len().max(1) as f64;
        let avg_change = {
            let changes: Vec<f64> = quotes
                .iter()
                .filter_map(|q| q["change_pct"].as_f64())
                .collect();
            if changes.is_empty() {
                None
            } else {
                Some(changes.iter().sum::<f64>() / changes.len() as f64)
            }
        };
        Ok(SourcePayload::new(
            json!({
                "quotes": quotes,
                "average_change_pct": avg_change,
                "unresolved": unresolved,
            }),
            confidence,
        ))
    }
}
