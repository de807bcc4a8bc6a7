// src/config/sources.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_USER_AGENT: &str =
    "market-intel-collector/0.1 (+https://example.invalid/market-intel-collector)";

/// Endpoints and lookup tables for the HTTP-backed adapters.
///
/// URL templates accept `{query}`, `{industry}`, `{symbol}` and `{slug}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub user_agent: String,
    /// Quote endpoint, `{symbol}` is replaced per ticker.
    pub stock_quote_url: String,
    /// Competitor name (case-insensitive) -> ticker symbol.
    pub tickers: BTreeMap<String, String>,
    pub news_rss_url: String,
    pub social_search_url: String,
    /// Competitor homepage template; `{slug}` is the alphanumeric name.
    pub web_url_template: String,
    /// Optional JSON file with competitor profiles.
    pub competitor_directory_path: Option<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        let tickers = [
            ("paypal", "PYPL"),
            ("block", "XYZ"),
            ("square", "XYZ"),
            ("visa", "V"),
            ("mastercard", "MA"),
            ("doordash", "DASH"),
            ("uber", "UBER"),
            ("coursera", "COUR"),
            ("chegg", "CHGG"),
            ("teladoc", "TDOC"),
            ("shopify", "SHOP"),
            ("apple", "AAPL"),
            ("microsoft", "MSFT"),
            ("alphabet", "GOOGL"),
            ("google", "GOOGL"),
            ("meta", "META"),
            ("amazon", "AMZN"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            stock_quote_url:
                "https://query1.finance.yahoo.com/v8/finance/chart/{symbol}?range=5d&interval=1d"
                    .to_string(),
            tickers,
            news_rss_url: "https://news.google.com/rss/search?q={query}&hl=en-US&gl=US&ceid=US:en"
                .to_string(),
            social_search_url: "https://www.reddit.com/search.json?q={query}&sort=new&limit=50"
                .to_string(),
            web_url_template: "https://www.{slug}.com".to_string(),
            competitor_directory_path: None,
        }
    }
}

impl SourcesConfig {
    /// Ticker for a competitor name, case-insensitive.
    pub fn ticker_for(&self, name: &str) -> Option<&str> {
        let n = name.trim().to_lowercase();
        self.tickers
            .iter()
            .find(|(k, _)| k.to_lowercase() == n)
            .map(|(_, v)| v.as_str())
    }
}
