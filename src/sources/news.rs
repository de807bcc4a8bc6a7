// src/sources/news.rs
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use serde_json::json;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::config::sources::SourcesConfig;
use crate::sources::text::{mentions_any, normalize_text, SentimentAnalyzer};
use crate::sources::{fill_template, get_text, http_client, FetchContext, SourceAdapter};
use crate::types::{SourceError, SourceKind, SourcePayload, SourceResult};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Headline {
    pub title: String,
    pub link: Option<String>,
    pub published_at: u64,
    pub polarity: f64,
    pub mentions_competitor: bool,
}

fn parse_rfc2822_to_unix(ts: &str) -> u64 {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
        .unwrap_or(0)
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

/// Parse an RSS document into scored headlines.
pub fn parse_headlines(xml: &str, competitors: &[String]) -> Result<Vec<Headline>, SourceError> {
    let analyzer = SentimentAnalyzer::new();
    let rss: Rss = from_str(&scrub_html_entities_for_xml(xml))
        .map_err(|e| SourceError::PartialData(format!("parsing news rss: {e}")))?;

    let mut out = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let title = normalize_text(it.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            continue;
        }
        let body = format!(
            "{}. {}",
            title,
            normalize_text(it.description.as_deref().unwrap_or_default())
        );
        out.push(Headline {
            polarity: analyzer.polarity(&body),
            mentions_competitor: mentions_any(&body, competitors),
            published_at: it
                .pub_date
                .as_deref()
                .map(parse_rfc2822_to_unix)
                .unwrap_or(0),
            link: it.link,
            title,
        });
    }
    Ok(out)
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        url_template: String,
    },
}

/// Headline sentiment from an RSS search feed.
pub struct NewsAdapter {
    mode: Mode,
}

impl NewsAdapter {
    pub fn from_config(cfg: &SourcesConfig) -> Result<Self, SourceError> {
        Ok(Self {
            mode: Mode::Http {
                client: http_client(&cfg.user_agent)?,
                url_template: cfg.news_rss_url.clone(),
            },
        })
    }

    pub fn from_fixture(xml: &str) -> Self {
        Self {
            mode: Mode::Fixture(xml.to_string()),
        }
    }
}

#[async_trait]
impl SourceAdapter for NewsAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::News
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        industry: &str,
        competitors: &[String],
    ) -> SourceResult {
        let xml = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http {
                client,
                url_template,
            } => {
                let query = search_query(industry, competitors);
                let url = fill_template(
                    url_template,
                    &[("query", query.as_str()), ("industry", industry)],
                );
                get_text(ctx, client, &url).await?
            }
        };

        let headlines = parse_headlines(&xml, competitors)?;
        if headlines.is_empty() {
            return Err(SourceError::PartialData("news feed had no items".into()));
        }

        let n = headlines.len();
        let avg = headlines.iter().map(|h| h.polarity).sum::<f64>() / n as f64;
        let positive = headlines.iter().filter(|h| h.polarity > 0.0).count();
        let negative = headlines.iter().filter(|h| h.polarity < 0.0).count();
        let mentioning = headlines.iter().filter(|h| h.mentions_competitor).count();
        let latest = headlines.iter().map(|h| h.published_at).max().unwrap_or(0);

        let mut top: Vec<&Headline> = headlines.iter().collect();
        top.sort_by(|a, b| b.polarity.abs().total_cmp(&a.polarity.abs()));
        let top: Vec<_> = top
            .into_iter()
            .take(5)
            .map(|h| json!({ "title": h.title, "link": h.link, "polarity": h.polarity }))
            .collect();

        // More items means a steadier average; saturates at 20 items.
        let confidence = 0.5 + 0.45 * (n.min(20) as f64 / 20.0);

        Ok(SourcePayload::new(
            json!({
                "items": n,
                "average_sentiment": avg,
                "positive": positive,
                "negative": negative,
                "competitor_mentions": mentioning,
                "latest_published_at": latest,
                "top_headlines": top,
            }),
            confidence,
        ))
    }
}

/// `industry OR "Comp A" OR "Comp B"`.
pub(crate) fn search_query(industry: &str, competitors: &[String]) -> String {
    let mut parts = vec![industry.trim().to_string()];
    parts.extend(
        competitors
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| format!("\"{}\"", c.trim())),
    );
    parts.join(" OR ")
}
