// src/sources/social.rs
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::config::sources::SourcesConfig;
use crate::sources::news::search_query;
use crate::sources::text::{normalize_text, SentimentAnalyzer};
use crate::sources::{fill_template, get_text, http_client, FetchContext, SourceAdapter};
use crate::types::{SourceError, SourceKind, SourcePayload, SourceResult};

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    #[serde(default)]
    title: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    #[serde(default)]
    subreddit: Option<String>,
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        url_template: String,
    },
}

/// Engagement-weighted sentiment over a social search listing.
pub struct SocialAdapter {
    mode: Mode,
}

impl SocialAdapter {
    pub fn from_config(cfg: &SourcesConfig) -> Result<Self, SourceError> {
        Ok(Self {
            mode: Mode::Http {
                client: http_client(&cfg.user_agent)?,
                url_template: cfg.social_search_url.clone(),
            },
        })
    }

    pub fn from_fixture(json_body: &str) -> Self {
        Self {
            mode: Mode::Fixture(json_body.to_string()),
        }
    }
}

#[async_trait]
impl SourceAdapter for SocialAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Social
    }

    async fn fetch(
        &self,
        ctx: &FetchContext,
        industry: &str,
        competitors: &[String],
    ) -> SourceResult {
        let body = match &self.mode {
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

        let listing: Listing = serde_json::from_str(&body)
            .map_err(|e| SourceError::PartialData(format!("social json: {e}")))?;

        let analyzer = SentimentAnalyzer::new();
        let mut weighted = 0.0f64;
        let mut total_weight = 0.0f64;
        let mut engagement = 0i64;
        let mut communities: BTreeMap<String, usize> = BTreeMap::new();
        let mut posts = 0usize;

        for child in listing.data.children {
            let post = child.data;
            let title = normalize_text(&post.title);
            if title.is_empty() {
                continue;
            }
            posts += 1;
            let activity = post.score.max(0) + post.num_comments.max(0);
            engagement += activity;
            // log-scaled so one viral post cannot dominate
            let w = 1.0 + (activity as f64).ln_1p();
            weighted += analyzer.polarity(&title) * w;
            total_weight += w;
            if let Some(sub) = post.subreddit {
                *communities.entry(sub).or_default() += 1;
            }
        }

        if posts == 0 {
            return Err(SourceError::PartialData("social listing had no posts".into()));
        }

        let sentiment = weighted / total_weight;
        let mut top_communities: Vec<(String, usize)> = communities.into_iter().collect();
        top_communities.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_communities.truncate(3);

        let confidence = 0.4 + 0.5 * (posts.min(25) as f64 / 25.0);
        Ok(SourcePayload::new(
            json!({
                "posts": posts,
                "weighted_sentiment": sentiment,
                "total_engagement": engagement,
                "top_communities": top_communities
                    .into_iter()
                    .map(|(name, count)| json!({ "name": name, "posts": count }))
                    .collect::<Vec<_>>(),
            }),
            confidence,
        ))
    }
}
