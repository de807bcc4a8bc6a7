// src/sources/text.rs
//! Text helpers shared by the feed/social/scrape adapters: HTML-aware
//! normalization and a small lexicon sentiment scorer.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).unwrap_or_default()
});

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

/// Normalize text: decode entities, strip tags, ASCII quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();
    out = RE_TAGS.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    out = RE_WS.replace_all(&out, " ").trim().to_string();

    // Length cap: 500 chars
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }
    out
}

/// Lexicon sentiment with 1..=3 token negation window.
#[derive(Debug, Clone, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Returns (score, token count).
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score = 0i32;
        for i in 0..tokens.len() {
            let base = *LEXICON.get(tokens[i].as_str()).unwrap_or(&0);
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
        }
        (score, tokens.len())
    }

    /// Score squashed into `[-1, 1]`.
    pub fn polarity(&self, text: &str) -> f64 {
        let (score, _) = self.score_text(text);
        (score as f64 / 4.0).tanh()
    }
}

fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not" | "no" | "never" | "isn't" | "wasn't" | "aren't" | "won't" | "can't" | "cannot" | "without"
    )
}

/// Lower-case, alphanumeric-only slug ("Procter & Gamble" -> "proctergamble").
pub fn slug(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Case-insensitive "does `text` mention any of `names`".
pub fn mentions_any(text: &str, names: &[String]) -> bool {
    let lower = text.to_lowercase();
    names
        .iter()
        .any(|n| !n.trim().is_empty() && lower.contains(&n.trim().to_lowercase()))
}
