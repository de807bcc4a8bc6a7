//! # Core data model
//! Source kinds, per-source results, batch attempts and the final
//! `IntelligenceBundle` handed to downstream consumers.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Category of external signal an adapter produces.
///
/// `Custom` lets callers register new kinds without touching the dispatcher.
/// Build it with [`SourceKind::custom`] or [`SourceKind::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    Stock,
    News,
    Social,
    Competitor,
    Funding,
    WebScrape,
    Custom(CustomKind),
}

/// Name of a caller-defined kind: trimmed, lower-cased, non-empty and never
/// one of the built-in wire names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CustomKind(String);

impl CustomKind {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn builtin(name: &str) -> Option<SourceKind> {
    match name {
        "stock" => Some(SourceKind::Stock),
        "news" => Some(SourceKind::News),
        "social" => Some(SourceKind::Social),
        "competitor" => Some(SourceKind::Competitor),
        "funding" => Some(SourceKind::Funding),
        "web_scrape" | "webscrape" | "web" => Some(SourceKind::WebScrape),
        _ => None,
    }
}

impl SourceKind {
    pub fn as_str(&self) -> &str {
        match self {
            SourceKind::Stock => "stock",
            SourceKind::News => "news",
            SourceKind::Social => "social",
            SourceKind::Competitor => "competitor",
            SourceKind::Funding => "funding",
            SourceKind::WebScrape => "web_scrape",
            SourceKind::Custom(name) => name.as_str(),
        }
    }

    /// Parse a kind from its wire name. Unknown names become `Custom`;
    /// blank input is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let name = s.trim().to_lowercase();
        if name.is_empty() {
            return None;
        }
        Some(builtin(&name).unwrap_or(SourceKind::Custom(CustomKind(name))))
    }

    /// A caller-defined kind. `None` for blank names and names that belong
    /// to a built-in kind.
    pub fn custom(name: &str) -> Option<Self> {
        match Self::parse(name)? {
            kind @ SourceKind::Custom(_) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Plain strings on the wire so kinds work as JSON object keys.
impl Serialize for SourceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SourceKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SourceKind::parse(&s).ok_or_else(|| serde::de::Error::custom("empty source kind"))
    }
}

/// Successful adapter output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePayload {
    /// Structured map produced by the adapter (a JSON object).
    pub data: Value,
    /// Adapter's own confidence in `data`, expected in `[0, 1]`.
    pub confidence: f64,
}

impl SourcePayload {
    pub fn new(data: Value, confidence: f64) -> Self {
        Self { data, confidence }
    }
}

/// Adapter-local failure. Never fatal to the batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("partial data: {0}")]
    PartialData(String),
}

impl SourceError {
    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            SourceError::Timeout(_) => "timeout",
            SourceError::Transport(_) => "transport",
            SourceError::PartialData(_) => "partial_data",
        }
    }
}

pub type SourceResult = Result<SourcePayload, SourceError>;

/// One pass over all adapters.
#[derive(Debug, Clone)]
pub struct BatchAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    pub duration: Duration,
    pub results: BTreeMap<SourceKind, SourceResult>,
}

impl BatchAttempt {
    pub fn ok_count(&self) -> usize {
        self.results.values().filter(|r| r.is_ok()).count()
    }

    pub fn failed_kinds(&self) -> Vec<SourceKind> {
        self.results
            .iter()
            .filter(|(_, r)| r.is_err())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

/// Aggregated, confidence-scored output of a collection run.
///
/// Fields are private so a bundle cannot change once built. Deserialization
/// goes through [`IntelligenceBundle::new`], so confidence is clamped there too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBundle")]
pub struct IntelligenceBundle {
    industry: String,
    competitors: Vec<String>,
    payloads: BTreeMap<SourceKind, Value>,
    confidence: f64,
    usable_sources: usize,
    collected_at: DateTime<Utc>,
    attempts: u32,
}

#[derive(Deserialize)]
struct RawBundle {
    industry: String,
    competitors: Vec<String>,
    payloads: BTreeMap<SourceKind, Value>,
    confidence: f64,
    usable_sources: usize,
    collected_at: DateTime<Utc>,
    attempts: u32,
}

impl From<RawBundle> for IntelligenceBundle {
    fn from(r: RawBundle) -> Self {
        Self::new(
            r.industry,
            r.competitors,
            r.payloads,
            r.confidence,
            r.usable_sources,
            r.collected_at,
            r.attempts,
        )
    }
}

impl IntelligenceBundle {
    pub fn new(
        industry: String,
        competitors: Vec<String>,
        payloads: BTreeMap<SourceKind, Value>,
        confidence: f64,
        usable_sources: usize,
        collected_at: DateTime<Utc>,
        attempts: u32,
    ) -> Self {
        Self {
            industry,
            competitors,
            payloads,
            confidence: clamp01(confidence),
            usable_sources,
            collected_at,
            attempts,
        }
    }

    pub fn industry(&self) -> &str {
        &self.industry
    }

    pub fn competitors(&self) -> &[String] {
        &self.competitors
    }

    pub fn payloads(&self) -> &BTreeMap<SourceKind, Value> {
        &self.payloads
    }

    pub fn payload(&self, kind: &SourceKind) -> Option<&Value> {
        self.payloads.get(kind)
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn usable_sources(&self) -> usize {
        self.usable_sources
    }

    pub fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// True when fewer than `min_sources` contributed. Still a valid bundle.
    pub fn is_degraded(&self, min_sources: usize) -> bool {
        self.usable_sources < min_sources
    }
}

/// Clamp to `[0, 1]`, mapping NaN to 0.
pub fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kinds_roundtrip_through_wire_names() {
        for k in [
            SourceKind::Stock,
            SourceKind::News,
            SourceKind::Social,
            SourceKind::Competitor,
            SourceKind::Funding,
            SourceKind::WebScrape,
        ] {
            assert_eq!(SourceKind::parse(k.as_str()), Some(k));
        }
        let patents = SourceKind::parse(" Patents").unwrap();
        assert_eq!(SourceKind::custom("patents"), Some(patents.clone()));
        assert_eq!(patents.as_str(), "patents");
        assert_eq!(SourceKind::parse("  "), None);
    }

    #[test]
    fn custom_kinds_cannot_shadow_builtins() {
        assert_eq!(SourceKind::custom("news"), None);
        assert_eq!(SourceKind::custom("Web"), None);
        assert_eq!(SourceKind::custom(""), None);

        // Wire names round-trip without loss.
        let mut m = BTreeMap::new();
        m.insert(SourceKind::custom("Patents").unwrap(), 1);
        m.insert(SourceKind::News, 2);
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v, json!({ "news": 2, "patents": 1 }));
        let back: BTreeMap<SourceKind, i32> = serde_json::from_value(v).unwrap();
        assert_eq!(back, m);

        assert!(serde_json::from_value::<SourceKind>(json!(" ")).is_err());
    }

    #[test]
    fn deserialized_bundle_is_clamped() {
        let raw = json!({
            "industry": "fintech",
            "competitors": [],
            "payloads": {},
            "confidence": 3.5,
            "usable_sources": 0,
            "collected_at": "2026-10-05T10:00:00Z",
            "attempts": 1
        });
        let b: IntelligenceBundle = serde_json::from_value(raw).unwrap();
        assert_eq!(b.confidence(), 1.0);
    }

    #[test]
    fn bundle_serializes_kinds_as_object_keys() {
        let mut payloads = BTreeMap::new();
        payloads.insert(SourceKind::WebScrape, json!({"pages": 1}));
        let b = IntelligenceBundle::new(
            "fintech".into(),
            vec!["Stripe".into()],
            payloads,
            1.7,
            1,
            Utc::now(),
            1,
        );
        assert_eq!(b.confidence(), 1.0);
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v["payloads"]["web_scrape"]["pages"], 1);
    }

    #[test]
    fn clamp_handles_nan() {
        assert_eq!(clamp01(f64::NAN), 0.0);
        assert_eq!(clamp01(-0.2), 0.0);
        assert_eq!(clamp01(0.42), 0.42);
    }
}
