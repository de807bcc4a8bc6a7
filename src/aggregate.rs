// src/aggregate.rs
//! Folds a batch attempt into payloads plus one overall confidence.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::types::{clamp01, BatchAttempt, SourceKind};

/// Confidence reported when no source succeeded.
pub const EMPTY_CONFIDENCE_FLOOR: f64 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub payloads: BTreeMap<SourceKind, Value>,
    pub confidence: f64,
    pub usable: usize,
}

/// Weighted mean of successful confidences. Kinds without an explicit
/// weight count 1.0; non-positive or non-finite weights drop the kind from
/// the mean but keep its payload.
pub fn aggregate(attempt: &BatchAttempt, weights: &BTreeMap<SourceKind, f64>) -> Aggregation {
    let mut payloads = BTreeMap::new();
    let mut weighted = 0.0;
    let mut total_weight = 0.0;

    for (kind, res) in &attempt.results {
        let Ok(p) = res else { continue };
        payloads.insert(kind.clone(), p.data.clone());

        let w = weights.get(kind).copied().unwrap_or(1.0);
        if !w.is_finite() || w <= 0.0 {
            continue;
        }
        weighted += w * clamp01(p.confidence);
        total_weight += w;
    }

    let confidence = if total_weight > 0.0 {
        clamp01(weighted / total_weight)
    } else {
        EMPTY_CONFIDENCE_FLOOR
    };

    Aggregation {
        usable: payloads.len(),
        payloads,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SourceError, SourcePayload, SourceResult};
    use serde_json::json;
    use std::time::Duration;

    fn attempt(results: Vec<(SourceKind, SourceResult)>) -> BatchAttempt {
        BatchAttempt {
            attempt: 1,
            duration: Duration::ZERO,
            results: results.into_iter().collect(),
        }
    }

    fn ok(c: f64) -> SourceResult {
        Ok(SourcePayload::new(json!({ "c": c }), c))
    }

    #[test]
    fn plain_mean_over_successes_only() {
        let a = attempt(vec![
            (SourceKind::Stock, ok(0.9)),
            (SourceKind::News, ok(0.8)),
            (SourceKind::Social, Err(SourceError::Timeout("t".into()))),
            (SourceKind::Funding, Err(SourceError::Transport("x".into()))),
        ]);
        let agg = aggregate(&a, &BTreeMap::new());
        assert_eq!(agg.usable, 2);
        assert!((agg.confidence - 0.85).abs() < 1e-9);
        assert!(agg.payloads.contains_key(&SourceKind::Stock));
        assert!(!agg.payloads.contains_key(&SourceKind::Social));
    }

    #[test]
    fn no_successes_gives_floor() {
        let a = attempt(vec![(
            SourceKind::News,
            Err(SourceError::PartialData("empty".into())),
        )]);
        let agg = aggregate(&a, &BTreeMap::new());
        assert_eq!(agg.usable, 0);
        assert_eq!(agg.confidence, EMPTY_CONFIDENCE_FLOOR);
        assert!(agg.payloads.is_empty());
    }

    #[test]
    fn out_of_range_and_nan_are_clamped() {
        let a = attempt(vec![
            (SourceKind::Stock, ok(1.6)),
            (SourceKind::News, ok(f64::NAN)),
        ]);
        let agg = aggregate(&a, &BTreeMap::new());
        assert!((agg.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn weights_shift_the_mean() {
        let a = attempt(vec![
            (SourceKind::Stock, ok(1.0)),
            (SourceKind::Social, ok(0.0)),
        ]);
        let mut w = BTreeMap::new();
        w.insert(SourceKind::Stock, 3.0);
        let agg = aggregate(&a, &w);
        assert!((agg.confidence - 0.75).abs() < 1e-9);

        w.insert(SourceKind::Social, 0.0);
        let agg = aggregate(&a, &w);
        assert_eq!(agg.confidence, 1.0);
        assert_eq!(agg.usable, 2);
    }
}
