// tests/collector_scenarios.rs
//! End-to-end collector behaviour against deterministic adapters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use market_intel_collector::sources::mock::StaticAdapter;
use market_intel_collector::{
    BundleCache, CacheKey, CacheStatus, CollectError, CollectorConfig, DynAdapter, IntelligenceBundle,
    IntelligenceCollector, SourceError, SourceKind, TtlCache,
};
use tokio_util::sync::CancellationToken;

const ALL_KINDS: [SourceKind; 6] = [
    SourceKind::Stock,
    SourceKind::News,
    SourceKind::Social,
    SourceKind::Competitor,
    SourceKind::Funding,
    SourceKind::WebScrape,
];

fn ttl_cache() -> Arc<dyn BundleCache> {
    Arc::new(TtlCache::new(Duration::from_secs(1800), None))
}

fn as_dyn(adapters: &[Arc<StaticAdapter>]) -> Vec<DynAdapter> {
    adapters.iter().map(|a| Arc::clone(a) as DynAdapter).collect()
}

fn total_calls(adapters: &[Arc<StaticAdapter>]) -> usize {
    adapters.iter().map(|a| a.calls()).sum()
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Counts traffic through the cache seam.
#[derive(Default)]
struct RecordingCache {
    inner: Mutex<HashMap<CacheKey, Arc<IntelligenceBundle>>>,
    gets: Mutex<usize>,
    puts: Mutex<Vec<CacheKey>>,
}

impl BundleCache for RecordingCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<IntelligenceBundle>> {
        *self.gets.lock().unwrap() += 1;
        self.inner.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: CacheKey, bundle: Arc<IntelligenceBundle>) {
        self.puts.lock().unwrap().push(key.clone());
        self.inner.lock().unwrap().insert(key, bundle);
    }
}

#[tokio::test(start_paused = true)]
async fn four_timeouts_two_successes_gives_mean_of_survivors() {
    let adapters: Vec<Arc<StaticAdapter>> = vec![
        Arc::new(StaticAdapter::ok(SourceKind::Stock, 0.9)),
        Arc::new(StaticAdapter::ok(SourceKind::Funding, 0.8)),
        Arc::new(StaticAdapter::ok(SourceKind::News, 0.9).with_delay(Duration::from_secs(60))),
        Arc::new(StaticAdapter::ok(SourceKind::Social, 0.9).with_delay(Duration::from_secs(60))),
        Arc::new(
            StaticAdapter::ok(SourceKind::Competitor, 0.9).with_delay(Duration::from_secs(60)),
        ),
        Arc::new(
            StaticAdapter::ok(SourceKind::WebScrape, 0.9).with_delay(Duration::from_secs(60)),
        ),
    ];
    let collector =
        IntelligenceCollector::new(CollectorConfig::default(), ttl_cache(), as_dyn(&adapters))
            .unwrap();

    let bundle = collector
        .collect_intelligence(&CancellationToken::new(), "fintech", &names(&["Stripe"]))
        .await
        .unwrap();

    assert_eq!(bundle.usable_sources(), 2);
    assert!((bundle.confidence() - 0.85).abs() < 1e-9);
    assert_eq!(bundle.attempts(), 3);
    for a in &adapters {
        assert_eq!(a.calls(), 3, "every adapter runs once per attempt");
    }
    assert!(bundle.payload(&SourceKind::Stock).is_some());
    assert!(bundle.payload(&SourceKind::News).is_none());
    assert!(bundle.is_degraded(3));
}

#[tokio::test(start_paused = true)]
async fn one_short_attempt_gives_exactly_one_retry() {
    let adapters: Vec<Arc<StaticAdapter>> = ALL_KINDS
        .iter()
        .map(|k| {
            let a = StaticAdapter::ok(k.clone(), 0.8);
            match k {
                SourceKind::Stock | SourceKind::Funding => Arc::new(a),
                _ => Arc::new(a.with_script(vec![Err(SourceError::Timeout("slow".into()))])),
            }
        })
        .collect();
    let collector =
        IntelligenceCollector::new(CollectorConfig::default(), ttl_cache(), as_dyn(&adapters))
            .unwrap();

    let bundle = collector
        .collect_intelligence(&CancellationToken::new(), "fintech", &names(&["Stripe"]))
        .await
        .unwrap();

    assert_eq!(bundle.attempts(), 2);
    assert_eq!(bundle.usable_sources(), 6);
    for a in &adapters {
        assert_eq!(a.calls(), 2);
        let starts = a.call_starts();
        let gap = starts[1] - starts[0];
        assert!(gap >= Duration::from_secs(1) && gap < Duration::from_millis(1_100));
    }
}

#[tokio::test(start_paused = true)]
async fn separator_characters_do_not_share_cache_entries() {
    let adapters: Vec<Arc<StaticAdapter>> = ALL_KINDS
        .iter()
        .map(|k| Arc::new(StaticAdapter::ok(k.clone(), 0.8)))
        .collect();
    let collector =
        IntelligenceCollector::new(CollectorConfig::default(), ttl_cache(), as_dyn(&adapters))
            .unwrap();
    let cancel = CancellationToken::new();

    let (first, _) = collector
        .collect_with_status(&cancel, "fintech", &names(&["Acme,Inc"]))
        .await
        .unwrap();
    let (second, status) = collector
        .collect_with_status(&cancel, "fintech", &names(&["Acme", "Inc"]))
        .await
        .unwrap();
    assert_eq!(status, CacheStatus::Miss);
    assert_eq!(first.competitors(), &["Acme,Inc".to_string()]);
    assert_eq!(second.competitors(), &["Acme".to_string(), "Inc".to_string()]);

    let (_, status) = collector
        .collect_with_status(&cancel, "x|a", &[])
        .await
        .unwrap();
    assert_eq!(status, CacheStatus::Miss);
    let (third, status) = collector
        .collect_with_status(&cancel, "x", &names(&["a|"]))
        .await
        .unwrap();
    assert_eq!(status, CacheStatus::Miss);
    assert_eq!(third.industry(), "x");
}

#[tokio::test(start_paused = true)]
async fn repeated_request_is_served_from_cache() {
    let adapters: Vec<Arc<StaticAdapter>> = ALL_KINDS
        .iter()
        .map(|k| Arc::new(StaticAdapter::ok(k.clone(), 0.8)))
        .collect();
    let collector =
        IntelligenceCollector::new(CollectorConfig::default(), ttl_cache(), as_dyn(&adapters))
            .unwrap();
    let cancel = CancellationToken::new();

    let first = collector
        .collect_intelligence(&cancel, "fintech", &names(&["Stripe", "PayPal"]))
        .await
        .unwrap();
    let calls_after_first = total_calls(&adapters);
    assert_eq!(calls_after_first, 6);

    let second = collector
        .collect_intelligence(&cancel, " FinTech ", &names(&["paypal", "STRIPE"]))
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(total_calls(&adapters), calls_after_first);
}

#[tokio::test(start_paused = true)]
async fn persistent_news_failure_is_absent_but_still_cached() {
    let adapters: Vec<Arc<StaticAdapter>> = ALL_KINDS
        .iter()
        .map(|k| {
            if *k == SourceKind::News {
                Arc::new(StaticAdapter::failing(
                    SourceKind::News,
                    SourceError::Transport("feed unavailable".into()),
                ))
            } else {
                Arc::new(StaticAdapter::ok(k.clone(), 0.7))
            }
        })
        .collect();
    let cache = Arc::new(RecordingCache::default());
    let collector = IntelligenceCollector::new(
        CollectorConfig::default(),
        cache.clone(),
        as_dyn(&adapters),
    )
    .unwrap();

    let bundle = collector
        .collect_intelligence(&CancellationToken::new(), "edtech", &names(&["Coursera"]))
        .await
        .unwrap();

    assert!(bundle.payload(&SourceKind::News).is_none());
    assert_eq!(bundle.usable_sources(), 5);
    assert_eq!(bundle.attempts(), 1);
    assert_eq!(cache.puts.lock().unwrap().len(), 1);
    assert_eq!(*cache.gets.lock().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn all_sources_failing_is_not_an_error_and_not_cached() {
    let adapters: Vec<Arc<StaticAdapter>> = ALL_KINDS
        .iter()
        .map(|k| {
            Arc::new(StaticAdapter::failing(
                k.clone(),
                SourceError::Transport("down".into()),
            ))
        })
        .collect();
    let cache = Arc::new(RecordingCache::default());
    let collector = IntelligenceCollector::new(
        CollectorConfig::default(),
        cache.clone(),
        as_dyn(&adapters),
    )
    .unwrap();

    let bundle = collector
        .collect_intelligence(&CancellationToken::new(), "healthtech", &[])
        .await
        .unwrap();

    assert_eq!(bundle.usable_sources(), 0);
    assert_eq!(bundle.confidence(), 0.0);
    assert!(bundle.payloads().is_empty());
    assert_eq!(bundle.attempts(), 3);
    assert!(cache.puts.lock().unwrap().is_empty());
    assert_eq!(total_calls(&adapters), 18);
}

#[tokio::test]
async fn empty_industry_is_rejected_without_touching_cache() {
    let adapters = vec![Arc::new(StaticAdapter::ok(SourceKind::Stock, 0.9))];
    let cache = Arc::new(RecordingCache::default());
    let collector = IntelligenceCollector::new(
        CollectorConfig::default(),
        cache.clone(),
        as_dyn(&adapters),
    )
    .unwrap();

    let err = collector
        .collect_intelligence(&CancellationToken::new(), "", &names(&["Stripe"]))
        .await
        .unwrap_err();

    assert_eq!(err, CollectError::EmptyIndustry);
    assert_eq!(*cache.gets.lock().unwrap(), 0);
    assert_eq!(total_calls(&adapters), 0);
}

#[tokio::test(start_paused = true)]
async fn bundle_keeps_trimmed_deduped_competitors() {
    let adapters = vec![Arc::new(StaticAdapter::ok(SourceKind::Funding, 0.9))];
    let collector =
        IntelligenceCollector::new(CollectorConfig::default(), ttl_cache(), as_dyn(&adapters))
            .unwrap();

    let bundle = collector
        .collect_intelligence(
            &CancellationToken::new(),
            "  foodtech ",
            &names(&[" DoorDash", "doordash", "", "Uber Eats"]),
        )
        .await
        .unwrap();

    assert_eq!(bundle.industry(), "foodtech");
    assert_eq!(bundle.competitors(), &["DoorDash".to_string(), "Uber Eats".to_string()]);
}
