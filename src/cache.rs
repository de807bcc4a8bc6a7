//! # TTL Cache
//! In-memory store of finished bundles keyed by (industry, competitor set).
//!
//! Expiry is absolute (no sliding refresh) and checked lazily on read.
//! An optional sweeper task purges expired entries in the background.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::types::IntelligenceBundle;

/// Deterministic cache key: lower-cased industry + sorted, de-duplicated,
/// lower-cased competitor names. Kept structured so no separator inside a
/// name can make two different queries collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    industry: String,
    competitors: Vec<String>,
}

impl CacheKey {
    pub fn new<S: AsRef<str>>(industry: &str, competitors: &[S]) -> Self {
        let set: BTreeSet<String> = competitors
            .iter()
            .map(|c| c.as_ref().trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        Self {
            industry: industry.trim().to_lowercase(),
            competitors: set.into_iter().collect(),
        }
    }

    pub fn industry(&self) -> &str {
        &self.industry
    }

    pub fn competitors(&self) -> &[String] {
        &self.competitors
    }

    /// Short anonymized id for logs (first 6 bytes of SHA-256, hex).
    /// Every part is length-prefixed before hashing.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        let mut feed = |part: &str| {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        };
        feed(&self.industry);
        for c in &self.competitors {
            feed(c);
        }
        let digest = hasher.finalize();
        let mut out = String::with_capacity(12);
        for b in digest.iter().take(6) {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub bundle: Arc<IntelligenceBundle>,
    pub inserted_at: Instant,
}

/// Cache seam used by the collector. Implementations must be safe for
/// concurrent readers and writers.
pub trait BundleCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Arc<IntelligenceBundle>>;
    fn put(&self, key: CacheKey, bundle: Arc<IntelligenceBundle>);
}

/// Mutex-guarded TTL map with an optional entry ceiling.
#[derive(Debug)]
pub struct TtlCache {
    ttl: Duration,
    max_entries: Option<usize>,
    inner: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl TtlCache {
    pub fn new(ttl: Duration, max_entries: Option<usize>) -> Self {
        Self {
            ttl,
            max_entries: max_entries.filter(|n| *n > 0),
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, e| !is_expired(e, now, self.ttl));
        before - map.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        // Entries are immutable once inserted, so a poisoned map is still consistent.
        match self.inner.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

impl BundleCache for TtlCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<IntelligenceBundle>> {
        let now = Instant::now();
        let mut map = self.lock();
        match map.get(key) {
            Some(e) if !is_expired(e, now, self.ttl) => Some(Arc::clone(&e.bundle)),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: CacheKey, bundle: Arc<IntelligenceBundle>) {
        let now = Instant::now();
        let mut map = self.lock();

        if let Some(cap) = self.max_entries {
            if !map.contains_key(&key) && map.len() >= cap {
                map.retain(|_, e| !is_expired(e, now, self.ttl));
                while map.len() >= cap {
                    let oldest = map
                        .iter()
                        .min_by_key(|(_, e)| e.inserted_at)
                        .map(|(k, _)| k.clone());
                    match oldest {
                        Some(k) => {
                            map.remove(&k);
                        }
                        None => break,
                    }
                }
            }
        }

        map.insert(
            key,
            CacheEntry {
                bundle,
                inserted_at: now,
            },
        );
    }
}

fn is_expired(entry: &CacheEntry, now: Instant, ttl: Duration) -> bool {
    now.saturating_duration_since(entry.inserted_at) >= ttl
}

/// Periodically purge expired entries. Wire this from app startup.
pub fn spawn_sweeper(cache: Arc<TtlCache>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period.max(Duration::from_millis(10)));
        loop {
            ticker.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                tracing::debug!(target: "collector", removed, "cache sweep");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn bundle(industry: &str) -> Arc<IntelligenceBundle> {
        Arc::new(IntelligenceBundle::new(
            industry.to_string(),
            vec![],
            BTreeMap::new(),
            0.5,
            0,
            Utc::now(),
            1,
        ))
    }

    #[test]
    fn key_ignores_case_order_and_duplicates() {
        let a = CacheKey::new("FinTech ", &["Stripe", "PayPal"]);
        let b = CacheKey::new("fintech", &["paypal", " stripe", "Stripe"]);
        assert_eq!(a, b);
        assert_eq!(a.industry(), "fintech");
        assert_eq!(a.competitors(), &["paypal".to_string(), "stripe".to_string()]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 12);
        assert_ne!(a, CacheKey::new("fintech", &["Stripe"]));
    }

    #[test]
    fn separators_inside_names_do_not_collide() {
        let a = CacheKey::new("x|a", &[] as &[&str]);
        let b = CacheKey::new("x", &["a|"]);
        assert_ne!(a, b);
        assert_ne!(a.fingerprint(), b.fingerprint());

        let one = CacheKey::new("fintech", &["Acme,Inc"]);
        let two = CacheKey::new("fintech", &["Acme", "Inc"]);
        assert_ne!(one, two);
        assert_ne!(one.fingerprint(), two.fingerprint());

        let cache = TtlCache::new(Duration::from_secs(60), None);
        cache.put(one.clone(), bundle("one"));
        assert!(cache.get(&two).is_none());
        assert!(cache.get(&one).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_readers_and_writers() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(60), Some(8)));
        let shared = CacheKey::new("shared", &["x"]);

        let mut tasks = Vec::new();
        for t in 0..16usize {
            let cache = Arc::clone(&cache);
            let shared = shared.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..200usize {
                    let own = CacheKey::new(&format!("t{t}-{}", i % 12), &["y"]);
                    cache.put(own.clone(), bundle("own"));
                    cache.put(shared.clone(), bundle(&format!("w{t}")));
                    let _ = cache.get(&own);
                    let got = cache.get(&shared);
                    if let Some(b) = got {
                        assert!(b.industry().starts_with('w'));
                    }
                    assert!(cache.len() <= 8);
                    tokio::task::yield_now().await;
                }
            }));
        }
        for t in tasks {
            t.await.expect("cache task panicked");
        }
        assert!(cache.len() <= 8);

        // Last writer wins once the writers are done.
        cache.put(shared.clone(), bundle("final"));
        assert_eq!(cache.get(&shared).unwrap().industry(), "final");
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_exactly_at_ttl() {
        let cache = TtlCache::new(Duration::from_secs(10), None);
        let key = CacheKey::new("edtech", &["Coursera"]);
        let b = bundle("edtech");
        cache.put(key.clone(), Arc::clone(&b));

        tokio::time::advance(Duration::from_millis(9_999)).await;
        let hit = cache.get(&key).expect("still fresh");
        assert!(Arc::ptr_eq(&hit, &b));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty(), "expired entry removed on read");
    }

    #[tokio::test(start_paused = true)]
    async fn put_overwrites_and_resets_age() {
        let cache = TtlCache::new(Duration::from_secs(10), None);
        let key = CacheKey::new("foodtech", &["DoorDash"]);
        cache.put(key.clone(), bundle("first"));
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.put(key.clone(), bundle("second"));
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get(&key).unwrap().industry(), "second");
    }

    #[tokio::test(start_paused = true)]
    async fn max_entries_evicts_oldest() {
        let cache = TtlCache::new(Duration::from_secs(60), Some(2));
        let k1 = CacheKey::new("a", &["x"]);
        let k2 = CacheKey::new("b", &["x"]);
        let k3 = CacheKey::new("c", &["x"]);
        cache.put(k1.clone(), bundle("a"));
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.put(k2.clone(), bundle("b"));
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.put(k3.clone(), bundle("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&k1).is_none());
        assert!(cache.get(&k2).is_some());
        assert!(cache.get(&k3).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_counts_expired() {
        let cache = TtlCache::new(Duration::from_secs(5), None);
        cache.put(CacheKey::new("a", &["x"]), bundle("a"));
        cache.put(CacheKey::new("b", &["x"]), bundle("b"));
        tokio::time::advance(Duration::from_secs(3)).await;
        cache.put(CacheKey::new("c", &["x"]), bundle("c"));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.len(), 1);
    }
}
