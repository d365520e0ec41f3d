//! Fetch-with-cache over an ordered list of tiers.
//!
//! Lookups walk the tiers front to back (memory, then database) and promote
//! hits from slower tiers into faster ones. Misses go through a single-flight
//! table so concurrent callers for one key share one computation, and the
//! result is written to every tier.

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{
    CacheEntry, CacheKey, CacheStats, CacheStatus, CacheTier, FlightRole, Freshness, MemoryTier,
    SingleFlight, SqliteTier, TierHealth,
};
use crate::config::CacheConfig;
use crate::error::Result;

/// Per-call cache behaviour
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// TTL for a newly computed entry (cache default when None)
    pub ttl: Option<Duration>,
    /// Skip lookup, always recompute and overwrite
    pub force_refresh: bool,
    /// Serve an expired entry immediately and refresh it in the background
    pub stale_while_revalidate: bool,
    /// Serve an expired entry when the computation fails
    pub stale_if_error: bool,
}

impl FetchOptions {
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn stale_while_revalidate(mut self) -> Self {
        self.stale_while_revalidate = true;
        self
    }

    pub fn stale_if_error(mut self) -> Self {
        self.stale_if_error = true;
        self
    }
}

/// Value returned by a fetch together with how it was obtained
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub value: T,
    pub status: CacheStatus,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_served: AtomicU64,
    coalesced: AtomicU64,
    computes: AtomicU64,
    compute_errors: AtomicU64,
}

struct Inner {
    tiers: Vec<Arc<dyn CacheTier>>,
    flights: SingleFlight<Arc<serde_json::Value>>,
    counters: Counters,
    default_ttl: Duration,
}

/// Tiered cache handle; cheap to clone
#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<Inner>,
}

impl TieredCache {
    /// Create a cache over `tiers`, fastest first
    pub fn new(tiers: Vec<Arc<dyn CacheTier>>, default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tiers,
                flights: SingleFlight::new(),
                counters: Counters::default(),
                default_ttl,
            }),
        }
    }

    /// Memory tier in front of the SQLite database tier
    pub async fn from_config(config: &CacheConfig) -> Result<Self> {
        let memory: Arc<dyn CacheTier> = match config.memory_capacity {
            0 => Arc::new(MemoryTier::new()),
            capacity => Arc::new(MemoryTier::with_capacity(capacity)),
        };
        let database: Arc<dyn CacheTier> = Arc::new(SqliteTier::new(&config.db_path).await?);

        Ok(Self::new(vec![memory, database], config.default_ttl()))
    }

    /// Memory-only cache (tests, CLI one-shots)
    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::new(vec![Arc::new(MemoryTier::new())], default_ttl)
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Return the cached value for `key` if fresh, otherwise compute, store and return it.
    pub async fn fetch<T, F, Fut>(&self, key: &CacheKey, options: FetchOptions, compute: F) -> Result<Fetched<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let ttl = options.ttl.unwrap_or(self.inner.default_ttl);
        let counters = &self.inner.counters;
        let mut stale: Option<T> = None;

        if !options.force_refresh {
            if let Some(entry) = self.lookup(key).await {
                match (entry.freshness(), decode::<T>(key, entry.payload)) {
                    (_, None) => {}
                    (Freshness::Fresh, Some(value)) => {
                        counters.hits.fetch_add(1, Ordering::Relaxed);
                        debug!("Cache hit: {}", key);
                        return Ok(Fetched { value, status: CacheStatus::Hit });
                    }
                    (Freshness::Stale, Some(value)) if options.stale_while_revalidate => {
                        counters.stale_served.fetch_add(1, Ordering::Relaxed);
                        debug!("Serving stale {} while revalidating", key);
                        self.spawn_refresh(key.clone(), ttl, compute);
                        return Ok(Fetched { value, status: CacheStatus::Stale });
                    }
                    (Freshness::Stale, Some(value)) => {
                        stale = Some(value);
                    }
                }
            }
        }

        counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache miss: {}", key);

        match self.compute_shared(key, ttl, compute).await {
            Ok((payload, role)) => {
                let status = match role {
                    FlightRole::Follower => {
                        counters.coalesced.fetch_add(1, Ordering::Relaxed);
                        CacheStatus::Coalesced
                    }
                    FlightRole::Leader if options.force_refresh => CacheStatus::Refreshed,
                    FlightRole::Leader => CacheStatus::Miss,
                };
                let value = serde_json::from_value(payload.as_ref().clone())?;
                Ok(Fetched { value, status })
            }
            Err(e) => match stale {
                Some(value) if options.stale_if_error => {
                    warn!("Refreshing {} failed, serving stale value: {}", key, e);
                    counters.stale_served.fetch_add(1, Ordering::Relaxed);
                    Ok(Fetched { value, status: CacheStatus::Stale })
                }
                _ => Err(e),
            },
        }
    }

    /// Fresh cached value without computing
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let entry = self.lookup(key).await?;
        if entry.freshness() != Freshness::Fresh {
            return None;
        }
        decode(key, entry.payload)
    }

    /// Store a value in every tier
    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Option<Duration>) -> Result<()> {
        let entry = CacheEntry::new(serde_json::to_value(value)?, ttl.unwrap_or(self.inner.default_ttl));
        self.inner.store(key.as_str(), &entry).await;
        Ok(())
    }

    /// Remove a key from every tier
    pub async fn invalidate(&self, key: &CacheKey) -> Result<bool> {
        let mut removed = false;
        for tier in &self.inner.tiers {
            removed |= tier.remove(key.as_str()).await?;
        }
        Ok(removed)
    }

    /// Bulk clear of every tier (admin action)
    pub async fn clear(&self) -> Result<u64> {
        let mut total = 0;
        for tier in &self.inner.tiers {
            let removed = tier.clear().await?;
            info!("Cleared {} entries from {} tier", removed, tier.name());
            total += removed;
        }
        Ok(total)
    }

    /// Drop entries that expired more than `grace` ago from every tier
    pub async fn purge_expired(&self, grace: Duration) -> Result<u64> {
        let mut total = 0;
        for tier in &self.inner.tiers {
            total += tier.purge_expired(grace).await?;
        }
        Ok(total)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let c = &self.inner.counters;
        let mut tiers = Vec::with_capacity(self.inner.tiers.len());
        for tier in &self.inner.tiers {
            tiers.push(tier.stats().await?);
        }

        Ok(CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            stale_served: c.stale_served.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            computes: c.computes.load(Ordering::Relaxed),
            compute_errors: c.compute_errors.load(Ordering::Relaxed),
            tiers,
        })
    }

    pub async fn health(&self) -> Vec<TierHealth> {
        let mut report = Vec::with_capacity(self.inner.tiers.len());
        for tier in &self.inner.tiers {
            report.push(tier.health_check().await);
        }
        report
    }

    /// Periodically purge entries past `expires_at + grace`
    pub fn spawn_maintenance(&self, interval: Duration, grace: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.purge_expired(grace).await {
                    Ok(0) => {}
                    Ok(n) => info!("🧹 Purged {} expired cache entries", n),
                    Err(e) => warn!("Cache maintenance failed: {}", e),
                }
            }
        })
    }

    async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        for (idx, tier) in self.inner.tiers.iter().enumerate() {
            match tier.get(key.as_str()).await {
                Ok(Some(entry)) => {
                    if let Err(e) = tier.record_hit(key.as_str()).await {
                        debug!("Failed to record hit on {}: {}", tier.name(), e);
                    }
                    for faster in &self.inner.tiers[..idx] {
                        if let Err(e) = faster.put(key.as_str(), &entry).await {
                            warn!("Failed to promote {} into {}: {}", key, faster.name(), e);
                        }
                    }
                    return Some(entry);
                }
                Ok(None) => {}
                Err(e) => warn!("Cache tier {} lookup failed for {}: {}", tier.name(), key, e),
            }
        }
        None
    }

    async fn compute_shared<T, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<(Arc<serde_json::Value>, FlightRole)>
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let inner = self.inner.clone();
        let raw_key = key.as_str().to_string();

        self.inner
            .flights
            .run(key.as_str(), async move {
                inner.counters.computes.fetch_add(1, Ordering::Relaxed);
                let value = match compute().await {
                    Ok(value) => value,
                    Err(e) => {
                        inner.counters.compute_errors.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                };
                let entry = CacheEntry::new(serde_json::to_value(&value)?, ttl);
                inner.store(&raw_key, &entry).await;
                Ok(Arc::new(entry.payload))
            })
            .await
    }

    fn spawn_refresh<T, F, Fut>(&self, key: CacheKey, ttl: Duration, compute: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let cache = self.clone();
        tokio::spawn(async move {
            match cache.compute_shared(&key, ttl, compute).await {
                Ok((_, FlightRole::Leader)) => debug!("Revalidated {}", key),
                Ok((_, FlightRole::Follower)) => debug!("Revalidation of {} already in flight", key),
                Err(e) => warn!("Background refresh of {} failed: {}", key, e),
            }
        });
    }
}

impl Inner {
    /// Write to every tier; failures are logged, never surfaced
    async fn store(&self, key: &str, entry: &CacheEntry) {
        for tier in &self.tiers {
            if let Err(e) = tier.put(key, entry).await {
                warn!("Failed to save {} to {} tier: {}", key, tier.name(), e);
            }
        }
    }
}

fn decode<T: DeserializeOwned>(key: &CacheKey, payload: serde_json::Value) -> Option<T> {
    match serde_json::from_value(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring undecodable cache entry {}: {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameShelfError;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn key(name: &str) -> CacheKey {
        CacheKey::builder("test").id(name).build()
    }

    fn counting(calls: &Arc<AtomicUsize>, value: u32) -> impl FnOnce() -> std::future::Ready<Result<u32>> + Send + 'static {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(value))
        }
    }

    async fn two_tier() -> (TieredCache, Arc<MemoryTier>, Arc<SqliteTier>) {
        let memory = Arc::new(MemoryTier::new());
        let sqlite = Arc::new(SqliteTier::new(":memory:").await.unwrap());
        let cache = TieredCache::new(
            vec![memory.clone() as Arc<dyn CacheTier>, sqlite.clone() as Arc<dyn CacheTier>],
            Duration::from_secs(60),
        );
        (cache, memory, sqlite)
    }

    #[tokio::test]
    async fn test_hit_within_ttl_skips_compute() {
        let cache = TieredCache::in_memory(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.fetch(&key("a"), FetchOptions::default(), counting(&calls, 1)).await.unwrap();
        let second = cache.fetch(&key("a"), FetchOptions::default(), counting(&calls, 2)).await.unwrap();

        assert_eq!(first.status, CacheStatus::Miss);
        assert_eq!(second.status, CacheStatus::Hit);
        assert_eq!(first.value, second.value);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_recomputes_once() {
        let cache = TieredCache::in_memory(Duration::from_millis(20));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.fetch(&key("a"), FetchOptions::default(), counting(&calls, 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let again = cache.fetch(&key("a"), FetchOptions::default(), counting(&calls, 2)).await.unwrap();
        assert_eq!(again.value, 2);
        assert_eq!(again.status, CacheStatus::Miss);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_overwrites() {
        let cache = TieredCache::in_memory(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.fetch(&key("a"), FetchOptions::default(), counting(&calls, 1)).await.unwrap();
        let forced = cache
            .fetch(&key("a"), FetchOptions::default().force_refresh(true), counting(&calls, 2))
            .await
            .unwrap();
        assert_eq!(forced.status, CacheStatus::Refreshed);
        assert_eq!(forced.value, 2);

        let cached: Option<u32> = cache.get(&key("a")).await;
        assert_eq!(cached, Some(2));
    }

    #[tokio::test]
    async fn test_stale_while_revalidate() {
        let cache = TieredCache::in_memory(Duration::from_millis(20));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.fetch(&key("a"), FetchOptions::default(), counting(&calls, 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        let options = FetchOptions::default().ttl(Duration::from_secs(60)).stale_while_revalidate();
        let stale = cache.fetch(&key("a"), options, counting(&calls, 2)).await.unwrap();
        assert_eq!(stale.status, CacheStatus::Stale);
        assert_eq!(stale.value, 1);

        // Background refresh lands shortly after
        tokio::time::sleep(Duration::from_millis(50)).await;
        let fresh: Option<u32> = cache.get(&key("a")).await;
        assert_eq!(fresh, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().await.unwrap().stale_served, 1);
    }

    #[tokio::test]
    async fn test_stale_not_served_without_opt_in() {
        let cache = TieredCache::in_memory(Duration::from_millis(10));
        let calls = Arc::new(AtomicUsize::new(0));
        cache.fetch(&key("a"), FetchOptions::default(), counting(&calls, 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.get::<u32>(&key("a")).await, None);

        let err = cache
            .fetch(&key("a"), FetchOptions::default(), || async {
                Err::<u32, _>(GameShelfError::provider("igdb", "HTTP 503"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GameShelfError::Provider { .. }));
    }

    #[tokio::test]
    async fn test_stale_if_error_falls_back() {
        let cache = TieredCache::in_memory(Duration::from_millis(10));
        let calls = Arc::new(AtomicUsize::new(0));
        cache.fetch(&key("a"), FetchOptions::default(), counting(&calls, 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let fetched = cache
            .fetch(&key("a"), FetchOptions::default().stale_if_error(), || async {
                Err::<u32, _>(GameShelfError::provider("igdb", "HTTP 503"))
            })
            .await
            .unwrap();
        assert_eq!(fetched.value, 1);
        assert_eq!(fetched.status, CacheStatus::Stale);
        assert_eq!(cache.stats().await.unwrap().compute_errors, 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_coalesce() {
        let cache = TieredCache::in_memory(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .fetch(&key("hot"), FetchOptions::default(), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(json!({"name": "Elden Ring"}))
                    })
                    .await
            }));
        }

        for handle in handles {
            let fetched = handle.await.unwrap().unwrap();
            assert_eq!(fetched.value["name"], "Elden Ring");
        }

        let stats = cache.stats().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(stats.computes, 1);
        assert_eq!(stats.coalesced, 9);
    }

    #[tokio::test]
    async fn test_database_hit_is_promoted() {
        let (cache, memory, sqlite) = two_tier().await;
        let entry = CacheEntry::new(json!(5), Duration::from_secs(60));
        sqlite.put(key("a").as_str(), &entry).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let fetched = cache.fetch(&key("a"), FetchOptions::default(), counting(&calls, 9)).await.unwrap();

        assert_eq!(fetched.value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let promoted = memory.get(key("a").as_str()).await.unwrap().unwrap();
        assert_eq!(promoted.created_at.timestamp_millis(), entry.created_at.timestamp_millis());
    }

    #[tokio::test]
    async fn test_compute_writes_all_tiers_and_clear() {
        let (cache, memory, sqlite) = two_tier().await;
        let calls = Arc::new(AtomicUsize::new(0));
        cache.fetch(&key("a"), FetchOptions::default(), counting(&calls, 1)).await.unwrap();

        assert_eq!(memory.len().await.unwrap(), 1);
        assert_eq!(sqlite.len().await.unwrap(), 1);

        let stats = cache.stats().await.unwrap();
        let entries: Vec<_> = stats.tiers.iter().map(|t| (t.tier.as_str(), t.entries)).collect();
        assert_eq!(entries, vec![("memory", 1), ("sqlite", 1)]);
        assert_eq!(stats.total_entries(), 2);
        assert!(stats.tiers[0].total_hits.is_none());
        assert!(stats.tiers[1].newest_entry.is_some());

        assert_eq!(cache.clear().await.unwrap(), 2);
        assert!(cache.get::<u32>(&key("a")).await.is_none());
        assert!(cache.health().await.iter().all(|h| h.healthy));
    }

    #[tokio::test]
    async fn test_stats_report_database_hits() {
        let sqlite = Arc::new(SqliteTier::new(":memory:").await.unwrap());
        let cache = TieredCache::new(vec![sqlite as Arc<dyn CacheTier>], Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            cache.fetch(&key("a"), FetchOptions::default(), counting(&calls, 1)).await.unwrap();
        }

        let tier = &cache.stats().await.unwrap().tiers[0];
        assert_eq!(tier.tier, "sqlite");
        assert_eq!(tier.entries, 1);
        assert_eq!(tier.total_hits, Some(2));
        assert_eq!(tier.avg_hit_count, Some(2.0));
        assert!(tier.oldest_entry.is_some());
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let cache = TieredCache::in_memory(Duration::from_secs(60));
        cache.put(&key("a"), &"not a number", None).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let fetched = cache.fetch(&key("a"), FetchOptions::default(), counting(&calls, 3)).await.unwrap();
        assert_eq!(fetched.value, 3);
        assert_eq!(fetched.status, CacheStatus::Miss);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = TieredCache::in_memory(Duration::from_secs(60));
        cache.put(&key("a"), &1u32, None).await.unwrap();
        assert!(cache.invalidate(&key("a")).await.unwrap());
        assert!(!cache.invalidate(&key("a")).await.unwrap());
    }
}
