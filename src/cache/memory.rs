use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::time::Duration;

use crate::cache::{CacheEntry, CacheTier, Freshness, TierHealth};
use crate::error::Result;

/// In-process cache tier.
///
/// With a capacity, inserting a new key into a full tier first drops expired
/// entries and then, if still full, the entry with the oldest `created_at`.
pub struct MemoryTier {
    entries: DashMap<String, CacheEntry>,
    capacity: Option<usize>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            capacity: None,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
            capacity: Some(capacity.max(1)),
        }
    }

    fn make_room(&self) {
        let Some(capacity) = self.capacity else {
            return;
        };
        if self.entries.len() < capacity {
            return;
        }

        let now = Utc::now();
        self.entries.retain(|_, entry| entry.freshness_at(now) == Freshness::Fresh);

        while self.entries.len() >= capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().created_at)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    tracing::debug!("Memory tier full, evicting {}", key);
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        if !self.entries.contains_key(key) {
            self.make_room();
        }
        self.entries.insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn clear(&self) -> Result<u64> {
        let count = self.entries.len() as u64;
        self.entries.clear();
        Ok(count)
    }

    async fn len(&self) -> Result<u64> {
        Ok(self.entries.len() as u64)
    }

    async fn purge_expired(&self, grace: Duration) -> Result<u64> {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_purgeable_at(now, grace));
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }

    async fn health_check(&self) -> TierHealth {
        TierHealth::healthy(self.name(), Some(self.entries.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_remove() {
        let tier = MemoryTier::new();
        let entry = CacheEntry::new(json!({"name": "Hades"}), Duration::from_secs(60));

        tier.put("game:id=1", &entry).await.unwrap();
        assert_eq!(tier.get("game:id=1").await.unwrap(), Some(entry));
        assert!(tier.remove("game:id=1").await.unwrap());
        assert!(!tier.remove("game:id=1").await.unwrap());
        assert_eq!(tier.get("game:id=1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_capacity_evicts_expired_first() {
        let tier = MemoryTier::with_capacity(2);
        let old_but_fresh = CacheEntry::created_at(
            json!(1),
            Duration::from_secs(3600),
            Utc::now() - chrono::Duration::seconds(30),
        );
        let expired = CacheEntry::new(json!(2), Duration::ZERO);

        tier.put("a", &old_but_fresh).await.unwrap();
        tier.put("b", &expired).await.unwrap();
        tier.put("c", &CacheEntry::new(json!(3), Duration::from_secs(60))).await.unwrap();

        assert_eq!(tier.len().await.unwrap(), 2);
        assert!(tier.get("a").await.unwrap().is_some());
        assert!(tier.get("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let tier = MemoryTier::with_capacity(2);
        let now = Utc::now();
        let ttl = Duration::from_secs(3600);

        tier.put("a", &CacheEntry::created_at(json!(1), ttl, now - chrono::Duration::seconds(20))).await.unwrap();
        tier.put("b", &CacheEntry::created_at(json!(2), ttl, now - chrono::Duration::seconds(10))).await.unwrap();
        tier.put("c", &CacheEntry::created_at(json!(3), ttl, now)).await.unwrap();

        assert!(tier.get("a").await.unwrap().is_none());
        assert!(tier.get("b").await.unwrap().is_some());
        assert!(tier.get("c").await.unwrap().is_some());

        // Overwriting an existing key never evicts
        tier.put("b", &CacheEntry::created_at(json!(4), ttl, now)).await.unwrap();
        assert_eq!(tier.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_purge_and_clear() {
        let tier = MemoryTier::new();
        tier.put("stale", &CacheEntry::new(json!(1), Duration::ZERO)).await.unwrap();
        tier.put("fresh", &CacheEntry::new(json!(2), Duration::from_secs(60))).await.unwrap();

        assert_eq!(tier.purge_expired(Duration::ZERO).await.unwrap(), 1);
        assert_eq!(tier.clear().await.unwrap(), 1);
        assert_eq!(tier.len().await.unwrap(), 0);

        let health = tier.health_check().await;
        assert!(health.healthy);
        assert_eq!(health.entries, Some(0));
    }
}
