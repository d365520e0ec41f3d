use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Freshness of a cached entry relative to its TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Within TTL
    Fresh,
    /// Past absolute expiry but still held by a tier
    Stale,
}

/// Cached payload with creation time and TTL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub ttl_ms: u64,
}

impl CacheEntry {
    /// Create an entry stamped with the current time
    pub fn new(payload: serde_json::Value, ttl: Duration) -> Self {
        Self::created_at(payload, ttl, Utc::now())
    }

    pub fn created_at(payload: serde_json::Value, ttl: Duration, created_at: DateTime<Utc>) -> Self {
        Self {
            payload,
            created_at,
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Absolute expiry; saturates for TTLs too large to represent
    pub fn expires_at(&self) -> DateTime<Utc> {
        let ttl = chrono::Duration::milliseconds(i64::try_from(self.ttl_ms).unwrap_or(i64::MAX));
        self.created_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn freshness_at(&self, now: DateTime<Utc>) -> Freshness {
        if now < self.expires_at() {
            Freshness::Fresh
        } else {
            Freshness::Stale
        }
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness_at(Utc::now())
    }

    pub fn is_fresh(&self) -> bool {
        self.freshness() == Freshness::Fresh
    }

    /// True when the entry expired more than `grace` before `now`
    pub fn is_purgeable_at(&self, now: DateTime<Utc>, grace: Duration) -> bool {
        let grace = chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::MAX);
        match self.expires_at().checked_add_signed(grace) {
            Some(limit) => now >= limit,
            None => false,
        }
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_freshness_boundary() {
        let created = Utc::now();
        let entry = CacheEntry::created_at(json!({"id": 1}), Duration::from_secs(60), created);

        assert_eq!(entry.freshness_at(created), Freshness::Fresh);
        assert_eq!(
            entry.freshness_at(created + chrono::Duration::seconds(59)),
            Freshness::Fresh
        );
        assert_eq!(
            entry.freshness_at(created + chrono::Duration::seconds(60)),
            Freshness::Stale
        );
    }

    #[test]
    fn test_zero_ttl_is_immediately_stale() {
        let entry = CacheEntry::new(json!(null), Duration::ZERO);
        assert_eq!(entry.freshness(), Freshness::Stale);
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let entry = CacheEntry::new(json!(1), Duration::from_secs(u64::MAX));
        assert!(entry.is_fresh());
        assert_eq!(entry.expires_at(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_purgeable_after_grace() {
        let created = Utc::now();
        let entry = CacheEntry::created_at(json!(1), Duration::from_secs(10), created);
        let grace = Duration::from_secs(60);

        assert!(!entry.is_purgeable_at(created + chrono::Duration::seconds(30), grace));
        assert!(entry.is_purgeable_at(created + chrono::Duration::seconds(70), grace));
        assert_eq!(entry.age_at(created + chrono::Duration::seconds(30)), Duration::from_secs(30));
    }
}
