pub mod entry;
pub mod flight;
pub mod key;
pub mod memory;
pub mod sqlite;
pub mod tiered;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

pub use entry::{CacheEntry, Freshness};
pub use flight::{FlightRole, SingleFlight};
pub use key::{normalize_query, CacheKey};
pub use memory::MemoryTier;
pub use sqlite::SqliteTier;
pub use tiered::{FetchOptions, Fetched, TieredCache};

/// Trait for cache tier implementations
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Tier name for logging and stats
    fn name(&self) -> &str;

    /// Get entry by key, fresh or stale
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Insert or replace an entry
    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<()>;

    /// Increment hit counter, for tiers that track one
    async fn record_hit(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    /// Remove one entry; true if it existed
    async fn remove(&self, key: &str) -> Result<bool>;

    /// Remove every entry, returning how many were removed
    async fn clear(&self) -> Result<u64>;

    async fn len(&self) -> Result<u64>;

    /// Usage snapshot; tiers without hit tracking report entries only
    async fn stats(&self) -> Result<TierStats> {
        Ok(TierStats::new(self.name(), self.len().await?))
    }

    /// Remove entries that expired more than `grace` ago
    async fn purge_expired(&self, grace: Duration) -> Result<u64>;

    async fn health_check(&self) -> TierHealth;
}

/// How a fetch was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Fresh entry from a tier
    Hit,
    /// Expired entry served while a refresh runs (or after a compute error)
    Stale,
    /// Computed by this caller
    Miss,
    /// Joined another caller's in-flight computation
    Coalesced,
    /// Recomputed because the caller forced it
    Refreshed,
    /// Cache not consulted
    Bypass,
}

impl CacheStatus {
    pub fn is_cached(self) -> bool {
        matches!(self, CacheStatus::Hit | CacheStatus::Stale)
    }
}

/// Result of a tier health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierHealth {
    pub tier: String,
    pub healthy: bool,
    pub entries: Option<u64>,
    pub message: Option<String>,
    pub latency_ms: f64,
}

impl TierHealth {
    pub fn healthy(tier: &str, entries: Option<u64>) -> Self {
        Self {
            tier: tier.to_string(),
            healthy: true,
            entries,
            message: None,
            latency_ms: 0.0,
        }
    }

    pub fn unhealthy(tier: &str, message: impl Into<String>) -> Self {
        Self {
            tier: tier.to_string(),
            healthy: false,
            entries: None,
            message: Some(message.into()),
            latency_ms: 0.0,
        }
    }

    pub fn with_latency(mut self, elapsed: Duration) -> Self {
        self.latency_ms = elapsed.as_secs_f64() * 1000.0;
        self
    }
}

/// Usage of one tier
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    pub tier: String,
    pub entries: u64,
    /// Total recorded hits, for tiers that count them
    pub total_hits: Option<u64>,
    pub avg_hit_count: Option<f64>,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

impl TierStats {
    pub fn new(tier: &str, entries: u64) -> Self {
        Self {
            tier: tier.to_string(),
            entries,
            ..Self::default()
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale_served: u64,
    pub coalesced: u64,
    pub computes: u64,
    pub compute_errors: u64,
    /// Per-tier usage, in lookup order
    pub tiers: Vec<TierStats>,
}

impl CacheStats {
    pub fn total_entries(&self) -> u64 {
        self.tiers.iter().map(|t| t.entries).sum()
    }

    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.stale_served + self.misses;
        if lookups == 0 {
            0.0
        } else {
            (self.hits + self.stale_served) as f64 / lookups as f64
        }
    }
}
