use rusqlite::{Connection, params, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::cache::{CacheEntry, CacheTier, TierHealth, TierStats};
use crate::error::{Result, GameShelfError};

/// SQLite-based "database cache" tier
///
/// ```sql
/// CREATE TABLE cache_entry (
///     key TEXT PRIMARY KEY,
///     payload TEXT NOT NULL,
///     created_at TEXT NOT NULL,
///     ttl_ms INTEGER NOT NULL,
///     expires_at_ms INTEGER NOT NULL,
///     hit_count INTEGER DEFAULT 0
/// );
/// ```
pub struct SqliteTier {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTier {
    /// Create new SQLite tier
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS cache_entry (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                ttl_ms INTEGER NOT NULL,
                expires_at_ms INTEGER NOT NULL,
                hit_count INTEGER DEFAULT 0
            )",
            [],
        )?;

        // Index for expiry sweeps
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache_entry(expires_at_ms)",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| GameShelfError::Cache("cache connection lock poisoned".to_string()))
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn to_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

#[async_trait]
impl CacheTier for SqliteTier {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                "SELECT payload, created_at, ttl_ms FROM cache_entry WHERE key = ?",
                params![key],
                |row| {
                    let payload: String = row.get(0)?;
                    let created_at: String = row.get(1)?;
                    let ttl_ms: i64 = row.get(2)?;
                    Ok((payload, created_at, ttl_ms))
                },
            )
            .optional()?;

        let Some((payload, created_at, ttl_ms)) = row else {
            return Ok(None);
        };

        let Some(created_at) = parse_timestamp(&created_at) else {
            tracing::warn!("Dropping cache entry {} with unreadable timestamp", key);
            return Ok(None);
        };

        Ok(Some(CacheEntry {
            payload: serde_json::from_str(&payload)?,
            created_at,
            ttl_ms: u64::try_from(ttl_ms).unwrap_or(0),
        }))
    }

    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let conn = self.conn()?;
        let payload = serde_json::to_string(&entry.payload)?;
        let expires_at_ms = entry.expires_at().timestamp_millis();

        conn.execute(
            "INSERT OR REPLACE INTO cache_entry (key, payload, created_at, ttl_ms, expires_at_ms, hit_count)
             VALUES (?1, ?2, ?3, ?4, ?5, COALESCE((SELECT hit_count FROM cache_entry WHERE key = ?1), 0))",
            params![
                key,
                payload,
                entry.created_at.to_rfc3339(),
                i64::try_from(entry.ttl_ms).unwrap_or(i64::MAX),
                expires_at_ms,
            ],
        )?;

        Ok(())
    }

    async fn record_hit(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;

        conn.execute(
            "UPDATE cache_entry SET hit_count = hit_count + 1 WHERE key = ?",
            params![key],
        )?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM cache_entry WHERE key = ?", params![key])?;
        Ok(deleted > 0)
    }

    async fn clear(&self) -> Result<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM cache_entry", [])?;
        Ok(deleted as u64)
    }

    async fn len(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM cache_entry", [], |row| row.get(0))?;
        Ok(count)
    }

    async fn stats(&self) -> Result<TierStats> {
        let conn = self.conn()?;

        let (total_entries, total_hits): (u64, u64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(hit_count), 0) FROM cache_entry",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let avg_hit_count: f64 = if total_entries > 0 {
            total_hits as f64 / total_entries as f64
        } else {
            0.0
        };

        let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(created_at), MAX(created_at) FROM cache_entry",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(TierStats {
            tier: self.name().to_string(),
            entries: total_entries,
            total_hits: Some(total_hits),
            avg_hit_count: Some(avg_hit_count),
            oldest_entry: oldest.and_then(|s| parse_timestamp(&s)),
            newest_entry: newest.and_then(|s| parse_timestamp(&s)),
        })
    }

    async fn purge_expired(&self, grace: Duration) -> Result<u64> {
        let conn = self.conn()?;
        let cutoff = Utc::now().timestamp_millis().saturating_sub(to_millis(grace));

        let deleted = conn.execute(
            "DELETE FROM cache_entry WHERE expires_at_ms <= ?",
            params![cutoff],
        )?;

        Ok(deleted as u64)
    }

    async fn health_check(&self) -> TierHealth {
        let start = Instant::now();
        match self.len().await {
            Ok(count) => TierHealth::healthy(self.name(), Some(count)).with_latency(start.elapsed()),
            Err(e) => TierHealth::unhealthy(self.name(), e.to_string()).with_latency(start.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_tier_create() {
        let tier = SqliteTier::new(":memory:").await.unwrap();
        let stats = tier.stats().await.unwrap();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.total_hits, Some(0));
        assert!(stats.oldest_entry.is_none());
    }

    #[tokio::test]
    async fn test_tier_put_and_get() {
        let tier = SqliteTier::new(":memory:").await.unwrap();
        let entry = CacheEntry::new(json!({"name": "CS2", "genres": ["Shooter"]}), Duration::from_secs(300));

        tier.put("game:id=730", &entry).await.unwrap();

        let cached = tier.get("game:id=730").await.unwrap().unwrap();
        assert_eq!(cached.payload["name"], "CS2");
        assert_eq!(cached.ttl_ms, 300_000);
        assert_eq!(cached.created_at.timestamp_millis(), entry.created_at.timestamp_millis());
        assert!(tier.get("game:id=1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tier_hit_count_survives_overwrite() {
        let tier = SqliteTier::new(":memory:").await.unwrap();
        let entry = CacheEntry::new(json!(1), Duration::from_secs(60));

        tier.put("k", &entry).await.unwrap();
        tier.record_hit("k").await.unwrap();
        tier.record_hit("k").await.unwrap();
        tier.put("k", &CacheEntry::new(json!(2), Duration::from_secs(60))).await.unwrap();

        let stats = tier.stats().await.unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_hits, Some(2));
        assert_eq!(stats.avg_hit_count, Some(2.0));
        assert!(stats.newest_entry.is_some());
    }

    #[tokio::test]
    async fn test_tier_purge_expired() {
        let tier = SqliteTier::new(":memory:").await.unwrap();
        let long_ago = Utc::now() - chrono::Duration::hours(2);

        tier.put("old", &CacheEntry::created_at(json!(1), Duration::from_secs(60), long_ago)).await.unwrap();
        tier.put("new", &CacheEntry::new(json!(2), Duration::from_secs(60))).await.unwrap();

        // Expired an hour+ ago, but still inside a 3h grace window
        assert_eq!(tier.purge_expired(Duration::from_secs(3 * 3600)).await.unwrap(), 0);
        assert_eq!(tier.purge_expired(Duration::from_secs(60)).await.unwrap(), 1);
        assert!(tier.get("old").await.unwrap().is_none());
        assert!(tier.get("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_tier_remove_clear_health() {
        let tier = SqliteTier::new(":memory:").await.unwrap();
        tier.put("a", &CacheEntry::new(json!(1), Duration::from_secs(60))).await.unwrap();
        tier.put("b", &CacheEntry::new(json!(2), Duration::from_secs(60))).await.unwrap();

        assert!(tier.remove("a").await.unwrap());
        assert_eq!(tier.len().await.unwrap(), 1);
        assert_eq!(tier.clear().await.unwrap(), 1);

        let health = tier.health_check().await;
        assert!(health.healthy);
        assert_eq!(health.tier, "sqlite");
    }
}
