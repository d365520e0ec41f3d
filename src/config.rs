//! Engine configuration.
//!
//! Loaded from an optional YAML file, then overridden by environment
//! variables. Every field has a default so an empty file (or no file) works.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{GameShelfError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub igdb: IgdbConfig,
    pub bot: BotConfig,
    pub sync: SyncConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// SQLite file backing the database tier
    pub db_path: String,
    pub default_ttl_secs: u64,
    pub search_ttl_secs: u64,
    pub game_ttl_secs: u64,
    /// Max entries in the memory tier (0 = unbounded)
    pub memory_capacity: usize,
    /// How long expired entries are kept for stale serving before purge
    pub stale_retention_secs: u64,
    pub maintenance_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: "gameshelf.db".to_string(),
            default_ttl_secs: 5 * 60,
            search_ttl_secs: 5 * 60,
            game_ttl_secs: 24 * 60 * 60,
            memory_capacity: 1000,
            stale_retention_secs: 7 * 24 * 60 * 60,
            maintenance_interval_secs: 5 * 60,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn game_ttl(&self) -> Duration {
        Duration::from_secs(self.game_ttl_secs)
    }

    pub fn stale_retention(&self) -> Duration {
        Duration::from_secs(self.stale_retention_secs)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IgdbConfig {
    pub client_id: String,
    pub access_token: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for IgdbConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            access_token: String::new(),
            base_url: "https://api.igdb.com/v4".to_string(),
            timeout_secs: 10,
        }
    }
}

impl IgdbConfig {
    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.access_token.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub verdict_ttl_secs: u64,
    /// Capped at 24h
    pub session_max_age_secs: u64,
    /// Capped at 50 views
    pub history_limit: usize,
    pub cleanup_interval_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            verdict_ttl_secs: 10 * 60,
            session_max_age_secs: 24 * 60 * 60,
            history_limit: 50,
            cleanup_interval_secs: 30 * 60,
        }
    }
}

impl BotConfig {
    pub fn verdict_ttl(&self) -> Duration {
        Duration::from_secs(self.verdict_ttl_secs)
    }

    pub fn session_max_age(&self) -> Duration {
        Duration::from_secs(self.session_max_age_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// IGDB ids per request (IGDB caps a page at 500)
    pub batch_size: usize,
    /// Concurrent IGDB requests
    pub parallel_requests: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            parallel_requests: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Game/review database
    pub db_path: String,
    /// Wishlist and history database
    pub local_db_path: String,
    pub related_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "gameshelf.db".to_string(),
            local_db_path: "gameshelf-local.db".to_string(),
            related_limit: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8090 }
    }
}

impl EngineConfig {
    /// Load YAML config (if the file exists) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_yaml(&std::fs::read_to_string(path).map_err(|e| {
                GameShelfError::Config(format!("cannot read {}: {}", path.display(), e))
            })?)?,
            Some(path) => {
                tracing::warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| GameShelfError::Config(format!("invalid value for {}: {:?}", name, value)))
        }

        if let Some(db) = lookup("GAMESHELF_DB") {
            self.cache.db_path = db.clone();
            self.store.db_path = db;
        }
        if let Some(local) = lookup("GAMESHELF_LOCAL_DB") {
            self.store.local_db_path = local;
        }
        if let Some(id) = lookup("IGDB_CLIENT_ID") {
            self.igdb.client_id = id;
        }
        if let Some(token) = lookup("IGDB_ACCESS_TOKEN") {
            self.igdb.access_token = token;
        }
        if let Some(url) = lookup("IGDB_BASE_URL") {
            self.igdb.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse("PORT", &port)?;
        }
        if let Some(ttl) = lookup("CACHE_TTL_SECS") {
            self.cache.default_ttl_secs = parse("CACHE_TTL_SECS", &ttl)?;
        }
        if let Some(ttl) = lookup("SEARCH_TTL_SECS") {
            self.cache.search_ttl_secs = parse("SEARCH_TTL_SECS", &ttl)?;
        }
        if let Some(capacity) = lookup("MEMORY_CACHE_CAPACITY") {
            self.cache.memory_capacity = parse("MEMORY_CACHE_CAPACITY", &capacity)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.bot.history_limit, 50);
        assert_eq!(config.bot.session_max_age(), Duration::from_secs(86_400));
        assert_eq!(config.sync.batch_size, 500);
        assert_eq!(config.igdb.base_url, "https://api.igdb.com/v4");
        assert!(!config.igdb.has_credentials());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
cache:
  search_ttl_secs: 60
igdb:
  client_id: abc
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.cache.search_ttl_secs, 60);
        assert_eq!(config.cache.default_ttl_secs, 300);
        assert_eq!(config.igdb.client_id, "abc");
        assert_eq!(config.server.port, 8090);
    }

    #[test]
    fn test_empty_yaml() {
        let config = EngineConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.store.related_limit, 8);
    }

    #[test]
    fn test_invalid_yaml() {
        let err = EngineConfig::from_yaml("cache: [1, 2").unwrap_err();
        assert!(matches!(err, GameShelfError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GAMESHELF_DB", "/tmp/shelf.db"),
            ("IGDB_CLIENT_ID", "id"),
            ("IGDB_ACCESS_TOKEN", "token"),
            ("IGDB_BASE_URL", "http://localhost:9000/"),
            ("PORT", "9999"),
            ("MEMORY_CACHE_CAPACITY", "10"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.cache.db_path, "/tmp/shelf.db");
        assert_eq!(config.store.db_path, "/tmp/shelf.db");
        assert!(config.igdb.has_credentials());
        assert_eq!(config.igdb.base_url, "http://localhost:9000");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.cache.memory_capacity, 10);
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_env(|name| (name == "PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
