use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::aggregator::PageDataService;
use crate::bot::{BotClassification, BotCleanup, BotDetectionCache, BotRequest};
use crate::cache::{CacheStats, TierHealth, TieredCache};
use crate::config::EngineConfig;
use crate::core::{GamePageData, SearchResponse};
use crate::error::Result;
use crate::local::LocalStore;
use crate::providers::{GameProvider, IgdbProvider};
use crate::ranking::FuzzyRanker;
use crate::search::{SearchRequest, SearchService, SearchSession};
use crate::store::{GameStore, SqliteStore};
use crate::sync::{MetadataSync, SyncReport};

/// What a maintenance pass removed
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaintenanceReport {
    pub cache_entries: u64,
    pub bot: BotCleanup,
}

/// Main orchestrator: owns the cache, stores, provider and services
pub struct GameShelf {
    config: EngineConfig,
    cache: TieredCache,
    store: Arc<dyn GameStore>,
    provider: Arc<dyn GameProvider>,
    search: SearchService,
    pages: PageDataService,
    bots: Arc<BotDetectionCache>,
    local: LocalStore,
}

impl GameShelf {
    /// Build everything from configuration: SQLite cache + store, IGDB provider
    pub async fn new(config: EngineConfig) -> Result<Self> {
        let cache = TieredCache::from_config(&config.cache).await?;
        let store: Arc<dyn GameStore> = Arc::new(SqliteStore::new(&config.store.db_path).await?);
        let provider: Arc<dyn GameProvider> = Arc::new(IgdbProvider::new(&config.igdb)?);

        if !config.igdb.has_credentials() {
            tracing::warn!("⚠️ IGDB credentials missing, remote lookups will fail");
        }

        Self::with_parts(config, cache, store, provider).await
    }

    /// Build around caller-supplied cache, store and provider
    pub async fn with_parts(
        config: EngineConfig,
        cache: TieredCache,
        store: Arc<dyn GameStore>,
        provider: Arc<dyn GameProvider>,
    ) -> Result<Self> {
        let search = SearchService::new(
            provider.clone(),
            Arc::new(FuzzyRanker::new()),
            cache.clone(),
            config.cache.search_ttl(),
        );
        let pages = PageDataService::new(
            store.clone(),
            provider.clone(),
            cache.clone(),
            config.cache.game_ttl(),
            config.store.related_limit,
        );
        let bots = Arc::new(BotDetectionCache::new(&config.bot));
        let local = LocalStore::open(&config.store.local_db_path).await?;

        tracing::info!("✅ GameShelf engine ready (provider: {})", provider.name());

        Ok(Self {
            config,
            cache,
            store,
            provider,
            search,
            pages,
            bots,
            local,
        })
    }

    /// Search for games
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        self.search.search(request).await
    }

    /// Search driver for search-as-you-type callers
    pub fn search_session(&self) -> SearchSession {
        SearchSession::new(self.search.clone())
    }

    /// Everything a game page shows; unknown games yield an empty page
    pub async fn game_page(&self, identifier: &str, user_id: Option<&str>) -> GamePageData {
        self.pages.load(identifier, user_id).await
    }

    pub async fn classify(&self, request: &BotRequest) -> Result<BotClassification> {
        self.bots.classify(request).await
    }

    /// Enrich stored games from IGDB
    pub async fn sync(&self) -> Result<SyncReport> {
        MetadataSync::new(self.store.clone(), self.provider.clone(), &self.config.sync)
            .run()
            .await
    }

    /// Get cache statistics
    pub async fn cache_stats(&self) -> Result<CacheStats> {
        self.cache.stats().await
    }

    pub async fn cache_health(&self) -> Vec<TierHealth> {
        self.cache.health().await
    }

    /// Drop every cached entry
    pub async fn clear_cache(&self) -> Result<u64> {
        self.cache.clear().await
    }

    /// Purge long-expired cache entries, stale bot verdicts and idle sessions
    pub async fn cleanup(&self) -> Result<MaintenanceReport> {
        Ok(MaintenanceReport {
            cache_entries: self.cache.purge_expired(self.config.cache.stale_retention()).await?,
            bot: self.bots.cleanup(),
        })
    }

    /// Start the periodic cache and bot maintenance tasks
    pub fn spawn_maintenance(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.cache.spawn_maintenance(
                self.config.cache.maintenance_interval(),
                self.config.cache.stale_retention(),
            ),
            self.bots.spawn_maintenance(self.config.bot.cleanup_interval()),
        ]
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &TieredCache {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn GameStore> {
        &self.store
    }

    pub fn provider(&self) -> &Arc<dyn GameProvider> {
        &self.provider
    }

    pub fn bots(&self) -> &Arc<BotDetectionCache> {
        &self.bots
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    /// Stop background workers
    pub async fn shutdown(&self) {
        self.bots.shutdown().await;
    }
}
