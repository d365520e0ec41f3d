use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::AbortHandle;

use crate::cache::{CacheKey, FetchOptions, TieredCache};
use crate::core::{Game, SearchFilters, SearchResponse};
use crate::error::{GameShelfError, Result};
use crate::providers::GameProvider;
use crate::ranking::Ranker;

/// Candidates requested from the provider per query, before filtering
const CANDIDATE_LIMIT: usize = 50;

fn default_limit() -> usize {
    10
}

/// Search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub force_refresh: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: SearchFilters::default(),
            limit: default_limit(),
            force_refresh: false,
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

/// Cached, filtered and ranked game search
#[derive(Clone)]
pub struct SearchService {
    provider: Arc<dyn GameProvider>,
    ranker: Arc<dyn Ranker>,
    cache: TieredCache,
    ttl: Duration,
}

impl SearchService {
    pub fn new(provider: Arc<dyn GameProvider>, ranker: Arc<dyn Ranker>, cache: TieredCache, ttl: Duration) -> Self {
        Self {
            provider,
            ranker,
            cache,
            ttl,
        }
    }

    /// Search for games
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();
        let query = request.query.trim().to_string();

        if query.is_empty() {
            return Ok(SearchResponse::empty(request.query));
        }

        let key = CacheKey::search(&query, &request.filters);
        let options = FetchOptions::default()
            .ttl(self.ttl)
            .force_refresh(request.force_refresh)
            .stale_while_revalidate();

        let provider = self.provider.clone();
        let remote_query = query.clone();
        let filters = request.filters.clone();
        let fetched = self
            .cache
            .fetch(&key, options, move || async move {
                let games = provider.search(&remote_query, CANDIDATE_LIMIT).await?;
                tracing::debug!("Provider {} returned {} results", provider.name(), games.len());
                Ok(games.into_iter().filter(|g| filters.matches(g)).collect::<Vec<Game>>())
            })
            .await?;

        let mut results = self.ranker.rank(&query, &fetched.value)?;
        results.truncate(request.limit);

        let response = SearchResponse {
            query,
            results,
            status: fetched.status,
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            ranking_method: self.ranker.name().to_string(),
        };

        tracing::info!("🔍 {}", response.display());
        Ok(response)
    }
}

/// Search-as-you-type driver: a new search aborts the one still running
pub struct SearchSession {
    service: SearchService,
    current: Mutex<Option<AbortHandle>>,
}

impl SearchSession {
    pub fn new(service: SearchService) -> Self {
        Self {
            service,
            current: Mutex::new(None),
        }
    }

    /// Run a search, superseding any previous one; the superseded caller gets `Cancelled`
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let service = self.service.clone();
        let handle = tokio::spawn(async move { service.search(request).await });

        {
            let mut current = self
                .current
                .lock()
                .map_err(|_| GameShelfError::Other("search session lock poisoned".to_string()))?;
            if let Some(previous) = current.replace(handle.abort_handle()) {
                previous.abort();
            }
        }

        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => {
                tracing::debug!("Search superseded");
                Err(GameShelfError::Cancelled)
            }
            Err(e) => Err(GameShelfError::Other(format!("search task failed: {}", e))),
        }
    }

    /// Abort the running search, if any
    pub fn cancel(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(handle) = current.take() {
                handle.abort();
            }
        }
    }
}
