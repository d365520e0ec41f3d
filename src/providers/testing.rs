//! In-process provider for unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::Game;
use crate::error::{GameShelfError, Result};
use crate::providers::GameProvider;

pub(crate) struct MockProvider {
    games: Vec<Game>,
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn new(games: Vec<Game>) -> Self {
        Self {
            games,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    async fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(GameShelfError::provider("mock", "unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl GameProvider for MockProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Game>> {
        self.enter().await?;
        let first = query.split_whitespace().next().unwrap_or_default().to_lowercase();
        Ok(self
            .games
            .iter()
            .filter(|g| g.name.to_lowercase().contains(&first))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Game> {
        self.enter().await?;
        self.games
            .iter()
            .find(|g| g.igdb_id == Some(id))
            .cloned()
            .ok_or_else(|| GameShelfError::NotFound(format!("mock game {}", id)))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Game> {
        self.enter().await?;
        self.games
            .iter()
            .find(|g| g.slug == slug)
            .cloned()
            .ok_or_else(|| GameShelfError::NotFound(format!("mock game '{}'", slug)))
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Game>> {
        self.enter().await?;
        Ok(self
            .games
            .iter()
            .filter(|g| g.igdb_id.is_some_and(|id| ids.contains(&id)))
            .cloned()
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }

    async fn is_available(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }
}
