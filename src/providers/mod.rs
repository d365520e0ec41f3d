pub mod igdb;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use crate::core::Game;
use crate::error::Result;

pub use igdb::IgdbProvider;

/// Trait for game metadata providers (IGDB)
#[async_trait]
pub trait GameProvider: Send + Sync {
    /// Search for games by free text
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Game>>;

    /// Get game by provider id
    async fn get_by_id(&self, id: i64) -> Result<Game>;

    /// Get game by URL slug
    async fn get_by_slug(&self, slug: &str) -> Result<Game>;

    /// Get several games at once; missing ids are skipped
    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Game>>;

    /// Get provider name
    fn name(&self) -> &str;

    /// Check if provider is available
    async fn is_available(&self) -> bool;
}
