//! # GameShelf Engine
//!
//! Data plane for a game discovery site:
//! - Tiered cache (memory + SQLite) with TTL, stale-while-revalidate and single-flight
//! - IGDB metadata provider and bulk metadata sync
//! - Parallel game page assembly with per-slice fallbacks
//! - Fuzzy-ranked, filtered search with abort-on-supersede sessions
//! - Bot detection with session tracking and a cached, worker-backed classifier
//! - Local wishlist and history store with versioned migrations
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use gameshelf_engine::{EngineConfig, GameShelf, SearchRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EngineConfig::load(None)?;
//!     let engine = GameShelf::new(config).await?;
//!
//!     let response = engine.search(SearchRequest::new("hollow knight")).await?;
//!     if let Some(best) = response.best() {
//!         println!("Found: {} - {:.0}%", best.game.name, best.score);
//!     }
//!
//!     let page = engine.game_page("hollow-knight", Some("user-1")).await;
//!     println!("{} reviews", page.reviews.len());
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod bot;
pub mod cache;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod local;
pub mod providers;
pub mod ranking;
pub mod search;
pub mod store;
pub mod sync;

// Re-export primary types
pub use aggregator::{GameIdentifier, PageDataService};
pub use bot::{BotDetectionCache, BotRequest, BotVerdict};
pub use cache::{CacheKey, CacheStatus, FetchOptions, TieredCache};
pub use config::EngineConfig;
pub use crate::core::{Game, GamePageData, GameSource, ScoredGame, SearchFilters, SearchResponse};
pub use engine::{GameShelf, MaintenanceReport};
pub use error::{GameShelfError, Result};
pub use local::{LocalChange, LocalStore};
pub use providers::GameProvider;
pub use search::{SearchRequest, SearchService, SearchSession};
pub use store::GameStore;
pub use sync::{MetadataSync, SyncReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
