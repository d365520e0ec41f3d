//! Game page assembly.
//!
//! Resolves the canonical game row (database first, IGDB through the cache
//! otherwise) and then loads reviews, user progress, related games and the
//! user's own rating concurrently. Secondary reads degrade to empty values;
//! only a failed primary lookup yields an empty page.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheKey, FetchOptions, TieredCache};
use crate::core::{Game, GamePageData, Review, UserProgress};
use crate::error::Result;
use crate::providers::GameProvider;
use crate::store::GameStore;

/// Reviews shown on a page
const REVIEW_LIMIT: usize = 20;

/// How a page addresses its game
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameIdentifier {
    IgdbId(i64),
    Slug(String),
}

impl GameIdentifier {
    /// All digits is an IGDB id, anything else a slug
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(id) = raw.parse() {
                return Self::IgdbId(id);
            }
        }
        Self::Slug(raw.to_lowercase())
    }
}

impl fmt::Display for GameIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IgdbId(id) => write!(f, "{}", id),
            Self::Slug(slug) => f.write_str(slug),
        }
    }
}

/// Builds `GamePageData` from the store and the metadata provider
pub struct PageDataService {
    store: Arc<dyn GameStore>,
    provider: Arc<dyn GameProvider>,
    cache: TieredCache,
    game_ttl: Duration,
    related_limit: usize,
}

impl PageDataService {
    pub fn new(
        store: Arc<dyn GameStore>,
        provider: Arc<dyn GameProvider>,
        cache: TieredCache,
        game_ttl: Duration,
        related_limit: usize,
    ) -> Self {
        Self {
            store,
            provider,
            cache,
            game_ttl,
            related_limit,
        }
    }

    /// Load everything a game page shows. Never fails: an unknown game is an empty page.
    pub async fn load(&self, identifier: &str, user_id: Option<&str>) -> GamePageData {
        let identifier = GameIdentifier::parse(identifier);

        let game = match self.resolve(&identifier).await {
            Ok(Some(game)) => game,
            Ok(None) => {
                tracing::info!("📭 No game for '{}'", identifier);
                return GamePageData::empty();
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to resolve game '{}': {}", identifier, e);
                return GamePageData::empty();
            }
        };

        let Some(game_id) = game.id else {
            tracing::warn!("⚠️ Game '{}' has no database id", identifier);
            return GamePageData::empty();
        };

        let (reviews, user_progress, related_games, user_rating) = tokio::join!(
            self.reviews(game_id),
            self.progress(user_id, game_id),
            self.related(&game),
            self.rating(user_id, game_id),
        );

        GamePageData {
            game: Some(game),
            reviews,
            user_progress,
            related_games,
            user_rating,
        }
    }

    /// Canonical row from the store, falling back to IGDB (cached) and inserting it
    async fn resolve(&self, identifier: &GameIdentifier) -> Result<Option<Game>> {
        let stored = match identifier {
            GameIdentifier::IgdbId(id) => self.store.find_by_igdb_id(*id).await?,
            GameIdentifier::Slug(slug) => self.store.find_by_slug(slug).await?,
        };
        if stored.is_some() {
            return Ok(stored);
        }

        let key = CacheKey::igdb(&identifier.to_string());
        let provider = self.provider.clone();
        let lookup = identifier.clone();
        let fetched = self
            .cache
            .fetch(&key, FetchOptions::default().ttl(self.game_ttl), move || async move {
                match lookup {
                    GameIdentifier::IgdbId(id) => provider.get_by_id(id).await,
                    GameIdentifier::Slug(slug) => provider.get_by_slug(&slug).await,
                }
            })
            .await?;

        tracing::info!("📥 Importing '{}' from IGDB ({:?})", fetched.value.name, fetched.status);
        Ok(Some(self.store.insert_game(&fetched.value).await?))
    }

    async fn reviews(&self, game_id: i64) -> Vec<Review> {
        self.store
            .reviews_for_game(game_id, REVIEW_LIMIT)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("⚠️ Reviews for game {} unavailable: {}", game_id, e);
                Vec::new()
            })
    }

    async fn progress(&self, user_id: Option<&str>, game_id: i64) -> Option<UserProgress> {
        let user_id = user_id?;
        self.store
            .user_progress(user_id, game_id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("⚠️ Progress of {} on game {} unavailable: {}", user_id, game_id, e);
                None
            })
    }

    async fn related(&self, game: &Game) -> Vec<Game> {
        self.store
            .related_games(game, self.related_limit)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("⚠️ Related games for '{}' unavailable: {}", game.name, e);
                Vec::new()
            })
    }

    async fn rating(&self, user_id: Option<&str>, game_id: i64) -> Option<Review> {
        let user_id = user_id?;
        self.store
            .user_rating(user_id, game_id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("⚠️ Rating of {} on game {} unavailable: {}", user_id, game_id, e);
                None
            })
    }
}
