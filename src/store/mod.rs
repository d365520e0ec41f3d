pub mod row;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::core::{Game, Review, UserProgress};
use crate::error::Result;

pub use row::GameRow;
pub use sqlite::SqliteStore;

/// Discussion comment on a game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub user_id: String,
    pub game_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Hosted game/review database
#[async_trait]
pub trait GameStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Game>>;

    async fn find_by_igdb_id(&self, igdb_id: i64) -> Result<Option<Game>>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Game>>;

    /// Insert a newly seen game; returns the stored row (existing one on conflict)
    async fn insert_game(&self, game: &Game) -> Result<Game>;

    /// Fill missing metadata of the row with the same IGDB id; false when absent
    async fn upsert_game_metadata(&self, game: &Game) -> Result<bool>;

    /// Games with an IGDB id that still lack cover, summary, developer or release date
    async fn games_needing_sync(&self, limit: usize) -> Result<Vec<Game>>;

    /// Newest reviews first
    async fn reviews_for_game(&self, game_id: i64, limit: usize) -> Result<Vec<Review>>;

    async fn user_progress(&self, user_id: &str, game_id: i64) -> Result<Option<UserProgress>>;

    /// Games sharing franchise/collection or listed as similar
    async fn related_games(&self, game: &Game, limit: usize) -> Result<Vec<Game>>;

    async fn user_rating(&self, user_id: &str, game_id: i64) -> Result<Option<Review>>;

    /// Create or replace the user's rating of a game
    async fn add_review(&self, user_id: &str, game_id: i64, rating: f64, review: Option<&str>) -> Result<Review>;

    async fn set_progress(&self, progress: &UserProgress) -> Result<()>;

    async fn ensure_user(&self, user_id: &str, username: &str) -> Result<()>;

    async fn add_comment(&self, user_id: &str, game_id: i64, content: &str) -> Result<Comment>;

    async fn comments_for_game(&self, game_id: i64, limit: usize) -> Result<Vec<Comment>>;
}
