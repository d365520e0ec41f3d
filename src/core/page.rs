use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::Game;

/// A user's rating (with optional review text) of a game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: i64,
    pub user_id: String,
    pub game_id: i64,
    /// Rating on a 0.0-10.0 scale
    pub rating: f64,
    #[serde(default)]
    pub review: Option<String>,
    /// Display name of the author, when the user row exists
    #[serde(default)]
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-user play state of a game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProgress {
    pub user_id: String,
    pub game_id: i64,
    pub started: bool,
    pub completed: bool,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Everything a game page needs, loaded in one pass
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GamePageData {
    pub game: Option<Game>,
    pub reviews: Vec<Review>,
    pub user_progress: Option<UserProgress>,
    pub related_games: Vec<Game>,
    pub user_rating: Option<Review>,
}

impl GamePageData {
    /// Composite with every slice empty
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.game.is_none()
    }

    /// Mean rating across loaded reviews
    pub fn average_rating(&self) -> Option<f64> {
        if self.reviews.is_empty() {
            return None;
        }
        let sum: f64 = self.reviews.iter().map(|r| r.rating).sum();
        Some(sum / self.reviews.len() as f64)
    }
}
