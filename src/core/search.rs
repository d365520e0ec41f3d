use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::cache::CacheStatus;
use crate::core::Game;

/// Filters applied to search results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Keep games having at least one of these genres (case-insensitive)
    #[serde(default)]
    pub genres: BTreeSet<String>,

    /// Keep games available on at least one of these platforms (case-insensitive)
    #[serde(default)]
    pub platforms: BTreeSet<String>,

    /// Minimum total rating (0-100)
    #[serde(default)]
    pub min_rating: Option<i32>,

    #[serde(default)]
    pub year_from: Option<i32>,

    #[serde(default)]
    pub year_to: Option<i32>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
            && self.platforms.is_empty()
            && self.min_rating.is_none()
            && self.year_from.is_none()
            && self.year_to.is_none()
    }

    /// Filter set as (name, value) pairs for cache key construction
    pub fn key_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if !self.genres.is_empty() {
            let genres: Vec<String> = self.genres.iter().map(|g| g.to_lowercase()).collect();
            pairs.push(("genres".to_string(), genres.join(",")));
        }
        if !self.platforms.is_empty() {
            let platforms: Vec<String> = self.platforms.iter().map(|p| p.to_lowercase()).collect();
            pairs.push(("platforms".to_string(), platforms.join(",")));
        }
        if let Some(min) = self.min_rating {
            pairs.push(("min_rating".to_string(), min.to_string()));
        }
        if let Some(from) = self.year_from {
            pairs.push(("year_from".to_string(), from.to_string()));
        }
        if let Some(to) = self.year_to {
            pairs.push(("year_to".to_string(), to.to_string()));
        }
        pairs
    }

    /// Check whether a game passes every active filter
    pub fn matches(&self, game: &Game) -> bool {
        fn any_overlap(wanted: &BTreeSet<String>, have: &[String]) -> bool {
            wanted.is_empty()
                || have
                    .iter()
                    .any(|h| wanted.iter().any(|w| w.eq_ignore_ascii_case(h)))
        }

        if !any_overlap(&self.genres, &game.genres) || !any_overlap(&self.platforms, &game.platforms) {
            return false;
        }
        if let Some(min) = self.min_rating {
            if game.total_rating.map_or(true, |r| r < min) {
                return false;
            }
        }
        if self.year_from.is_some() || self.year_to.is_some() {
            let Some(year) = game.year() else {
                return false;
            };
            if self.year_from.is_some_and(|from| year < from) || self.year_to.is_some_and(|to| year > to) {
                return false;
            }
        }
        true
    }
}

/// Game with its relevance score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredGame {
    pub game: Game,
    /// Match score (0.0 - 100.0)
    pub score: f64,
}

/// Search response with ranked games and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,

    /// Ranked results, best first
    pub results: Vec<ScoredGame>,

    /// Where the underlying result set came from
    pub status: CacheStatus,

    /// Search latency in milliseconds
    pub latency_ms: f64,

    /// Ranking method used
    pub ranking_method: String,
}

impl SearchResponse {
    /// Response for a query that was never sent
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            results: Vec::new(),
            status: CacheStatus::Bypass,
            latency_ms: 0.0,
            ranking_method: String::from("none"),
        }
    }

    pub fn best(&self) -> Option<&ScoredGame> {
        self.results.first()
    }

    pub fn from_cache(&self) -> bool {
        self.status.is_cached()
    }

    /// Get display string for logging
    pub fn display(&self) -> String {
        match self.best() {
            Some(best) => format!(
                "{} -> {} ({:.1}%) [{} results, {:?}, {:.1}ms]",
                self.query,
                best.game.display_name(),
                best.score,
                self.results.len(),
                self.status,
                self.latency_ms
            ),
            None => format!("{} -> no results [{:?}]", self.query, self.status),
        }
    }
}
