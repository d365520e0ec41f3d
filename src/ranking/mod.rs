pub mod fuzzy;

use crate::core::{Game, ScoredGame};
use crate::error::Result;

pub use fuzzy::FuzzyRanker;

/// Trait for ranking/fuzzy matching implementations
pub trait Ranker: Send + Sync {
    /// Rank candidates against query, return sorted by score (highest first)
    fn rank(&self, query: &str, candidates: &[Game]) -> Result<Vec<ScoredGame>>;

    /// Get ranker name for logging
    fn name(&self) -> &str;
}
