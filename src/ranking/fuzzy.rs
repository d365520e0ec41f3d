use rapidfuzz::distance::jaro_winkler;
use std::cmp::Ordering;

use crate::cache::normalize_query;
use crate::core::{Game, ScoredGame};
use crate::error::Result;
use crate::ranking::Ranker;

/// Jaro-Winkler ranker over game names and alternative names
pub struct FuzzyRanker;

impl FuzzyRanker {
    pub fn new() -> Self {
        Self
    }

    /// Similarity of the query to one game (0-100)
    pub fn score(&self, query: &str, game: &Game) -> f64 {
        let query = normalize_query(query);
        std::iter::once(&game.name)
            .chain(game.alternative_names.iter())
            .map(|name| similarity(&query, &normalize_query(name)))
            .fold(0.0, f64::max)
    }
}

impl Default for FuzzyRanker {
    fn default() -> Self {
        Self::new()
    }
}

fn similarity(query: &str, name: &str) -> f64 {
    // Jaro-Winkler similarity (0.0 - 1.0)
    jaro_winkler::normalized_similarity(query.chars(), name.chars()) * 100.0
}

impl Ranker for FuzzyRanker {
    fn rank(&self, query: &str, candidates: &[Game]) -> Result<Vec<ScoredGame>> {
        let mut ranked: Vec<ScoredGame> = candidates
            .iter()
            .map(|game| ScoredGame {
                score: self.score(query, game),
                game: game.clone(),
            })
            .collect();

        // Ties keep the more popular game first
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.game.rating_count.cmp(&a.game.rating_count))
        });

        Ok(ranked)
    }

    fn name(&self) -> &str {
        "jaro-winkler"
    }
}
