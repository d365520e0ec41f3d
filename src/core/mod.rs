pub mod game;
pub mod page;
pub mod search;

pub use game::{slugify, Game, GameSource};
pub use page::{GamePageData, Review, UserProgress};
pub use search::{ScoredGame, SearchFilters, SearchResponse};
