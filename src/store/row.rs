use chrono::NaiveDate;
use rusqlite::Row;

use crate::core::{Game, GameSource};

/// Columns of the `game` table, in `GameRow::from_row` order
pub const GAME_COLUMNS: &str = "id, igdb_id, slug, name, summary, cover_url, release_date, developer, publisher, \
     genres, platforms, screenshots, total_rating, rating_count, metacritic_score, franchise_name, \
     collection_name, alternative_names, similar_game_ids, dlc_ids, expansion_ids, category, parent_game, \
     data_source";

/// `game` table row as stored; list columns hold JSON arrays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameRow {
    pub id: Option<i64>,
    pub igdb_id: Option<i64>,
    pub slug: String,
    pub name: String,
    pub summary: Option<String>,
    pub cover_url: Option<String>,
    /// YYYY-MM-DD
    pub release_date: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub genres: String,
    pub platforms: String,
    pub screenshots: String,
    pub total_rating: Option<i32>,
    pub rating_count: i32,
    pub metacritic_score: Option<i32>,
    pub franchise_name: Option<String>,
    pub collection_name: Option<String>,
    pub alternative_names: String,
    pub similar_game_ids: String,
    pub dlc_ids: String,
    pub expansion_ids: String,
    pub category: Option<i32>,
    pub parent_game: Option<i64>,
    pub data_source: Option<String>,
}

impl GameRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            igdb_id: row.get(1)?,
            slug: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            name: row.get(3)?,
            summary: row.get(4)?,
            cover_url: row.get(5)?,
            release_date: row.get(6)?,
            developer: row.get(7)?,
            publisher: row.get(8)?,
            genres: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            platforms: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
            screenshots: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
            total_rating: row.get(12)?,
            rating_count: row.get::<_, Option<i32>>(13)?.unwrap_or(0),
            metacritic_score: row.get(14)?,
            franchise_name: row.get(15)?,
            collection_name: row.get(16)?,
            alternative_names: row.get::<_, Option<String>>(17)?.unwrap_or_default(),
            similar_game_ids: row.get::<_, Option<String>>(18)?.unwrap_or_default(),
            dlc_ids: row.get::<_, Option<String>>(19)?.unwrap_or_default(),
            expansion_ids: row.get::<_, Option<String>>(20)?.unwrap_or_default(),
            category: row.get(21)?,
            parent_game: row.get(22)?,
            data_source: row.get(23)?,
        })
    }
}

/// Lenient JSON-array column decoding: empty or malformed means empty
fn list<T: serde::de::DeserializeOwned>(column: &str) -> Vec<T> {
    if column.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(column).unwrap_or_else(|e| {
        tracing::warn!("Malformed list column {:?}: {}", column, e);
        Vec::new()
    })
}

fn encode<T: serde::Serialize>(items: &[T]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

impl From<GameRow> for Game {
    fn from(row: GameRow) -> Self {
        let mut game = Game::new(row.name);
        game.id = row.id;
        game.igdb_id = row.igdb_id;
        if !row.slug.is_empty() {
            game.slug = row.slug;
        }
        game.summary = row.summary;
        game.cover_url = row.cover_url;
        game.release_date = row
            .release_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        game.developer = row.developer;
        game.publisher = row.publisher;
        game.genres = list(&row.genres);
        game.platforms = list(&row.platforms);
        game.screenshots = list(&row.screenshots);
        game.total_rating = row.total_rating;
        game.rating_count = row.rating_count;
        game.metacritic_score = row.metacritic_score;
        game.franchise_name = row.franchise_name;
        game.collection_name = row.collection_name;
        game.alternative_names = list(&row.alternative_names);
        game.similar_game_ids = list(&row.similar_game_ids);
        game.dlc_ids = list(&row.dlc_ids);
        game.expansion_ids = list(&row.expansion_ids);
        game.category = row.category;
        game.parent_game = row.parent_game;
        game.source = match row.data_source.as_deref() {
            Some("igdb") | Some("igdb_sync") => GameSource::Merged,
            _ => GameSource::Database,
        };
        game
    }
}

impl From<&Game> for GameRow {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id,
            igdb_id: game.igdb_id,
            slug: game.slug.clone(),
            name: game.name.clone(),
            summary: game.summary.clone(),
            cover_url: game.cover_url.clone(),
            release_date: game.release_date.map(|d| d.format("%Y-%m-%d").to_string()),
            developer: game.developer.clone(),
            publisher: game.publisher.clone(),
            genres: encode(&game.genres),
            platforms: encode(&game.platforms),
            screenshots: encode(&game.screenshots),
            total_rating: game.total_rating,
            rating_count: game.rating_count,
            metacritic_score: game.metacritic_score,
            franchise_name: game.franchise_name.clone(),
            collection_name: game.collection_name.clone(),
            alternative_names: encode(&game.alternative_names),
            similar_game_ids: encode(&game.similar_game_ids),
            dlc_ids: encode(&game.dlc_ids),
            expansion_ids: encode(&game.expansion_ids),
            category: game.category,
            parent_game: game.parent_game,
            data_source: Some(
                match game.source {
                    GameSource::Igdb => "igdb",
                    GameSource::Merged => "igdb_sync",
                    GameSource::Database => "manual",
                }
                .to_string(),
            ),
        }
    }
}
