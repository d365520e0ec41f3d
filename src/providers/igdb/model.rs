use chrono::DateTime;
use serde::Deserialize;

use crate::core::{slugify, Game, GameSource};

/// Raw IGDB `/games` record
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IgdbGame {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub cover: Option<IgdbImage>,
    /// Unix seconds
    #[serde(default)]
    pub first_release_date: Option<i64>,
    #[serde(default)]
    pub genres: Vec<IgdbNamed>,
    #[serde(default)]
    pub platforms: Vec<IgdbNamed>,
    #[serde(default)]
    pub involved_companies: Vec<IgdbInvolvedCompany>,
    #[serde(default)]
    pub screenshots: Vec<IgdbImage>,
    #[serde(default)]
    pub aggregated_rating: Option<f64>,
    #[serde(default)]
    pub total_rating: Option<f64>,
    #[serde(default)]
    pub total_rating_count: Option<i32>,
    #[serde(default)]
    pub franchises: Vec<IgdbNamed>,
    #[serde(default)]
    pub collections: Vec<IgdbNamed>,
    #[serde(default)]
    pub alternative_names: Vec<IgdbNamed>,
    #[serde(default)]
    pub similar_games: Vec<i64>,
    #[serde(default)]
    pub dlcs: Vec<i64>,
    #[serde(default)]
    pub expansions: Vec<i64>,
    #[serde(default)]
    pub category: Option<i32>,
    #[serde(default)]
    pub parent_game: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IgdbImage {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IgdbNamed {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IgdbInvolvedCompany {
    #[serde(default)]
    pub company: Option<IgdbNamed>,
    #[serde(default)]
    pub developer: bool,
    #[serde(default)]
    pub publisher: bool,
}

/// Protocol-relative IGDB image URL to https, thumbnail size to 1080p
pub fn normalize_image_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let absolute = if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    };
    Some(absolute.replace("t_thumb", "t_1080p"))
}

fn names(items: &[IgdbNamed]) -> Vec<String> {
    items
        .iter()
        .filter(|n| !n.name.is_empty())
        .map(|n| n.name.clone())
        .collect()
}

impl Game {
    /// Convert an IGDB record into the canonical game shape
    pub fn from_igdb(raw: IgdbGame) -> Game {
        // Last flagged company wins
        let company_with = |flag: fn(&IgdbInvolvedCompany) -> bool| {
            raw.involved_companies
                .iter()
                .filter(|c| flag(c))
                .filter_map(|c| c.company.as_ref().map(|n| n.name.clone()))
                .last()
        };
        let developer = company_with(|c| c.developer);
        let publisher = company_with(|c| c.publisher);

        let mut game = Game::new(raw.name.clone());
        game.igdb_id = Some(raw.id);
        game.slug = raw
            .slug
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| slugify(&raw.name));
        game.summary = raw.summary.clone().filter(|s| !s.trim().is_empty());
        game.cover_url = raw.cover.as_ref().and_then(|c| normalize_image_url(&c.url));
        game.release_date = raw
            .first_release_date
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.date_naive());
        game.developer = developer;
        game.publisher = publisher;
        game.genres = names(&raw.genres);
        game.platforms = names(&raw.platforms);
        game.screenshots = raw
            .screenshots
            .iter()
            .filter_map(|s| normalize_image_url(&s.url))
            .collect();
        game.total_rating = raw.total_rating.map(|r| r.round() as i32);
        game.rating_count = raw.total_rating_count.unwrap_or(0);
        game.metacritic_score = raw.aggregated_rating.map(|r| r.round() as i32);
        game.franchise_name = raw.franchises.first().map(|f| f.name.clone());
        game.collection_name = raw.collections.first().map(|c| c.name.clone());
        game.alternative_names = names(&raw.alternative_names);
        game.similar_game_ids = raw.similar_games;
        game.dlc_ids = raw.dlcs;
        game.expansion_ids = raw.expansions;
        game.category = raw.category;
        game.parent_game = raw.parent_game;
        game.source = GameSource::Igdb;
        game
    }
}
