use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Where a game record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameSource {
    /// Transformed IGDB API response
    Igdb,
    /// Row from the hosted database
    #[default]
    Database,
    /// Database row enriched with IGDB metadata
    Merged,
}

/// IGDB category codes that mark add-on content
const CATEGORY_DLC: i32 = 1;
const CATEGORY_EXPANSION: i32 = 2;

/// Canonical game record shared by every layer.
///
/// Database rows and IGDB responses are both converted into this shape at the
/// boundary (see `store::GameRow` and `providers::igdb::IgdbGame`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Game {
    /// Hosted database id (None until inserted)
    #[serde(default)]
    pub id: Option<i64>,

    /// IGDB id
    #[serde(default)]
    pub igdb_id: Option<i64>,

    /// URL slug
    #[serde(default)]
    pub slug: String,

    /// Game name
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub summary: Option<String>,

    /// Cover image URL (https, 1080p variant)
    #[serde(default)]
    pub cover_url: Option<String>,

    #[serde(default)]
    pub release_date: Option<NaiveDate>,

    #[serde(default)]
    pub developer: Option<String>,

    #[serde(default)]
    pub publisher: Option<String>,

    #[serde(default)]
    pub genres: Vec<String>,

    #[serde(default)]
    pub platforms: Vec<String>,

    #[serde(default)]
    pub screenshots: Vec<String>,

    /// Aggregate rating (0-100)
    #[serde(default)]
    pub total_rating: Option<i32>,

    #[serde(default)]
    pub rating_count: i32,

    /// Critic score (0-100)
    #[serde(default)]
    pub metacritic_score: Option<i32>,

    #[serde(default)]
    pub franchise_name: Option<String>,

    #[serde(default)]
    pub collection_name: Option<String>,

    #[serde(default)]
    pub alternative_names: Vec<String>,

    #[serde(default)]
    pub similar_game_ids: Vec<i64>,

    #[serde(default)]
    pub dlc_ids: Vec<i64>,

    #[serde(default)]
    pub expansion_ids: Vec<i64>,

    /// IGDB category (0 = main game, 1 = DLC, 2 = expansion, ...)
    #[serde(default)]
    pub category: Option<i32>,

    /// IGDB id of the parent game for add-ons
    #[serde(default)]
    pub parent_game: Option<i64>,

    #[serde(default)]
    pub source: GameSource,

    /// Timestamp when this record was fetched
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl Game {
    /// Create a new game with only a name; the slug is derived from it
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: None,
            igdb_id: None,
            slug: slugify(&name),
            name,
            summary: None,
            cover_url: None,
            release_date: None,
            developer: None,
            publisher: None,
            genres: Vec::new(),
            platforms: Vec::new(),
            screenshots: Vec::new(),
            total_rating: None,
            rating_count: 0,
            metacritic_score: None,
            franchise_name: None,
            collection_name: None,
            alternative_names: Vec::new(),
            similar_game_ids: Vec::new(),
            dlc_ids: Vec::new(),
            expansion_ids: Vec::new(),
            category: None,
            parent_game: None,
            source: GameSource::Database,
            fetched_at: Utc::now(),
        }
    }

    /// Set the IGDB id (builder style)
    pub fn with_igdb_id(mut self, igdb_id: i64) -> Self {
        self.igdb_id = Some(igdb_id);
        self
    }

    /// Release year, if the release date is known
    pub fn year(&self) -> Option<i32> {
        self.release_date.map(|d| d.year())
    }

    /// Check if game is a DLC/expansion
    pub fn is_dlc(&self) -> bool {
        if matches!(self.category, Some(CATEGORY_DLC) | Some(CATEGORY_EXPANSION)) {
            return true;
        }
        let name = self.name.to_lowercase();
        name.contains("dlc") || name.contains("expansion")
    }

    /// Get display name (for logging/UI)
    pub fn display_name(&self) -> String {
        if let Some(year) = self.year() {
            format!("{} ({})", self.name, year)
        } else {
            self.name.clone()
        }
    }

    /// Fill fields that are missing here from `other`.
    ///
    /// Existing non-empty values win; `rating_count` keeps the larger value and
    /// `metacritic_score` always takes the newer one when present.
    pub fn merge_missing(&mut self, other: &Game) {
        fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }
        fn fill_vec<T: Clone>(slot: &mut Vec<T>, value: &[T]) {
            if slot.is_empty() {
                *slot = value.to_vec();
            }
        }

        if self.igdb_id.is_none() {
            self.igdb_id = other.igdb_id;
        }
        if self.slug.is_empty() {
            self.slug.clone_from(&other.slug);
        }
        if self.name.is_empty() {
            self.name.clone_from(&other.name);
        }
        fill(&mut self.summary, &other.summary);
        fill(&mut self.cover_url, &other.cover_url);
        fill(&mut self.release_date, &other.release_date);
        fill(&mut self.developer, &other.developer);
        fill(&mut self.publisher, &other.publisher);
        fill_vec(&mut self.genres, &other.genres);
        fill_vec(&mut self.platforms, &other.platforms);
        fill_vec(&mut self.screenshots, &other.screenshots);
        fill(&mut self.total_rating, &other.total_rating);
        self.rating_count = self.rating_count.max(other.rating_count);
        if other.metacritic_score.is_some() {
            self.metacritic_score = other.metacritic_score;
        }
        fill(&mut self.franchise_name, &other.franchise_name);
        fill(&mut self.collection_name, &other.collection_name);
        if !other.alternative_names.is_empty() {
            self.alternative_names.clone_from(&other.alternative_names);
        }
        fill_vec(&mut self.similar_game_ids, &other.similar_game_ids);
        fill_vec(&mut self.dlc_ids, &other.dlc_ids);
        fill_vec(&mut self.expansion_ids, &other.expansion_ids);
        fill(&mut self.category, &other.category);
        fill(&mut self.parent_game, &other.parent_game);

        if self.source == GameSource::Database && other.source == GameSource::Igdb {
            self.source = GameSource::Merged;
        }
    }

    /// True when the record lacks metadata worth fetching from IGDB
    pub fn needs_enrichment(&self) -> bool {
        self.cover_url.is_none()
            || self.summary.is_none()
            || self.developer.is_none()
            || self.release_date.is_none()
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new("Unknown Game")
    }
}

/// Lowercase, ASCII-alphanumeric slug with single dashes
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '\'' {
            // "Assassin's" -> "assassins"
        } else {
            pending_dash = true;
        }
    }

    slug
}
