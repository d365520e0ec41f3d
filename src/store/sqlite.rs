use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::{Game, Review, UserProgress};
use crate::error::{GameShelfError, Result};
use crate::store::row::{GameRow, GAME_COLUMNS};
use crate::store::{Comment, GameStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS game (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    igdb_id INTEGER UNIQUE,
    slug TEXT,
    name TEXT NOT NULL,
    summary TEXT,
    cover_url TEXT,
    release_date TEXT,
    developer TEXT,
    publisher TEXT,
    genres TEXT DEFAULT '[]',
    platforms TEXT DEFAULT '[]',
    screenshots TEXT DEFAULT '[]',
    total_rating INTEGER,
    rating_count INTEGER DEFAULT 0,
    metacritic_score INTEGER,
    franchise_name TEXT,
    collection_name TEXT,
    alternative_names TEXT DEFAULT '[]',
    similar_game_ids TEXT DEFAULT '[]',
    dlc_ids TEXT DEFAULT '[]',
    expansion_ids TEXT DEFAULT '[]',
    category INTEGER,
    parent_game INTEGER,
    last_synced TEXT,
    data_source TEXT
);
CREATE INDEX IF NOT EXISTS idx_game_slug ON game(slug);
CREATE INDEX IF NOT EXISTS idx_game_franchise ON game(franchise_name);

CREATE TABLE IF NOT EXISTS "user" (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rating (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    game_id INTEGER NOT NULL REFERENCES game(id),
    rating REAL NOT NULL,
    review TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(user_id, game_id)
);
CREATE INDEX IF NOT EXISTS idx_rating_game ON rating(game_id);

CREATE TABLE IF NOT EXISTS game_progress (
    user_id TEXT NOT NULL,
    game_id INTEGER NOT NULL REFERENCES game(id),
    started INTEGER NOT NULL DEFAULT 0,
    completed INTEGER NOT NULL DEFAULT 0,
    started_at TEXT,
    completed_at TEXT,
    PRIMARY KEY (user_id, game_id)
);

CREATE TABLE IF NOT EXISTS comment (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    game_id INTEGER NOT NULL REFERENCES game(id),
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_comment_game ON comment(game_id);
"#;

/// SQLite implementation of the game database
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the store
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| GameShelfError::Other("store connection lock poisoned".to_string()))
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn select_game<P: Params>(conn: &Connection, condition: &str, params: P) -> Result<Option<Game>> {
    let sql = format!("SELECT {} FROM game WHERE {} LIMIT 1", GAME_COLUMNS, condition);
    let row = conn.query_row(&sql, params, GameRow::from_row).optional()?;
    Ok(row.map(Game::from))
}

fn select_games<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Game>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, GameRow::from_row)?;
    let mut games = Vec::new();
    for row in rows {
        games.push(Game::from(row?));
    }
    Ok(games)
}

fn review_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Review> {
    let created_at: String = row.get(6)?;
    Ok(Review {
        id: row.get(0)?,
        user_id: row.get(1)?,
        game_id: row.get(2)?,
        rating: row.get(3)?,
        review: row.get(4)?,
        username: row.get(5)?,
        created_at: parse_ts(&created_at),
    })
}

const REVIEW_SELECT: &str = r#"SELECT r.id, r.user_id, r.game_id, r.rating, r.review, u.username, r.created_at
    FROM rating r LEFT JOIN "user" u ON u.id = r.user_id"#;

#[async_trait]
impl GameStore for SqliteStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Game>> {
        let conn = self.conn()?;
        select_game(&conn, "id = ?", params![id])
    }

    async fn find_by_igdb_id(&self, igdb_id: i64) -> Result<Option<Game>> {
        let conn = self.conn()?;
        select_game(&conn, "igdb_id = ?", params![igdb_id])
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Game>> {
        let conn = self.conn()?;
        select_game(&conn, "slug = ?", params![slug.trim().to_lowercase()])
    }

    async fn insert_game(&self, game: &Game) -> Result<Game> {
        let conn = self.conn()?;
        let row = GameRow::from(game);

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO game (igdb_id, slug, name, summary, cover_url, release_date, developer, publisher,
                genres, platforms, screenshots, total_rating, rating_count, metacritic_score, franchise_name,
                collection_name, alternative_names, similar_game_ids, dlc_ids, expansion_ids, category, parent_game,
                last_synced, data_source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
                ?21, ?22, ?23, ?24)",
            params![
                row.igdb_id,
                row.slug,
                row.name,
                row.summary,
                row.cover_url,
                row.release_date,
                row.developer,
                row.publisher,
                row.genres,
                row.platforms,
                row.screenshots,
                row.total_rating,
                row.rating_count,
                row.metacritic_score,
                row.franchise_name,
                row.collection_name,
                row.alternative_names,
                row.similar_game_ids,
                row.dlc_ids,
                row.expansion_ids,
                row.category,
                row.parent_game,
                game.igdb_id.map(|_| Utc::now().to_rfc3339()),
                row.data_source,
            ],
        )?;

        let stored = if inserted == 0 {
            // Lost a race with another insert of the same IGDB id
            match game.igdb_id {
                Some(igdb_id) => select_game(&conn, "igdb_id = ?", params![igdb_id])?,
                None => None,
            }
        } else {
            select_game(&conn, "id = ?", params![conn.last_insert_rowid()])?
        };

        stored.ok_or_else(|| GameShelfError::Other(format!("failed to insert game {}", game.name)))
    }

    async fn upsert_game_metadata(&self, game: &Game) -> Result<bool> {
        let Some(igdb_id) = game.igdb_id else {
            return Ok(false);
        };
        let conn = self.conn()?;
        let Some(mut existing) = select_game(&conn, "igdb_id = ?", params![igdb_id])? else {
            return Ok(false);
        };

        existing.merge_missing(game);
        let row = GameRow::from(&existing);

        conn.execute(
            "UPDATE game SET summary = ?2, cover_url = ?3, release_date = ?4, developer = ?5, publisher = ?6,
                genres = ?7, platforms = ?8, screenshots = ?9, total_rating = ?10, rating_count = ?11,
                metacritic_score = ?12, franchise_name = ?13, collection_name = ?14, alternative_names = ?15,
                similar_game_ids = ?16, dlc_ids = ?17, expansion_ids = ?18, category = ?19, parent_game = ?20,
                last_synced = ?21, data_source = 'igdb_sync'
             WHERE igdb_id = ?1",
            params![
                igdb_id,
                row.summary,
                row.cover_url,
                row.release_date,
                row.developer,
                row.publisher,
                row.genres,
                row.platforms,
                row.screenshots,
                row.total_rating,
                row.rating_count,
                row.metacritic_score,
                row.franchise_name,
                row.collection_name,
                row.alternative_names,
                row.similar_game_ids,
                row.dlc_ids,
                row.expansion_ids,
                row.category,
                row.parent_game,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(true)
    }

    async fn games_needing_sync(&self, limit: usize) -> Result<Vec<Game>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM game
             WHERE igdb_id IS NOT NULL
               AND (cover_url IS NULL OR summary IS NULL OR developer IS NULL
                    OR release_date IS NULL OR last_synced IS NULL)
             ORDER BY rating_count DESC
             LIMIT ?",
            GAME_COLUMNS
        );
        select_games(&conn, &sql, params![limit as i64])
    }

    async fn reviews_for_game(&self, game_id: i64, limit: usize) -> Result<Vec<Review>> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE r.game_id = ? ORDER BY r.created_at DESC, r.id DESC LIMIT ?", REVIEW_SELECT);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![game_id, limit as i64], review_from_row)?;
        let mut reviews = Vec::new();
        for row in rows {
            reviews.push(row?);
        }
        Ok(reviews)
    }

    async fn user_progress(&self, user_id: &str, game_id: i64) -> Result<Option<UserProgress>> {
        let conn = self.conn()?;
        let progress = conn
            .query_row(
                "SELECT user_id, game_id, started, completed, started_at, completed_at
                 FROM game_progress WHERE user_id = ? AND game_id = ?",
                params![user_id, game_id],
                |row| {
                    let started_at: Option<String> = row.get(4)?;
                    let completed_at: Option<String> = row.get(5)?;
                    Ok(UserProgress {
                        user_id: row.get(0)?,
                        game_id: row.get(1)?,
                        started: row.get(2)?,
                        completed: row.get(3)?,
                        started_at: started_at.as_deref().map(parse_ts),
                        completed_at: completed_at.as_deref().map(parse_ts),
                    })
                },
            )
            .optional()?;
        Ok(progress)
    }

    async fn related_games(&self, game: &Game, limit: usize) -> Result<Vec<Game>> {
        let conn = self.conn()?;
        let similar = serde_json::to_string(&game.similar_game_ids)?;
        let sql = format!(
            "SELECT {} FROM game
             WHERE id != ?1
               AND ((?2 IS NOT NULL AND franchise_name = ?2)
                    OR (?3 IS NOT NULL AND collection_name = ?3)
                    OR igdb_id IN (SELECT value FROM json_each(?4)))
             ORDER BY rating_count DESC, total_rating DESC
             LIMIT ?5",
            GAME_COLUMNS
        );
        select_games(
            &conn,
            &sql,
            params![
                game.id.unwrap_or(-1),
                game.franchise_name,
                game.collection_name,
                similar,
                limit as i64
            ],
        )
    }

    async fn user_rating(&self, user_id: &str, game_id: i64) -> Result<Option<Review>> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE r.user_id = ? AND r.game_id = ?", REVIEW_SELECT);
        Ok(conn
            .query_row(&sql, params![user_id, game_id], review_from_row)
            .optional()?)
    }

    async fn add_review(&self, user_id: &str, game_id: i64, rating: f64, review: Option<&str>) -> Result<Review> {
        if !(0.0..=10.0).contains(&rating) {
            return Err(GameShelfError::Other(format!("rating {} outside 0-10", rating)));
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO rating (user_id, game_id, rating, review, created_at) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, game_id) DO UPDATE SET
                rating = excluded.rating, review = excluded.review, created_at = excluded.created_at",
            params![user_id, game_id, rating, review, Utc::now().to_rfc3339()],
        )?;

        let sql = format!("{} WHERE r.user_id = ? AND r.game_id = ?", REVIEW_SELECT);
        Ok(conn.query_row(&sql, params![user_id, game_id], review_from_row)?)
    }

    async fn set_progress(&self, progress: &UserProgress) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO game_progress (user_id, game_id, started, completed, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                progress.user_id,
                progress.game_id,
                progress.started,
                progress.completed,
                progress.started_at.map(|t| t.to_rfc3339()),
                progress.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    async fn ensure_user(&self, user_id: &str, username: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"INSERT INTO "user" (id, username, created_at) VALUES (?1, ?2, ?3)
               ON CONFLICT(id) DO UPDATE SET username = excluded.username"#,
            params![user_id, username, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn add_comment(&self, user_id: &str, game_id: i64, content: &str) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(GameShelfError::Other("empty comment".to_string()));
        }
        let conn = self.conn()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO comment (user_id, game_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, game_id, content, created_at.to_rfc3339()],
        )?;
        Ok(Comment {
            id: conn.last_insert_rowid(),
            user_id: user_id.to_string(),
            game_id,
            content: content.to_string(),
            created_at,
        })
    }

    async fn comments_for_game(&self, game_id: i64, limit: usize) -> Result<Vec<Comment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, game_id, content, created_at FROM comment
             WHERE game_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )?;
        let rows = stmt.query_map(params![game_id, limit as i64], |row| {
            let created_at: String = row.get(4)?;
            Ok(Comment {
                id: row.get(0)?,
                user_id: row.get(1)?,
                game_id: row.get(2)?,
                content: row.get(3)?,
                created_at: parse_ts(&created_at),
            })
        })?;
        let mut comments = Vec::new();
        for row in rows {
            comments.push(row?);
        }
        Ok(comments)
    }
}
