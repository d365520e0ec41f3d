//! Per-user state kept on the client machine: wishlist, recently viewed
//! games and recent searches.
//!
//! Schema changes go through the ordered `MIGRATIONS` list, tracked with
//! `PRAGMA user_version`. Every write is announced on a broadcast channel
//! shared by all clones of a store.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::info;

use crate::cache::normalize_query;
use crate::error::{GameShelfError, Result};

pub const RECENT_VIEWS_LIMIT: usize = 20;
pub const RECENT_SEARCHES_LIMIT: usize = 10;

/// Schema migrations, applied in order; index + 1 is the resulting version
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE wishlist (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        game_id INTEGER NOT NULL UNIQUE,
        name TEXT NOT NULL,
        cover_url TEXT,
        added_at TEXT NOT NULL
    );
    CREATE TABLE recent_view (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        game_id INTEGER NOT NULL UNIQUE,
        name TEXT NOT NULL,
        cover_url TEXT,
        viewed_at TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE recent_search (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        query_key TEXT NOT NULL UNIQUE,
        query TEXT NOT NULL,
        searched_at TEXT NOT NULL
    );
    "#,
];

/// Game reference stored locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalGame {
    pub game_id: i64,
    pub name: String,
    pub cover_url: Option<String>,
    /// When it was added (wishlist) or last viewed (history)
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocalChange {
    WishlistAdded { game_id: i64 },
    WishlistRemoved { game_id: i64 },
    ViewRecorded { game_id: i64 },
    SearchRecorded { query: String },
    HistoryCleared,
}

/// Handle to the local database; clones share the connection and change feed
#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<LocalChange>,
}

impl LocalStore {
    pub async fn open(db_path: &str) -> Result<Self> {
        let mut conn = Connection::open(db_path)?;
        migrate(&mut conn)?;
        let (changes, _) = broadcast::channel(64);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            changes,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| GameShelfError::Other("local store lock poisoned".to_string()))
    }

    fn notify(&self, change: LocalChange) {
        // No subscribers is fine
        let _ = self.changes.send(change);
    }

    /// Change events from every clone of this store
    pub fn subscribe(&self) -> broadcast::Receiver<LocalChange> {
        self.changes.subscribe()
    }

    pub async fn schema_version(&self) -> Result<usize> {
        let conn = self.conn()?;
        user_version(&conn)
    }

    /// Add to the wishlist; false when already present
    pub async fn wishlist_add(&self, game_id: i64, name: &str, cover_url: Option<&str>) -> Result<bool> {
        let added = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT OR IGNORE INTO wishlist (game_id, name, cover_url, added_at) VALUES (?1, ?2, ?3, ?4)",
                params![game_id, name, cover_url, Utc::now().to_rfc3339()],
            )? > 0
        };
        if added {
            self.notify(LocalChange::WishlistAdded { game_id });
        }
        Ok(added)
    }

    pub async fn wishlist_remove(&self, game_id: i64) -> Result<bool> {
        let removed = {
            let conn = self.conn()?;
            conn.execute("DELETE FROM wishlist WHERE game_id = ?", params![game_id])? > 0
        };
        if removed {
            self.notify(LocalChange::WishlistRemoved { game_id });
        }
        Ok(removed)
    }

    pub async fn wishlist_contains(&self, game_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row("SELECT 1 FROM wishlist WHERE game_id = ?", params![game_id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Newest first
    pub async fn wishlist(&self) -> Result<Vec<LocalGame>> {
        let conn = self.conn()?;
        games(&conn, "SELECT game_id, name, cover_url, added_at FROM wishlist ORDER BY seq DESC")
    }

    /// Move a game to the front of the recently viewed list
    pub async fn record_view(&self, game_id: i64, name: &str, cover_url: Option<&str>) -> Result<()> {
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT OR REPLACE INTO recent_view (game_id, name, cover_url, viewed_at) VALUES (?1, ?2, ?3, ?4)",
                params![game_id, name, cover_url, Utc::now().to_rfc3339()],
            )?;
            conn.execute(
                "DELETE FROM recent_view WHERE seq NOT IN (SELECT seq FROM recent_view ORDER BY seq DESC LIMIT ?)",
                params![RECENT_VIEWS_LIMIT as i64],
            )?;
        }
        self.notify(LocalChange::ViewRecorded { game_id });
        Ok(())
    }

    /// Most recent first
    pub async fn recent_views(&self) -> Result<Vec<LocalGame>> {
        let conn = self.conn()?;
        games(&conn, "SELECT game_id, name, cover_url, viewed_at FROM recent_view ORDER BY seq DESC")
    }

    /// Remember a search; blank queries are ignored
    pub async fn record_search(&self, query: &str) -> Result<()> {
        let key = normalize_query(query);
        if key.is_empty() {
            return Ok(());
        }
        let query = query.trim().to_string();
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT OR REPLACE INTO recent_search (query_key, query, searched_at) VALUES (?1, ?2, ?3)",
                params![key, query, Utc::now().to_rfc3339()],
            )?;
            conn.execute(
                "DELETE FROM recent_search WHERE seq NOT IN (SELECT seq FROM recent_search ORDER BY seq DESC LIMIT ?)",
                params![RECENT_SEARCHES_LIMIT as i64],
            )?;
        }
        self.notify(LocalChange::SearchRecorded { query });
        Ok(())
    }

    /// Most recent first
    pub async fn recent_searches(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT query FROM recent_search ORDER BY seq DESC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut queries = Vec::new();
        for row in rows {
            queries.push(row?);
        }
        Ok(queries)
    }

    /// Forget viewed games and searches; the wishlist stays
    pub async fn clear_history(&self) -> Result<()> {
        {
            let conn = self.conn()?;
            conn.execute_batch("DELETE FROM recent_view; DELETE FROM recent_search;")?;
        }
        self.notify(LocalChange::HistoryCleared);
        Ok(())
    }
}

fn user_version(conn: &Connection) -> Result<usize> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version.max(0) as usize)
}

/// Apply pending migrations, each in its own transaction
fn migrate(conn: &mut Connection) -> Result<()> {
    let current = user_version(conn)?;
    if current > MIGRATIONS.len() {
        return Err(GameShelfError::Config(format!(
            "local database schema v{} is newer than supported v{}",
            current,
            MIGRATIONS.len()
        )));
    }

    for (index, sql) in MIGRATIONS.iter().enumerate().skip(current) {
        let version = index + 1;
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version as i64)?;
        tx.commit()?;
        info!("📦 Local store migrated to v{}", version);
    }
    Ok(())
}

fn games(conn: &Connection, sql: &str) -> Result<Vec<LocalGame>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        let at: String = row.get(3)?;
        Ok(LocalGame {
            game_id: row.get(0)?,
            name: row.get(1)?,
            cover_url: row.get(2)?,
            at: DateTime::parse_from_rfc3339(&at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    })?;
    let mut games = Vec::new();
    for row in rows {
        games.push(row?);
    }
    Ok(games)
}
