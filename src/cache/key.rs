use std::collections::BTreeMap;
use std::fmt;

use crate::core::SearchFilters;

/// Well-known key namespaces
pub mod ns {
    pub const SEARCH: &str = "search";
    pub const GAME: &str = "game";
    pub const IGDB: &str = "igdb";
    pub const PAGE: &str = "page";
}

/// Deterministic cache key built from namespace, entity id, query text and filters.
///
/// Layout: `namespace[:id=<id>][:q=<query>][:f=<name>=<value>&...]`, every
/// component URL-encoded so separators in user input cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn builder(namespace: &str) -> CacheKeyBuilder {
        CacheKeyBuilder {
            namespace: namespace.to_string(),
            id: None,
            query: None,
            filters: BTreeMap::new(),
        }
    }

    /// Key for a free-text search with filters
    pub fn search(query: &str, filters: &SearchFilters) -> Self {
        let mut builder = Self::builder(ns::SEARCH).query(query);
        for (name, value) in filters.key_pairs() {
            builder = builder.filter(name, value);
        }
        builder.build()
    }

    /// Key for an IGDB lookup by id or slug
    pub fn igdb(identifier: &str) -> Self {
        Self::builder(ns::IGDB).id(identifier.trim().to_lowercase()).build()
    }

    /// Wrap an already-built key string (e.g. read back from a tier)
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn namespace(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub struct CacheKeyBuilder {
    namespace: String,
    id: Option<String>,
    query: Option<String>,
    filters: BTreeMap<String, String>,
}

impl CacheKeyBuilder {
    pub fn id(mut self, id: impl ToString) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Query text is normalized before it becomes part of the key
    pub fn query(mut self, query: &str) -> Self {
        self.query = Some(normalize_query(query));
        self
    }

    /// Filters are kept sorted by name; the last value for a name wins
    pub fn filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> CacheKey {
        let mut key = urlencoding::encode(&self.namespace).into_owned();

        if let Some(id) = self.id {
            key.push_str(":id=");
            key.push_str(&urlencoding::encode(&id));
        }
        if let Some(query) = self.query {
            key.push_str(":q=");
            key.push_str(&urlencoding::encode(&query));
        }
        if !self.filters.is_empty() {
            let filters: Vec<String> = self
                .filters
                .iter()
                .map(|(name, value)| format!("{}={}", urlencoding::encode(name), urlencoding::encode(value)))
                .collect();
            key.push_str(":f=");
            key.push_str(&filters.join("&"));
        }

        CacheKey(key)
    }
}

/// Normalize query for consistent cache lookups
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
