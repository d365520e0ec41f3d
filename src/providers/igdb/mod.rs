pub mod model;
pub mod query;

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::IgdbConfig;
use crate::core::Game;
use crate::error::{GameShelfError, Result};
use crate::providers::GameProvider;

pub use model::{IgdbGame, normalize_image_url};
pub use query::{IgdbQuery, MAX_LIMIT};

const PROVIDER: &str = "igdb";

/// IGDB API v4 provider
pub struct IgdbProvider {
    client: Client,
    base_url: String,
    client_id: String,
    access_token: String,
}

impl IgdbProvider {
    /// Create new IGDB provider
    pub fn new(config: &IgdbConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// POST a query to an IGDB endpoint and decode the JSON array it returns
    async fn post(&self, endpoint: &str, query: &IgdbQuery) -> Result<Vec<IgdbGame>> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let body = query.build();
        tracing::debug!("IGDB {} <- {}", endpoint, body);

        let response = self
            .client
            .post(&url)
            .header("Client-ID", &self.client_id)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| GameShelfError::provider(PROVIDER, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GameShelfError::provider(PROVIDER, format!("HTTP {}: {}", status, text)));
        }

        response
            .json()
            .await
            .map_err(|e| GameShelfError::provider(PROVIDER, format!("Invalid JSON: {}", e)))
    }

    async fn games(&self, query: IgdbQuery) -> Result<Vec<Game>> {
        let raw = self.post("games", &query).await?;
        Ok(raw.into_iter().map(Game::from_igdb).collect())
    }
}

#[async_trait]
impl GameProvider for IgdbProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Game>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.games(IgdbQuery::games().search(query).limit(limit)).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Game> {
        self.games(IgdbQuery::games().where_id(id).limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GameShelfError::NotFound(format!("IGDB game {}", id)))
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Game> {
        self.games(IgdbQuery::games().where_slug(slug).limit(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GameShelfError::NotFound(format!("IGDB game '{}'", slug)))
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Game>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut games = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_LIMIT) {
            games.extend(self.games(IgdbQuery::games().where_ids(chunk).limit(chunk.len())).await?);
        }
        Ok(games)
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    async fn is_available(&self) -> bool {
        if self.client_id.is_empty() || self.access_token.is_empty() {
            return false;
        }
        self.post("games", &IgdbQuery::new().fields(&["id"]).limit(1))
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> IgdbProvider {
        let config = IgdbConfig {
            client_id: std::env::var("IGDB_CLIENT_ID").unwrap_or_default(),
            access_token: std::env::var("IGDB_ACCESS_TOKEN").unwrap_or_default(),
            ..IgdbConfig::default()
        };
        IgdbProvider::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_unavailable_without_credentials() {
        let provider = IgdbProvider::new(&IgdbConfig::default()).unwrap();
        assert!(!provider.is_available().await);
        assert!(provider.search("   ", 10).await.unwrap().is_empty());
        assert!(provider.get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_provider_error() {
        let config = IgdbConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            ..IgdbConfig::default()
        };
        let provider = IgdbProvider::new(&config).unwrap();
        let err = provider.get_by_id(1942).await.unwrap_err();
        assert!(matches!(err, GameShelfError::Provider { .. }));
    }

    #[tokio::test]
    #[ignore] // Requires network access and IGDB credentials
    async fn test_igdb_search() {
        let results = provider().search("witcher 3", 10).await.unwrap();
        assert!(results.iter().any(|g| g.name.contains("Witcher 3")));
    }

    #[tokio::test]
    #[ignore] // Requires network access and IGDB credentials
    async fn test_igdb_get_by_id() {
        let game = provider().get_by_id(1942).await.unwrap();
        assert_eq!(game.igdb_id, Some(1942));
        assert_eq!(game.slug, "the-witcher-3-wild-hunt");
    }
}
