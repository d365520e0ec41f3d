use std::sync::Arc;

use thiserror::Error;

/// Main error type for the GameShelf data layer
#[derive(Error, Debug)]
pub enum GameShelfError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP request errors
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors (bad YAML, bad env values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider errors
    #[error("Provider '{provider}' error: {message}")]
    Provider { provider: String, message: String },

    /// Cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Background worker unavailable or dropped the request
    #[error("Worker error: {0}")]
    Worker(String),

    /// Request superseded by a newer one
    #[error("Request cancelled")]
    Cancelled,

    /// Error produced by another caller's in-flight computation
    #[error("{0}")]
    Shared(Arc<GameShelfError>),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl GameShelfError {
    /// Build a provider error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        GameShelfError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Look through `Shared` wrappers to the original error
    pub fn root(&self) -> &GameShelfError {
        match self {
            GameShelfError::Shared(inner) => inner.root(),
            other => other,
        }
    }
}

impl From<String> for GameShelfError {
    fn from(s: String) -> Self {
        GameShelfError::Other(s)
    }
}

impl From<&str> for GameShelfError {
    fn from(s: &str) -> Self {
        GameShelfError::Other(s.to_string())
    }
}

impl From<serde_yaml::Error> for GameShelfError {
    fn from(e: serde_yaml::Error) -> Self {
        GameShelfError::Config(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, GameShelfError>;
