use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gameshelf_engine::bot::BotClassification;
use gameshelf_engine::cache::{CacheStats, TierHealth};
use gameshelf_engine::{
    BotRequest, EngineConfig, GamePageData, GameShelf, GameShelfError, SearchRequest, SearchResponse,
};

#[derive(Clone)]
struct AppState {
    engine: Arc<GameShelf>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    removed: u64,
}

#[derive(Debug, Serialize)]
struct CacheHealthResponse {
    healthy: bool,
    tiers: Vec<TierHealth>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    user_id: Option<String>,
}

/// Classification body; the user agent header is used when the body has none
#[derive(Debug, Deserialize)]
struct ClassifyRequest {
    #[serde(default)]
    user_agent: Option<String>,
    session_id: String,
    #[serde(default)]
    game_id: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gameshelf_server=info,gameshelf_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("GAMESHELF_CONFIG").ok().map(std::path::PathBuf::from);
    let config = EngineConfig::load(config_path.as_deref())?;
    let port = config.server.port;

    tracing::info!("🚀 Starting GameShelf Engine Server");
    tracing::info!("📦 Database: {}", config.store.db_path);
    tracing::info!("🔌 Port: {}", port);

    let engine = Arc::new(GameShelf::new(config).await?);
    let maintenance = engine.spawn_maintenance();

    let state = AppState { engine: engine.clone() };

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/search", post(search_handler))
        .route("/v1/games/:id", get(game_handler))
        .route("/v1/cache/stats", get(stats_handler))
        .route("/v1/cache/clear", post(clear_handler))
        .route("/v1/cache/health", get(cache_health_handler))
        .route("/v1/bot/classify", post(classify_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("🎮 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("🛑 Shutting down");
        })
        .await?;

    for handle in maintenance {
        handle.abort();
    }
    engine.shutdown().await;

    Ok(())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: gameshelf_engine::VERSION.to_string(),
    })
}

async fn search_handler(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    tracing::debug!("Search request: {:?}", req);

    let result = state.engine.search(req).await?;

    Ok(Json(result))
}

async fn game_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<GamePageData>, AppError> {
    let page = state.engine.game_page(&id, query.user_id.as_deref()).await;

    if page.is_empty() {
        return Err(GameShelfError::NotFound(format!("game '{}'", id)).into());
    }

    Ok(Json(page))
}

async fn stats_handler(State(state): State<AppState>) -> Result<Json<CacheStats>, AppError> {
    Ok(Json(state.engine.cache_stats().await?))
}

async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>, AppError> {
    let removed = state.engine.clear_cache().await?;
    tracing::info!("🧹 Cache cleared ({} entries)", removed);

    Ok(Json(ClearResponse { removed }))
}

async fn cache_health_handler(State(state): State<AppState>) -> (StatusCode, Json<CacheHealthResponse>) {
    let tiers = state.engine.cache_health().await;
    let healthy = tiers.iter().all(|t| t.healthy);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(CacheHealthResponse { healthy, tiers }))
}

async fn classify_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<BotClassification>, AppError> {
    let user_agent = req.user_agent.or_else(|| {
        headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    let classification = state
        .engine
        .classify(&BotRequest {
            user_agent,
            session_id: req.session_id,
            game_id: req.game_id,
        })
        .await?;

    Ok(Json(classification))
}

// Error handling
struct AppError(GameShelfError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0.root() {
            GameShelfError::NotFound(what) => (StatusCode::NOT_FOUND, format!("Not found: {}", what)),
            GameShelfError::Provider { provider, message } => {
                (StatusCode::BAD_GATEWAY, format!("Provider '{}' error: {}", provider, message))
            }
            GameShelfError::Cancelled => (StatusCode::CONFLICT, "Request superseded".to_string()),
            e => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        tracing::error!("❌ Error: {} - {}", status, message);

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<GameShelfError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
