use clap::{Parser, Subcommand};
use gameshelf_engine::{BotRequest, EngineConfig, GameShelf, SearchFilters, SearchRequest};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gameshelf")]
#[command(about = "GameShelf engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database path (overrides configuration)
    #[arg(short, long)]
    db: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for games
    Search {
        /// Search query
        query: String,

        /// Maximum results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Only games with this genre (repeatable)
        #[arg(long)]
        genre: Vec<String>,

        /// Only games on this platform (repeatable)
        #[arg(long)]
        platform: Vec<String>,

        /// Minimum total rating (0-100)
        #[arg(long)]
        min_rating: Option<i32>,

        /// Bypass cached results
        #[arg(long)]
        refresh: bool,
    },

    /// Show a game page by IGDB id or slug
    Game {
        identifier: String,

        /// Include this user's progress and rating
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Get cache statistics
    Stats,

    /// Drop every cache entry
    Clear,

    /// Purge expired cache entries and idle bot sessions
    Cleanup,

    /// Enrich stored games from IGDB
    Sync,

    /// Classify a request as bot or human
    BotCheck {
        /// User agent string
        #[arg(short, long)]
        user_agent: Option<String>,

        #[arg(short, long, default_value = "cli")]
        session: String,
    },

    /// Manage the local wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
}

#[derive(Subcommand)]
enum WishlistAction {
    /// Add a game by IGDB id or slug
    Add { identifier: String },
    /// Remove a game by IGDB id
    Remove { igdb_id: i64 },
    /// List wishlisted games
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gameshelf_engine=info")))
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.cache.db_path = db.clone();
        config.store.db_path = db;
    }

    let engine = GameShelf::new(config).await?;

    match cli.command {
        Commands::Search {
            query,
            limit,
            genre,
            platform,
            min_rating,
            refresh,
        } => {
            println!("🔍 Searching for: {}", query);

            let filters = SearchFilters {
                genres: genre.into_iter().collect(),
                platforms: platform.into_iter().collect(),
                min_rating,
                ..SearchFilters::default()
            };
            let mut request = SearchRequest::new(query.clone()).with_filters(filters).with_limit(limit);
            if refresh {
                request = request.force_refresh();
            }

            let response = engine.search(request).await?;
            engine.local().record_search(&query).await?;

            if response.results.is_empty() {
                println!("\n❌ No results");
            }
            for (i, scored) in response.results.iter().enumerate() {
                println!(
                    "{:>3}. {} ({:.1}%){}",
                    i + 1,
                    scored.game.display_name(),
                    scored.score,
                    scored.game.igdb_id.map(|id| format!(" [igdb {}]", id)).unwrap_or_default()
                );
            }
            println!("\n   Status: {:?}", response.status);
            println!("   Latency: {:.2}ms", response.latency_ms);
        }

        Commands::Game { identifier, user } => {
            let page = engine.game_page(&identifier, user.as_deref()).await;

            let Some(game) = page.game.as_ref() else {
                println!("❌ No game found for '{}'", identifier);
                return Ok(());
            };

            if let Some(igdb_id) = game.igdb_id {
                engine.local().record_view(igdb_id, &game.name, game.cover_url.as_deref()).await?;
            }

            println!("🎮 {}", game.display_name());
            if let Some(developer) = &game.developer {
                println!("   Developer: {}", developer);
            }
            if !game.genres.is_empty() {
                println!("   Genres: {}", game.genres.join(", "));
            }
            if let Some(rating) = game.total_rating {
                println!("   Rating: {}/100 ({} votes)", rating, game.rating_count);
            }
            if let Some(summary) = &game.summary {
                println!("\n{}\n", summary);
            }
            match page.average_rating() {
                Some(avg) => println!("⭐ {} reviews, average {:.1}/10", page.reviews.len(), avg),
                None => println!("⭐ No reviews yet"),
            }
            if let Some(progress) = &page.user_progress {
                println!("   Your progress: started={} completed={}", progress.started, progress.completed);
            }
            if let Some(rating) = &page.user_rating {
                println!("   Your rating: {:.1}/10", rating.rating);
            }
            if !page.related_games.is_empty() {
                println!("\n📋 Related:");
                for (i, related) in page.related_games.iter().enumerate() {
                    println!("   {}. {}", i + 1, related.display_name());
                }
            }
        }

        Commands::Stats => {
            let stats = engine.cache_stats().await?;

            println!("📊 Cache Statistics:");
            println!("   Hits: {}", stats.hits);
            println!("   Misses: {}", stats.misses);
            println!("   Stale served: {}", stats.stale_served);
            println!("   Hit rate: {:.1}%", stats.hit_rate() * 100.0);
            for tier in &stats.tiers {
                println!("   {} tier: {} entries", tier.tier, tier.entries);
                if let (Some(hits), Some(avg)) = (tier.total_hits, tier.avg_hit_count) {
                    println!("      Hits: {} (avg {:.1} per entry)", hits, avg);
                }
                if let (Some(oldest), Some(newest)) = (tier.oldest_entry, tier.newest_entry) {
                    println!("      Oldest: {}  Newest: {}", oldest.to_rfc3339(), newest.to_rfc3339());
                }
            }
        }

        Commands::Clear => {
            let removed = engine.clear_cache().await?;
            println!("✅ Removed {} entries", removed);
        }

        Commands::Cleanup => {
            println!("🧹 Cleaning up...");

            let report = engine.cleanup().await?;

            println!("✅ Deleted {} cache entries", report.cache_entries);
            println!(
                "   Bot cache: {} verdicts, {} sessions",
                report.bot.verdicts, report.bot.sessions
            );
        }

        Commands::Sync => {
            let report = engine.sync().await?;

            println!("✅ Sync complete in {:.0}s", report.elapsed.as_secs_f64());
            println!("   Updated: {}/{} games", report.updated, report.total);
            println!("   Failed batches: {}", report.failed_batches);
            println!("   Rate: {:.0} games/second", report.rate());
        }

        Commands::BotCheck { user_agent, session } => {
            let classification = engine
                .classify(&BotRequest {
                    user_agent,
                    session_id: session,
                    game_id: None,
                })
                .await?;
            let verdict = &classification.verdict;

            println!(
                "{} confidence {:.2} [{:?}]",
                if verdict.is_bot { "🤖 Bot" } else { "🙂 Human" },
                verdict.confidence,
                classification.status
            );
            for reason in &verdict.reasons {
                println!("   - {}", reason);
            }
        }

        Commands::Wishlist { action } => match action {
            WishlistAction::Add { identifier } => {
                let page = engine.game_page(&identifier, None).await;
                match page.game {
                    Some(game) => {
                        let igdb_id = game.igdb_id.or(game.id).unwrap_or_default();
                        if engine.local().wishlist_add(igdb_id, &game.name, game.cover_url.as_deref()).await? {
                            println!("✅ Added {}", game.name);
                        } else {
                            println!("Already on the wishlist: {}", game.name);
                        }
                    }
                    None => println!("❌ No game found for '{}'", identifier),
                }
            }
            WishlistAction::Remove { igdb_id } => {
                if engine.local().wishlist_remove(igdb_id).await? {
                    println!("✅ Removed {}", igdb_id);
                } else {
                    println!("Not on the wishlist: {}", igdb_id);
                }
            }
            WishlistAction::List => {
                let games = engine.local().wishlist().await?;
                println!("📋 Wishlist ({} games):", games.len());
                for game in games {
                    println!("   {} [{}] added {}", game.name, game.game_id, game.at.format("%Y-%m-%d"));
                }
            }
        },
    }

    engine.shutdown().await;
    Ok(())
}
