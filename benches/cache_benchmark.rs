use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gameshelf_engine::cache::{CacheKey, CacheTier, FetchOptions, MemoryTier, SqliteTier, TieredCache};
use gameshelf_engine::core::Game;
use gameshelf_engine::SearchFilters;
use std::sync::Arc;
use std::time::Duration;

fn key(i: usize) -> CacheKey {
    CacheKey::search(&format!("query {}", i), &SearchFilters::default())
}

async fn setup_cache() -> TieredCache {
    let memory: Arc<dyn CacheTier> = Arc::new(MemoryTier::with_capacity(1000));
    let sqlite: Arc<dyn CacheTier> = Arc::new(SqliteTier::new(":memory:").await.unwrap());
    let cache = TieredCache::new(vec![memory, sqlite], Duration::from_secs(3600));

    // Populate with test data
    for i in 0..100 {
        let game = Game::new(format!("Game {}", i)).with_igdb_id(i as i64);
        cache.put(&key(i), &vec![game], None).await.unwrap();
    }

    cache
}

fn bench_cache_fetch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let cache = runtime.block_on(setup_cache());

    c.bench_function("tiered_fetch_hit", |b| {
        b.to_async(&runtime).iter(|| async {
            let fetched = cache
                .fetch(&key(50), FetchOptions::default(), || async { Ok(Vec::<Game>::new()) })
                .await
                .unwrap();
            black_box(fetched)
        });
    });

    c.bench_function("tiered_get_miss", |b| {
        b.to_async(&runtime).iter(|| async { black_box(cache.get::<Vec<Game>>(&key(1_000)).await) });
    });
}

fn bench_sqlite_tier(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let tier = runtime.block_on(SqliteTier::new(":memory:")).unwrap();
    let entry = gameshelf_engine::cache::CacheEntry::new(
        serde_json::to_value(Game::new("Test Game")).unwrap(),
        Duration::from_secs(60),
    );

    c.bench_function("sqlite_tier_put", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(tier.put("game:id=1", &entry).await.unwrap()) });
    });

    c.bench_function("sqlite_tier_get", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(tier.get("game:id=1").await.unwrap()) });
    });
}

fn bench_cache_key(c: &mut Criterion) {
    let filters = SearchFilters {
        genres: ["RPG".to_string(), "Adventure".to_string()].into_iter().collect(),
        min_rating: Some(80),
        ..SearchFilters::default()
    };

    c.bench_function("cache_key_search", |b| {
        b.iter(|| black_box(CacheKey::search("  The Witcher 3  Wild Hunt ", &filters)));
    });
}

fn bench_game_serialization(c: &mut Criterion) {
    let mut game = Game::new("Counter-Strike 2").with_igdb_id(242408);
    game.developer = Some("Valve".to_string());
    game.publisher = Some("Valve".to_string());
    game.genres = vec!["Shooter".to_string(), "Tactical".to_string()];
    game.platforms = vec!["PC (Microsoft Windows)".to_string(), "Linux".to_string()];

    c.bench_function("game_to_json", |b| {
        b.iter(|| black_box(game.to_json().unwrap()));
    });

    let json = game.to_json().unwrap();
    c.bench_function("game_from_json", |b| {
        b.iter(|| black_box(Game::from_json(&json).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_cache_fetch,
    bench_sqlite_tier,
    bench_cache_key,
    bench_game_serialization
);
criterion_main!(benches);
