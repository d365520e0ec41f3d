use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gameshelf_engine::{
    core::Game,
    ranking::{FuzzyRanker, Ranker},
};

fn create_test_candidates(count: usize) -> Vec<Game> {
    (0..count)
        .map(|i| {
            let mut game = Game::new(format!("Test Game {}", i)).with_igdb_id(i as i64);
            game.alternative_names = vec![format!("TG{}", i)];
            game.rating_count = (i % 7) as i32 * 100;
            game
        })
        .collect()
}

fn bench_fuzzy_ranking(c: &mut Criterion) {
    let ranker = FuzzyRanker::new();

    let candidates_10 = create_test_candidates(10);
    let candidates_50 = create_test_candidates(50);
    let candidates_100 = create_test_candidates(100);

    c.bench_function("fuzzy_rank_10", |b| {
        b.iter(|| black_box(ranker.rank("test game 5", &candidates_10).unwrap()));
    });

    c.bench_function("fuzzy_rank_50", |b| {
        b.iter(|| black_box(ranker.rank("test game 25", &candidates_50).unwrap()));
    });

    c.bench_function("fuzzy_rank_100", |b| {
        b.iter(|| black_box(ranker.rank("test game 50", &candidates_100).unwrap()));
    });
}

criterion_group!(benches, bench_fuzzy_ranking);
criterion_main!(benches);
