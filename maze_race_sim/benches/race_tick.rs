// Benchmarks for maze generation, BFS distance maps and the tick loop.
//
// Run with: cargo bench -p maze_race_sim --bench race_tick
//
// The tick benchmark plays an AI-vs-AI race at 60 fps from a warmed-up
// state, so the numbers include behavior decisions, collisions and the rival
// controller with a realistic population on the board.

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use maze_race_sim::config::{MazeParams, RaceConfig};
use maze_race_sim::distance::distance_map;
use maze_race_sim::engine::Engine;
use maze_race_sim::maze_gen;
use maze_race_sim::prng::RaceRng;
use maze_race_sim::types::Team;
use std::hint::black_box;

fn bench_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("maze_gen");
    for size in [15u32, 31] {
        let params = MazeParams {
            width: size,
            height: size,
            ..MazeParams::default()
        };
        group.bench_function(format!("generate_{size}x{size}"), |b| {
            let mut seed = 0u64;
            b.iter(|| {
                seed += 1;
                black_box(maze_gen::generate(&params, &mut RaceRng::new(seed)))
            });
        });
    }
    group.finish();
}

fn bench_distance(c: &mut Criterion) {
    let (maze, _) = maze_gen::generate(&MazeParams::default(), &mut RaceRng::new(7));
    c.bench_function("distance_map_15x15", |b| {
        b.iter(|| black_box(distance_map(&maze, maze.goal())));
    });
}

fn warmed_engine() -> Engine {
    let mut config = RaceConfig::default();
    config.rival.ai_teams = vec![Team::A, Team::B];
    config.economy.round_duration_secs = 10_000.0;
    config.economy.goals_to_win = u32::MAX;
    let mut engine = Engine::with_config(42, config);
    for _ in 0..600 {
        engine.tick(1.0 / 60.0);
    }
    engine
}

fn bench_tick(c: &mut Criterion) {
    let warmed = warmed_engine();
    let mut group = c.benchmark_group("race");
    group.bench_function("tick_60fps", |b| {
        b.iter_batched(
            || warmed.clone(),
            |mut engine| {
                engine.tick(1.0 / 60.0);
                engine
            },
            BatchSize::SmallInput,
        );
    });
    group.bench_function("ten_seconds_60fps", |b| {
        b.iter_batched(
            || warmed.clone(),
            |mut engine| {
                for _ in 0..600 {
                    black_box(engine.tick(1.0 / 60.0));
                }
                engine
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_generation, bench_distance, bench_tick);
criterion_main!(benches);
