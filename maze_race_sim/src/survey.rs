// Fairness sweeps over many seeds.
//
// `fairness_survey` generates one maze per seed in parallel and checks each
// for the race's core fairness property: both starts at the same finite BFS
// distance from the goal, at least the configured minimum. Generation is a
// pure function of `(params, seed)`, so each worker owns its own `RaceRng`
// and the per-seed results come back in seed order regardless of thread
// scheduling.
//
// Used by the headless runner's `--survey` mode and the fairness
// integration test.
//
// See also: `maze_gen.rs` for generation and `validate`.

use crate::config::MazeParams;
use crate::distance::distance_map;
use crate::maze_gen::{self, min_start_distance};
use crate::types::Team;
use maze_race_prng::RaceRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedResult {
    pub seed: u64,
    /// Distance from team A's start; `None` if unreachable.
    pub start_distance: Option<u32>,
    pub used_fallback: bool,
    pub attempts: u32,
    pub loop_bridges: u32,
    pub fair: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SurveyReport {
    pub seeds: u64,
    pub unfair: Vec<u64>,
    pub fallbacks: u64,
    pub min_distance: u32,
    pub max_distance: u32,
    pub mean_distance: f64,
    pub mean_attempts: f64,
}

impl SurveyReport {
    pub fn all_fair(&self) -> bool {
        self.unfair.is_empty()
    }
}

/// Generate and check a single seed.
pub fn survey_seed(params: &MazeParams, seed: u64) -> SeedResult {
    let mut rng = RaceRng::new(seed);
    let (maze, report) = maze_gen::generate(params, &mut rng);
    let map = distance_map(&maze, maze.goal());
    let a = map.get(maze.start(Team::A));
    let b = map.get(maze.start(Team::B));
    let fair = maze.check_wall_symmetry().is_ok()
        && a.is_some()
        && a == b
        && a.is_some_and(|d| d >= min_start_distance(&maze, params));
    SeedResult {
        seed,
        start_distance: a,
        used_fallback: report.used_fallback,
        attempts: report.attempts,
        loop_bridges: report.loop_bridges,
        fair,
    }
}

pub fn fairness_survey(params: &MazeParams, seeds: Range<u64>) -> SurveyReport {
    let results: Vec<SeedResult> = seeds
        .clone()
        .into_par_iter()
        .map(|seed| survey_seed(params, seed))
        .collect();
    let report = summarize(&results);
    tracing::info!(
        seeds = report.seeds,
        unfair = report.unfair.len(),
        fallbacks = report.fallbacks,
        min = report.min_distance,
        max = report.max_distance,
        "fairness survey done"
    );
    report
}

fn summarize(results: &[SeedResult]) -> SurveyReport {
    let distances: Vec<u32> = results.iter().filter_map(|r| r.start_distance).collect();
    let count = results.len() as u64;
    let mean = |total: f64, n: usize| if n == 0 { 0.0 } else { total / n as f64 };
    SurveyReport {
        seeds: count,
        unfair: results.iter().filter(|r| !r.fair).map(|r| r.seed).collect(),
        fallbacks: results.iter().filter(|r| r.used_fallback).count() as u64,
        min_distance: distances.iter().copied().min().unwrap_or(0),
        max_distance: distances.iter().copied().max().unwrap_or(0),
        mean_distance: mean(
            distances.iter().map(|d| f64::from(*d)).sum(),
            distances.len(),
        ),
        mean_attempts: mean(
            results.iter().map(|r| f64::from(r.attempts)).sum(),
            results.len(),
        ),
    }
}
