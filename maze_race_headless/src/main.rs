// Headless runner for the maze race.
//
// Plays a full AI-vs-AI round with no frontend, or sweeps a range of seeds
// for maze fairness, and prints a JSON summary on stdout. Logs go to stderr
// through `tracing_subscriber` (default level `info`, override with
// `RUST_LOG`).
//
// Usage:
//   maze-race [OPTIONS]
//     --seed <N>          Race seed, or first survey seed (default: 0)
//     --config <PATH>     RaceConfig JSON (default: built-in config)
//     --seconds <S>       Race-time cap in seconds (default: round duration)
//     --fps <F>           Simulated frame rate (default: 60)
//     --survey <COUNT>    Fairness-survey COUNT seeds instead of racing
//
// Exits non-zero on bad arguments, an unreadable or invalid config, or a
// survey that finds an unfair maze.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use maze_race_sim::config::RaceConfig;
use maze_race_sim::engine::{Engine, RoundState};
use maze_race_sim::event::RoundEndReason;
use maze_race_sim::survey::fairness_survey;
use maze_race_sim::types::Team;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

struct Options {
    seed: u64,
    config: Option<PathBuf>,
    seconds: Option<f64>,
    fps: f64,
    survey: Option<u64>,
}

#[derive(Serialize)]
struct RaceSummary {
    seed: u64,
    ticks: u64,
    time: f64,
    start_distance: u32,
    used_fallback: bool,
    finished: bool,
    winner: Option<Team>,
    reason: Option<RoundEndReason>,
    goals: [u32; 2],
    scores: [i64; 2],
    events: BTreeMap<&'static str, u64>,
}

fn main() {
    init_logging();
    let options = parse_args();

    let config = match &options.config {
        Some(path) => load_config(path).unwrap_or_else(|e| {
            eprintln!("{e}");
            std::process::exit(1);
        }),
        None => RaceConfig::default(),
    };

    if let Some(count) = options.survey {
        let seeds = options.seed..options.seed.saturating_add(count);
        let report = fairness_survey(&config.maze, seeds);
        print_json(&report);
        if !report.all_fair() {
            eprintln!("{} unfair maze(s): {:?}", report.unfair.len(), report.unfair);
            std::process::exit(2);
        }
        return;
    }

    let summary = run_race(&options, config).unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });
    print_json(&summary);
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: &Path) -> Result<RaceConfig, String> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    RaceConfig::from_json(&json).map_err(|e| format!("Invalid config {}: {e}", path.display()))
}

/// Both teams on the rival controller until the round ends or the time cap.
fn run_race(options: &Options, mut config: RaceConfig) -> Result<RaceSummary, String> {
    config.rival.ai_teams = Team::ALL.to_vec();
    let cap = options
        .seconds
        .unwrap_or(config.economy.round_duration_secs);
    let dt = 1.0 / options.fps;
    let mut engine = Engine::try_with_config(options.seed, config)
        .map_err(|e| format!("Config cannot run an AI-vs-AI race: {e}"))?;
    let mut events: BTreeMap<&'static str, u64> = BTreeMap::new();

    while engine.is_running() && engine.time() < cap {
        for event in engine.tick(dt) {
            *events.entry(event.kind.name()).or_default() += 1;
        }
    }

    let (finished, winner, reason) = match engine.round_state() {
        RoundState::Running => (false, None, None),
        RoundState::Finished { winner, reason } => (true, winner, Some(reason)),
    };
    tracing::info!(ticks = engine.current_tick(), ?winner, "race finished");
    Ok(RaceSummary {
        seed: options.seed,
        ticks: engine.current_tick(),
        time: engine.time(),
        start_distance: engine.generation().start_distance,
        used_fallback: engine.generation().used_fallback,
        finished,
        winner,
        reason,
        goals: Team::ALL.map(|t| engine.team(t).goals),
        scores: Team::ALL.map(|t| engine.team(t).score),
        events,
    })
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to serialize output: {e}");
            std::process::exit(1);
        }
    }
}

/// Parse command-line arguments. Uses plain `std::env::args()` matching.
fn parse_args() -> Options {
    let mut options = Options {
        seed: 0,
        config: None,
        seconds: None,
        fps: 60.0,
        survey: None,
    };
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--seed" => {
                i += 1;
                options.seed = parsed(&args, i, "--seed requires an unsigned integer");
            }
            "--config" => {
                i += 1;
                options.config = Some(args.get(i).map(PathBuf::from).unwrap_or_else(|| {
                    eprintln!("--config requires a path");
                    std::process::exit(1);
                }));
            }
            "--seconds" => {
                i += 1;
                let seconds: f64 = parsed(&args, i, "--seconds requires a number");
                if !(seconds > 0.0) {
                    eprintln!("--seconds must be positive");
                    std::process::exit(1);
                }
                options.seconds = Some(seconds);
            }
            "--fps" => {
                i += 1;
                options.fps = parsed(&args, i, "--fps requires a number");
                if !(options.fps > 0.0 && options.fps.is_finite()) {
                    eprintln!("--fps must be positive");
                    std::process::exit(1);
                }
            }
            "--survey" => {
                i += 1;
                options.survey = Some(parsed(&args, i, "--survey requires a seed count"));
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    options
}

fn parsed<T: std::str::FromStr>(args: &[String], i: usize, message: &str) -> T {
    args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
        eprintln!("{message}");
        std::process::exit(1);
    })
}

fn print_usage() {
    println!("Usage: maze-race [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --seed <N>          Race seed, or first survey seed (default: 0)");
    println!("  --config <PATH>     RaceConfig JSON (default: built-in config)");
    println!("  --seconds <S>       Race-time cap in seconds (default: round duration)");
    println!("  --fps <F>           Simulated frame rate (default: 60)");
    println!("  --survey <COUNT>    Fairness-survey COUNT seeds instead of racing");
    println!("  --help, -h          Show this help");
}
