// maze_race_sim: the simulation core of a two-team maze race.
//
// This crate holds everything that decides what happens in a race: the
// fair-maze generator, the BFS distance oracle, the mouse behavior engine,
// and the tick engine with its economy, hazards, predators and AI rival. It
// draws nothing, plays no sound and reads no clock; a frontend drives it
// with commands and `dt`, and reads it through queries and snapshots.
//
// Module overview:
// - `engine.rs`:    Engine, the tick loop, command validation and queries.
// - `maze.rs`:      Wall-mask grid, edge mutation, halves and mirroring.
// - `maze_gen.rs`:  Per-half backtracker carves validated for equal start
//                   distances, with a mirrored fallback.
// - `distance.rs`:  BFS distance maps and gradient steps.
// - `behavior.rs`:  `choose_next` and the per-variant strategies.
// - `mouse.rs`:     Mouse motion, memory and timed effects.
// - `cat.rs`:       Predator targeting, movement and fatigue.
// - `hazard.rs`:    Pickups, decoys and fences.
// - `economy.rs`:   TeamState: score, cooldowns, freeze, fog, dead ends.
// - `rival.rs`:     The AI opponent's per-think plan.
// - `command.rs`:   Command, AbilityKind, Rejection.
// - `event.rs`:     Narrative RaceEvents.
// - `snapshot.rs`:  Read-only RaceSnapshot views.
// - `survey.rs`:    Parallel fairness sweeps over seed ranges.
// - `config.rs`:    RaceConfig, every tunable, loaded from JSON.
// - `error.rs`:     ConfigError.
// - `types.rs`:     Cell, Dir, Team, entity ids, Variant.
// - `prng`:         Re-exported from `maze_race_prng`: xoshiro256++ with
//                   SplitMix64 seeding.
//
// **Critical constraint: determinism.** A race is a pure function of
// `(seed, config, command log, dt sequence)`. All randomness comes from the
// engine's one `RaceRng`. Ordered state lives in `BTreeMap`s; the one hash
// map (collision grouping) is sorted before anything reads its order. No
// system time, no OS entropy.

pub mod behavior;
pub mod cat;
pub mod command;
pub mod config;
pub mod distance;
pub mod economy;
pub mod engine;
pub mod error;
pub mod event;
pub mod hazard;
pub mod maze;
pub mod maze_gen;
pub mod mouse;
pub use maze_race_prng as prng;
pub mod rival;
pub mod snapshot;
pub mod survey;
pub mod types;
