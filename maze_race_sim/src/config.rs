// Data-driven race configuration.
//
// Every tunable lives in `RaceConfig`, grouped into nested parameter structs
// and loaded from JSON (`RaceConfig::from_json`, which also validates). The
// sim reads these values and carries no balance numbers of its own, so
// designers iterate without recompiling.
//
// Per-variant data (deploy cost, speed multiplier) is keyed by `Variant` in
// `variants`; per-ability data (cost, cooldown, duration, radius) is keyed by
// `AbilityKind` in `abilities`. Both tables must be complete.
//
// The loop-detection thresholds in `BehaviorParams` were tuned by playtesting
// and have no derivation; treat them as data, not as numbers to "fix".
//
// See also: `engine.rs` which owns the config, `maze_gen.rs` for
// `MazeParams`, `behavior.rs` for `BehaviorParams`.
//
// **Critical constraint: determinism.** Config values feed straight into the
// simulation. Replays must use the config they were recorded with.

use crate::command::AbilityKind;
use crate::error::ConfigError;
use crate::types::{Team, Variant};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maze generation parameters. See `maze_gen::generate`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MazeParams {
    /// Columns. Must be odd so the two starts mirror about the goal column.
    pub width: u32,
    pub height: u32,
    /// Minimum direction changes along each start's gradient walk.
    pub min_turns: u32,
    /// Randomized attempts before the mirrored-serpentine fallback.
    pub max_attempts: u32,
    /// Start distance must be at least `ceil(factor * manhattan(start, goal))`.
    pub path_length_factor: f64,
    /// Extra wall breaks added inside each half after a maze validates.
    pub loop_bridges_per_half: u32,
}

/// Movement speeds, in cells per second.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MovementParams {
    pub base_speed: f64,
    /// Upper clamp on a single tick's `dt`.
    pub max_dt_secs: f64,
    pub cat_speed: f64,
}

/// Per-variant deploy cost and speed multiplier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariantData {
    pub cost: i64,
    pub speed: f64,
}

/// Tuning for the behavior engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BehaviorParams {
    /// Length of each mouse's recent-cell ring buffer.
    pub recent_memory_len: usize,
    /// Probability a wanderer restricts itself to unvisited neighbors.
    pub wanderer_unvisited_bias: f64,
    pub sniffer_visit_penalty: f64,
    pub sniffer_recent_penalty: f64,
    pub sniffer_noise: f64,
    pub tremaux_dead_end_penalty: f64,
    pub fragile_mistake_chance: f64,
    /// Visits to one cell before a mouse is flagged as looping.
    pub loop_visit_threshold: u32,
    /// Consecutive A-B-A bounces before a mouse goes crazy.
    pub ping_pong_threshold: u32,
    pub blocked_retry_delay_secs: f64,
    pub decoy_lure_radius: u32,
    pub decoy_lure_chance: f64,
    /// Manhattan radius revealed around every arrival.
    pub fog_reveal_radius: u32,
}

/// Score economy and round rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EconomyParams {
    pub starting_score: i64,
    pub decay_per_second: i64,
    pub goal_reward: i64,
    pub goals_to_win: u32,
    pub max_active_mice: usize,
    pub deploy_cooldown_secs: f64,
    pub round_duration_secs: f64,
}

/// Per-ability cost, cooldown, effect duration and area radius. Fields an
/// ability doesn't use are ignored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbilityData {
    pub cost: i64,
    pub cooldown_secs: f64,
    pub duration_secs: f64,
    pub radius: u32,
}

/// Timed status effect tuning not tied to a specific ability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectParams {
    pub boost_multiplier: f64,
    /// Boost ability uses per mouse.
    pub boost_limit: u8,
    pub speed_pickup_multiplier: f64,
    pub speed_pickup_secs: f64,
    pub freeze_pickup_secs: f64,
    pub reveal_pickup_secs: f64,
    pub sickness_secs: f64,
    /// Speed multiplier while sick.
    pub sickness_speed_penalty: f64,
    /// Wall-break radius of a cross-team collision.
    pub collision_blast_radius: u32,
}

/// Predator tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatParams {
    pub lifetime_secs: f64,
    pub fatigue_after_kills: u32,
    pub fatigue_delay_secs: f64,
    /// Speed multiplier once fatigue sets in. Permanent.
    pub fatigue_speed_penalty: f64,
    pub sight_radius: u32,
}

/// Built-in pickup dispatcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HazardParams {
    /// Seconds between symmetric pickup pairs. 0 disables the dispatcher.
    pub pickup_interval_secs: f64,
    pub pickup_lifetime_secs: f64,
    pub max_pickup_pairs: usize,
}

/// The AI opponent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RivalParams {
    /// Teams driven by the rival controller. Usually just the non-user team.
    pub ai_teams: Vec<Team>,
    pub think_interval_secs: f64,
    /// Variants the rival deploys, picked uniformly.
    pub deploy_pool: Vec<Variant>,
    /// Spend Truth on mice flagged as looping.
    pub truth_on_looping: bool,
    /// Visible opposing mice needed before the rival releases its cat.
    pub cat_min_targets: usize,
}

/// The complete configuration for one race.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RaceConfig {
    pub maze: MazeParams,
    pub movement: MovementParams,
    pub variants: BTreeMap<Variant, VariantData>,
    pub behavior: BehaviorParams,
    pub economy: EconomyParams,
    pub abilities: BTreeMap<AbilityKind, AbilityData>,
    pub effects: EffectParams,
    pub cat: CatParams,
    pub hazards: HazardParams,
    pub rival: RivalParams,
}

impl RaceConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RaceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the sim relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.maze;
        if m.width < 7 || m.height < 7 || m.width % 2 == 0 {
            return Err(ConfigError::MazeSize {
                width: m.width,
                height: m.height,
            });
        }
        if !(1.0..=2.0).contains(&m.path_length_factor) {
            return Err(ConfigError::OutOfRange {
                field: "maze.path_length_factor",
                expected: "within [1.0, 2.0]",
                value: m.path_length_factor,
            });
        }
        positive("movement.base_speed", self.movement.base_speed)?;
        positive("movement.max_dt_secs", self.movement.max_dt_secs)?;
        positive("movement.cat_speed", self.movement.cat_speed)?;
        probability(
            "behavior.wanderer_unvisited_bias",
            self.behavior.wanderer_unvisited_bias,
        )?;
        probability(
            "behavior.fragile_mistake_chance",
            self.behavior.fragile_mistake_chance,
        )?;
        probability("behavior.decoy_lure_chance", self.behavior.decoy_lure_chance)?;

        for variant in Variant::ALL {
            match self.variants.get(&variant) {
                None => return Err(ConfigError::MissingVariant(variant)),
                Some(data) => positive("variants.speed", data.speed)?,
            }
        }
        for kind in AbilityKind::ALL {
            if !self.abilities.contains_key(&kind) {
                return Err(ConfigError::MissingAbility(kind));
            }
        }
        if !self.rival.ai_teams.is_empty() && self.rival.deploy_pool.is_empty() {
            return Err(ConfigError::EmptyDeployPool);
        }
        Ok(())
    }

    pub fn variant(&self, variant: Variant) -> &VariantData {
        &self.variants[&variant]
    }

    pub fn ability(&self, kind: AbilityKind) -> &AbilityData {
        &self.abilities[&kind]
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected: "positive",
            value,
        })
    }
}

fn probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            expected: "within [0.0, 1.0]",
            value,
        })
    }
}

impl Default for MazeParams {
    fn default() -> Self {
        Self {
            width: 15,
            height: 15,
            min_turns: 6,
            max_attempts: 200,
            path_length_factor: 1.8,
            loop_bridges_per_half: 3,
        }
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        let variants = [
            (Variant::Manual, 10, 1.0),
            (Variant::PerfectPath, 40, 0.8),
            (Variant::Wanderer, 5, 1.15),
            (Variant::WallHugger, 8, 1.1),
            (Variant::Sniffer, 15, 1.0),
            (Variant::Tremaux, 20, 1.0),
            (Variant::Explorer, 12, 1.05),
            (Variant::WiseButFragile, 25, 1.25),
        ]
        .into_iter()
        .map(|(v, cost, speed)| (v, VariantData { cost, speed }))
        .collect();

        let abilities = [
            (AbilityKind::Boost, 10, 3.0, 4.0, 0),
            (AbilityKind::Truth, 30, 12.0, 6.0, 0),
            (AbilityKind::Freeze, 35, 20.0, 3.0, 0),
            (AbilityKind::Demolish, 25, 10.0, 0.0, 1),
            (AbilityKind::Fence, 20, 8.0, 5.0, 1),
            (AbilityKind::Decoy, 15, 6.0, 15.0, 0),
            (AbilityKind::Cat, 45, 30.0, 0.0, 0),
        ]
        .into_iter()
        .map(|(kind, cost, cooldown_secs, duration_secs, radius)| {
            (
                kind,
                AbilityData {
                    cost,
                    cooldown_secs,
                    duration_secs,
                    radius,
                },
            )
        })
        .collect();

        Self {
            maze: MazeParams::default(),
            movement: MovementParams {
                base_speed: 3.0,
                max_dt_secs: 0.1,
                cat_speed: 2.4,
            },
            variants,
            behavior: BehaviorParams {
                recent_memory_len: 8,
                wanderer_unvisited_bias: 0.75,
                sniffer_visit_penalty: 2.0,
                sniffer_recent_penalty: 12.0,
                sniffer_noise: 0.5,
                tremaux_dead_end_penalty: 50.0,
                fragile_mistake_chance: 0.1,
                loop_visit_threshold: 6,
                ping_pong_threshold: 10,
                blocked_retry_delay_secs: 1.5,
                decoy_lure_radius: 3,
                decoy_lure_chance: 0.6,
                fog_reveal_radius: 2,
            },
            economy: EconomyParams {
                starting_score: 100,
                decay_per_second: 1,
                goal_reward: 40,
                goals_to_win: 5,
                max_active_mice: 6,
                deploy_cooldown_secs: 0.75,
                round_duration_secs: 180.0,
            },
            abilities,
            effects: EffectParams {
                boost_multiplier: 1.6,
                boost_limit: 2,
                speed_pickup_multiplier: 1.5,
                speed_pickup_secs: 5.0,
                freeze_pickup_secs: 3.0,
                reveal_pickup_secs: 6.0,
                sickness_secs: 8.0,
                sickness_speed_penalty: 0.5,
                collision_blast_radius: 1,
            },
            cat: CatParams {
                lifetime_secs: 25.0,
                fatigue_after_kills: 2,
                fatigue_delay_secs: 4.0,
                fatigue_speed_penalty: 0.6,
                sight_radius: 3,
            },
            hazards: HazardParams {
                pickup_interval_secs: 10.0,
                pickup_lifetime_secs: 12.0,
                max_pickup_pairs: 3,
            },
            rival: RivalParams {
                ai_teams: vec![Team::B],
                think_interval_secs: 1.5,
                deploy_pool: vec![
                    Variant::Sniffer,
                    Variant::Tremaux,
                    Variant::Explorer,
                    Variant::Wanderer,
                    Variant::WallHugger,
                    Variant::WiseButFragile,
                    Variant::PerfectPath,
                ],
                truth_on_looping: true,
                cat_min_targets: 2,
            },
        }
    }
}
