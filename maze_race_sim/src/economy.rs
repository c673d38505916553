// Per-team economy and team-wide state.
//
// `TeamState` holds a team's score (spent on deploys and abilities, credited
// on goals, decayed every whole race second), its goal count, ability
// cooldowns, the deploy cooldown, the freeze gate, the fog-of-war mask and
// the Trémaux dead-end set its mice share. Cooldowns and freezes are stored
// as absolute ready/expiry times, never as timers that count down.
//
// The score never drops below zero.
//
// See also: `engine.rs` for validation order and the decay phase,
// `command.rs` for `Rejection`, `config.rs` for `EconomyParams`.

use crate::command::AbilityKind;
use crate::maze::Maze;
use crate::types::{Cell, Dir};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamState {
    pub score: i64,
    pub goals: u32,
    /// Ability -> race time it is usable again.
    cooldowns: BTreeMap<AbilityKind, f64>,
    pub deploy_ready_at: f64,
    pub frozen_until: Option<f64>,
    /// Cells with a single exit, learned by this team's mice.
    pub dead_ends: BTreeSet<usize>,
    explored: Vec<bool>,
    /// Fractional seconds not yet charged for decay.
    decay_carry: f64,
    /// Direction for this team's manual mice, consumed each tick.
    pub queued_dir: Option<Dir>,
}

impl TeamState {
    pub fn new(starting_score: i64, cell_count: usize) -> Self {
        Self {
            score: starting_score,
            goals: 0,
            cooldowns: BTreeMap::new(),
            deploy_ready_at: 0.0,
            frozen_until: None,
            dead_ends: BTreeSet::new(),
            explored: vec![false; cell_count],
            decay_carry: 0.0,
            queued_dir: None,
        }
    }

    pub fn can_afford(&self, cost: i64) -> bool {
        self.score >= cost
    }

    /// Deduct `cost` if affordable.
    pub fn spend(&mut self, cost: i64) -> bool {
        if self.can_afford(cost) {
            self.score -= cost;
            true
        } else {
            false
        }
    }

    pub fn credit(&mut self, amount: i64) {
        self.score += amount;
    }

    pub fn cooldown_remaining(&self, kind: AbilityKind, now: f64) -> f64 {
        self.cooldowns
            .get(&kind)
            .map_or(0.0, |ready| (ready - now).max(0.0))
    }

    pub fn start_cooldown(&mut self, kind: AbilityKind, ready_at: f64) {
        self.cooldowns.insert(kind, ready_at);
    }

    pub fn is_frozen(&self, now: f64) -> bool {
        self.frozen_until.is_some_and(|t| now < t)
    }

    /// Freeze until `until`, extending an existing freeze but never
    /// shortening it.
    pub fn freeze(&mut self, until: f64) {
        let until = self.frozen_until.map_or(until, |t| t.max(until));
        self.frozen_until = Some(until);
    }

    /// Clear an elapsed freeze. Returns whether one ended.
    pub fn expire_freeze(&mut self, now: f64) -> bool {
        if self.frozen_until.is_some_and(|t| now >= t) {
            self.frozen_until = None;
            true
        } else {
            false
        }
    }

    /// Charge decay for every whole second accumulated. Returns the amount
    /// actually deducted.
    pub fn decay(&mut self, dt: f64, per_second: i64) -> i64 {
        self.decay_carry += dt;
        let whole = self.decay_carry.floor();
        if whole < 1.0 {
            return 0;
        }
        self.decay_carry -= whole;
        let owed = per_second.saturating_mul(whole as i64);
        let charged = owed.min(self.score).max(0);
        self.score -= charged;
        charged
    }

    /// Mark every cell within Manhattan `radius` of `center` as explored.
    pub fn reveal(&mut self, maze: &Maze, center: Cell, radius: u32) {
        let r = radius as i32;
        for dy in -r..=r {
            let span = r - dy.abs();
            for dx in -span..=span {
                if let Some(i) = maze.index(Cell::new(center.x + dx, center.y + dy)) {
                    self.explored[i] = true;
                }
            }
        }
    }

    pub fn is_explored(&self, maze: &Maze, cell: Cell) -> bool {
        maze.index(cell)
            .and_then(|i| self.explored.get(i).copied())
            .unwrap_or(false)
    }

    pub fn explored_count(&self) -> usize {
        self.explored.iter().filter(|e| **e).count()
    }
}
