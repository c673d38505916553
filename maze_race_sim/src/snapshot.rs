// Read-only views of the race for renderers and HUDs.
//
// `Engine::snapshot()` copies out everything a frontend draws in one frame:
// the wall masks, every mouse and cat with an interpolated position, hazards,
// both teams' economies and the clock. Snapshots are plain serde data so a
// frontend in another process can receive them as JSON.
//
// Nothing here feeds back into the simulation.
//
// See also: `engine.rs` for the live state these are cut from.

use crate::command::AbilityKind;
use crate::engine::{Engine, RoundState};
use crate::hazard::{CellRect, PickupKind};
use crate::types::{CatId, Cell, Dir, HazardId, MouseId, Team, Variant};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MouseView {
    pub id: MouseId,
    pub team: Team,
    pub variant: Variant,
    pub cell: Cell,
    pub position: (f64, f64),
    pub heading: Dir,
    pub sick: bool,
    pub truth: bool,
    pub looping: bool,
    pub speed_multiplier: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatView {
    pub id: CatId,
    pub team: Team,
    pub cell: Cell,
    pub position: (f64, f64),
    pub target: Option<Cell>,
    pub fatigued: bool,
    pub kills: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TeamView {
    pub team: Team,
    pub score: i64,
    pub goals: u32,
    pub active_mice: usize,
    pub frozen: bool,
    pub deploy_cooldown: f64,
    /// Seconds until each ability is usable again.
    pub cooldowns: BTreeMap<AbilityKind, f64>,
    pub explored_cells: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum HazardView {
    Pickup { kind: PickupKind, cell: Cell },
    Decoy { owner: Team, cell: Cell },
    Fence { owner: Team, rect: CellRect },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub tick: u64,
    pub time: f64,
    pub time_remaining: f64,
    pub round: RoundState,
    pub width: u32,
    pub height: u32,
    /// Row-major wall masks (N=1, E=2, S=4, W=8).
    pub walls: Vec<u8>,
    pub starts: [Cell; 2],
    pub goal: Cell,
    pub mice: Vec<MouseView>,
    pub cats: Vec<CatView>,
    pub hazards: BTreeMap<HazardId, HazardView>,
    pub teams: [TeamView; 2],
}

impl Engine {
    pub fn snapshot(&self) -> RaceSnapshot {
        let now = self.time;
        let mice = self
            .mice
            .values()
            .map(|m| MouseView {
                id: m.id,
                team: m.team,
                variant: m.variant,
                cell: m.cell,
                position: m.position(),
                heading: m.heading,
                sick: m.is_sick(now),
                truth: m.has_truth(now),
                looping: m.looping,
                speed_multiplier: m.speed_multiplier(now),
            })
            .collect();
        let cats = self
            .cats
            .values()
            .map(|c| CatView {
                id: c.id,
                team: c.team,
                cell: c.cell,
                position: c.position(),
                target: c.target,
                fatigued: c.fatigued,
                kills: c.kills,
            })
            .collect();

        let mut hazards = BTreeMap::new();
        for (id, p) in &self.pickups {
            hazards.insert(
                *id,
                HazardView::Pickup {
                    kind: p.kind,
                    cell: p.cell,
                },
            );
        }
        for (id, d) in &self.decoys {
            hazards.insert(
                *id,
                HazardView::Decoy {
                    owner: d.owner,
                    cell: d.cell,
                },
            );
        }
        for (id, f) in &self.fences {
            hazards.insert(
                *id,
                HazardView::Fence {
                    owner: f.owner,
                    rect: f.rect,
                },
            );
        }

        let teams = Team::ALL.map(|team| {
            let state = self.team(team);
            TeamView {
                team,
                score: state.score,
                goals: state.goals,
                active_mice: self.active_mice(team),
                frozen: state.is_frozen(now),
                deploy_cooldown: self.deploy_cooldown_remaining(team),
                cooldowns: AbilityKind::ALL
                    .into_iter()
                    .map(|k| (k, state.cooldown_remaining(k, now)))
                    .collect(),
                explored_cells: state.explored_count(),
            }
        });

        RaceSnapshot {
            tick: self.tick,
            time: now,
            time_remaining: (self.config.economy.round_duration_secs - now).max(0.0),
            round: self.round,
            width: self.maze.width(),
            height: self.maze.height(),
            walls: self.maze.wall_masks().to_vec(),
            starts: self.maze.starts(),
            goal: self.maze.goal(),
            mice,
            cats,
            hazards,
            teams,
        }
    }
}
