// Narrative events emitted by the engine.
//
// Every observable state change the UI might want to animate or log comes
// out of `Engine::step`/`Engine::tick` as a `RaceEvent`, stamped with the
// tick number and race time it happened at. Direct command calls
// (`Engine::deploy` and friends) queue their events too; the next step
// returns them ahead of the tick's own.
//
// Events are output only. Nothing in the engine reads them back, so
// replaying a command log reproduces them exactly.
//
// See also: `engine.rs` which emits them, `command.rs` for the inputs.

use crate::command::AbilityKind;
use crate::hazard::PickupKind;
use crate::mouse::EffectKind;
use crate::types::{CatId, Cell, EpidemicId, HazardId, MouseId, Team, Variant};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RaceEvent {
    pub tick: u64,
    pub time: f64,
    pub kind: RaceEventKind,
}

/// Why a mouse left the board without reaching the goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestroyReason {
    /// `Engine::destroy` / `Command::Destroy`.
    Explicit,
    /// Shared a cell with the other team.
    Collision,
    /// A fragile mouse sharing a cell with a teammate.
    Crushed,
    /// Exceeded the ping-pong threshold.
    WentCrazy,
    EatenByCat,
    RoundEnded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CatDeath {
    AteSickMouse,
    Decoy,
    /// Lifetime ran out.
    Expired,
    RoundEnded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundEndReason {
    GoalsReached,
    TimeUp,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RaceEventKind {
    RoundStarted {
        seed: u64,
        start_distance: u32,
    },
    MouseDeployed {
        mouse: MouseId,
        team: Team,
        variant: Variant,
    },
    MouseReachedGoal {
        mouse: MouseId,
        team: Team,
        goals: u32,
    },
    MouseDestroyed {
        mouse: MouseId,
        team: Team,
        reason: DestroyReason,
    },
    /// Every exit fenced off this tick.
    MouseTrapped {
        mouse: MouseId,
        cell: Cell,
    },
    MouseLooping {
        mouse: MouseId,
    },
    MouseSickened {
        mouse: MouseId,
        source: EpidemicId,
    },
    EffectExpired {
        mouse: MouseId,
        effect: EffectKind,
    },
    AbilityUsed {
        team: Team,
        kind: AbilityKind,
        target: Option<Cell>,
    },
    WallsBroken {
        center: Cell,
        count: u32,
    },
    TeamFrozen {
        team: Team,
        until: f64,
    },
    FreezeEnded {
        team: Team,
    },
    PickupSpawned {
        pickup: HazardId,
        kind: PickupKind,
        cell: Cell,
    },
    PickupCollected {
        pickup: HazardId,
        mouse: MouseId,
        kind: PickupKind,
    },
    FenceRaised {
        fence: HazardId,
        team: Team,
    },
    DecoyPlaced {
        decoy: HazardId,
        team: Team,
        cell: Cell,
    },
    DecoyEaten {
        decoy: HazardId,
        mouse: MouseId,
    },
    HazardExpired {
        hazard: HazardId,
    },
    CatSpawned {
        cat: CatId,
        team: Team,
    },
    CatKill {
        cat: CatId,
        mouse: MouseId,
    },
    CatFatigued {
        cat: CatId,
    },
    CatDied {
        cat: CatId,
        cause: CatDeath,
    },
    RoundEnded {
        winner: Option<Team>,
        reason: RoundEndReason,
    },
}

impl RaceEventKind {
    /// Variant name, for tallies and logs.
    pub fn name(&self) -> &'static str {
        match self {
            RaceEventKind::RoundStarted { .. } => "RoundStarted",
            RaceEventKind::MouseDeployed { .. } => "MouseDeployed",
            RaceEventKind::MouseReachedGoal { .. } => "MouseReachedGoal",
            RaceEventKind::MouseDestroyed { .. } => "MouseDestroyed",
            RaceEventKind::MouseTrapped { .. } => "MouseTrapped",
            RaceEventKind::MouseLooping { .. } => "MouseLooping",
            RaceEventKind::MouseSickened { .. } => "MouseSickened",
            RaceEventKind::EffectExpired { .. } => "EffectExpired",
            RaceEventKind::AbilityUsed { .. } => "AbilityUsed",
            RaceEventKind::WallsBroken { .. } => "WallsBroken",
            RaceEventKind::TeamFrozen { .. } => "TeamFrozen",
            RaceEventKind::FreezeEnded { .. } => "FreezeEnded",
            RaceEventKind::PickupSpawned { .. } => "PickupSpawned",
            RaceEventKind::PickupCollected { .. } => "PickupCollected",
            RaceEventKind::FenceRaised { .. } => "FenceRaised",
            RaceEventKind::DecoyPlaced { .. } => "DecoyPlaced",
            RaceEventKind::DecoyEaten { .. } => "DecoyEaten",
            RaceEventKind::HazardExpired { .. } => "HazardExpired",
            RaceEventKind::CatSpawned { .. } => "CatSpawned",
            RaceEventKind::CatKill { .. } => "CatKill",
            RaceEventKind::CatFatigued { .. } => "CatFatigued",
            RaceEventKind::CatDied { .. } => "CatDied",
            RaceEventKind::RoundEnded { .. } => "RoundEnded",
        }
    }
}
