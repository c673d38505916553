// Commands the input layer issues to the engine, and how they can fail.
//
// All external mutations go through here: deploying mice, destroying them,
// using abilities, and queueing manual directions. Each has a direct method
// on `Engine` (`deploy`, `destroy`, `use_ability`, `queue_direction`) for a UI
// that wants the result immediately, and a `Command` value for callers that
// keep a log and replay it through `Engine::step`. Replaying the same log
// against the same seed reproduces the same race.
//
// Rejections are plain data. The core never formats user-facing text; the UI
// maps each `Rejection` to its own message.
//
// See also: `engine.rs` for validation order and application, `event.rs` for
// what the engine reports back.

use crate::types::{Cell, Dir, MouseId, Team, Variant};
use serde::{Deserialize, Serialize};

/// Abilities a team can spend score on. Keyed into `RaceConfig::abilities`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Speed up an own mouse standing on the target cell.
    Boost,
    /// Put an own mouse on guaranteed-shortest-path autopilot.
    Truth,
    /// Freeze the opposing team.
    Freeze,
    /// Break walls around the target cell.
    Demolish,
    /// Raise a fence centered on a cell in the opposing half.
    Fence,
    /// Place a decoy on a cell in the opposing half.
    Decoy,
    /// Release this team's predator.
    Cat,
}

impl AbilityKind {
    pub const ALL: [AbilityKind; 7] = [
        AbilityKind::Boost,
        AbilityKind::Truth,
        AbilityKind::Freeze,
        AbilityKind::Demolish,
        AbilityKind::Fence,
        AbilityKind::Decoy,
        AbilityKind::Cat,
    ];

    /// Whether `use_ability` requires a target cell.
    pub const fn needs_target(self) -> bool {
        matches!(
            self,
            AbilityKind::Boost
                | AbilityKind::Truth
                | AbilityKind::Demolish
                | AbilityKind::Fence
                | AbilityKind::Decoy
        )
    }
}

/// Why a command was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    InsufficientFunds,
    OnCooldown,
    MaxActiveReached,
    RoundInactive,
    InvalidTarget,
}

/// A loggable engine command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Deploy {
        team: Team,
        variant: Variant,
    },
    Destroy {
        mouse: MouseId,
    },
    UseAbility {
        team: Team,
        kind: AbilityKind,
        target: Option<Cell>,
    },
    QueueDirection {
        team: Team,
        dir: Dir,
    },
}

/// What happened to one command in `Engine::step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    Deployed(MouseId),
    Applied,
    /// `Destroy` named a mouse that no longer exists.
    NoSuchMouse,
    Rejected(Rejection),
}
