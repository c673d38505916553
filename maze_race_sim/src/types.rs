// Core types shared across the simulation.
//
// Grid addressing (`Cell`, `Dir`), the two teams, compact sequential entity
// ids, and the closed set of mouse behavior `Variant`s. Everything derives
// `Serialize`/`Deserialize` so the whole engine can be snapshotted.
//
// Direction order matters: `Dir::ALL` is N, E, S, W, and every tie-break in
// the crate (gradient descent, turn-count walk, candidate ordering) iterates
// in that order.
//
// **Critical constraint: determinism.** Ids are handed out sequentially by
// the engine, never from entropy. Use `BTreeMap`/`BTreeSet` for anything
// iterated.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A maze cell. `x` grows east, `y` grows south; `(0, 0)` is the north-west
/// corner.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Self) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// The adjacent cell in `dir`. May be out of bounds.
    pub fn step(self, dir: Dir) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Direction from `self` to an orthogonally adjacent `other`.
    pub fn dir_to(self, other: Self) -> Option<Dir> {
        Dir::ALL.into_iter().find(|d| self.step(*d) == other)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Compass direction. Doubles as the wall bit for that side of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dir {
    North,
    East,
    South,
    West,
}

impl Dir {
    /// Tie-break order used everywhere: N, E, S, W.
    pub const ALL: [Dir; 4] = [Dir::North, Dir::East, Dir::South, Dir::West];

    /// Wall-mask bit: N=1, E=2, S=4, W=8.
    pub const fn bit(self) -> u8 {
        match self {
            Dir::North => 1,
            Dir::East => 2,
            Dir::South => 4,
            Dir::West => 8,
        }
    }

    pub const fn delta(self) -> (i32, i32) {
        match self {
            Dir::North => (0, -1),
            Dir::East => (1, 0),
            Dir::South => (0, 1),
            Dir::West => (-1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Dir::North => Dir::South,
            Dir::East => Dir::West,
            Dir::South => Dir::North,
            Dir::West => Dir::East,
        }
    }

    /// 90° counter-clockwise.
    pub const fn left(self) -> Self {
        match self {
            Dir::North => Dir::West,
            Dir::East => Dir::North,
            Dir::South => Dir::East,
            Dir::West => Dir::South,
        }
    }

    /// 90° clockwise.
    pub const fn right(self) -> Self {
        match self {
            Dir::North => Dir::East,
            Dir::East => Dir::South,
            Dir::South => Dir::West,
            Dir::West => Dir::North,
        }
    }

    /// Reflection across a vertical axis (east <-> west).
    pub const fn mirrored(self) -> Self {
        match self {
            Dir::East => Dir::West,
            Dir::West => Dir::East,
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

/// The two racing sides. `A` is the user's team and wins every tie in maze
/// partitioning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

impl Team {
    pub const ALL: [Team; 2] = [Team::A, Team::B];

    pub const fn index(self) -> usize {
        match self {
            Team::A => 0,
            Team::B => 1,
        }
    }

    pub const fn opponent(self) -> Self {
        match self {
            Team::A => Team::B,
            Team::B => Team::A,
        }
    }
}

// ---------------------------------------------------------------------------
// Entity ids: sequential, compact
// ---------------------------------------------------------------------------

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

entity_id!(/// A deployed mouse.
MouseId);
entity_id!(/// A predator cat.
CatId);
entity_id!(/// A pickup, decoy or fence.
HazardId);
entity_id!(/// One sickness outbreak. Every mouse infected down a contagion chain
/// carries the id of the decoy that started it.
EpidemicId);

/// Hands out sequential ids. Lives on the engine so ids survive snapshots.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn next_raw(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

// ---------------------------------------------------------------------------
// Behavior variants
// ---------------------------------------------------------------------------

/// A mouse's pathfinding strategy, fixed at deploy time. Dispatched by one
/// exhaustive `match` in `behavior.rs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variant {
    /// Follows directions queued by the input layer.
    Manual,
    /// Descends the goal-distance gradient ("aiManual").
    PerfectPath,
    /// Random walk biased toward unvisited cells.
    Wanderer,
    /// Left- or right-hand wall follower.
    WallHugger,
    /// Greedy with recency penalties.
    Sniffer,
    /// Trémaux passage marking with team-shared dead ends ("Cartographer").
    Tremaux,
    /// Unvisited first, then least recently visited.
    Explorer,
    /// Near-optimal, occasionally wrong, crushed by company.
    WiseButFragile,
}

impl Variant {
    pub const ALL: [Variant; 8] = [
        Variant::Manual,
        Variant::PerfectPath,
        Variant::Wanderer,
        Variant::WallHugger,
        Variant::Sniffer,
        Variant::Tremaux,
        Variant::Explorer,
        Variant::WiseButFragile,
    ];

    /// Whether the behavior engine drives this mouse on its own. Manual mice
    /// ignore lures and blocked-cell retries.
    pub const fn is_autonomous(self) -> bool {
        !matches!(self, Variant::Manual)
    }
}

/// Which wall a `WallHugger` keeps its hand on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
}
