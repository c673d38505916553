// Pickups, decoys and fences.
//
// All three are time-bounded (absolute `expires_at` in race seconds, checked
// in the engine's expiry phase) and side-scoped: each lives in one team's
// half of the maze. Pickups always spawn as a mirrored pair, one per half,
// so neither team gets a better draw.
//
// A fence is an axis-aligned rectangle of cells. While active it blocks any
// move whose endpoints lie on opposite sides of its boundary, in either
// direction. Movement entirely inside or entirely outside is unaffected.
//
// A decoy lures and sickens mice of the team that doesn't own it, and kills
// any cat not owned by its team. Each decoy carries the `EpidemicId` that the
// sickness it causes will spread under.
//
// See also: `engine.rs` for placement, collection and expiry,
// `behavior.rs` for the fence filter and decoy lure.

use crate::types::{Cell, EpidemicId, HazardId, Team};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PickupKind {
    /// Speed multiplier for the collector.
    Speed,
    /// Freezes the collector's opponents.
    Freeze,
    /// Truth autopilot for the collector.
    Reveal,
}

impl PickupKind {
    pub const ALL: [PickupKind; 3] = [PickupKind::Speed, PickupKind::Freeze, PickupKind::Reveal];
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pickup {
    pub kind: PickupKind,
    pub cell: Cell,
    /// The half it was spawned in.
    pub side: Team,
    /// Id of the pair's team-A pickup. Both halves of a pair share it.
    pub pair: HazardId,
    pub expires_at: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decoy {
    pub owner: Team,
    pub cell: Cell,
    pub source: EpidemicId,
    pub expires_at: f64,
}

impl Decoy {
    /// Whether this decoy lures and sickens mice of `team`.
    pub fn targets(&self, team: Team) -> bool {
        self.owner != team
    }
}

/// Inclusive cell rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRect {
    pub min: Cell,
    pub max: Cell,
}

impl CellRect {
    /// Square of side `2 * radius + 1` around `center`, clipped to a
    /// `width x height` grid.
    pub fn around(center: Cell, radius: u32, width: u32, height: u32) -> Self {
        let r = radius as i32;
        Self {
            min: Cell::new((center.x - r).max(0), (center.y - r).max(0)),
            max: Cell::new(
                (center.x + r).min(width as i32 - 1),
                (center.y + r).min(height as i32 - 1),
            ),
        }
    }

    pub fn contains(&self, cell: Cell) -> bool {
        (self.min.x..=self.max.x).contains(&cell.x) && (self.min.y..=self.max.y).contains(&cell.y)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fence {
    pub owner: Team,
    pub rect: CellRect,
    pub expires_at: f64,
}

impl Fence {
    pub fn is_active(&self, now: f64) -> bool {
        now < self.expires_at
    }

    /// Whether a move from `from` to `to` crosses this fence's boundary.
    pub fn blocks(&self, from: Cell, to: Cell, now: f64) -> bool {
        self.is_active(now) && self.rect.contains(from) != self.rect.contains(to)
    }
}

/// Whether any fence in `fences` blocks the move.
pub fn fenced_off<'a>(
    fences: impl IntoIterator<Item = &'a Fence>,
    from: Cell,
    to: Cell,
    now: f64,
) -> bool {
    fences.into_iter().any(|f| f.blocks(from, to, now))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence(center: Cell, radius: u32, expires_at: f64) -> Fence {
        Fence {
            owner: Team::B,
            rect: CellRect::around(center, radius, 15, 15),
            expires_at,
        }
    }

    #[test]
    fn rect_is_clipped_to_the_grid() {
        let r = CellRect::around(Cell::new(0, 14), 1, 15, 15);
        assert_eq!(r.min, Cell::new(0, 13));
        assert_eq!(r.max, Cell::new(1, 14));
        assert!(r.contains(Cell::new(1, 13)));
        assert!(!r.contains(Cell::new(2, 13)));
    }

    #[test]
    fn fence_blocks_crossings_both_ways() {
        let f = fence(Cell::new(5, 5), 1, 10.0);
        let inside = Cell::new(6, 5);
        let outside = Cell::new(7, 5);
        assert!(f.blocks(inside, outside, 0.0));
        assert!(f.blocks(outside, inside, 0.0));
        assert!(!f.blocks(Cell::new(5, 5), inside, 0.0));
        assert!(!f.blocks(outside, Cell::new(8, 5), 0.0));
    }

    #[test]
    fn expired_fence_blocks_nothing() {
        let f = fence(Cell::new(5, 5), 1, 10.0);
        assert!(f.blocks(Cell::new(6, 5), Cell::new(7, 5), 9.99));
        assert!(!f.blocks(Cell::new(6, 5), Cell::new(7, 5), 10.0));
    }

    #[test]
    fn fenced_off_checks_every_fence() {
        let fences = [fence(Cell::new(2, 2), 0, 5.0), fence(Cell::new(8, 8), 0, 5.0)];
        assert!(fenced_off(&fences, Cell::new(8, 7), Cell::new(8, 8), 1.0));
        assert!(!fenced_off(&fences, Cell::new(5, 5), Cell::new(5, 6), 1.0));
    }

    #[test]
    fn decoys_only_target_the_other_team() {
        let d = Decoy {
            owner: Team::A,
            cell: Cell::new(10, 3),
            source: EpidemicId(1),
            expires_at: 15.0,
        };
        assert!(d.targets(Team::B));
        assert!(!d.targets(Team::A));
    }
}
