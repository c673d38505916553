// Predator cats.
//
// Each team may have one cat at a time. It spawns on the goal and hunts the
// opposing team's mice, moving with the same Idle/Transit machine as mice
// (`mouse::Motion`) at `movement.cat_speed`.
//
// Targeting: every tick the engine tells the cat which opposing mice it can
// observe (cell explored by the cat's team, or within its own sight radius).
// The nearest observed mouse's cell becomes the target. With nothing in view
// the cat keeps chasing the last observed position until it gets there, then
// wanders.
//
// Lifecycle: after `fatigue_after_kills` kills a fatigue timer starts; when it
// fires the cat slows down for good. Cats despawn at `lifetime_secs`. Eating a
// sick mouse or stepping on a decoy it doesn't own kills the cat.
//
// See also: `engine.rs` for spawning, the kill rules and expiry,
// `distance.rs` for the BFS used to chase.
//
// **Critical constraint: determinism.** Target ties break on `MouseId`, and
// wandering draws from the engine RNG.

use crate::config::CatParams;
use crate::distance::distance_map;
use crate::hazard::{Fence, fenced_off};
use crate::maze::Maze;
use crate::mouse::Motion;
use crate::types::{CatId, Cell, Dir, MouseId, Team};
use maze_race_prng::RaceRng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cat {
    pub id: CatId,
    pub team: Team,
    pub cell: Cell,
    pub motion: Motion,
    pub heading: Dir,
    pub target: Option<Cell>,
    pub kills: u32,
    /// When fatigue sets in, once the kill threshold is reached.
    pub fatigue_at: Option<f64>,
    pub fatigued: bool,
    pub expires_at: f64,
}

impl Cat {
    pub fn new(id: CatId, team: Team, cell: Cell, now: f64, params: &CatParams) -> Self {
        Self {
            id,
            team,
            cell,
            motion: Motion::Idle,
            heading: Dir::South,
            target: None,
            kills: 0,
            fatigue_at: None,
            fatigued: false,
            expires_at: now + params.lifetime_secs,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.motion, Motion::Idle)
    }

    pub fn speed_multiplier(&self, params: &CatParams) -> f64 {
        if self.fatigued {
            params.fatigue_speed_penalty
        } else {
            1.0
        }
    }

    /// Interpolated position in cell units.
    pub fn position(&self) -> (f64, f64) {
        match self.motion {
            Motion::Idle => (f64::from(self.cell.x), f64::from(self.cell.y)),
            Motion::Transit { from, to, progress } => (
                f64::from(from.x) + f64::from(to.x - from.x) * progress,
                f64::from(from.y) + f64::from(to.y - from.y) * progress,
            ),
        }
    }

    /// Retarget on the nearest observed mouse, by Manhattan distance then id.
    /// Keeps the old target when nothing is observed.
    pub fn observe(&mut self, observed: &[(MouseId, Cell)]) {
        let nearest = observed
            .iter()
            .min_by_key(|(id, cell)| (cell.manhattan(self.cell), *id));
        if let Some((_, cell)) = nearest {
            self.target = Some(*cell);
        } else if self.target == Some(self.cell) {
            self.target = None;
        }
    }

    pub fn record_kill(&mut self, now: f64, params: &CatParams) {
        self.kills += 1;
        if self.fatigue_at.is_none() && !self.fatigued && self.kills >= params.fatigue_after_kills {
            self.fatigue_at = Some(now + params.fatigue_delay_secs);
        }
    }

    /// Fire the fatigue timer if due. Returns whether it fired.
    pub fn update_fatigue(&mut self, now: f64) -> bool {
        match self.fatigue_at {
            Some(at) if now >= at => {
                self.fatigue_at = None;
                self.fatigued = true;
                true
            }
            _ => false,
        }
    }

    pub fn start_transit(&mut self, to: Cell) {
        if let Some(dir) = self.cell.dir_to(to) {
            self.heading = dir;
        }
        self.motion = Motion::Transit {
            from: self.cell,
            to,
            progress: 0.0,
        };
    }

    /// Commit a finished transit. Overflow progress is discarded.
    pub fn commit(&mut self) -> Option<Cell> {
        let Motion::Transit { to, progress, .. } = self.motion else {
            return None;
        };
        if progress < 1.0 {
            return None;
        }
        self.cell = to;
        self.motion = Motion::Idle;
        Some(to)
    }
}

/// Next cell for an idle cat: one BFS step toward its target, or a random
/// legal neighbor when it has none. Never crosses an active fence.
pub fn choose_cat_step(
    cat: &Cat,
    maze: &Maze,
    fences: &[Fence],
    now: f64,
    rng: &mut RaceRng,
) -> Option<Cell> {
    let open: SmallVec<[Cell; 4]> = maze
        .open_neighbors(cat.cell)
        .into_iter()
        .filter(|n| !fenced_off(fences, cat.cell, *n, now))
        .collect();
    match cat.target {
        Some(target) if target != cat.cell => {
            let map = distance_map(maze, target);
            let here = map.get(cat.cell)?;
            open.into_iter()
                .find(|n| map.get(*n).is_some_and(|d| d < here))
        }
        _ => rng.pick(&open).copied(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RaceConfig;
    use crate::hazard::CellRect;

    fn corridor() -> Maze {
        Maze::from_ascii(
            "
            +-+-+-+-+-+-+-+
            |A     G     B|
            +-+-+-+-+-+-+-+
            ",
        )
        .unwrap()
    }

    fn cat_at(cell: Cell) -> Cat {
        Cat::new(CatId(0), Team::B, cell, 0.0, &RaceConfig::default().cat)
    }

    #[test]
    fn chases_target_along_the_corridor() {
        let maze = corridor();
        let mut cat = cat_at(maze.goal());
        cat.observe(&[(MouseId(3), Cell::new(1, 0))]);
        assert_eq!(cat.target, Some(Cell::new(1, 0)));
        let mut rng = RaceRng::new(1);
        assert_eq!(
            choose_cat_step(&cat, &maze, &[], 0.0, &mut rng),
            Some(Cell::new(2, 0))
        );
    }

    #[test]
    fn picks_nearest_then_lowest_id() {
        let mut cat = cat_at(Cell::new(3, 0));
        cat.observe(&[
            (MouseId(9), Cell::new(6, 0)),
            (MouseId(4), Cell::new(0, 0)),
            (MouseId(2), Cell::new(5, 0)),
            (MouseId(1), Cell::new(1, 0)),
        ]);
        // (5,0) and (1,0) are both 2 away; MouseId(1) wins.
        assert_eq!(cat.target, Some(Cell::new(1, 0)));
    }

    #[test]
    fn keeps_last_sighting_until_reached() {
        let mut cat = cat_at(Cell::new(3, 0));
        cat.observe(&[(MouseId(1), Cell::new(5, 0))]);
        cat.observe(&[]);
        assert_eq!(cat.target, Some(Cell::new(5, 0)));
        cat.cell = Cell::new(5, 0);
        cat.observe(&[]);
        assert_eq!(cat.target, None);
    }

    #[test]
    fn respects_fences() {
        let maze = corridor();
        let mut cat = cat_at(maze.goal());
        cat.target = Some(Cell::new(0, 0));
        let fences = [Fence {
            owner: Team::A,
            rect: CellRect {
                min: Cell::new(2, 0),
                max: Cell::new(2, 0),
            },
            expires_at: 10.0,
        }];
        let mut rng = RaceRng::new(1);
        assert_eq!(choose_cat_step(&cat, &maze, &fences, 1.0, &mut rng), None);
        assert_eq!(
            choose_cat_step(&cat, &maze, &fences, 10.0, &mut rng),
            Some(Cell::new(2, 0))
        );
    }

    #[test]
    fn fatigue_fires_after_kills_and_delay() {
        let params = RaceConfig::default().cat;
        let mut cat = cat_at(Cell::new(3, 0));
        cat.record_kill(1.0, &params);
        assert_eq!(cat.fatigue_at, None);
        cat.record_kill(2.0, &params);
        let at = 2.0 + params.fatigue_delay_secs;
        assert_eq!(cat.fatigue_at, Some(at));
        assert!(!cat.update_fatigue(at - 0.01));
        assert!(cat.update_fatigue(at));
        assert!(cat.fatigued);
        assert_eq!(cat.speed_multiplier(&params), params.fatigue_speed_penalty);
        // Permanent: more kills don't restart anything.
        cat.record_kill(20.0, &params);
        assert_eq!(cat.fatigue_at, None);
    }
}
