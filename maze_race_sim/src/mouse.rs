// Mouse agents: motion state, memory and timed status effects.
//
// A mouse is either `Idle` on its committed cell or in `Transit` between two
// adjacent cells with a progress fraction in [0, 1). Its `cell` is always the
// committed cell, so a mouse in transit still occupies its origin for
// collision purposes. The engine drives the state machine (`engine.rs`); the
// behavior engine only reads a mouse (`behavior.rs`).
//
// Memory is per-mouse and feeds the behavior variants:
// - `visits`: repeat-visit counts and the arrival index of the last visit,
//   keyed by maze cell index.
// - `recent`: a ring buffer of the last few cells, newest last. The current
//   cell is always the newest entry.
// - `ping_pong`: consecutive arrivals back onto the cell from two moves ago.
// - `blocked`: the best candidate a fence cut off, with the time from which
//   the mouse may try it again.
//
// Team-shared dead-end knowledge lives on `TeamState`, not here.
//
// Effects carry absolute expiry times in race seconds. Expiry is applied by
// the engine in its effect phase; the readers here also check `now` so a
// mid-tick read never sees an effect past its time.
//
// See also: `behavior.rs` for how memory is used, `engine.rs` for the tick
// phases, `config.rs` for `BehaviorParams`.

use crate::config::BehaviorParams;
use crate::types::{Cell, Dir, EpidemicId, Hand, MouseId, Team, Variant};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, VecDeque};

/// Idle on the committed cell, or moving to an adjacent one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Motion {
    Idle,
    Transit { from: Cell, to: Cell, progress: f64 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub count: u32,
    /// Arrival number (`MouseMemory::arrivals`) of the latest visit.
    pub last_visit: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockedMemory {
    pub cell: Cell,
    pub retry_at: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MouseMemory {
    pub visits: BTreeMap<usize, VisitRecord>,
    pub recent: VecDeque<Cell>,
    /// Cells arrived at so far, counting the start.
    pub arrivals: u64,
    pub ping_pong: u32,
    pub blocked: Option<BlockedMemory>,
}

impl MouseMemory {
    pub fn visit_count(&self, index: usize) -> u32 {
        self.visits.get(&index).map_or(0, |v| v.count)
    }

    /// Arrival number of the last visit, `None` if never visited.
    pub fn last_visit(&self, index: usize) -> Option<u64> {
        self.visits.get(&index).map(|v| v.last_visit)
    }

    pub fn recently_visited(&self, cell: Cell) -> bool {
        self.recent.contains(&cell)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeedEffect {
    pub multiplier: f64,
    pub expires_at: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sickness {
    pub source: EpidemicId,
    /// Speed multiplier while sick.
    pub penalty: f64,
    pub expires_at: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Effects {
    pub speed: Option<SpeedEffect>,
    /// Truth autopilot end time.
    pub truth_until: Option<f64>,
    pub sickness: Option<Sickness>,
}

/// Which timed effect ran out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    Speed,
    Truth,
    Sickness,
}

/// What an arrival did to a mouse's memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArrivalOutcome {
    /// The mouse just crossed the loop-visit threshold.
    pub started_looping: bool,
    /// The ping-pong counter exceeded its threshold.
    pub went_crazy: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mouse {
    pub id: MouseId,
    pub team: Team,
    pub variant: Variant,
    /// Committed cell.
    pub cell: Cell,
    pub motion: Motion,
    pub heading: Dir,
    /// Only meaningful for `WallHugger`.
    pub hand: Hand,
    pub memory: MouseMemory,
    pub effects: Effects,
    /// Cells traversed.
    pub distance_traveled: u32,
    pub boosts_used: u8,
    /// Flagged once any cell's visit count exceeds the loop threshold.
    pub looping: bool,
    pub deployed_at: f64,
}

impl Mouse {
    pub fn new(
        id: MouseId,
        team: Team,
        variant: Variant,
        start: Cell,
        start_index: usize,
        hand: Hand,
        now: f64,
    ) -> Self {
        let mut mouse = Self {
            id,
            team,
            variant,
            cell: start,
            motion: Motion::Idle,
            heading: Dir::North,
            hand,
            memory: MouseMemory::default(),
            effects: Effects::default(),
            distance_traveled: 0,
            boosts_used: 0,
            looping: false,
            deployed_at: now,
        };
        mouse.memory.recent.push_back(start);
        mouse.memory.arrivals = 1;
        mouse.memory.visits.insert(
            start_index,
            VisitRecord {
                count: 1,
                last_visit: 1,
            },
        );
        mouse
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.motion, Motion::Idle)
    }

    /// Interpolated position in cell units, for renderers.
    pub fn position(&self) -> (f64, f64) {
        match self.motion {
            Motion::Idle => (f64::from(self.cell.x), f64::from(self.cell.y)),
            Motion::Transit { from, to, progress } => (
                f64::from(from.x) + f64::from(to.x - from.x) * progress,
                f64::from(from.y) + f64::from(to.y - from.y) * progress,
            ),
        }
    }

    pub fn is_sick(&self, now: f64) -> bool {
        self.effects.sickness.is_some_and(|s| now < s.expires_at)
    }

    pub fn has_truth(&self, now: f64) -> bool {
        self.effects.truth_until.is_some_and(|t| now < t)
    }

    /// Combined multiplier from speed effects and sickness.
    pub fn speed_multiplier(&self, now: f64) -> f64 {
        let boost = self
            .effects
            .speed
            .filter(|s| now < s.expires_at)
            .map_or(1.0, |s| s.multiplier);
        let sick = self
            .effects
            .sickness
            .filter(|s| now < s.expires_at)
            .map_or(1.0, |s| s.penalty);
        boost * sick
    }

    /// Begin moving to an adjacent cell.
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
        self.distance_traveled += 1;
        Some(to)
    }

    /// Update memory for an arrival at `self.cell` (index `index`).
    pub fn record_arrival(&mut self, index: usize, params: &BehaviorParams) -> ArrivalOutcome {
        let cell = self.cell;
        let memory = &mut self.memory;
        let two_back = memory
            .recent
            .len()
            .checked_sub(2)
            .and_then(|i| memory.recent.get(i))
            .copied();
        if two_back == Some(cell) {
            memory.ping_pong += 1;
        } else {
            memory.ping_pong = 0;
        }

        memory.recent.push_back(cell);
        while memory.recent.len() > params.recent_memory_len.max(2) {
            memory.recent.pop_front();
        }

        memory.arrivals += 1;
        let record = memory.visits.entry(index).or_default();
        record.count += 1;
        record.last_visit = memory.arrivals;
        let count = record.count;

        let started_looping = !self.looping && count > params.loop_visit_threshold;
        self.looping |= started_looping;
        ArrivalOutcome {
            started_looping,
            went_crazy: self.memory.ping_pong > params.ping_pong_threshold,
        }
    }

    /// Drop effects whose time has come. Returns which ones ended.
    pub fn expire_effects(&mut self, now: f64) -> SmallVec<[EffectKind; 3]> {
        let mut ended = SmallVec::new();
        if self.effects.speed.is_some_and(|s| now >= s.expires_at) {
            self.effects.speed = None;
            ended.push(EffectKind::Speed);
        }
        if self.effects.truth_until.is_some_and(|t| now >= t) {
            self.effects.truth_until = None;
            ended.push(EffectKind::Truth);
        }
        if self.effects.sickness.is_some_and(|s| now >= s.expires_at) {
            self.effects.sickness = None;
            ended.push(EffectKind::Sickness);
        }
        ended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RaceConfig;

    fn mouse_at(cell: Cell) -> Mouse {
        Mouse::new(MouseId(0), Team::A, Variant::Sniffer, cell, 0, Hand::Left, 0.0)
    }

    fn arrive(mouse: &mut Mouse, cell: Cell, params: &BehaviorParams) -> ArrivalOutcome {
        mouse.cell = cell;
        let index = (cell.x + cell.y * 100) as usize;
        mouse.record_arrival(index, params)
    }

    #[test]
    fn transit_commits_only_at_full_progress() {
        let mut m = mouse_at(Cell::new(1, 1));
        m.start_transit(Cell::new(2, 1));
        assert_eq!(m.heading, Dir::East);
        assert_eq!(m.commit(), None);
        if let Motion::Transit { progress, .. } = &mut m.motion {
            *progress = 0.5;
        }
        assert_eq!(m.position(), (1.5, 1.0));
        assert_eq!(m.cell, Cell::new(1, 1));
        if let Motion::Transit { progress, .. } = &mut m.motion {
            *progress = 1.3;
        }
        assert_eq!(m.commit(), Some(Cell::new(2, 1)));
        assert!(m.is_idle());
        assert_eq!(m.distance_traveled, 1);
    }

    #[test]
    fn ping_pong_counts_consecutive_bounces() {
        let mut params = RaceConfig::default().behavior;
        params.ping_pong_threshold = 3;
        let a = Cell::new(0, 0);
        let b = Cell::new(1, 0);
        let mut m = mouse_at(a);
        // b: no bounce yet. a: bounce 1. b: 2. a: 3. b: 4 > 3.
        assert!(!arrive(&mut m, b, &params).went_crazy);
        assert_eq!(m.memory.ping_pong, 0);
        for expected in 1..=3 {
            let next = if expected % 2 == 1 { a } else { b };
            assert!(!arrive(&mut m, next, &params).went_crazy);
            assert_eq!(m.memory.ping_pong, expected);
        }
        assert!(arrive(&mut m, b, &params).went_crazy);
    }

    #[test]
    fn ping_pong_resets_on_a_fresh_cell() {
        let params = RaceConfig::default().behavior;
        let mut m = mouse_at(Cell::new(0, 0));
        arrive(&mut m, Cell::new(1, 0), &params);
        arrive(&mut m, Cell::new(0, 0), &params);
        assert_eq!(m.memory.ping_pong, 1);
        arrive(&mut m, Cell::new(0, 1), &params);
        assert_eq!(m.memory.ping_pong, 0);
    }

    #[test]
    fn looping_flag_trips_once() {
        let mut params = RaceConfig::default().behavior;
        params.loop_visit_threshold = 2;
        params.ping_pong_threshold = 100;
        let a = Cell::new(0, 0);
        let b = Cell::new(1, 0);
        let mut m = mouse_at(a);
        arrive(&mut m, b, &params);
        assert!(!arrive(&mut m, a, &params).started_looping);
        arrive(&mut m, b, &params);
        // Third visit to `a` crosses the threshold of 2.
        assert!(arrive(&mut m, a, &params).started_looping);
        assert!(m.looping);
        arrive(&mut m, b, &params);
        assert!(!arrive(&mut m, a, &params).started_looping);
    }

    #[test]
    fn recent_buffer_is_bounded() {
        let mut params = RaceConfig::default().behavior;
        params.recent_memory_len = 3;
        let mut m = mouse_at(Cell::new(0, 0));
        for x in 1..10 {
            arrive(&mut m, Cell::new(x, 0), &params);
        }
        assert_eq!(
            m.memory.recent.iter().copied().collect::<Vec<_>>(),
            vec![Cell::new(7, 0), Cell::new(8, 0), Cell::new(9, 0)]
        );
        assert!(m.memory.recently_visited(Cell::new(8, 0)));
        assert!(!m.memory.recently_visited(Cell::new(2, 0)));
    }

    #[test]
    fn effects_combine_and_expire() {
        let mut m = mouse_at(Cell::new(0, 0));
        m.effects.speed = Some(SpeedEffect {
            multiplier: 2.0,
            expires_at: 5.0,
        });
        m.effects.sickness = Some(Sickness {
            source: EpidemicId(3),
            penalty: 0.5,
            expires_at: 8.0,
        });
        m.effects.truth_until = Some(2.0);
        assert_eq!(m.speed_multiplier(1.0), 1.0);
        assert!(m.has_truth(1.0));
        assert!(!m.has_truth(2.0));

        assert_eq!(m.expire_effects(2.0).as_slice(), &[EffectKind::Truth]);
        assert_eq!(m.expire_effects(6.0).as_slice(), &[EffectKind::Speed]);
        assert_eq!(m.speed_multiplier(6.0), 0.5);
        assert!(m.is_sick(7.9));
        assert_eq!(m.expire_effects(8.0).as_slice(), &[EffectKind::Sickness]);
        assert!(!m.is_sick(8.0));
        assert!(m.expire_effects(100.0).is_empty());
    }
}
