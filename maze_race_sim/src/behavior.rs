// The per-tick decision function for mice.
//
// `choose_next(mouse, ctx, rng)` looks at one idle mouse and the world
// around it and returns a `Decision`: move to an adjacent cell, stay put
// because fences cut off every exit (`Trapped`), or stay put because the
// variant declined to move (`Hold`). It never mutates anything but the RNG;
// the engine applies the result.
//
// Candidates are the open neighbors of the mouse's cell, in N, E, S, W order.
// Overrides run before the variant's own logic, highest priority first:
//
//   1. Fence filter. Neighbors across an active fence boundary are removed.
//      If that leaves nothing the mouse is trapped.
//   2. Truth autopilot. Strict descent of the goal-distance gradient,
//      whatever the variant.
//   3. Decoy lure (autonomous only). An opposing decoy within range pulls
//      the mouse toward it with a configured probability.
//   4. Blocked-cell retry (autonomous only). Once the retry delay has passed
//      and the remembered cell is reachable again, step into it.
//
// Then a single exhaustive `match` on `Variant` picks among the candidates.
//
// See also: `mouse.rs` for the memory read here, `hazard.rs` for fences and
// decoys, `engine.rs` which builds the `DecisionContext` and records the
// blocked-cell memory from `candidates`.
//
// **Critical constraint: determinism.** Ties break in candidate order
// (N, E, S, W) unless a variant says otherwise, and every random draw goes
// through the `RaceRng` argument in a fixed order.

use crate::config::BehaviorParams;
use crate::distance::DistanceMap;
use crate::hazard::{Decoy, Fence, fenced_off};
use crate::maze::Maze;
use crate::mouse::Mouse;
use crate::types::{Cell, Dir, Hand, Variant};
use maze_race_prng::RaceRng;
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// Result of one decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Move(Cell),
    /// Every open neighbor is behind an active fence.
    Trapped,
    Hold,
}

/// Everything a decision may read besides the mouse itself.
pub struct DecisionContext<'a> {
    pub maze: &'a Maze,
    pub goal_distances: &'a DistanceMap,
    /// Fences still standing this tick.
    pub fences: &'a [Fence],
    /// Decoys on the board, any owner.
    pub decoys: &'a [Decoy],
    /// The mouse's team's shared dead-end cells, by maze index.
    pub dead_ends: &'a BTreeSet<usize>,
    /// Direction queued for this team's manual mice.
    pub queued: Option<Dir>,
    pub now: f64,
    pub params: &'a BehaviorParams,
}

impl DecisionContext<'_> {
    fn goal_distance(&self, cell: Cell) -> u32 {
        self.goal_distances.get(cell).unwrap_or(u32::MAX)
    }

    fn goal_manhattan(&self, cell: Cell) -> u32 {
        cell.manhattan(self.maze.goal())
    }

    fn index(&self, cell: Cell) -> usize {
        self.maze.index(cell).unwrap_or(usize::MAX)
    }
}

/// Open neighbors split by whether an active fence cuts them off.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Candidates {
    pub open: SmallVec<[Cell; 4]>,
    pub fenced: SmallVec<[Cell; 4]>,
}

pub fn candidates(from: Cell, ctx: &DecisionContext) -> Candidates {
    let mut out = Candidates::default();
    for next in ctx.maze.open_neighbors(from) {
        if fenced_off(ctx.fences, from, next, ctx.now) {
            out.fenced.push(next);
        } else {
            out.open.push(next);
        }
    }
    out
}

/// Pick the next move for an idle mouse.
pub fn choose_next(mouse: &Mouse, ctx: &DecisionContext, rng: &mut RaceRng) -> Decision {
    let cands = candidates(mouse.cell, ctx);
    if cands.open.is_empty() {
        return if cands.fenced.is_empty() {
            Decision::Hold
        } else {
            Decision::Trapped
        };
    }
    let open = cands.open.as_slice();

    if mouse.has_truth(ctx.now) {
        return to_decision(descend(mouse.cell, open, ctx));
    }

    if mouse.variant.is_autonomous() {
        if let Some(cell) = decoy_lure(mouse, open, ctx, rng) {
            return Decision::Move(cell);
        }
        if let Some(blocked) = mouse.memory.blocked {
            if ctx.now >= blocked.retry_at && open.contains(&blocked.cell) {
                return Decision::Move(blocked.cell);
            }
        }
    }

    let choice = match mouse.variant {
        Variant::Manual => ctx
            .queued
            .map(|dir| mouse.cell.step(dir))
            .filter(|cell| open.contains(cell)),
        Variant::PerfectPath => descend(mouse.cell, open, ctx),
        Variant::Wanderer => wander(mouse, open, ctx, rng),
        Variant::WallHugger => hug_wall(mouse, open),
        Variant::Sniffer => sniff(mouse, open, ctx, rng),
        Variant::Tremaux => tremaux(mouse, open, ctx),
        Variant::Explorer => explore(mouse, open, ctx),
        Variant::WiseButFragile => wise(open, ctx, rng),
    };
    to_decision(choice)
}

fn to_decision(choice: Option<Cell>) -> Decision {
    choice.map_or(Decision::Hold, Decision::Move)
}

/// First candidate exactly one step closer to the goal.
fn descend(from: Cell, open: &[Cell], ctx: &DecisionContext) -> Option<Cell> {
    let here = ctx.goal_distances.get(from)?;
    open.iter()
        .copied()
        .find(|c| here > 0 && ctx.goal_distances.get(*c) == Some(here - 1))
}

/// Step toward the nearest luring decoy, if one is in range and the roll
/// succeeds.
fn decoy_lure(
    mouse: &Mouse,
    open: &[Cell],
    ctx: &DecisionContext,
    rng: &mut RaceRng,
) -> Option<Cell> {
    let decoy = ctx
        .decoys
        .iter()
        .filter(|d| d.targets(mouse.team))
        .map(|d| (d.cell.manhattan(mouse.cell), d.cell))
        .filter(|(dist, _)| *dist <= ctx.params.decoy_lure_radius)
        .min()?
        .1;
    if !rng.chance(ctx.params.decoy_lure_chance) {
        return None;
    }
    open.iter().copied().min_by_key(|c| c.manhattan(decoy))
}

fn wander(mouse: &Mouse, open: &[Cell], ctx: &DecisionContext, rng: &mut RaceRng) -> Option<Cell> {
    let unvisited: SmallVec<[Cell; 4]> = open
        .iter()
        .copied()
        .filter(|c| mouse.memory.visit_count(ctx.index(*c)) == 0)
        .collect();
    if !unvisited.is_empty() && rng.chance(ctx.params.wanderer_unvisited_bias) {
        rng.pick(&unvisited).copied()
    } else {
        rng.pick(open).copied()
    }
}

/// Left hand: left, straight, right, back. Right hand mirrors that.
fn hug_wall(mouse: &Mouse, open: &[Cell]) -> Option<Cell> {
    let h = mouse.heading;
    let order = match mouse.hand {
        Hand::Left => [h.left(), h, h.right(), h.opposite()],
        Hand::Right => [h.right(), h, h.left(), h.opposite()],
    };
    order
        .into_iter()
        .map(|d| mouse.cell.step(d))
        .find(|c| open.contains(c))
}

fn sniff(mouse: &Mouse, open: &[Cell], ctx: &DecisionContext, rng: &mut RaceRng) -> Option<Cell> {
    let p = ctx.params;
    let mut best: Option<(f64, Cell)> = None;
    for &cell in open {
        let visits = f64::from(mouse.memory.visit_count(ctx.index(cell)));
        let recent = if mouse.memory.recently_visited(cell) {
            p.sniffer_recent_penalty
        } else {
            0.0
        };
        let score = f64::from(ctx.goal_manhattan(cell))
            + visits * p.sniffer_visit_penalty
            + recent
            + rng.jitter(p.sniffer_noise);
        if best.is_none_or(|(s, _)| score < s) {
            best = Some((score, cell));
        }
    }
    best.map(|(_, cell)| cell)
}

/// Least-marked passage, with known dead ends heavily penalized. Ties go
/// toward the goal, then to candidate order.
fn tremaux(mouse: &Mouse, open: &[Cell], ctx: &DecisionContext) -> Option<Cell> {
    let score = |cell: Cell| {
        let i = ctx.index(cell);
        let marks = f64::from(mouse.memory.visit_count(i));
        let dead_end = if ctx.dead_ends.contains(&i) {
            ctx.params.tremaux_dead_end_penalty
        } else {
            0.0
        };
        (marks + dead_end, ctx.goal_manhattan(cell))
    };
    open.iter().copied().min_by(|a, b| {
        let (sa, ma) = score(*a);
        let (sb, mb) = score(*b);
        sa.total_cmp(&sb).then(ma.cmp(&mb))
    })
}

/// Unvisited first, then least recently visited; ties toward the goal.
fn explore(mouse: &Mouse, open: &[Cell], ctx: &DecisionContext) -> Option<Cell> {
    let memory = &mouse.memory;
    let unvisited = open
        .iter()
        .copied()
        .filter(|c| memory.last_visit(ctx.index(*c)).is_none())
        .min_by_key(|c| ctx.goal_manhattan(*c));
    unvisited.or_else(|| {
        open.iter()
            .copied()
            .min_by_key(|c| (memory.last_visit(ctx.index(*c)), ctx.goal_manhattan(*c)))
    })
}

/// Best by goal distance, except for the occasional wrong turn.
fn wise(open: &[Cell], ctx: &DecisionContext, rng: &mut RaceRng) -> Option<Cell> {
    let mut ranked: SmallVec<[Cell; 4]> = open.iter().copied().collect();
    ranked.sort_by_key(|c| ctx.goal_distance(*c));
    if ranked.len() > 1 && rng.chance(ctx.params.fragile_mistake_chance) {
        rng.pick(&ranked[1..]).copied()
    } else {
        ranked.first().copied()
    }
}
