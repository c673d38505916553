// Breadth-first distance maps over open passages.
//
// `distance_map(maze, source)` runs a plain single-source BFS on the 4-grid,
// crossing only edges with no wall bit set. The result is a flat `Vec<u32>`
// indexed like the maze's wall masks, with `UNREACHABLE` as the sentinel.
// The oracle is stateless: callers own caching. The engine keeps exactly one
// cached map (distances to the goal) and rebuilds it from scratch after every
// wall break, never patching it incrementally.
//
// Each map records the maze `revision` it was built from so a reader can
// assert it isn't stale (`is_current_for`).
//
// `step_toward` walks the gradient over open walls only. The generator's
// turn-count walk and the rival's decoy placement use it. Mouse behaviors
// descend over their own fence-filtered candidates (`behavior.rs`), and cats
// compare distances to their target themselves (`cat.rs`).
//
// See also: `maze.rs` for the walls, `engine.rs` for the cached goal map.
//
// **Critical constraint: determinism.** BFS expands neighbors in N, E, S, W
// order and `step_toward` breaks ties the same way.

use crate::maze::Maze;
use crate::types::{Cell, Dir};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Sentinel for cells the source cannot reach.
pub const UNREACHABLE: u32 = u32::MAX;

/// BFS distances from one source to every cell. The default value is an
/// empty map that is current for no maze.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceMap {
    width: u32,
    source: Cell,
    dist: Vec<u32>,
    revision: u64,
}

impl DistanceMap {
    /// Distance from the source, or `None` if unreachable or out of bounds.
    pub fn get(&self, cell: Cell) -> Option<u32> {
        if cell.x < 0 || cell.y < 0 || cell.x as u32 >= self.width {
            return None;
        }
        let i = cell.x as usize + cell.y as usize * self.width as usize;
        self.dist.get(i).copied().filter(|d| *d != UNREACHABLE)
    }

    pub fn source(&self) -> Cell {
        self.source
    }

    /// Maze revision this map was computed from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_current_for(&self, maze: &Maze) -> bool {
        self.revision == maze.revision() && self.width == maze.width()
    }

    /// Raw distances, row-major, `UNREACHABLE` for unreachable cells.
    pub fn as_slice(&self) -> &[u32] {
        &self.dist
    }
}

/// Single-source BFS over the maze's open passages.
pub fn distance_map(maze: &Maze, source: Cell) -> DistanceMap {
    let mut dist = vec![UNREACHABLE; maze.cell_count()];
    if let Some(start) = maze.index(source) {
        dist[start] = 0;
        let mut queue = VecDeque::from([source]);
        while let Some(cell) = queue.pop_front() {
            let Some(ci) = maze.index(cell) else { continue };
            let next_d = dist[ci] + 1;
            for next in maze.open_neighbors(cell) {
                let Some(ni) = maze.index(next) else { continue };
                if dist[ni] == UNREACHABLE {
                    dist[ni] = next_d;
                    queue.push_back(next);
                }
            }
        }
    }
    DistanceMap {
        width: maze.width(),
        source,
        dist,
        revision: maze.revision(),
    }
}

/// First open neighbor of `from` (N, E, S, W) whose distance is exactly one
/// less. `None` at the source or from an unreachable cell.
pub fn step_toward(maze: &Maze, map: &DistanceMap, from: Cell) -> Option<Cell> {
    let here = map.get(from)?;
    if here == 0 {
        return None;
    }
    Dir::ALL
        .into_iter()
        .filter(|d| !maze.has_wall(from, *d))
        .map(|d| from.step(d))
        .find(|n| map.get(*n) == Some(here - 1))
}

/// The full gradient path from `from` down to the map's source, inclusive
/// of both ends. Empty if `from` is unreachable.
pub fn gradient_path(maze: &Maze, map: &DistanceMap, from: Cell) -> Vec<Cell> {
    if map.get(from).is_none() {
        return Vec::new();
    }
    let mut path = vec![from];
    let mut cell = from;
    while let Some(next) = step_toward(maze, map, cell) {
        path.push(next);
        cell = next;
    }
    path
}
