// The maze grid: per-cell wall masks, the two starts and the goal.
//
// Walls are stored as a flat `Vec<u8>` of 4-bit masks (N=1, E=2, S=4, W=8)
// indexed by `x + y * width`. Every mutation goes through `carve` or
// `raise_wall`, which write both sides of an edge, so the two masks of
// adjacent cells always agree. The outer boundary is never opened.
//
// `revision` counts wall mutations. Anything derived from the walls (the
// engine's goal-distance map) records the revision it was built from and
// asserts it is still current before being read; see `distance.rs` and
// `Engine::goal_distances`.
//
// Halves: a cell belongs to the team whose start is Manhattan-closer, with
// ties going to team A. The generator carves each half separately and the
// hazard dispatcher keeps pickups side-scoped with `half_of`/`mirror`.
//
// `from_ascii` parses box-drawing art for hand-built test mazes.
//
// See also: `maze_gen.rs` for generation, `distance.rs` for BFS,
// `engine.rs` which owns the live maze and gates wall breaks.
//
// **Critical constraint: determinism.** Cell iteration order is row-major
// (`cells()`), and nothing here draws randomness.

use crate::types::{Cell, Dir, Team};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

const ALL_WALLS: u8 = 0b1111;

/// A rectangular maze with consistent wall masks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maze {
    width: u32,
    height: u32,
    walls: Vec<u8>,
    starts: [Cell; 2],
    goal: Cell,
    revision: u64,
}

/// An edge whose two wall bits disagree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WallAsymmetry {
    pub cell: Cell,
    pub dir: Dir,
}

impl Maze {
    /// A maze with every wall up.
    ///
    /// Panics if a start or the goal lies outside the grid.
    pub fn closed(width: u32, height: u32, starts: [Cell; 2], goal: Cell) -> Self {
        let maze = Self {
            width,
            height,
            walls: vec![ALL_WALLS; (width as usize) * (height as usize)],
            starts,
            goal,
            revision: 0,
        };
        assert!(
            starts.iter().chain([&goal]).all(|c| maze.in_bounds(*c)),
            "starts and goal must lie inside a {width}x{height} maze"
        );
        maze
    }

    /// The race layout: team A bottom-left, team B bottom-right, goal at the
    /// top of the middle column. Mirror-symmetric when `width` is odd.
    pub fn standard_layout(width: u32, height: u32) -> ([Cell; 2], Cell) {
        let w = width as i32;
        let h = height as i32;
        (
            [Cell::new(0, h - 1), Cell::new(w - 1, h - 1)],
            Cell::new(w / 2, 0),
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn start(&self, team: Team) -> Cell {
        self.starts[team.index()]
    }

    pub fn starts(&self) -> [Cell; 2] {
        self.starts
    }

    pub fn goal(&self) -> Cell {
        self.goal
    }

    /// Number of wall mutations since construction.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn cell_count(&self) -> usize {
        self.walls.len()
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    /// Flat index of `cell`, or `None` if out of bounds.
    pub fn index(&self, cell: Cell) -> Option<usize> {
        self.in_bounds(cell)
            .then(|| cell.x as usize + cell.y as usize * self.width as usize)
    }

    /// Inverse of `index`.
    pub fn cell_at(&self, index: usize) -> Cell {
        let w = self.width as usize;
        Cell::new((index % w) as i32, (index / w) as i32)
    }

    /// Every cell, row-major.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.cell_count()).map(|i| self.cell_at(i))
    }

    /// Raw wall mask. Out-of-bounds cells read as fully walled.
    pub fn walls(&self, cell: Cell) -> u8 {
        self.index(cell).map_or(ALL_WALLS, |i| self.walls[i])
    }

    /// The raw masks, row-major. For renderers.
    pub fn wall_masks(&self) -> &[u8] {
        &self.walls
    }

    pub fn has_wall(&self, cell: Cell, dir: Dir) -> bool {
        self.walls(cell) & dir.bit() != 0
    }

    /// Open neighbors in N, E, S, W order.
    pub fn open_neighbors(&self, cell: Cell) -> SmallVec<[Cell; 4]> {
        Dir::ALL
            .into_iter()
            .filter(|d| !self.has_wall(cell, *d))
            .map(|d| cell.step(d))
            .collect()
    }

    /// Remove the wall on `cell`'s `dir` side (both masks). Returns whether a
    /// wall actually came down. Boundary walls are refused.
    pub fn carve(&mut self, cell: Cell, dir: Dir) -> bool {
        self.set_edge(cell, dir, false)
    }

    /// Put the wall on `cell`'s `dir` side back up (both masks).
    pub fn raise_wall(&mut self, cell: Cell, dir: Dir) -> bool {
        self.set_edge(cell, dir, true)
    }

    fn set_edge(&mut self, cell: Cell, dir: Dir, wall: bool) -> bool {
        let next = cell.step(dir);
        let (Some(a), Some(b)) = (self.index(cell), self.index(next)) else {
            return false;
        };
        if (self.walls[a] & dir.bit() != 0) == wall {
            return false;
        }
        if wall {
            self.walls[a] |= dir.bit();
            self.walls[b] |= dir.opposite().bit();
        } else {
            self.walls[a] &= !dir.bit();
            self.walls[b] &= !dir.opposite().bit();
        }
        self.revision += 1;
        true
    }

    /// Knock down every interior wall between two cells that both lie within
    /// Chebyshev distance `radius` of `center`. Returns the number of walls
    /// removed. The outer boundary is untouched.
    pub fn break_walls_around(&mut self, center: Cell, radius: u32) -> u32 {
        let r = radius as i32;
        let mut broken = 0;
        for y in (center.y - r)..=(center.y + r) {
            for x in (center.x - r)..=(center.x + r) {
                let cell = Cell::new(x, y);
                if !self.in_bounds(cell) {
                    continue;
                }
                // East and south edges only, so each edge is visited once.
                if x < center.x + r && self.carve(cell, Dir::East) {
                    broken += 1;
                }
                if y < center.y + r && self.carve(cell, Dir::South) {
                    broken += 1;
                }
            }
        }
        broken
    }

    /// The team whose start is Manhattan-closer. Ties go to team A.
    pub fn half_of(&self, cell: Cell) -> Team {
        let da = cell.manhattan(self.start(Team::A));
        let db = cell.manhattan(self.start(Team::B));
        if db < da { Team::B } else { Team::A }
    }

    /// Reflection across the goal column.
    pub fn mirror(&self, cell: Cell) -> Cell {
        Cell::new(self.width as i32 - 1 - cell.x, cell.y)
    }

    /// First edge whose two wall bits disagree, scanning row-major.
    pub fn check_wall_symmetry(&self) -> Result<(), WallAsymmetry> {
        for cell in self.cells() {
            for dir in Dir::ALL {
                let next = cell.step(dir);
                if !self.in_bounds(next) {
                    if !self.has_wall(cell, dir) {
                        return Err(WallAsymmetry { cell, dir });
                    }
                    continue;
                }
                if self.has_wall(cell, dir) != self.has_wall(next, dir.opposite()) {
                    return Err(WallAsymmetry { cell, dir });
                }
            }
        }
        Ok(())
    }

    /// Parse box-drawing art into a maze.
    ///
    /// The art has `2*h+1` lines of `2*w+1` characters. Cell `(x, y)` sits at
    /// line `2y+1`, column `2x+1`, and holds `A`/`B` (starts), `G` (goal) or
    /// anything else. A `|` right of a cell is an east wall; a `-` below it is
    /// a south wall. Leading indentation is ignored. Returns `None` if the art
    /// is malformed or lacks a marker.
    ///
    /// ```text
    /// +-+-+-+
    /// |A G|B|
    /// +-+ + +
    /// ```
    pub fn from_ascii(art: &str) -> Option<Self> {
        let lines: Vec<Vec<char>> = art
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| l.chars().collect())
            .collect();
        if lines.len() < 3 || lines.len() % 2 == 0 {
            return None;
        }
        let cols = lines[0].len();
        if cols < 3 || cols % 2 == 0 {
            return None;
        }
        let width = ((cols - 1) / 2) as u32;
        let height = ((lines.len() - 1) / 2) as u32;
        let at = |line: usize, col: usize| lines[line].get(col).copied().unwrap_or(' ');

        let mut starts = [None, None];
        let mut goal = None;
        for y in 0..height as usize {
            for x in 0..width as usize {
                let cell = Cell::new(x as i32, y as i32);
                match at(2 * y + 1, 2 * x + 1) {
                    'A' => starts[0] = Some(cell),
                    'B' => starts[1] = Some(cell),
                    'G' => goal = Some(cell),
                    _ => {}
                }
            }
        }
        let mut maze = Self::closed(width, height, [starts[0]?, starts[1]?], goal?);
        for y in 0..height as usize {
            for x in 0..width as usize {
                let cell = Cell::new(x as i32, y as i32);
                if x + 1 < width as usize && at(2 * y + 1, 2 * x + 2) != '|' {
                    maze.carve(cell, Dir::East);
                }
                if y + 1 < height as usize && at(2 * y + 2, 2 * x + 1) != '-' {
                    maze.carve(cell, Dir::South);
                }
            }
        }
        maze.revision = 0;
        Some(maze)
    }
}
