// Procedural maze generation with a hard fairness guarantee.
//
// A generated maze always gives both starts exactly the same BFS distance to
// the goal, and that distance is long and winding enough to race on.
//
// The randomized path:
//   1. Each half (cells Manhattan-closer to one start, ties to team A) gets
//      its own iterative recursive-backtracker carve from its start. The goal
//      belongs to neither half: each carve may open into it once and never
//      expands past it.
//   2. `validate` rejects the maze if the start distances differ, either is
//      shorter than `ceil(path_length_factor * manhattan)`, or the gradient
//      walk from either start makes fewer than `min_turns` direction changes.
//   3. Up to `max_attempts` tries, each carving fresh walls.
//
// If every attempt fails, `fallback_maze` carves a serpentine corridor through
// team A's strip (the columns west of the goal) and mirrors it into team B's
// strip. Mirror symmetry makes the start distances equal by construction, so
// generation always returns.
//
// Loop bridges are added last: random extra openings inside one half, each
// kept only if the maze still validates afterwards.
//
// See also: `maze.rs` for the grid and halves, `distance.rs` for the BFS
// used by validation, `config.rs` for `MazeParams`, `survey.rs` which runs
// this over many seeds.
//
// **Critical constraint: determinism.** All randomness comes from the
// `RaceRng` passed in. Neighbor candidates are gathered in N, E, S, W order
// before the RNG picks among them.

use crate::config::MazeParams;
use crate::distance::{distance_map, gradient_path};
use crate::maze::Maze;
use crate::types::{Cell, Dir, Team};
use maze_race_prng::RaceRng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// How a maze came to be.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Randomized attempts made, including the successful one.
    pub attempts: u32,
    pub used_fallback: bool,
    /// BFS distance from either start to the goal.
    pub start_distance: u32,
    /// Loop bridges that survived validation, both halves combined.
    pub loop_bridges: u32,
}

/// Build a fair maze. Never fails for a validated `MazeParams`.
pub fn generate(params: &MazeParams, rng: &mut RaceRng) -> (Maze, GenerationReport) {
    let (starts, goal) = Maze::standard_layout(params.width, params.height);

    let mut attempts = 0;
    let mut carved = None;
    while attempts < params.max_attempts {
        attempts += 1;
        let mut maze = Maze::closed(params.width, params.height, starts, goal);
        for team in Team::ALL {
            carve_half(&mut maze, team, rng);
        }
        if validate(&maze, params).is_some() {
            tracing::debug!(attempts, "randomized maze accepted");
            carved = Some(maze);
            break;
        }
    }

    let used_fallback = carved.is_none();
    let mut maze = match carved {
        Some(maze) => maze,
        None => {
            tracing::info!(
                attempts,
                width = params.width,
                height = params.height,
                "maze generation falling back to mirrored serpentine"
            );
            fallback_maze(params.width, params.height)
        }
    };

    let loop_bridges = add_loop_bridges(&mut maze, params, rng);
    debug_assert!(maze.check_wall_symmetry().is_ok());

    let start_distance = distance_map(&maze, goal)
        .get(maze.start(Team::A))
        .unwrap_or_default();
    (
        maze,
        GenerationReport {
            attempts,
            used_fallback,
            start_distance,
            loop_bridges,
        },
    )
}

/// Randomized depth-first carve of one half, starting at that team's start.
fn carve_half(maze: &mut Maze, team: Team, rng: &mut RaceRng) {
    let goal = maze.goal();
    let start = maze.start(team);
    let mut visited = vec![false; maze.cell_count()];
    let mut goal_opened = false;
    if let Some(i) = maze.index(start) {
        visited[i] = true;
    }
    let mut stack = vec![start];

    while let Some(&cell) = stack.last() {
        let mut options: SmallVec<[Dir; 4]> = SmallVec::new();
        for dir in Dir::ALL {
            let next = cell.step(dir);
            let Some(ni) = maze.index(next) else { continue };
            if next == goal {
                if !goal_opened {
                    options.push(dir);
                }
            } else if maze.half_of(next) == team && !visited[ni] {
                options.push(dir);
            }
        }
        let Some(&dir) = rng.pick(&options) else {
            stack.pop();
            continue;
        };
        let next = cell.step(dir);
        maze.carve(cell, dir);
        if next == goal {
            goal_opened = true;
        } else if let Some(ni) = maze.index(next) {
            visited[ni] = true;
            stack.push(next);
        }
    }
}

/// Shortest start distance a valid maze may have.
pub fn min_start_distance(maze: &Maze, params: &MazeParams) -> u32 {
    let manhattan = maze.start(Team::A).manhattan(maze.goal());
    (params.path_length_factor * f64::from(manhattan)).ceil() as u32
}

/// Direction changes along the gradient walk from `from` to the goal.
pub fn turn_count(maze: &Maze, from: Cell) -> u32 {
    let map = distance_map(maze, maze.goal());
    let path = gradient_path(maze, &map, from);
    let mut turns = 0;
    let mut heading = None;
    for pair in path.windows(2) {
        let dir = pair[0].dir_to(pair[1]);
        if heading.is_some() && dir != heading {
            turns += 1;
        }
        heading = dir;
    }
    turns
}

/// The shared start distance if the maze is fair, long enough and winding
/// enough; `None` otherwise.
pub fn validate(maze: &Maze, params: &MazeParams) -> Option<u32> {
    let map = distance_map(maze, maze.goal());
    let da = map.get(maze.start(Team::A))?;
    let db = map.get(maze.start(Team::B))?;
    if da != db || da < min_start_distance(maze, params) {
        return None;
    }
    let winding = Team::ALL
        .into_iter()
        .all(|t| turn_count(maze, maze.start(t)) >= params.min_turns);
    winding.then_some(da)
}

/// Deterministic mirrored serpentine. Needs an odd width of at least 7.
pub fn fallback_maze(width: u32, height: u32) -> Maze {
    let (starts, goal) = Maze::standard_layout(width, height);
    let mut maze = Maze::closed(width, height, starts, goal);
    let c = goal.x;
    let h = height as i32;

    // Boustrophedon over rows h-1 ..= 1 of the west strip, starting east-bound
    // from team A's corner.
    let mut east = true;
    let mut row_end = 0;
    for y in (1..h).rev() {
        let (from, dir) = if east { (0, Dir::East) } else { (c - 1, Dir::West) };
        let mut x = from;
        for _ in 0..c - 1 {
            maze.carve(Cell::new(x, y), dir);
            x += dir.delta().0;
        }
        row_end = x;
        maze.carve(Cell::new(row_end, y), Dir::North);
        east = !east;
    }
    // Row 0 runs the width of the strip into the goal. Whichever end the
    // serpentine climbed into, the other side is a dead-end spur.
    debug_assert!(row_end == 0 || row_end == c - 1);
    for x in 0..c {
        maze.carve(Cell::new(x, 0), Dir::East);
    }
    // The goal column below the goal is a spur off the goal.
    for y in 0..h - 1 {
        maze.carve(Cell::new(c, y), Dir::South);
    }

    // Mirror the west strip into the east strip.
    for y in 0..h {
        for x in 0..c {
            let cell = Cell::new(x, y);
            for dir in Dir::ALL {
                if !maze.has_wall(cell, dir) {
                    let mirrored = maze.mirror(cell);
                    maze.carve(mirrored, dir.mirrored());
                }
            }
        }
    }
    maze
}

/// Open extra walls inside each half, keeping each only if the maze still
/// validates. Returns how many stuck.
fn add_loop_bridges(maze: &mut Maze, params: &MazeParams, rng: &mut RaceRng) -> u32 {
    let goal = maze.goal();
    let mut added = 0;
    for team in Team::ALL {
        let candidates: Vec<(Cell, Dir)> = maze
            .cells()
            .filter(|c| *c != goal && maze.half_of(*c) == team)
            .flat_map(|c| Dir::ALL.into_iter().map(move |d| (c, d)))
            .filter(|(c, d)| {
                let n = c.step(*d);
                maze.in_bounds(n)
                    && n != goal
                    && maze.half_of(n) == team
                    && maze.has_wall(*c, *d)
            })
            .collect();
        let mut kept = 0;
        let mut tries = 0;
        let max_tries = params.loop_bridges_per_half.saturating_mul(8);
        while kept < params.loop_bridges_per_half && tries < max_tries {
            tries += 1;
            let Some(&(cell, dir)) = rng.pick(&candidates) else { break };
            if !maze.carve(cell, dir) {
                continue;
            }
            if validate(maze, params).is_some() {
                kept += 1;
            } else {
                maze.raise_wall(cell, dir);
            }
        }
        tracing::debug!(?team, kept, tries, "loop bridges");
        added += kept;
    }
    added
}
