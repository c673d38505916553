// The race engine: single owner of all mutable race state and the tick loop.
//
// `Engine` owns the maze, the cached goal-distance map, every mouse and cat,
// pickups, decoys, fences, both teams' economies, the id allocator and the
// one `RaceRng`. Nothing lives in globals. The UI drives it with commands
// (`deploy`, `destroy`, `use_ability`, `queue_direction`, or a batch through
// `step`) and advances it with `tick(dt)`; it reads state through the query
// methods and `snapshot()`.
//
// ## Tick phases
//
// `tick(dt)` clamps `dt` to `movement.max_dt_secs`, advances the race clock,
// then runs, in order:
//
//   1. Motion. Every transit (mice and cats of unfrozen teams) gains
//      `speed * multipliers * dt` progress.
//   2. Arrivals. Transits at progress >= 1 commit (overflow discarded) and
//      run arrival effects: fog reveal, goal check, memory and loop
//      detection, dead-end learning, pickup collection, decoy contact. Cats
//      arriving on a decoy they don't own die.
//   3. Decisions. Idle mice of unfrozen teams call `behavior::choose_next`
//      and start their next transit; idle cats retarget and step. Mice that
//      committed in phase 2 decide here in the same tick.
//   4. Collisions, grouped by committed cell. Both teams present: everyone
//      there dies and the walls around the cell are blown once. One team: a
//      fragile mouse with company is crushed, then sickness spreads to
//      healthy teammates. Start cells are exempt from crush and contagion.
//      Then cats eat opposing mice on their cell unless that team is frozen;
//      eating a sick mouse kills the cat instead.
//   5. Expiry of mouse effects, freezes, pickups, decoys, fences, cat
//      fatigue timers and cat lifetimes.
//   6. Economy decay, the pickup dispatcher, the rival controller and the
//      round-end check.
//
// ## Walls and distances
//
// The goal-distance map is a cache keyed by the maze revision. `break_walls`
// is the only place walls change after generation; it recomputes the map
// before returning and clears both teams' dead-end sets. Every read goes
// through `current_distances`, which asserts the revision still matches.
//
// ## Save/load
//
// `Engine` derives serde. The goal-distance map is `#[serde(skip)]` and is
// rebuilt by `rebuild_transient_state()`; `to_json`/`from_json` wrap the
// round trip.
//
// See also: `behavior.rs` for decisions, `command.rs`/`event.rs` for the
// surface, `economy.rs` for `TeamState`, `rival.rs` for the AI opponent,
// `snapshot.rs` for read-only views.
//
// **Critical constraint: determinism.** Entities live in `BTreeMap`s keyed
// by sequential ids and every phase walks them in id order. All randomness
// goes through `self.rng`. The race clock is the sum of clamped `dt`s, never
// wall time.

use crate::behavior::{self, Decision, DecisionContext};
use crate::cat::{self, Cat};
use crate::command::{AbilityKind, Command, CommandOutcome, Rejection};
use crate::config::RaceConfig;
use crate::distance::{DistanceMap, distance_map};
use crate::economy::TeamState;
use crate::error::ConfigError;
use crate::event::{CatDeath, DestroyReason, RaceEvent, RaceEventKind, RoundEndReason};
use crate::hazard::{CellRect, Decoy, Fence, Pickup, PickupKind};
use crate::maze::Maze;
use crate::maze_gen::{self, GenerationReport};
use crate::mouse::{BlockedMemory, Motion, Mouse, Sickness, SpeedEffect};
use crate::rival;
use crate::types::{
    CatId, Cell, Dir, EpidemicId, Hand, HazardId, IdAllocator, MouseId, Team, Variant,
};
use maze_race_prng::RaceRng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};

/// dt values beyond this multiple of the clamp are logged as hitches.
const HITCH_WARN_FACTOR: f64 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    Running,
    Finished {
        winner: Option<Team>,
        reason: RoundEndReason,
    },
}

/// What one `step` produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepResult {
    pub events: Vec<RaceEvent>,
    /// One per input command, in order.
    pub outcomes: Vec<CommandOutcome>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Engine {
    pub(crate) config: RaceConfig,
    pub(crate) seed: u64,
    pub(crate) rng: RaceRng,
    pub(crate) maze: Maze,
    pub(crate) generation: GenerationReport,
    /// Rebuilt after deserialization.
    #[serde(skip)]
    pub(crate) goal_distances: DistanceMap,
    pub(crate) mice: BTreeMap<MouseId, Mouse>,
    pub(crate) cats: BTreeMap<CatId, Cat>,
    pub(crate) pickups: BTreeMap<HazardId, Pickup>,
    pub(crate) decoys: BTreeMap<HazardId, Decoy>,
    pub(crate) fences: BTreeMap<HazardId, Fence>,
    pub(crate) teams: [TeamState; 2],
    pub(crate) ids: IdAllocator,
    pub(crate) tick: u64,
    pub(crate) time: f64,
    pub(crate) round: RoundState,
    pub(crate) next_pickup_at: f64,
    pub(crate) next_think_at: f64,
    /// Events not yet handed out by `tick`.
    pub(crate) pending: Vec<RaceEvent>,
}

/// Assert `map` was built from the maze's current walls.
fn current_distances<'a>(map: &'a DistanceMap, maze: &Maze) -> &'a DistanceMap {
    assert!(
        map.is_current_for(maze),
        "goal distances read at revision {} but maze is at {}",
        map.revision(),
        maze.revision()
    );
    map
}

impl Engine {
    /// A race on a generated maze with the default config.
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, RaceConfig::default())
    }

    /// A race on a generated maze.
    ///
    /// # Panics
    ///
    /// `config` must already pass `RaceConfig::validate` (`RaceConfig::from_json`
    /// and `RaceConfig::default` both do). A config missing a variant or
    /// ability entry panics on first use. Use `try_with_config` for configs
    /// built by hand.
    pub fn with_config(seed: u64, config: RaceConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "unvalidated config");
        let mut rng = RaceRng::new(seed);
        let (maze, report) = maze_gen::generate(&config.maze, &mut rng);
        Self::build(seed, config, rng, maze, report)
    }

    /// `with_config`, validating the config first.
    pub fn try_with_config(seed: u64, config: RaceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_config(seed, config))
    }

    /// A race on a hand-built maze, for scenarios and tests.
    pub fn with_maze(seed: u64, config: RaceConfig, maze: Maze) -> Self {
        let start_distance = distance_map(&maze, maze.goal())
            .get(maze.start(Team::A))
            .unwrap_or_default();
        let report = GenerationReport {
            attempts: 0,
            used_fallback: false,
            start_distance,
            loop_bridges: 0,
        };
        Self::build(seed, config, RaceRng::new(seed), maze, report)
    }

    fn build(
        seed: u64,
        config: RaceConfig,
        rng: RaceRng,
        maze: Maze,
        generation: GenerationReport,
    ) -> Self {
        debug_assert!(maze.check_wall_symmetry().is_ok());
        let mut teams = Team::ALL
            .map(|_| TeamState::new(config.economy.starting_score, maze.cell_count()));
        for team in Team::ALL {
            teams[team.index()].reveal(&maze, maze.start(team), config.behavior.fog_reveal_radius);
        }
        let goal_distances = distance_map(&maze, maze.goal());
        let mut engine = Self {
            seed,
            rng,
            goal_distances,
            generation,
            mice: BTreeMap::new(),
            cats: BTreeMap::new(),
            pickups: BTreeMap::new(),
            decoys: BTreeMap::new(),
            fences: BTreeMap::new(),
            teams,
            ids: IdAllocator::default(),
            tick: 0,
            time: 0.0,
            round: RoundState::Running,
            next_pickup_at: config.hazards.pickup_interval_secs,
            next_think_at: 0.0,
            pending: Vec::new(),
            maze,
            config,
        };
        let start_distance = engine.generation.start_distance;
        tracing::info!(
            seed,
            start_distance,
            fallback = engine.generation.used_fallback,
            "round started"
        );
        engine.emit(RaceEventKind::RoundStarted {
            seed,
            start_distance,
        });
        engine
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    pub fn generation(&self) -> &GenerationReport {
        &self.generation
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Race clock in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn round_state(&self) -> RoundState {
        self.round
    }

    pub fn is_running(&self) -> bool {
        self.round == RoundState::Running
    }

    /// Goal distances for the current walls.
    pub fn goal_distances(&self) -> &DistanceMap {
        current_distances(&self.goal_distances, &self.maze)
    }

    pub fn distance_to_goal(&self, cell: Cell) -> Option<u32> {
        self.goal_distances().get(cell)
    }

    pub fn mouse(&self, id: MouseId) -> Option<&Mouse> {
        self.mice.get(&id)
    }

    pub fn mice(&self) -> impl Iterator<Item = &Mouse> {
        self.mice.values()
    }

    pub fn cats(&self) -> impl Iterator<Item = &Cat> {
        self.cats.values()
    }

    pub fn team(&self, team: Team) -> &TeamState {
        &self.teams[team.index()]
    }

    pub fn active_mice(&self, team: Team) -> usize {
        self.mice.values().filter(|m| m.team == team).count()
    }

    pub fn cooldown_remaining(&self, team: Team, kind: AbilityKind) -> f64 {
        self.team(team).cooldown_remaining(kind, self.time)
    }

    pub fn deploy_cooldown_remaining(&self, team: Team) -> f64 {
        (self.team(team).deploy_ready_at - self.time).max(0.0)
    }

    /// Fog of war: has `team` seen `cell`?
    pub fn explored(&self, team: Team, cell: Cell) -> bool {
        self.team(team).is_explored(&self.maze, cell)
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Apply a batch of commands in order, then advance one tick.
    pub fn step(&mut self, commands: &[Command], dt: f64) -> StepResult {
        let outcomes = commands.iter().map(|c| self.apply(c)).collect();
        let events = self.tick(dt);
        StepResult { events, outcomes }
    }

    /// Apply a single command immediately.
    pub fn apply(&mut self, command: &Command) -> CommandOutcome {
        let result = match *command {
            Command::Deploy { team, variant } => {
                return match self.deploy(team, variant) {
                    Ok(id) => CommandOutcome::Deployed(id),
                    Err(r) => CommandOutcome::Rejected(r),
                };
            }
            Command::Destroy { mouse } => {
                return if self.destroy(mouse) {
                    CommandOutcome::Applied
                } else {
                    CommandOutcome::NoSuchMouse
                };
            }
            Command::UseAbility { team, kind, target } => self.use_ability(team, kind, target),
            Command::QueueDirection { team, dir } => self.queue_direction(team, dir),
        };
        match result {
            Ok(()) => CommandOutcome::Applied,
            Err(r) => CommandOutcome::Rejected(r),
        }
    }

    /// Put a new mouse on `team`'s start.
    pub fn deploy(&mut self, team: Team, variant: Variant) -> Result<MouseId, Rejection> {
        self.try_deploy(team, variant)
            .inspect_err(|r| tracing::debug!(?team, ?variant, reason = ?r, "deploy rejected"))
    }

    fn try_deploy(&mut self, team: Team, variant: Variant) -> Result<MouseId, Rejection> {
        if !self.is_running() {
            return Err(Rejection::RoundInactive);
        }
        if self.active_mice(team) >= self.config.economy.max_active_mice {
            return Err(Rejection::MaxActiveReached);
        }
        let now = self.time;
        if now < self.teams[team.index()].deploy_ready_at {
            return Err(Rejection::OnCooldown);
        }
        let cost = self.config.variant(variant).cost;
        if !self.teams[team.index()].spend(cost) {
            return Err(Rejection::InsufficientFunds);
        }
        self.teams[team.index()].deploy_ready_at = now + self.config.economy.deploy_cooldown_secs;

        let hand = if variant == Variant::WallHugger && self.rng.chance(0.5) {
            Hand::Right
        } else {
            Hand::Left
        };
        let id = MouseId(self.ids.next_raw());
        let start = self.maze.start(team);
        let start_index = self.maze.index(start).unwrap_or_default();
        self.mice
            .insert(id, Mouse::new(id, team, variant, start, start_index, hand, now));
        tracing::debug!(%id, ?team, ?variant, "mouse deployed");
        self.emit(RaceEventKind::MouseDeployed {
            mouse: id,
            team,
            variant,
        });
        Ok(id)
    }

    /// Remove a mouse. Returns whether it existed.
    pub fn destroy(&mut self, mouse: MouseId) -> bool {
        self.remove_mouse(mouse, DestroyReason::Explicit)
    }

    /// Set the direction `team`'s manual mice take on their next decision.
    pub fn queue_direction(&mut self, team: Team, dir: Dir) -> Result<(), Rejection> {
        if !self.is_running() {
            return Err(Rejection::RoundInactive);
        }
        self.teams[team.index()].queued_dir = Some(dir);
        Ok(())
    }

    /// Spend score on an ability. Checks run in a fixed order: round,
    /// target, limits, cooldown, funds.
    pub fn use_ability(
        &mut self,
        team: Team,
        kind: AbilityKind,
        target: Option<Cell>,
    ) -> Result<(), Rejection> {
        self.try_use_ability(team, kind, target).inspect_err(|r| {
            tracing::debug!(?team, ?kind, ?target, reason = ?r, "ability rejected")
        })
    }

    fn try_use_ability(
        &mut self,
        team: Team,
        kind: AbilityKind,
        target: Option<Cell>,
    ) -> Result<(), Rejection> {
        if !self.is_running() {
            return Err(Rejection::RoundInactive);
        }
        let target = match (kind.needs_target(), target) {
            (true, Some(cell)) if self.maze.in_bounds(cell) => Some(cell),
            (true, _) => return Err(Rejection::InvalidTarget),
            (false, _) => None,
        };

        // Resolve the target and check per-ability limits before touching
        // cooldowns or funds.
        let mut subject = None;
        match (kind, target) {
            (AbilityKind::Boost | AbilityKind::Truth, Some(cell)) => {
                let id = self
                    .own_mouse_at(team, cell)
                    .ok_or(Rejection::InvalidTarget)?;
                if kind == AbilityKind::Boost
                    && self.mice.get(&id).is_some_and(|m| {
                        m.boosts_used >= self.config.effects.boost_limit
                    })
                {
                    return Err(Rejection::MaxActiveReached);
                }
                subject = Some(id);
            }
            (AbilityKind::Fence, Some(cell)) => {
                if self.maze.half_of(cell) != team.opponent() {
                    return Err(Rejection::InvalidTarget);
                }
            }
            (AbilityKind::Decoy, Some(cell)) => {
                if self.maze.half_of(cell) != team.opponent()
                    || self.maze.starts().contains(&cell)
                    || cell == self.maze.goal()
                {
                    return Err(Rejection::InvalidTarget);
                }
            }
            (AbilityKind::Cat, _) => {
                if self.cats.values().any(|c| c.team == team) {
                    return Err(Rejection::MaxActiveReached);
                }
            }
            _ => {}
        }

        let now = self.time;
        if self.teams[team.index()].cooldown_remaining(kind, now) > 0.0 {
            return Err(Rejection::OnCooldown);
        }
        let data = self.config.ability(kind).clone();
        if !self.teams[team.index()].spend(data.cost) {
            return Err(Rejection::InsufficientFunds);
        }
        self.teams[team.index()].start_cooldown(kind, now + data.cooldown_secs);
        self.emit(RaceEventKind::AbilityUsed { team, kind, target });

        let until = now + data.duration_secs;
        match (kind, target) {
            (AbilityKind::Boost, _) => {
                let multiplier = self.config.effects.boost_multiplier;
                if let Some(mouse) = subject.and_then(|id| self.mice.get_mut(&id)) {
                    mouse.boosts_used += 1;
                    mouse.effects.speed = Some(SpeedEffect {
                        multiplier,
                        expires_at: until,
                    });
                }
            }
            (AbilityKind::Truth, _) => {
                if let Some(mouse) = subject.and_then(|id| self.mice.get_mut(&id)) {
                    grant_truth(mouse, until);
                }
            }
            (AbilityKind::Freeze, _) => self.freeze_team(team.opponent(), until),
            (AbilityKind::Demolish, Some(cell)) => {
                self.break_walls(cell, data.radius);
            }
            (AbilityKind::Fence, Some(cell)) => {
                let id = HazardId(self.ids.next_raw());
                let rect =
                    CellRect::around(cell, data.radius, self.maze.width(), self.maze.height());
                let fence = Fence {
                    owner: team,
                    rect,
                    expires_at: until,
                };
                self.halt_crossings(&fence, now);
                self.fences.insert(id, fence);
                self.emit(RaceEventKind::FenceRaised { fence: id, team });
            }
            (AbilityKind::Decoy, Some(cell)) => {
                let id = HazardId(self.ids.next_raw());
                let source = EpidemicId(self.ids.next_raw());
                self.decoys.insert(
                    id,
                    Decoy {
                        owner: team,
                        cell,
                        source,
                        expires_at: until,
                    },
                );
                self.emit(RaceEventKind::DecoyPlaced {
                    decoy: id,
                    team,
                    cell,
                });
            }
            (AbilityKind::Cat, _) => {
                let id = CatId(self.ids.next_raw());
                let cat = Cat::new(id, team, self.maze.goal(), now, &self.config.cat);
                self.cats.insert(id, cat);
                tracing::debug!(%id, ?team, "cat released");
                self.emit(RaceEventKind::CatSpawned { cat: id, team });
            }
            _ => {}
        }
        Ok(())
    }

    /// Spawn a pickup in team A's half and its mirror in team B's half.
    /// `None` if the round is over, the pair limit is reached or no free
    /// cell exists.
    pub fn spawn_pickup_pair(&mut self, kind: PickupKind) -> Option<(HazardId, HazardId)> {
        if !self.is_running() || self.live_pickup_pairs() >= self.config.hazards.max_pickup_pairs {
            return None;
        }
        let maze = &self.maze;
        let taken: Vec<Cell> = self.pickups.values().map(|p| p.cell).collect();
        let free: Vec<Cell> = maze
            .cells()
            .filter(|c| {
                let m = maze.mirror(*c);
                maze.half_of(*c) == Team::A
                    && maze.half_of(m) == Team::B
                    && !maze.starts().contains(c)
                    && *c != maze.goal()
                    && !taken.contains(c)
                    && !taken.contains(&m)
            })
            .collect();
        let cell = *self.rng.pick(&free)?;
        let mirrored = self.maze.mirror(cell);
        let expires_at = self.time + self.config.hazards.pickup_lifetime_secs;
        let ids = [HazardId(self.ids.next_raw()), HazardId(self.ids.next_raw())];
        for (id, (side, at)) in ids.into_iter().zip([(Team::A, cell), (Team::B, mirrored)]) {
            self.pickups.insert(
                id,
                Pickup {
                    kind,
                    cell: at,
                    side,
                    pair: ids[0],
                    expires_at,
                },
            );
            self.emit(RaceEventKind::PickupSpawned {
                pickup: id,
                kind,
                cell: at,
            });
        }
        Some((ids[0], ids[1]))
    }

    /// Pairs with at least one pickup still on the board.
    fn live_pickup_pairs(&self) -> usize {
        self.pickups
            .values()
            .map(|p| p.pair)
            .collect::<BTreeSet<_>>()
            .len()
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the race by `dt` seconds (clamped) and return every event
    /// since the last call.
    pub fn tick(&mut self, dt: f64) -> Vec<RaceEvent> {
        if !self.is_running() {
            return std::mem::take(&mut self.pending);
        }
        let max_dt = self.config.movement.max_dt_secs;
        let raw = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        if raw > max_dt * HITCH_WARN_FACTOR {
            tracing::warn!(dt = raw, max_dt, "frame hitch, clamping dt");
        }
        let dt = raw.min(max_dt);

        self.tick += 1;
        self.time += dt;
        let now = self.time;

        self.advance_motion(dt, now);
        self.commit_arrivals(now);
        self.decide(now);
        self.resolve_collisions(now);
        self.expire(now);
        self.run_economy(dt, now);

        std::mem::take(&mut self.pending)
    }

    fn frozen_teams(&self, now: f64) -> [bool; 2] {
        Team::ALL.map(|t| self.teams[t.index()].is_frozen(now))
    }

    /// Phase 1.
    fn advance_motion(&mut self, dt: f64, now: f64) {
        let frozen = self.frozen_teams(now);
        let base = self.config.movement.base_speed;
        for mouse in self.mice.values_mut() {
            if frozen[mouse.team.index()] {
                continue;
            }
            let speed = base * self.config.variant(mouse.variant).speed * mouse.speed_multiplier(now);
            if let Motion::Transit { progress, .. } = &mut mouse.motion {
                *progress += speed * dt;
            }
        }
        let cat_speed = self.config.movement.cat_speed;
        for cat in self.cats.values_mut() {
            if frozen[cat.team.index()] {
                continue;
            }
            let speed = cat_speed * cat.speed_multiplier(&self.config.cat);
            if let Motion::Transit { progress, .. } = &mut cat.motion {
                *progress += speed * dt;
            }
        }
    }

    /// Phase 2.
    fn commit_arrivals(&mut self, now: f64) {
        let arrived: Vec<MouseId> = self
            .mice
            .values_mut()
            .filter_map(|m| m.commit().map(|_| m.id))
            .collect();
        for id in arrived {
            self.on_mouse_arrival(id, now);
        }
        let cats: Vec<CatId> = self
            .cats
            .values_mut()
            .filter_map(|c| c.commit().map(|_| c.id))
            .collect();
        for id in cats {
            self.on_cat_arrival(id);
        }
    }

    fn on_mouse_arrival(&mut self, id: MouseId, now: f64) {
        let Some((team, cell)) = self.mice.get(&id).map(|m| (m.team, m.cell)) else {
            return;
        };
        let radius = self.config.behavior.fog_reveal_radius;
        self.teams[team.index()].reveal(&self.maze, cell, radius);

        if cell == self.maze.goal() {
            self.mice.remove(&id);
            let state = &mut self.teams[team.index()];
            state.goals += 1;
            state.credit(self.config.economy.goal_reward);
            let goals = state.goals;
            tracing::info!(%id, ?team, goals, "goal reached");
            self.emit(RaceEventKind::MouseReachedGoal {
                mouse: id,
                team,
                goals,
            });
            return;
        }

        let Some(index) = self.maze.index(cell) else {
            return;
        };
        let Some(mouse) = self.mice.get_mut(&id) else {
            return;
        };
        if mouse.memory.blocked.is_some_and(|b| b.cell == cell) {
            mouse.memory.blocked = None;
        }
        let outcome = mouse.record_arrival(index, &self.config.behavior);
        if outcome.started_looping {
            self.emit(RaceEventKind::MouseLooping { mouse: id });
        }
        if outcome.went_crazy {
            self.remove_mouse(id, DestroyReason::WentCrazy);
            return;
        }
        if self.maze.open_neighbors(cell).len() == 1 && cell != self.maze.start(team) {
            self.teams[team.index()].dead_ends.insert(index);
        }
        self.collect_pickup(id, cell, now);
        self.eat_decoy(id, cell, now);
    }

    fn collect_pickup(&mut self, id: MouseId, cell: Cell, now: f64) {
        let Some((&pickup, kind)) = self
            .pickups
            .iter()
            .find(|(_, p)| p.cell == cell)
            .map(|(pid, p)| (pid, p.kind))
        else {
            return;
        };
        self.pickups.remove(&pickup);
        let effects = &self.config.effects;
        let Some(mouse) = self.mice.get_mut(&id) else {
            return;
        };
        let team = mouse.team;
        match kind {
            PickupKind::Speed => {
                mouse.effects.speed = Some(SpeedEffect {
                    multiplier: effects.speed_pickup_multiplier,
                    expires_at: now + effects.speed_pickup_secs,
                });
            }
            PickupKind::Reveal => grant_truth(mouse, now + effects.reveal_pickup_secs),
            PickupKind::Freeze => {
                let until = now + effects.freeze_pickup_secs;
                self.freeze_team(team.opponent(), until);
            }
        }
        self.emit(RaceEventKind::PickupCollected {
            pickup,
            mouse: id,
            kind,
        });
    }

    fn eat_decoy(&mut self, id: MouseId, cell: Cell, now: f64) {
        let Some(team) = self.mice.get(&id).map(|m| m.team) else {
            return;
        };
        let Some((&decoy, source)) = self
            .decoys
            .iter()
            .find(|(_, d)| d.cell == cell && d.targets(team))
            .map(|(did, d)| (did, d.source))
        else {
            return;
        };
        self.decoys.remove(&decoy);
        self.emit(RaceEventKind::DecoyEaten { decoy, mouse: id });
        self.sicken(id, source, now);
    }

    /// Infect a healthy mouse. Already-sick mice keep their infection.
    fn sicken(&mut self, id: MouseId, source: EpidemicId, now: f64) {
        let effects = &self.config.effects;
        let Some(mouse) = self.mice.get_mut(&id) else {
            return;
        };
        if mouse.is_sick(now) {
            return;
        }
        mouse.effects.sickness = Some(Sickness {
            source,
            penalty: effects.sickness_speed_penalty,
            expires_at: now + effects.sickness_secs,
        });
        self.emit(RaceEventKind::MouseSickened { mouse: id, source });
    }

    fn on_cat_arrival(&mut self, id: CatId) {
        let Some((team, cell)) = self.cats.get(&id).map(|c| (c.team, c.cell)) else {
            return;
        };
        let poison = self
            .decoys
            .iter()
            .find(|(_, d)| d.cell == cell && d.owner != team)
            .map(|(did, _)| *did);
        if let Some(decoy) = poison {
            self.decoys.remove(&decoy);
            self.remove_cat(id, CatDeath::Decoy);
        }
    }

    /// Phase 3.
    fn decide(&mut self, now: f64) {
        let frozen = self.frozen_teams(now);
        let fences: Vec<Fence> = self.fences.values().cloned().collect();
        let decoys: Vec<Decoy> = self.decoys.values().cloned().collect();
        let goal_distances = current_distances(&self.goal_distances, &self.maze);

        let mut moves: Vec<(MouseId, Decision, Option<Cell>)> = Vec::new();
        // Teams whose queued direction an idle manual mouse read this pass.
        let mut consumed = [false; 2];
        for mouse in self.mice.values() {
            if !mouse.is_idle() || frozen[mouse.team.index()] {
                continue;
            }
            let team = &self.teams[mouse.team.index()];
            if mouse.variant == Variant::Manual && team.queued_dir.is_some() {
                consumed[mouse.team.index()] = true;
            }
            let ctx = DecisionContext {
                maze: &self.maze,
                goal_distances,
                fences: &fences,
                decoys: &decoys,
                dead_ends: &team.dead_ends,
                queued: team.queued_dir,
                now,
                params: &self.config.behavior,
            };
            let decision = behavior::choose_next(mouse, &ctx, &mut self.rng);
            let blocked = if mouse.variant.is_autonomous() {
                behavior::candidates(mouse.cell, &ctx)
                    .fenced
                    .into_iter()
                    .min_by_key(|c| goal_distances.get(*c).unwrap_or(u32::MAX))
            } else {
                None
            };
            moves.push((mouse.id, decision, blocked));
        }

        let retry_delay = self.config.behavior.blocked_retry_delay_secs;
        for (id, decision, blocked) in moves {
            let Some(mouse) = self.mice.get_mut(&id) else {
                continue;
            };
            if let Some(cell) = blocked {
                mouse.memory.blocked = Some(BlockedMemory {
                    cell,
                    retry_at: now + retry_delay,
                });
            }
            match decision {
                Decision::Move(to) => {
                    if mouse.memory.blocked.is_some_and(|b| b.cell == to) {
                        mouse.memory.blocked = None;
                    }
                    mouse.start_transit(to);
                }
                Decision::Trapped => {
                    let cell = mouse.cell;
                    self.emit(RaceEventKind::MouseTrapped { mouse: id, cell });
                }
                Decision::Hold => {}
            }
        }
        for team in Team::ALL {
            if consumed[team.index()] {
                self.teams[team.index()].queued_dir = None;
            }
        }

        let idle_cats: Vec<CatId> = self
            .cats
            .values()
            .filter(|c| c.is_idle() && !frozen[c.team.index()])
            .map(|c| c.id)
            .collect();
        for id in idle_cats {
            let observed = self.observed_prey(id);
            let Some(cat) = self.cats.get_mut(&id) else {
                continue;
            };
            cat.observe(&observed);
            if let Some(to) = cat::choose_cat_step(cat, &self.maze, &fences, now, &mut self.rng) {
                cat.start_transit(to);
            }
        }
    }

    /// Opposing mice a cat can see: on cells its team has explored, or within
    /// its own sight radius.
    fn observed_prey(&self, id: CatId) -> Vec<(MouseId, Cell)> {
        let Some(cat) = self.cats.get(&id) else {
            return Vec::new();
        };
        let sight = self.config.cat.sight_radius;
        let team = &self.teams[cat.team.index()];
        self.mice
            .values()
            .filter(|m| m.team != cat.team)
            .filter(|m| {
                team.is_explored(&self.maze, m.cell) || m.cell.manhattan(cat.cell) <= sight
            })
            .map(|m| (m.id, m.cell))
            .collect()
    }

    /// Phase 4.
    fn resolve_collisions(&mut self, now: f64) {
        let mut by_cell: FxHashMap<Cell, SmallVec<[MouseId; 4]>> = FxHashMap::default();
        for mouse in self.mice.values() {
            by_cell.entry(mouse.cell).or_default().push(mouse.id);
        }
        let mut crowded: Vec<(Cell, SmallVec<[MouseId; 4]>)> =
            by_cell.into_iter().filter(|(_, ids)| ids.len() > 1).collect();
        crowded.sort_by_key(|(cell, _)| *cell);

        let starts = self.maze.starts();
        for (cell, ids) in crowded {
            let teams_here: SmallVec<[Team; 4]> =
                ids.iter().filter_map(|id| self.mice.get(id).map(|m| m.team)).collect();
            let mixed = teams_here.contains(&Team::A) && teams_here.contains(&Team::B);
            if mixed {
                tracing::debug!(%cell, count = ids.len(), "cross-team collision");
                for id in &ids {
                    self.remove_mouse(*id, DestroyReason::Collision);
                }
                self.break_walls(cell, self.config.effects.collision_blast_radius);
                continue;
            }
            if starts.contains(&cell) {
                continue;
            }
            let fragile: SmallVec<[MouseId; 4]> = ids
                .iter()
                .copied()
                .filter(|id| {
                    self.mice
                        .get(id)
                        .is_some_and(|m| m.variant == Variant::WiseButFragile)
                })
                .collect();
            for id in &fragile {
                self.remove_mouse(*id, DestroyReason::Crushed);
            }
            let survivors: SmallVec<[MouseId; 4]> = ids
                .iter()
                .copied()
                .filter(|id| self.mice.contains_key(id))
                .collect();
            self.spread_sickness(&survivors, now);
        }
        self.resolve_cat_kills(now);
    }

    /// The first sick mouse (by id) infects every healthy one in `ids`.
    fn spread_sickness(&mut self, ids: &[MouseId], now: f64) {
        let source = ids.iter().find_map(|id| {
            self.mice
                .get(id)
                .filter(|m| m.is_sick(now))
                .and_then(|m| m.effects.sickness.map(|s| s.source))
        });
        let Some(source) = source else {
            return;
        };
        for id in ids {
            self.sicken(*id, source, now);
        }
    }

    fn resolve_cat_kills(&mut self, now: f64) {
        let cat_ids: Vec<CatId> = self.cats.keys().copied().collect();
        for cat_id in cat_ids {
            let Some((cell, prey_team)) = self.cats.get(&cat_id).map(|c| (c.cell, c.team.opponent()))
            else {
                continue;
            };
            if self.teams[prey_team.index()].is_frozen(now) {
                continue;
            }
            let prey: Vec<MouseId> = self
                .mice
                .values()
                .filter(|m| m.team == prey_team && m.cell == cell)
                .map(|m| m.id)
                .collect();
            for mouse in prey {
                if self.mice.get(&mouse).is_some_and(|m| m.is_sick(now)) {
                    self.remove_cat(cat_id, CatDeath::AteSickMouse);
                    break;
                }
                self.remove_mouse(mouse, DestroyReason::EatenByCat);
                if let Some(cat) = self.cats.get_mut(&cat_id) {
                    cat.record_kill(now, &self.config.cat);
                }
                self.emit(RaceEventKind::CatKill { cat: cat_id, mouse });
            }
        }
    }

    /// Phase 5.
    fn expire(&mut self, now: f64) {
        let mut ended = Vec::new();
        for mouse in self.mice.values_mut() {
            for effect in mouse.expire_effects(now) {
                ended.push(RaceEventKind::EffectExpired {
                    mouse: mouse.id,
                    effect,
                });
            }
        }
        for team in Team::ALL {
            if self.teams[team.index()].expire_freeze(now) {
                ended.push(RaceEventKind::FreezeEnded { team });
            }
        }

        let mut expired: Vec<HazardId> = Vec::new();
        expired.extend(self.pickups.iter().filter(|(_, p)| now >= p.expires_at).map(|(id, _)| *id));
        expired.extend(self.decoys.iter().filter(|(_, d)| now >= d.expires_at).map(|(id, _)| *id));
        expired.extend(self.fences.iter().filter(|(_, f)| !f.is_active(now)).map(|(id, _)| *id));
        for hazard in expired {
            self.pickups.remove(&hazard);
            self.decoys.remove(&hazard);
            self.fences.remove(&hazard);
            ended.push(RaceEventKind::HazardExpired { hazard });
        }

        let mut spent = Vec::new();
        for cat in self.cats.values_mut() {
            if cat.update_fatigue(now) {
                ended.push(RaceEventKind::CatFatigued { cat: cat.id });
            }
            if now >= cat.expires_at {
                spent.push(cat.id);
            }
        }
        for kind in ended {
            self.emit(kind);
        }
        for id in spent {
            self.remove_cat(id, CatDeath::Expired);
        }
    }

    /// Phase 6.
    fn run_economy(&mut self, dt: f64, now: f64) {
        let decay = self.config.economy.decay_per_second;
        for team in &mut self.teams {
            team.decay(dt, decay);
        }

        let interval = self.config.hazards.pickup_interval_secs;
        if interval > 0.0 && now >= self.next_pickup_at {
            self.next_pickup_at = now + interval;
            if let Some(&kind) = self.rng.pick(&PickupKind::ALL) {
                self.spawn_pickup_pair(kind);
            }
        }

        let think = self.config.rival.think_interval_secs;
        if !self.config.rival.ai_teams.is_empty() && now >= self.next_think_at {
            self.next_think_at = now + think;
            for team in self.config.rival.ai_teams.clone() {
                let mut rng = self.rng.clone();
                let plan = rival::plan(self, team, &mut rng);
                self.rng = rng;
                for command in plan {
                    let outcome = self.apply(&command);
                    tracing::debug!(?team, ?command, ?outcome, "rival command");
                }
            }
        }

        self.check_round_end(now);
    }

    fn check_round_end(&mut self, now: f64) {
        let goals = Team::ALL.map(|t| self.teams[t.index()].goals);
        let reason = if goals.iter().any(|g| *g >= self.config.economy.goals_to_win) {
            RoundEndReason::GoalsReached
        } else if now >= self.config.economy.round_duration_secs {
            RoundEndReason::TimeUp
        } else {
            return;
        };
        let winner = match goals[0].cmp(&goals[1]) {
            std::cmp::Ordering::Greater => Some(Team::A),
            std::cmp::Ordering::Less => Some(Team::B),
            std::cmp::Ordering::Equal => None,
        };
        self.end_round(winner, reason);
    }

    fn end_round(&mut self, winner: Option<Team>, reason: RoundEndReason) {
        let mice: Vec<MouseId> = self.mice.keys().copied().collect();
        for id in mice {
            self.remove_mouse(id, DestroyReason::RoundEnded);
        }
        let cats: Vec<CatId> = self.cats.keys().copied().collect();
        for id in cats {
            self.remove_cat(id, CatDeath::RoundEnded);
        }
        self.round = RoundState::Finished { winner, reason };
        tracing::info!(
            ?winner,
            ?reason,
            goals_a = self.teams[0].goals,
            goals_b = self.teams[1].goals,
            "round ended"
        );
        self.emit(RaceEventKind::RoundEnded { winner, reason });
    }

    // -----------------------------------------------------------------------
    // Shared mutations
    // -----------------------------------------------------------------------

    fn emit(&mut self, kind: RaceEventKind) {
        self.pending.push(RaceEvent {
            tick: self.tick,
            time: self.time,
            kind,
        });
    }

    fn remove_mouse(&mut self, id: MouseId, reason: DestroyReason) -> bool {
        let Some(mouse) = self.mice.remove(&id) else {
            return false;
        };
        self.emit(RaceEventKind::MouseDestroyed {
            mouse: id,
            team: mouse.team,
            reason,
        });
        true
    }

    fn remove_cat(&mut self, id: CatId, cause: CatDeath) {
        if self.cats.remove(&id).is_some() {
            tracing::debug!(%id, ?cause, "cat gone");
            self.emit(RaceEventKind::CatDied { cat: id, cause });
        }
    }

    fn freeze_team(&mut self, team: Team, until: f64) {
        self.teams[team.index()].freeze(until);
        let until = self.teams[team.index()].frozen_until.unwrap_or(until);
        self.emit(RaceEventKind::TeamFrozen { team, until });
    }

    /// Stop everything mid-way across a freshly raised fence. Movers stay on
    /// the cell they were leaving.
    fn halt_crossings(&mut self, fence: &Fence, now: f64) {
        let crossing = |motion: &Motion| {
            matches!(*motion, Motion::Transit { from, to, .. } if fence.blocks(from, to, now))
        };
        for mouse in self.mice.values_mut() {
            if crossing(&mouse.motion) {
                mouse.motion = Motion::Idle;
            }
        }
        for cat in self.cats.values_mut() {
            if crossing(&cat.motion) {
                cat.motion = Motion::Idle;
            }
        }
    }

    fn own_mouse_at(&self, team: Team, cell: Cell) -> Option<MouseId> {
        self.mice
            .values()
            .find(|m| m.team == team && m.cell == cell)
            .map(|m| m.id)
    }

    /// Knock down walls around `center` and bring every derived structure
    /// back in line before anything reads it.
    fn break_walls(&mut self, center: Cell, radius: u32) -> u32 {
        let count = self.maze.break_walls_around(center, radius);
        debug_assert!(self.maze.check_wall_symmetry().is_ok());
        self.goal_distances = distance_map(&self.maze, self.maze.goal());
        for team in &mut self.teams {
            team.dead_ends.clear();
        }
        tracing::debug!(%center, radius, count, "walls broken");
        self.emit(RaceEventKind::WallsBroken { center, count });
        count
    }

    // -----------------------------------------------------------------------
    // Save/load
    // -----------------------------------------------------------------------

    /// Recompute everything `#[serde(skip)]` drops.
    pub fn rebuild_transient_state(&mut self) {
        self.goal_distances = distance_map(&self.maze, self.maze.goal());
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut engine: Engine = serde_json::from_str(json)?;
        engine.rebuild_transient_state();
        Ok(engine)
    }
}

fn grant_truth(mouse: &mut Mouse, until: f64) {
    let until = mouse.effects.truth_until.map_or(until, |t| t.max(until));
    mouse.effects.truth_until = Some(until);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Corridors up the outer columns into row 0, a spur down the middle, and
    /// sealed two-cell rooms in between. Both starts are 9 from the goal.
    fn twin_corridors() -> Maze {
        Maze::from_ascii(
            "
            +-+-+-+-+-+-+-+
            |      G      |
            + +-+-+ +-+-+ +
            | |   | |   | |
            + +-+-+ +-+-+ +
            | |   | |   | |
            + +-+-+ +-+-+ +
            | |   | |   | |
            + +-+-+ +-+-+ +
            | |   | |   | |
            + +-+-+ +-+-+ +
            | |   | |   | |
            + +-+-+ +-+-+ +
            |A|   | |   |B|
            +-+-+-+-+-+-+-+
            ",
        )
        .unwrap()
    }

    /// No rival, no dispatcher.
    fn quiet_config() -> RaceConfig {
        let mut config = RaceConfig::default();
        config.rival.ai_teams.clear();
        config.hazards.pickup_interval_secs = 0.0;
        config
    }

    fn engine() -> Engine {
        Engine::with_maze(7, quiet_config(), twin_corridors())
    }

    /// Drop a mouse straight onto the board, bypassing the economy.
    fn place(engine: &mut Engine, team: Team, variant: Variant, cell: Cell) -> MouseId {
        let id = MouseId(engine.ids.next_raw());
        let index = engine.maze.index(cell).unwrap();
        let mouse = Mouse::new(id, team, variant, cell, index, Hand::Left, engine.time);
        engine.mice.insert(id, mouse);
        id
    }

    /// Put a mouse one hair short of arriving at `to`.
    fn send(engine: &mut Engine, id: MouseId, to: Cell) {
        let mouse = engine.mice.get_mut(&id).unwrap();
        mouse.motion = Motion::Transit {
            from: mouse.cell,
            to,
            progress: 0.99,
        };
    }

    fn count(events: &[RaceEvent], pred: impl Fn(&RaceEventKind) -> bool) -> usize {
        events.iter().filter(|e| pred(&e.kind)).count()
    }

    #[test]
    fn new_engine_is_fair_and_running() {
        let mut engine = Engine::new(42);
        let a = engine.distance_to_goal(engine.maze().start(Team::A));
        let b = engine.distance_to_goal(engine.maze().start(Team::B));
        assert!(a.is_some());
        assert_eq!(a, b);
        assert!(engine.is_running());
        let events = engine.tick(0.0);
        assert!(matches!(events[0].kind, RaceEventKind::RoundStarted { seed: 42, .. }));
        assert!(engine.explored(Team::A, engine.maze().start(Team::A)));
    }

    #[test]
    fn deploy_spends_and_starts_cooldown() {
        let mut engine = engine();
        let cost = engine.config.variant(Variant::Sniffer).cost;
        let id = engine.deploy(Team::A, Variant::Sniffer).unwrap();
        assert_eq!(engine.team(Team::A).score, 100 - cost);
        assert_eq!(engine.mouse(id).unwrap().cell, Cell::new(0, 6));
        assert_eq!(
            engine.deploy(Team::A, Variant::Sniffer),
            Err(Rejection::OnCooldown)
        );
        assert!(engine.deploy_cooldown_remaining(Team::A) > 0.0);
        // The other team has its own cooldown.
        assert!(engine.deploy(Team::B, Variant::Sniffer).is_ok());
    }

    #[test]
    fn deploy_rejection_order() {
        let mut config = quiet_config();
        config.economy.max_active_mice = 1;
        config.economy.starting_score = 5;
        let mut engine = Engine::with_maze(1, config, twin_corridors());
        // Funds are checked last.
        assert_eq!(
            engine.deploy(Team::A, Variant::PerfectPath),
            Err(Rejection::InsufficientFunds)
        );
        let id = engine.deploy(Team::A, Variant::Wanderer).unwrap();
        // Cap beats cooldown.
        assert_eq!(
            engine.deploy(Team::A, Variant::Wanderer),
            Err(Rejection::MaxActiveReached)
        );
        assert!(engine.destroy(id));
        assert!(!engine.destroy(id));
        assert_eq!(
            engine.deploy(Team::A, Variant::Wanderer),
            Err(Rejection::OnCooldown)
        );
    }

    #[test]
    fn ability_rejection_order() {
        let mut engine = engine();
        // Fence must target the opposing half.
        assert_eq!(
            engine.use_ability(Team::A, AbilityKind::Fence, Some(Cell::new(1, 3))),
            Err(Rejection::InvalidTarget)
        );
        assert_eq!(
            engine.use_ability(Team::A, AbilityKind::Fence, None),
            Err(Rejection::InvalidTarget)
        );
        assert_eq!(
            engine.use_ability(Team::A, AbilityKind::Decoy, Some(Cell::new(6, 6))),
            Err(Rejection::InvalidTarget)
        );
        // Boost needs an own mouse on the cell.
        assert_eq!(
            engine.use_ability(Team::A, AbilityKind::Boost, Some(Cell::new(0, 6))),
            Err(Rejection::InvalidTarget)
        );
        engine
            .use_ability(Team::A, AbilityKind::Fence, Some(Cell::new(6, 3)))
            .unwrap();
        assert_eq!(
            engine.use_ability(Team::A, AbilityKind::Fence, Some(Cell::new(6, 3))),
            Err(Rejection::OnCooldown)
        );
        assert!(engine.cooldown_remaining(Team::A, AbilityKind::Fence) > 0.0);
        // 100 - 20 - 45 - 35 leaves nothing for a demolition.
        engine.use_ability(Team::A, AbilityKind::Cat, None).unwrap();
        assert_eq!(
            engine.use_ability(Team::A, AbilityKind::Cat, None),
            Err(Rejection::MaxActiveReached)
        );
        engine.use_ability(Team::A, AbilityKind::Freeze, None).unwrap();
        assert_eq!(engine.team(Team::A).score, 0);
        assert_eq!(
            engine.use_ability(Team::A, AbilityKind::Demolish, Some(Cell::new(3, 3))),
            Err(Rejection::InsufficientFunds)
        );
    }

    #[test]
    fn boost_limit_is_per_mouse() {
        let mut config = quiet_config();
        config.economy.starting_score = 1000;
        config.abilities.get_mut(&AbilityKind::Boost).unwrap().cooldown_secs = 0.0;
        let mut engine = Engine::with_maze(1, config, twin_corridors());
        let id = place(&mut engine, Team::A, Variant::Manual, Cell::new(3, 3));
        for _ in 0..2 {
            engine
                .use_ability(Team::A, AbilityKind::Boost, Some(Cell::new(3, 3)))
                .unwrap();
        }
        assert_eq!(engine.mouse(id).unwrap().boosts_used, 2);
        assert!(engine.mouse(id).unwrap().speed_multiplier(engine.time()) > 1.0);
        assert_eq!(
            engine.use_ability(Team::A, AbilityKind::Boost, Some(Cell::new(3, 3))),
            Err(Rejection::MaxActiveReached)
        );
    }

    #[test]
    fn fence_traps_then_releases() {
        let mut engine = engine();
        let id = engine.deploy(Team::A, Variant::PerfectPath).unwrap();
        engine
            .use_ability(Team::B, AbilityKind::Fence, Some(Cell::new(0, 4)))
            .unwrap();
        engine.tick(0.0);
        for _ in 0..40 {
            let events = engine.tick(0.1);
            assert_eq!(
                count(&events, |k| matches!(k, RaceEventKind::MouseTrapped { .. })),
                1
            );
            let mouse = engine.mouse(id).unwrap();
            assert!(mouse.is_idle());
            assert_eq!(mouse.cell, Cell::new(0, 6));
        }
        assert_eq!(
            engine.mouse(id).unwrap().memory.blocked.map(|b| b.cell),
            Some(Cell::new(0, 5))
        );
        for _ in 0..20 {
            engine.tick(0.1);
        }
        let mouse = engine.mouse(id).unwrap();
        assert!(mouse.cell != Cell::new(0, 6) || !mouse.is_idle());
        assert!(engine.fences.is_empty());
    }

    #[test]
    fn sickness_chain_keeps_the_source() {
        let mut engine = engine();
        engine
            .use_ability(Team::B, AbilityKind::Decoy, Some(Cell::new(3, 4)))
            .unwrap();
        let source = engine.decoys.values().next().unwrap().source;

        let first = place(&mut engine, Team::A, Variant::Manual, Cell::new(3, 5));
        send(&mut engine, first, Cell::new(3, 4));
        let events = engine.tick(0.1);
        assert_eq!(
            count(&events, |k| matches!(k, RaceEventKind::DecoyEaten { .. })),
            1
        );
        assert!(engine.decoys.is_empty());
        let sick = |e: &Engine, id| e.mouse(id).unwrap().effects.sickness.map(|s| s.source);
        assert_eq!(sick(&engine, first), Some(source));

        let second = place(&mut engine, Team::A, Variant::Manual, Cell::new(3, 3));
        send(&mut engine, first, Cell::new(3, 3));
        engine.tick(0.1);
        assert_eq!(sick(&engine, second), Some(source));

        let third = place(&mut engine, Team::A, Variant::Manual, Cell::new(3, 2));
        send(&mut engine, second, Cell::new(3, 2));
        engine.tick(0.1);
        assert_eq!(sick(&engine, third), Some(source));
        assert_eq!(engine.mouse(first).unwrap().cell, Cell::new(3, 3));
    }

    #[test]
    fn cross_team_collision_destroys_both_and_blasts_once() {
        let mut engine = engine();
        let a = place(&mut engine, Team::A, Variant::Manual, Cell::new(3, 3));
        let b = place(&mut engine, Team::B, Variant::Manual, Cell::new(3, 4));
        send(&mut engine, b, Cell::new(3, 3));
        let revision = engine.maze().revision();
        let events = engine.tick(0.1);
        assert!(engine.mouse(a).is_none());
        assert!(engine.mouse(b).is_none());
        assert_eq!(
            count(&events, |k| matches!(
                k,
                RaceEventKind::MouseDestroyed {
                    reason: DestroyReason::Collision,
                    ..
                }
            )),
            2
        );
        assert_eq!(
            count(&events, |k| matches!(k, RaceEventKind::WallsBroken { .. })),
            1
        );
        assert!(engine.maze().revision() > revision);
        // The distance cache followed the walls.
        assert!(engine.goal_distances().is_current_for(engine.maze()));
        assert_eq!(engine.distance_to_goal(Cell::new(2, 3)), Some(4));
        let later = engine.tick(0.1);
        assert_eq!(
            count(&later, |k| matches!(k, RaceEventKind::WallsBroken { .. })),
            0
        );
    }

    #[test]
    fn fragile_mouse_is_crushed_by_company() {
        let mut engine = engine();
        let steady = place(&mut engine, Team::A, Variant::Manual, Cell::new(3, 3));
        let fragile = place(&mut engine, Team::A, Variant::WiseButFragile, Cell::new(3, 4));
        send(&mut engine, fragile, Cell::new(3, 3));
        let events = engine.tick(0.1);
        assert!(engine.mouse(fragile).is_none());
        assert!(engine.mouse(steady).is_some());
        assert_eq!(
            count(&events, |k| matches!(
                k,
                RaceEventKind::MouseDestroyed {
                    reason: DestroyReason::Crushed,
                    ..
                }
            )),
            1
        );
    }

    #[test]
    fn start_cell_is_exempt_from_crush() {
        let mut config = quiet_config();
        config.economy.deploy_cooldown_secs = 0.0;
        let mut engine = Engine::with_maze(1, config, twin_corridors());
        let fragile = engine.deploy(Team::A, Variant::WiseButFragile).unwrap();
        let other = engine.deploy(Team::A, Variant::Manual).unwrap();
        engine.tick(0.01);
        assert!(engine.mouse(fragile).is_some());
        assert!(engine.mouse(other).is_some());
    }

    #[test]
    fn cat_eats_healthy_prey() {
        let mut engine = engine();
        engine.use_ability(Team::B, AbilityKind::Cat, None).unwrap();
        let cat = *engine.cats.keys().next().unwrap();
        assert_eq!(engine.cats[&cat].cell, engine.maze().goal());
        let prey = place(&mut engine, Team::A, Variant::Manual, Cell::new(3, 1));
        engine.cats.get_mut(&cat).unwrap().motion = Motion::Transit {
            from: Cell::new(3, 0),
            to: Cell::new(3, 1),
            progress: 0.99,
        };
        let events = engine.tick(0.1);
        assert!(engine.mouse(prey).is_none());
        assert_eq!(engine.cats[&cat].kills, 1);
        assert_eq!(
            count(&events, |k| matches!(k, RaceEventKind::CatKill { .. })),
            1
        );
    }

    #[test]
    fn frozen_prey_is_untouchable_and_sick_prey_is_poison() {
        let mut engine = engine();
        engine.use_ability(Team::B, AbilityKind::Cat, None).unwrap();
        let cat = *engine.cats.keys().next().unwrap();
        let prey = place(&mut engine, Team::A, Variant::Manual, Cell::new(3, 0));
        engine.teams[Team::A.index()].freeze(1.0);
        engine.tick(0.1);
        assert!(engine.mouse(prey).is_some());
        assert!(engine.cats.contains_key(&cat));

        engine.teams[Team::A.index()].frozen_until = None;
        engine.mice.get_mut(&prey).unwrap().effects.sickness = Some(Sickness {
            source: EpidemicId(99),
            penalty: 0.5,
            expires_at: 50.0,
        });
        let events = engine.tick(0.1);
        assert!(engine.mouse(prey).is_some());
        assert!(!engine.cats.contains_key(&cat));
        assert!(events.iter().any(|e| matches!(
            e.kind,
            RaceEventKind::CatDied {
                cause: CatDeath::AteSickMouse,
                ..
            }
        )));
    }

    #[test]
    fn decoy_kills_a_foreign_cat() {
        let mut engine = engine();
        engine.use_ability(Team::B, AbilityKind::Cat, None).unwrap();
        engine
            .use_ability(Team::A, AbilityKind::Decoy, Some(Cell::new(4, 0)))
            .unwrap();
        let cat = *engine.cats.keys().next().unwrap();
        engine.cats.get_mut(&cat).unwrap().motion = Motion::Transit {
            from: Cell::new(3, 0),
            to: Cell::new(4, 0),
            progress: 0.99,
        };
        engine.tick(0.1);
        assert!(engine.cats.is_empty());
        assert!(engine.decoys.is_empty());
    }

    #[test]
    fn frozen_team_does_not_move() {
        let mut engine = engine();
        let id = engine.deploy(Team::A, Variant::PerfectPath).unwrap();
        engine.use_ability(Team::B, AbilityKind::Freeze, None).unwrap();
        for _ in 0..20 {
            engine.tick(0.1);
        }
        // Freeze lasts 3s; 2s in, nothing has happened.
        let mouse = engine.mouse(id).unwrap();
        assert!(mouse.is_idle());
        assert_eq!(mouse.cell, Cell::new(0, 6));
        for _ in 0..20 {
            engine.tick(0.1);
        }
        let mouse = engine.mouse(id).unwrap();
        assert!(!mouse.is_idle() || mouse.cell != Cell::new(0, 6));
    }

    #[test]
    fn goal_ends_the_round_and_closes_commands() {
        let mut config = quiet_config();
        config.economy.goals_to_win = 1;
        let mut engine = Engine::with_maze(1, config, twin_corridors());
        let runner = place(&mut engine, Team::A, Variant::Manual, Cell::new(2, 0));
        let bystander = place(&mut engine, Team::B, Variant::Manual, Cell::new(6, 3));
        send(&mut engine, runner, Cell::new(3, 0));
        let events = engine.tick(0.1);
        assert_eq!(
            engine.round_state(),
            RoundState::Finished {
                winner: Some(Team::A),
                reason: RoundEndReason::GoalsReached
            }
        );
        assert_eq!(engine.team(Team::A).goals, 1);
        assert!(engine.mouse(bystander).is_none());
        assert!(events.iter().any(|e| matches!(
            e.kind,
            RaceEventKind::MouseDestroyed {
                reason: DestroyReason::RoundEnded,
                ..
            }
        )));
        assert_eq!(
            engine.deploy(Team::B, Variant::Sniffer),
            Err(Rejection::RoundInactive)
        );
        assert_eq!(
            engine.use_ability(Team::B, AbilityKind::Freeze, None),
            Err(Rejection::RoundInactive)
        );
        let before = engine.time();
        engine.tick(0.1);
        assert_eq!(engine.time(), before);
    }

    #[test]
    fn timeout_with_equal_goals_is_a_draw() {
        let mut config = quiet_config();
        config.economy.round_duration_secs = 1.0;
        let mut engine = Engine::with_maze(1, config, twin_corridors());
        for _ in 0..12 {
            engine.tick(0.1);
        }
        assert_eq!(
            engine.round_state(),
            RoundState::Finished {
                winner: None,
                reason: RoundEndReason::TimeUp
            }
        );
    }

    #[test]
    fn dt_is_clamped() {
        let mut engine = engine();
        engine.tick(5.0);
        assert_eq!(engine.time(), engine.config().movement.max_dt_secs);
        engine.tick(f64::NAN);
        engine.tick(-1.0);
        assert_eq!(engine.time(), engine.config().movement.max_dt_secs);
        assert_eq!(engine.current_tick(), 3);
    }

    #[test]
    fn score_decays_per_whole_second() {
        let mut engine = engine();
        for _ in 0..25 {
            engine.tick(0.1);
        }
        // 2.5s elapsed, two whole seconds charged.
        assert_eq!(engine.team(Team::A).score, 98);
        assert_eq!(engine.team(Team::B).score, 98);
    }

    #[test]
    fn pickup_pairs_mirror_across_halves() {
        let mut engine = engine();
        let (a, b) = engine.spawn_pickup_pair(PickupKind::Speed).unwrap();
        let pa = &engine.pickups[&a];
        let pb = &engine.pickups[&b];
        assert_eq!(pb.cell, engine.maze().mirror(pa.cell));
        assert_eq!(engine.maze().half_of(pa.cell), Team::A);
        assert_eq!(engine.maze().half_of(pb.cell), Team::B);
        assert_eq!(pa.expires_at, pb.expires_at);
        for _ in 1..engine.config().hazards.max_pickup_pairs {
            engine.spawn_pickup_pair(PickupKind::Reveal).unwrap();
        }
        assert!(engine.spawn_pickup_pair(PickupKind::Freeze).is_none());
    }

    #[test]
    fn freeze_pickup_freezes_the_opponent() {
        let mut engine = engine();
        let (a, _) = engine.spawn_pickup_pair(PickupKind::Freeze).unwrap();
        let cell = engine.pickups[&a].cell;
        let id = place(&mut engine, Team::A, Variant::Manual, cell);
        // Arrive from a neighbor: reuse the cell itself as the origin.
        send(&mut engine, id, cell);
        engine.tick(0.1);
        assert!(engine.team(Team::B).is_frozen(engine.time()));
        assert!(!engine.pickups.contains_key(&a));
    }

    #[test]
    fn queued_direction_waits_for_a_moving_manual_mouse() {
        let mut engine = engine();
        let id = engine.deploy(Team::A, Variant::Manual).unwrap();
        engine.queue_direction(Team::A, Dir::North).unwrap();
        engine.tick(0.0);
        assert!(!engine.mouse(id).unwrap().is_idle());
        assert_eq!(engine.team(Team::A).queued_dir, None);

        engine.tick(0.1);
        engine.queue_direction(Team::A, Dir::North).unwrap();
        engine.tick(0.1);
        // Still mid-move, so nobody has read it yet.
        assert!(!engine.mouse(id).unwrap().is_idle());
        assert_eq!(engine.team(Team::A).queued_dir, Some(Dir::North));

        for _ in 0..30 {
            engine.tick(0.1);
        }
        let mouse = engine.mouse(id).unwrap();
        assert!(mouse.is_idle());
        assert_eq!(mouse.cell, Cell::new(0, 4));
        assert_eq!(engine.team(Team::A).queued_dir, None);
    }

    #[test]
    fn ping_pong_past_the_threshold_destroys_without_scoring() {
        let mut engine = engine();
        let id = place(&mut engine, Team::A, Variant::Manual, Cell::new(3, 5));
        let bounces = engine.config().behavior.ping_pong_threshold as usize + 4;
        let mut events = Vec::new();
        for i in 0..bounces {
            if engine.mouse(id).is_none() {
                break;
            }
            let to = if i % 2 == 0 { Cell::new(3, 4) } else { Cell::new(3, 5) };
            send(&mut engine, id, to);
            events.extend(engine.tick(0.1));
        }
        assert!(engine.mouse(id).is_none());
        assert_eq!(
            count(&events, |k| matches!(
                k,
                RaceEventKind::MouseDestroyed {
                    reason: DestroyReason::WentCrazy,
                    ..
                }
            )),
            1
        );
        assert_eq!(
            count(&events, |k| matches!(k, RaceEventKind::MouseReachedGoal { .. })),
            0
        );
        assert_eq!(engine.team(Team::A).goals, 0);
        assert_eq!(engine.team(Team::A).score, engine.team(Team::B).score);
    }

    #[test]
    fn dead_ends_are_learned_per_team_and_forgotten_after_a_blast() {
        let mut engine = engine();
        let id = place(&mut engine, Team::A, Variant::Manual, Cell::new(3, 5));
        send(&mut engine, id, Cell::new(3, 6));
        engine.tick(0.1);
        let index = engine.maze().index(Cell::new(3, 6)).unwrap();
        assert!(engine.team(Team::A).dead_ends.contains(&index));
        assert!(engine.team(Team::B).dead_ends.is_empty());

        // Arriving back in the corridor teaches nothing.
        send(&mut engine, id, Cell::new(3, 5));
        engine.tick(0.1);
        assert_eq!(engine.team(Team::A).dead_ends.len(), 1);

        engine.break_walls(Cell::new(3, 3), 1);
        assert!(engine.team(Team::A).dead_ends.is_empty());
    }

    #[test]
    fn cat_leaves_when_its_lifetime_runs_out() {
        let mut config = quiet_config();
        config.cat.lifetime_secs = 1.0;
        let mut engine = Engine::with_maze(1, config, twin_corridors());
        engine.use_ability(Team::B, AbilityKind::Cat, None).unwrap();
        let cat = *engine.cats.keys().next().unwrap();
        for _ in 0..5 {
            engine.tick(0.1);
        }
        assert!(engine.cats.contains_key(&cat));

        let mut events = Vec::new();
        for _ in 0..7 {
            events.extend(engine.tick(0.1));
        }
        assert!(engine.cats.is_empty());
        assert_eq!(
            count(&events, |k| matches!(
                k,
                RaceEventKind::CatDied {
                    cause: CatDeath::Expired,
                    ..
                }
            )),
            1
        );
    }

    #[test]
    fn speed_and_reveal_pickups_buff_the_collector() {
        let mut engine = engine();
        let (speed, _) = engine.spawn_pickup_pair(PickupKind::Speed).unwrap();
        let (reveal, _) = engine.spawn_pickup_pair(PickupKind::Reveal).unwrap();
        let fast_cell = engine.pickups[&speed].cell;
        let wise_cell = engine.pickups[&reveal].cell;
        let fast = place(&mut engine, Team::A, Variant::Manual, fast_cell);
        let wise = place(&mut engine, Team::A, Variant::Manual, wise_cell);
        send(&mut engine, fast, fast_cell);
        send(&mut engine, wise, wise_cell);
        engine.tick(0.1);

        let now = engine.time();
        let effects = &engine.config().effects;
        let fast = engine.mouse(fast).unwrap();
        assert_eq!(
            fast.effects.speed.map(|s| s.multiplier),
            Some(effects.speed_pickup_multiplier)
        );
        assert!(fast.speed_multiplier(now) > 1.0);
        assert!(!fast.has_truth(now));
        let wise = engine.mouse(wise).unwrap();
        assert!(wise.has_truth(now));
        assert!(wise.effects.speed.is_none());
        assert!(!engine.pickups.contains_key(&speed));
        assert!(!engine.pickups.contains_key(&reveal));
    }

    #[test]
    fn a_half_collected_pair_still_counts_toward_the_limit() {
        let mut engine = engine();
        let max = engine.config().hazards.max_pickup_pairs;
        let (first, partner) = engine.spawn_pickup_pair(PickupKind::Speed).unwrap();
        for _ in 1..max {
            engine.spawn_pickup_pair(PickupKind::Reveal).unwrap();
        }
        let cell = engine.pickups[&first].cell;
        let id = place(&mut engine, Team::A, Variant::Manual, cell);
        send(&mut engine, id, cell);
        engine.tick(0.1);
        assert!(!engine.pickups.contains_key(&first));
        assert_eq!(engine.pickups[&partner].pair, first);
        assert!(engine.spawn_pickup_pair(PickupKind::Freeze).is_none());

        engine.pickups.remove(&partner);
        assert!(engine.spawn_pickup_pair(PickupKind::Freeze).is_some());
    }

    #[test]
    fn raising_a_fence_stops_a_mouse_mid_crossing() {
        let mut engine = engine();
        let id = engine.deploy(Team::A, Variant::PerfectPath).unwrap();
        engine.tick(0.0);
        engine.tick(0.1);
        assert!(matches!(
            engine.mouse(id).unwrap().motion,
            Motion::Transit { to, .. } if to == Cell::new(0, 5)
        ));

        engine
            .use_ability(Team::B, AbilityKind::Fence, Some(Cell::new(0, 4)))
            .unwrap();
        let mouse = engine.mouse(id).unwrap();
        assert!(mouse.is_idle());
        assert_eq!(mouse.cell, Cell::new(0, 6));
        for _ in 0..10 {
            engine.tick(0.1);
            assert_eq!(engine.mouse(id).unwrap().cell, Cell::new(0, 6));
        }
    }

    #[test]
    fn try_with_config_rejects_an_incomplete_config() {
        let mut config = quiet_config();
        config.variants.remove(&Variant::Sniffer);
        assert!(matches!(
            Engine::try_with_config(3, config),
            Err(ConfigError::MissingVariant(Variant::Sniffer))
        ));
        assert!(Engine::try_with_config(3, quiet_config()).is_ok());
    }

    #[test]
    fn json_roundtrip_rebuilds_distances() {
        let mut engine = engine();
        engine.deploy(Team::A, Variant::Explorer).unwrap();
        for _ in 0..10 {
            engine.tick(0.1);
        }
        let json = engine.to_json().unwrap();
        let mut restored = Engine::from_json(&json).unwrap();
        assert_eq!(restored.goal_distances(), engine.goal_distances());
        for _ in 0..30 {
            let a = engine.tick(0.1);
            let b = restored.tick(0.1);
            assert_eq!(a, b);
        }
    }
}
