// The AI opponent.
//
// `plan` looks at the race through the engine's public queries and returns
// the commands one AI team issues on a single think. The engine calls it
// every `rival.think_interval_secs` for each team in `rival.ai_teams` and
// applies the commands through the same path a human's go through, so the
// rival pays the same costs, waits out the same cooldowns and gets the same
// rejections.
//
// Priorities, each considered once per think and skipped when unaffordable
// or cooling down:
//   1. Truth on an own mouse that has started looping.
//   2. Freeze when the opponent leads on goals.
//   3. Cat when enough opposing mice are in explored territory.
//   4. Decoy one step ahead of the opposing mouse nearest the goal.
//   5. Deploy a random variant from the pool.
// Score is tracked locally so a think never plans more than it can pay for.
//
// See also: `engine.rs` (`run_economy`) for the call site, `config.rs` for
// `RivalParams`.
//
// **Critical constraint: determinism.** The only randomness is the variant
// draw, taken from the RNG the engine hands in.

use crate::command::{AbilityKind, Command};
use crate::distance::step_toward;
use crate::engine::Engine;
use crate::types::Team;
use maze_race_prng::RaceRng;

pub fn plan(engine: &Engine, team: Team, rng: &mut RaceRng) -> Vec<Command> {
    let config = engine.config();
    let params = &config.rival;
    let mut budget = engine.team(team).score;
    let mut commands = Vec::new();

    let mut try_ability = |commands: &mut Vec<Command>, kind, target| {
        let cost = config.ability(kind).cost;
        if engine.cooldown_remaining(team, kind) <= 0.0 && budget >= cost {
            budget -= cost;
            commands.push(Command::UseAbility { team, kind, target });
        }
    };

    if params.truth_on_looping
        && let Some(mouse) = engine.mice().find(|m| {
            m.team == team && m.looping && !m.has_truth(engine.time())
        })
    {
        try_ability(&mut commands, AbilityKind::Truth, Some(mouse.cell));
    }

    if engine.team(team.opponent()).goals > engine.team(team).goals {
        try_ability(&mut commands, AbilityKind::Freeze, None);
    }

    let visible = engine
        .mice()
        .filter(|m| m.team != team && engine.explored(team, m.cell))
        .count();
    if visible >= params.cat_min_targets && engine.cats().all(|c| c.team != team) {
        try_ability(&mut commands, AbilityKind::Cat, None);
    }

    let maze = engine.maze();
    let distances = engine.goal_distances();
    let leader = engine
        .mice()
        .filter(|m| m.team != team)
        .min_by_key(|m| (distances.get(m.cell).unwrap_or(u32::MAX), m.id));
    if let Some(ahead) = leader.and_then(|m| step_toward(maze, distances, m.cell))
        && maze.half_of(ahead) == team.opponent()
        && ahead != maze.goal()
        && !maze.starts().contains(&ahead)
    {
        try_ability(&mut commands, AbilityKind::Decoy, Some(ahead));
    }

    let room = engine.active_mice(team) < config.economy.max_active_mice;
    if room
        && engine.deploy_cooldown_remaining(team) <= 0.0
        && let Some(&variant) = rng.pick(&params.deploy_pool)
        && budget >= config.variant(variant).cost
    {
        commands.push(Command::Deploy { team, variant });
    }

    commands
}
