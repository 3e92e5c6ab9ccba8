//! One-step greedy descent on Manhattan distance.

use anyhow::{bail, Result};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use super::{evaluate_candidates, fallback_action, Decision, DecisionContext, Policy};
use crate::geometry::{Action, Position};

/// Pick among the actions that shrink the distance to `goal` the most.
///
/// Ties are broken uniformly at random. When nothing gets closer the first
/// action of the set is returned, even if it is a no-move.
fn greedy_step(
    ctx: &DecisionContext<'_>,
    actions: &[Action],
    goal: Position,
    rng: &mut impl Rng,
) -> Action {
    let current = ctx.position.manhattan(goal);
    let scored: Vec<(Action, i32)> = evaluate_candidates(ctx, actions)
        .into_iter()
        .map(|c| (c.action, c.outcome.manhattan(goal) - current))
        .collect();

    let Some(best) = scored.iter().map(|&(_, delta)| delta).min() else {
        return fallback_action(actions);
    };
    if best >= 0 {
        return fallback_action(actions);
    }

    let ties: Vec<Action> = scored
        .iter()
        .filter(|&&(_, delta)| delta == best)
        .map(|&(action, _)| action)
        .collect();
    ties.choose(rng)
        .copied()
        .unwrap_or_else(|| fallback_action(actions))
}

/// Walks toward a fixed goal cell.
pub struct GoalSeeking {
    actions: Vec<Action>,
    goal: Position,
    rng: ChaCha8Rng,
}

impl GoalSeeking {
    pub fn new(actions: Vec<Action>, goal: Position) -> Self {
        Self {
            actions,
            goal,
            rng: ChaCha8Rng::from_rng(&mut rand::rng()),
        }
    }

    pub fn seeded(actions: Vec<Action>, goal: Position, seed: u64) -> Self {
        Self {
            actions,
            goal,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn goal(&self) -> Position {
        self.goal
    }
}

impl Policy for GoalSeeking {
    fn name(&self) -> &str {
        "goal_seeking"
    }

    fn choose_action(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        Ok(Decision::Act(greedy_step(
            ctx,
            &self.actions,
            self.goal,
            &mut self.rng,
        )))
    }
}

/// Goal seeking where the goal is the first observed position, re-read on
/// every decision.
pub struct Pursuit {
    actions: Vec<Action>,
    rng: ChaCha8Rng,
}

impl Pursuit {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            rng: ChaCha8Rng::from_rng(&mut rand::rng()),
        }
    }

    pub fn seeded(actions: Vec<Action>, seed: u64) -> Self {
        Self {
            actions,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Policy for Pursuit {
    fn name(&self) -> &str {
        "pursuit"
    }

    fn choose_action(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        let Some(target) = ctx.observation.first() else {
            bail!("agent {} has nothing to pursue in its observation", ctx.agent_id);
        };
        Ok(Decision::Act(greedy_step(
            ctx,
            &self.actions,
            target,
            &mut self.rng,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{act, Fixture};
    use super::*;
    use crate::grid::GridModel;

    fn nesw() -> Vec<Action> {
        vec![Action::NORTH, Action::EAST, Action::SOUTH, Action::WEST]
    }

    #[test]
    fn test_goal_strictly_east_always_east() {
        let grid = GridModel::open(5, 7).unwrap();
        let fixture = Fixture::new(grid, &[("a", Position::new(1, 2))], "a");

        for seed in 0..20 {
            let mut policy = GoalSeeking::seeded(nesw(), Position::new(6, 2), seed);
            assert_eq!(act(policy.choose_action(&fixture.ctx()).unwrap()), Action::EAST);
        }
    }

    #[test]
    fn test_ties_only_pick_improving_moves() {
        let grid = GridModel::open(5, 5).unwrap();
        let fixture = Fixture::new(grid, &[("a", Position::new(0, 0))], "a");
        let mut policy = GoalSeeking::seeded(nesw(), Position::new(3, 3), 1);

        for _ in 0..30 {
            let action = act(policy.choose_action(&fixture.ctx()).unwrap());
            assert!(action == Action::NORTH || action == Action::EAST, "picked {action}");
        }
    }

    #[test]
    fn test_no_improvement_falls_back_to_first_action() {
        // Wall directly east, goal behind it: nothing gets closer.
        let grid = GridModel::new(1, 3, [Position::new(1, 0)], []).unwrap();
        let fixture = Fixture::new(grid, &[("a", Position::new(0, 0))], "a");
        let mut policy = GoalSeeking::seeded(nesw(), Position::new(2, 0), 3);
        assert_eq!(act(policy.choose_action(&fixture.ctx()).unwrap()), Action::NORTH);

        let mut empty = GoalSeeking::seeded(Vec::new(), Position::new(2, 0), 3);
        assert_eq!(act(empty.choose_action(&fixture.ctx()).unwrap()), Action::STAY);
    }

    #[test]
    fn test_pursuit_follows_observation() {
        let grid = GridModel::open(5, 5).unwrap();
        let mut policy = Pursuit::seeded(nesw(), 9);

        let fixture = Fixture::new(grid.clone(), &[("robot", Position::new(2, 2))], "robot")
            .observing(vec![Position::new(2, 4)]);
        assert_eq!(act(policy.choose_action(&fixture.ctx()).unwrap()), Action::NORTH);

        let fixture = Fixture::new(grid, &[("robot", Position::new(2, 2))], "robot")
            .observing(vec![Position::new(0, 2)]);
        assert_eq!(act(policy.choose_action(&fixture.ctx()).unwrap()), Action::WEST);
    }

    #[test]
    fn test_pursuit_without_observation_is_a_fault() {
        let fixture = Fixture::new(GridModel::open(3, 3).unwrap(), &[("robot", Position::new(1, 1))], "robot");
        let mut policy = Pursuit::seeded(nesw(), 9);
        assert!(policy.choose_action(&fixture.ctx()).is_err());
    }
}
