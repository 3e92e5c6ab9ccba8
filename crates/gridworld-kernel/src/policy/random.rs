//! Uniform random walk over the moves that actually change position.

use anyhow::Result;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use super::{evaluate_candidates, fallback_action, Decision, DecisionContext, Policy};
use crate::geometry::Action;

pub struct RandomWalk {
    actions: Vec<Action>,
    rng: ChaCha8Rng,
}

impl RandomWalk {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            rng: ChaCha8Rng::from_rng(&mut rand::rng()),
        }
    }

    /// Reproducible walk for a fixed seed.
    pub fn seeded(actions: Vec<Action>, seed: u64) -> Self {
        Self {
            actions,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomWalk {
    fn name(&self) -> &str {
        "random"
    }

    fn choose_action(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        let moving: Vec<Action> = evaluate_candidates(ctx, &self.actions)
            .into_iter()
            .filter(|c| c.outcome != ctx.position)
            .map(|c| c.action)
            .collect();

        // Boxed in: actions[0] resolves to a no-move.
        let action = moving
            .choose(&mut self.rng)
            .copied()
            .unwrap_or_else(|| fallback_action(&self.actions));
        Ok(Decision::Act(action))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{act, Fixture};
    use super::*;
    use crate::geometry::Position;
    use crate::grid::GridModel;

    #[test]
    fn test_only_picks_moves_that_change_position() {
        // Corner cell: only north and east move the agent.
        let fixture = Fixture::new(GridModel::open(3, 3).unwrap(), &[("a", Position::new(0, 0))], "a");
        let mut policy = RandomWalk::seeded(Action::CARDINALS.to_vec(), 7);

        for _ in 0..50 {
            let action = act(policy.choose_action(&fixture.ctx()).unwrap());
            assert!(action == Action::NORTH || action == Action::EAST, "picked {action}");
        }
    }

    #[test]
    fn test_boxed_in_falls_back_to_first_action() {
        let fixture = Fixture::new(GridModel::open(1, 1).unwrap(), &[("a", Position::new(0, 0))], "a");
        let mut policy = RandomWalk::seeded(Action::CARDINALS.to_vec(), 7);
        assert_eq!(act(policy.choose_action(&fixture.ctx()).unwrap()), Action::WEST);
    }

    #[test]
    fn test_same_seed_same_walk() {
        let fixture = Fixture::new(GridModel::open(5, 5).unwrap(), &[("a", Position::new(2, 2))], "a");
        let mut first = RandomWalk::seeded(Action::CARDINALS.to_vec(), 42);
        let mut second = RandomWalk::seeded(Action::CARDINALS.to_vec(), 42);

        for _ in 0..20 {
            assert_eq!(
                first.choose_action(&fixture.ctx()).unwrap(),
                second.choose_action(&fixture.ctx()).unwrap()
            );
        }
    }
}
