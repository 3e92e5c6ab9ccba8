//! Reward functions: `(old position, action if the agent moved, new position) -> f64`.

use std::sync::Arc;

use crate::geometry::{Action, Position};
use crate::grid::GridModel;

/// Injected reward collaborator. The action is `None` for agents that did not
/// act this step (every non-mover in the turn-based protocol).
pub type RewardFn = Arc<dyn Fn(Position, Option<Action>, Position) -> f64 + Send + Sync>;

/// Constant zero, as used by the interaction trials.
pub fn zero() -> RewardFn {
    Arc::new(|_, _, _| 0.0)
}

/// `-cost` for every step an agent acted, `goal_reward` when it lands on a goal.
pub fn step_cost(grid: Arc<GridModel>, cost: f64, goal_reward: f64) -> RewardFn {
    Arc::new(move |_, action, new| {
        if action.is_some() && grid.is_goal(new) {
            goal_reward
        } else if action.is_some() {
            -cost
        } else {
            0.0
        }
    })
}
