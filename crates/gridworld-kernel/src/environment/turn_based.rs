//! Turn-based protocol: agents act one at a time in registration order.

use tracing::debug;

use super::{Environment, Hook, Phase};
use crate::geometry::Action;
use crate::policy::Transition;
use crate::submission::{DropReason, SubmitOutcome};

impl Environment {
    pub(super) fn init_turn_based(&mut self) {
        // Still Idle here: decisions returned by `init` are superseded by the
        // first solicitation and get dropped.
        let world = self.world_snapshot();
        for idx in 0..self.agents.len() {
            let decision = self.consult(idx, &world, Hook::Init);
            self.apply_decision(idx, decision);
        }

        if let Some(log) = self.log.as_mut() {
            log.record(world.positions);
        }
        self.begin_turn(0);
    }

    pub(super) fn offer_turn(&mut self, idx: usize, action: Action) -> SubmitOutcome {
        if let Some(reason) = self.phase_drop() {
            return SubmitOutcome::Dropped(reason);
        }
        match self.phase {
            Phase::AwaitingTurn(active) if active == idx => {
                self.take_turn(idx, action);
                SubmitOutcome::Committed
            }
            _ => SubmitOutcome::Dropped(DropReason::NotYourTurn),
        }
    }

    /// Hand the turn to the agent at `idx` and solicit its action.
    pub(super) fn begin_turn(&mut self, idx: usize) {
        self.phase = Phase::AwaitingTurn(idx);
        debug!(agent = %self.agents[idx].id, step = self.steps, "Turn started");

        let world = self.world_snapshot();
        let decision = self.consult(idx, &world, Hook::Choose);
        self.apply_decision(idx, decision);
    }

    fn take_turn(&mut self, idx: usize, action: Action) {
        self.phase = Phase::Applying;

        let previous = self.agents[idx].position;
        let position = self.grid.resolve(previous, action);
        self.agents[idx].position = position;
        self.steps += 1;

        // The pointer moves before anyone is notified.
        let next = (idx + 1) % self.agents.len();
        self.phase = Phase::BetweenTurns(next);
        debug!(agent = %self.agents[idx].id, %action, from = %previous, to = %position, "Turn committed");

        let world = self.world_snapshot();
        for j in 0..self.agents.len() {
            let transition = if j == idx {
                Transition {
                    previous,
                    position,
                    action: Some(action),
                    reward: (self.reward)(previous, Some(action), position),
                }
            } else {
                let here = self.agents[j].position;
                Transition {
                    previous: here,
                    position: here,
                    action: None,
                    reward: (self.reward)(here, None, here),
                }
            };
            let decision = self.consult(j, &world, Hook::Transitioned(transition));
            self.apply_decision(j, decision);
        }

        self.close_step(&world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentConfig;
    use crate::geometry::Position;
    use crate::grid::GridModel;
    use crate::policy::{InputAdapter, KeyMap, ManualInput};

    fn manual() -> ManualInput {
        ManualInput::new(InputAdapter::new(KeyMap::buttons()))
    }

    fn env() -> Environment {
        let mut env =
            Environment::new(GridModel::open(4, 4).unwrap(), EnvironmentConfig::turn_based());
        env.register_agent("a", Position::new(0, 0), manual()).unwrap();
        env.register_agent("b", Position::new(3, 3), manual()).unwrap();
        env.init(Box::new(|_| {})).unwrap();
        env
    }

    #[test]
    fn test_only_active_agent_may_move() {
        let mut env = env();
        assert_eq!(env.active_agent(), Some("a"));
        assert_eq!(
            env.submit_move("b", Action::WEST),
            SubmitOutcome::Dropped(DropReason::NotYourTurn)
        );
        assert_eq!(env.submit_move("a", Action::EAST), SubmitOutcome::Committed);
        assert_eq!(env.agent_position("a"), Some(Position::new(1, 0)));
        assert_eq!(env.phase(), Phase::BetweenTurns(1));
    }

    #[test]
    fn test_submissions_between_turns_are_dropped() {
        let mut env = env();
        env.submit_move("a", Action::EAST);
        assert_eq!(
            env.submit_move("b", Action::WEST),
            SubmitOutcome::Dropped(DropReason::BetweenTurns)
        );

        assert!(env.run_pending());
        assert_eq!(env.active_agent(), Some("b"));
        assert_eq!(env.submit_move("b", Action::WEST), SubmitOutcome::Committed);
        assert_eq!(env.agent_position("b"), Some(Position::new(2, 3)));
    }

    #[test]
    fn test_turn_order_in_log_header() {
        let mut env = env();
        assert_eq!(env.agent_ids().collect::<Vec<_>>(), vec!["a", "b"]);
        let log = env.log.as_ref().unwrap();
        assert_eq!(log.turn_order, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(log.len(), 1);
        env.abandon();
    }
}
