//! Agent decision policies.
//!
//! A policy is consulted at three points of an episode:
//!
//! ```text
//! init            ─▶ first decision, before any step is committed
//! choose_action   ─▶ solicited decision (turn-based protocol)
//! on_transitioned ─▶ outcome of a committed step, next decision
//! ```
//!
//! Each call returns a [`Decision`]. `Act` is accepted or dropped by the
//! environment on the spot; `Defer` means the policy will submit later through
//! the [`MoveSubmitter`] it received in [`Policy::attach`]. Errors are policy
//! faults and count as a no-op for that cycle.

mod blocking;
mod external;
mod greedy;
mod manual;
mod random;
mod scripted;

use anyhow::Result;

use crate::geometry::{Action, Position};
use crate::grid::GridModel;
use crate::submission::MoveSubmitter;
use crate::world::{AgentId, Observation, WorldSnapshot};

pub use blocking::{segment_distance, Blocking, Stance};
pub use external::{
    DecisionClient, DecisionRequest, DecisionResponse, DecisionSource, ExternalDecision,
};
pub use greedy::{GoalSeeking, Pursuit};
pub use manual::{InputAdapter, KeyMap, ManualInput};
pub use random::RandomWalk;
pub use scripted::{Playback, Stationary};

/// The result of a decision call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Submit this action now.
    Act(Action),
    /// The action will arrive later through the policy's submitter.
    Defer,
}

/// Everything a policy may consult when deciding.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub agent_id: &'a str,
    /// The agent's authoritative position.
    pub position: Position,
    pub observation: &'a Observation,
    pub world: &'a WorldSnapshot,
}

impl DecisionContext<'_> {
    pub fn grid(&self) -> &GridModel {
        &self.world.grid
    }

    /// Where this agent would end up after `action`.
    pub fn resolve(&self, action: Action) -> Position {
        self.world.grid.resolve(self.position, action)
    }
}

/// Outcome of a committed step, delivered to every agent's policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub previous: Position,
    pub position: Position,
    /// `None` when this agent did not act in the step.
    pub action: Option<Action>,
    pub reward: f64,
}

/// Decision-making strategy bound to one agent.
pub trait Policy: Send {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Receive this agent's submission handle. Called once at registration.
    fn attach(&mut self, _submitter: MoveSubmitter) {}

    /// Agents this policy reads from the world; checked at `init`.
    fn tracked_agents(&self) -> &[AgentId] {
        &[]
    }

    /// First decision of the episode.
    fn init(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        self.choose_action(ctx)
    }

    /// Decide on an action for the current situation.
    fn choose_action(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision>;

    /// A step was committed; `ctx` reflects the post-step world.
    fn on_transitioned(
        &mut self,
        _transition: &Transition,
        ctx: &DecisionContext<'_>,
    ) -> Result<Decision> {
        self.choose_action(ctx)
    }

    /// The episode is over: release input subscriptions, cancel pending work.
    fn detach(&mut self) {}
}

/// One candidate action and where it would leave the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Index into the policy's action set.
    pub index: usize,
    pub action: Action,
    pub outcome: Position,
}

/// Resolve every action in `actions` against the grid from the agent's
/// current position. Shared by all heuristic policies.
pub fn evaluate_candidates(ctx: &DecisionContext<'_>, actions: &[Action]) -> Vec<Candidate> {
    actions
        .iter()
        .enumerate()
        .map(|(index, &action)| Candidate {
            index,
            action,
            outcome: ctx.resolve(action),
        })
        .collect()
}

/// `actions[0]`, or a no-op for an empty action set.
pub(crate) fn fallback_action(actions: &[Action]) -> Action {
    actions.first().copied().unwrap_or(Action::STAY)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Context builders shared by the policy unit tests.

    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;

    pub struct Fixture {
        pub world: WorldSnapshot,
        pub observation: Observation,
        pub agent: String,
    }

    impl Fixture {
        pub fn new(grid: GridModel, agents: &[(&str, Position)], me: &str) -> Self {
            let positions: BTreeMap<_, _> = agents
                .iter()
                .map(|(id, p)| (id.to_string(), *p))
                .collect();
            Self {
                world: WorldSnapshot {
                    grid: Arc::new(grid),
                    positions,
                },
                observation: Observation::empty(),
                agent: me.to_string(),
            }
        }

        pub fn observing(mut self, positions: Vec<Position>) -> Self {
            self.observation = Observation::new(positions);
            self
        }

        pub fn ctx(&self) -> DecisionContext<'_> {
            DecisionContext {
                agent_id: &self.agent,
                position: self.world.position(&self.agent).unwrap(),
                observation: &self.observation,
                world: &self.world,
            }
        }
    }

    pub fn act(decision: Decision) -> Action {
        match decision {
            Decision::Act(action) => action,
            Decision::Defer => panic!("expected an immediate action"),
        }
    }
}
