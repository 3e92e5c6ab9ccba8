//! An agent: identity, authoritative position and bound policy.

use crate::geometry::Position;
use crate::policy::Policy;
use crate::world::{observe, AgentId, Observation, ObservationFn, WorldSnapshot};

/// A registered participant of an episode.
///
/// The position is only ever written by the environment.
pub struct Agent {
    pub(crate) id: AgentId,
    pub(crate) position: Position,
    pub(crate) policy: Box<dyn Policy>,
    observation: ObservationFn,
}

impl Agent {
    pub fn new(id: impl Into<AgentId>, start: Position, policy: impl Policy + 'static) -> Self {
        Self::boxed(id, start, Box::new(policy))
    }

    pub fn boxed(id: impl Into<AgentId>, start: Position, policy: Box<dyn Policy>) -> Self {
        Self {
            id: id.into(),
            position: start,
            policy,
            observation: observe::nothing(),
        }
    }

    /// Use `observation` to compute what this agent perceives.
    pub fn observing(mut self, observation: ObservationFn) -> Self {
        self.observation = observation;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub(crate) fn observe(&self, world: &WorldSnapshot) -> Observation {
        (self.observation)(&self.id, world)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("policy", &self.policy.name())
            .finish()
    }
}
