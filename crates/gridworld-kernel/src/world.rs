//! Read-only world snapshots and per-agent observations.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::geometry::Position;
use crate::grid::GridModel;

/// Identifier of an agent, unique within an episode.
pub type AgentId = String;

/// Grid geometry plus every agent's position at one instant.
///
/// Built fresh by the environment for each decision; policies only ever see a
/// shared reference.
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    pub grid: Arc<GridModel>,
    pub positions: BTreeMap<AgentId, Position>,
}

impl WorldSnapshot {
    pub fn position(&self, agent: &str) -> Option<Position> {
        self.positions.get(agent).copied()
    }

    /// Agents standing on `cell`.
    pub fn occupants(&self, cell: Position) -> impl Iterator<Item = &str> {
        self.positions
            .iter()
            .filter(move |(_, p)| **p == cell)
            .map(|(id, _)| id.as_str())
    }
}

/// What one agent perceives: an ordered list of observed cells.
///
/// Trial observation functions typically expose a single tracked agent, so
/// `first()` is the common accessor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation {
    pub positions: Vec<Position>,
}

impl Observation {
    pub fn new(positions: Vec<Position>) -> Self {
        Self { positions }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn first(&self) -> Option<Position> {
        self.positions.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Computes an agent's observation from a world snapshot.
pub type ObservationFn = Arc<dyn Fn(&str, &WorldSnapshot) -> Observation + Send + Sync>;

/// Ready-made observation functions.
pub mod observe {
    use std::sync::Arc;

    use super::{AgentId, Observation, ObservationFn};

    /// Observe nothing.
    pub fn nothing() -> ObservationFn {
        Arc::new(|_, _| Observation::empty())
    }

    /// Observe one agent's position. Empty if the agent is unknown.
    pub fn agent(tracked: impl Into<AgentId>) -> ObservationFn {
        let tracked = tracked.into();
        Arc::new(move |_, world| Observation::new(world.position(&tracked).into_iter().collect()))
    }

    /// Observe several agents' positions, in the given order.
    pub fn agents(tracked: Vec<AgentId>) -> ObservationFn {
        Arc::new(move |_, world| {
            Observation::new(tracked.iter().filter_map(|id| world.position(id)).collect())
        })
    }

    /// Observe every other agent, ordered by id.
    pub fn others() -> ObservationFn {
        Arc::new(|me, world| {
            Observation::new(
                world
                    .positions
                    .iter()
                    .filter(|(id, _)| id.as_str() != me)
                    .map(|(_, p)| *p)
                    .collect(),
            )
        })
    }
}
