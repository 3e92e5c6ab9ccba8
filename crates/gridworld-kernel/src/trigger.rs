//! End triggers: named predicates that terminate an episode.
//!
//! Triggers are evaluated in insertion order after every committed step. The
//! first one that holds names the episode result; later ones are not consulted,
//! so two conditions becoming true in the same step resolve deterministically.

use std::collections::HashSet;

use crate::error::EnvironmentError;
use crate::geometry::Position;
use crate::world::{AgentId, WorldSnapshot};

/// Read-only view of the coordinator handed to trigger predicates.
#[derive(Debug, Clone, Copy)]
pub struct EpisodeView<'a> {
    /// Positions after the step that was just committed.
    pub world: &'a WorldSnapshot,
    /// Number of committed steps (rounds or turns) so far.
    pub step: usize,
}

impl EpisodeView<'_> {
    pub fn position(&self, agent: &str) -> Option<Position> {
        self.world.position(agent)
    }
}

pub type TriggerFn = Box<dyn Fn(&EpisodeView<'_>) -> bool + Send + Sync>;

/// A named end condition.
pub struct EndTrigger {
    name: String,
    predicate: TriggerFn,
}

impl EndTrigger {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&EpisodeView<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn holds(&self, view: &EpisodeView<'_>) -> bool {
        (self.predicate)(view)
    }
}

impl std::fmt::Debug for EndTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndTrigger").field("name", &self.name).finish()
    }
}

/// Ordered set of end triggers.
#[derive(Debug, Default)]
pub struct EndTriggers {
    triggers: Vec<EndTrigger>,
}

impl EndTriggers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a trigger; it is evaluated after every trigger added before it.
    pub fn with(
        mut self,
        name: impl Into<String>,
        predicate: impl Fn(&EpisodeView<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.push(EndTrigger::new(name, predicate));
        self
    }

    pub fn push(&mut self, trigger: EndTrigger) {
        self.triggers.push(trigger);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.triggers.iter().map(EndTrigger::name)
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Names must be non-empty and unique so the result tag is unambiguous.
    pub fn validate(&self) -> Result<(), EnvironmentError> {
        let mut seen = HashSet::new();
        for name in self.names() {
            if name.is_empty() || !seen.insert(name) {
                return Err(EnvironmentError::InvalidTrigger(name.to_string()));
            }
        }
        Ok(())
    }

    /// Name of the first trigger that holds.
    pub fn first_match(&self, view: &EpisodeView<'_>) -> Option<&str> {
        self.triggers
            .iter()
            .find(|trigger| trigger.holds(view))
            .map(EndTrigger::name)
    }
}

/// `agent` stands on `cell`.
pub fn reached_cell(
    agent: impl Into<AgentId>,
    cell: Position,
) -> impl Fn(&EpisodeView<'_>) -> bool + Send + Sync + 'static {
    let agent = agent.into();
    move |view| view.position(&agent) == Some(cell)
}

/// `agent` stands on any goal cell of the grid.
pub fn reached_any_goal(
    agent: impl Into<AgentId>,
) -> impl Fn(&EpisodeView<'_>) -> bool + Send + Sync + 'static {
    let agent = agent.into();
    move |view| {
        view.position(&agent)
            .is_some_and(|p| view.world.grid.is_goal(p))
    }
}

/// Two agents share a cell.
pub fn collision(
    a: impl Into<AgentId>,
    b: impl Into<AgentId>,
) -> impl Fn(&EpisodeView<'_>) -> bool + Send + Sync + 'static {
    let (a, b) = (a.into(), b.into());
    move |view| match (view.position(&a), view.position(&b)) {
        (Some(pa), Some(pb)) => pa == pb,
        _ => false,
    }
}

/// At least `limit` steps have been committed.
pub fn step_limit(limit: usize) -> impl Fn(&EpisodeView<'_>) -> bool + Send + Sync + 'static {
    move |view| view.step >= limit
}
