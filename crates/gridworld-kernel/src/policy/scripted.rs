//! Policies that ignore the world: hold still, or replay a recorded schedule.

use anyhow::Result;

use super::{Decision, DecisionContext, Policy, Transition};
use crate::error::EnvironmentError;
use crate::geometry::Action;
use crate::log::{EpisodeLog, StepSnapshot};

/// Always submits the zero action.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stationary;

impl Stationary {
    /// Only two-dimensional action spaces exist on a 2D grid.
    pub fn new(dimension: usize) -> Result<Self, EnvironmentError> {
        if dimension != 2 {
            return Err(EnvironmentError::UnsupportedDimension(dimension));
        }
        Ok(Self)
    }
}

impl Policy for Stationary {
    fn name(&self) -> &str {
        "stationary"
    }

    fn choose_action(&mut self, _ctx: &DecisionContext<'_>) -> Result<Decision> {
        Ok(Decision::Act(Action::STAY))
    }
}

/// Replays positions from a move schedule.
///
/// `schedule[0]` is the starting layout. Each committed step moves the cursor
/// forward by one, and the submitted action is the displacement from the
/// current position to `schedule[cursor][agent]`. Past the end of the schedule,
/// or for an agent missing from the entry, the policy holds still.
#[derive(Debug, Clone)]
pub struct Playback {
    schedule: Vec<StepSnapshot>,
    cursor: usize,
}

impl Playback {
    pub fn new(schedule: Vec<StepSnapshot>) -> Self {
        Self {
            schedule,
            cursor: 0,
        }
    }

    /// Replay a recorded episode.
    pub fn from_log(log: &EpisodeLog) -> Self {
        Self::new(log.steps.clone())
    }

    fn scheduled_action(&self, ctx: &DecisionContext<'_>) -> Action {
        self.schedule
            .get(self.cursor)
            .and_then(|step| step.get(ctx.agent_id))
            .and_then(|&target| ctx.position.displacement_to(target))
            .unwrap_or(Action::STAY)
    }
}

impl Policy for Playback {
    fn name(&self) -> &str {
        "playback"
    }

    fn init(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        self.cursor = 1;
        self.choose_action(ctx)
    }

    fn choose_action(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        Ok(Decision::Act(self.scheduled_action(ctx)))
    }

    fn on_transitioned(
        &mut self,
        _transition: &Transition,
        ctx: &DecisionContext<'_>,
    ) -> Result<Decision> {
        self.cursor += 1;
        self.choose_action(ctx)
    }
}
