//! Blocking and anti-blocking: position relative to another agent's path.
//!
//! The path is approximated by the straight segment from the tracked agent's
//! current cell to its goal. A blocker moves onto that segment; an
//! anti-blocker moves as far away from it as it can.

use anyhow::{Context, Result};

use super::{evaluate_candidates, fallback_action, Decision, DecisionContext, Policy};
use crate::geometry::{Action, Position};
use crate::world::AgentId;

/// Euclidean distance from `point` to the segment `a`–`b`.
///
/// The projection parameter is clamped to `[0, 1]`; a degenerate segment
/// measures the distance to `a`.
pub fn segment_distance(point: Position, a: Position, b: Position) -> f64 {
    let (px, py) = (f64::from(point.x), f64::from(point.y));
    let (ax, ay) = (f64::from(a.x), f64::from(a.y));
    let (bx, by) = (f64::from(b.x), f64::from(b.y));

    let (dx, dy) = (bx - ax, by - ay);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return (px - ax).hypot(py - ay);
    }

    let t = (((px - ax) * dx + (py - ay) * dy) / length_sq).clamp(0.0, 1.0);
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (px - cx).hypot(py - cy)
}

/// Whether the agent seeks or avoids the tracked path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stance {
    Block,
    Avoid,
}

pub struct Blocking {
    actions: Vec<Action>,
    tracked: [AgentId; 1],
    tracked_goal: Position,
    stance: Stance,
}

impl Blocking {
    /// Move onto `tracked`'s path toward `tracked_goal`.
    pub fn new(actions: Vec<Action>, tracked: impl Into<AgentId>, tracked_goal: Position) -> Self {
        Self::with_stance(actions, tracked, tracked_goal, Stance::Block)
    }

    /// Stay as far from `tracked`'s path as possible.
    pub fn anti(actions: Vec<Action>, tracked: impl Into<AgentId>, tracked_goal: Position) -> Self {
        Self::with_stance(actions, tracked, tracked_goal, Stance::Avoid)
    }

    pub fn with_stance(
        actions: Vec<Action>,
        tracked: impl Into<AgentId>,
        tracked_goal: Position,
        stance: Stance,
    ) -> Self {
        Self {
            actions,
            tracked: [tracked.into()],
            tracked_goal,
            stance,
        }
    }

    pub fn stance(&self) -> Stance {
        self.stance
    }
}

impl Policy for Blocking {
    fn name(&self) -> &str {
        match self.stance {
            Stance::Block => "blocking",
            Stance::Avoid => "anti_blocking",
        }
    }

    fn tracked_agents(&self) -> &[AgentId] {
        &self.tracked
    }

    fn choose_action(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision> {
        let tracked = &self.tracked[0];
        let start = ctx
            .world
            .position(tracked)
            .with_context(|| format!("tracked agent {tracked} is not in the world"))?;

        let mut best: Option<(Action, f64)> = None;
        for candidate in evaluate_candidates(ctx, &self.actions) {
            let distance = segment_distance(candidate.outcome, start, self.tracked_goal);
            // Strict comparison: the lowest index wins ties.
            let better = match (best, self.stance) {
                (None, _) => true,
                (Some((_, d)), Stance::Block) => distance < d,
                (Some((_, d)), Stance::Avoid) => distance > d,
            };
            if better {
                best = Some((candidate.action, distance));
            }
        }

        Ok(Decision::Act(
            best.map(|(action, _)| action)
                .unwrap_or_else(|| fallback_action(&self.actions)),
        ))
    }
}
