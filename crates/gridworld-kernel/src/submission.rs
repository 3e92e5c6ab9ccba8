//! The move submission channel shared by every kind of policy.
//!
//! Synchronous policies hand their action back from a decision call; deferred
//! policies (manual input, remote decisions) send it later through a
//! [`MoveSubmitter`]. Both end up in the environment's single acceptance path.

use tokio::sync::mpsc;
use tracing::trace;

use crate::geometry::Action;
use crate::world::AgentId;

/// A move submitted on behalf of an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub agent: AgentId,
    pub action: Action,
}

/// Sending half of the submission channel, bound to one agent.
#[derive(Debug, Clone)]
pub struct MoveSubmitter {
    agent: AgentId,
    tx: mpsc::UnboundedSender<Submission>,
}

impl MoveSubmitter {
    pub(crate) fn new(agent: impl Into<AgentId>, tx: mpsc::UnboundedSender<Submission>) -> Self {
        Self {
            agent: agent.into(),
            tx,
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Queue `action` for this agent. Returns false once the environment is gone;
    /// late submissions are not an error.
    pub fn submit(&self, action: Action) -> bool {
        let sent = self
            .tx
            .send(Submission {
                agent: self.agent.clone(),
                action,
            })
            .is_ok();
        if !sent {
            trace!(agent = %self.agent, %action, "Submission after environment shutdown discarded");
        }
        sent
    }
}

/// What happened to a submitted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Stored in the agent's slot; the round is still waiting on others.
    Staged,
    /// The move completed a round or a turn that has now been applied.
    Committed,
    /// Silently ignored.
    Dropped(DropReason),
}

/// Why a submission was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownAgent,
    /// `init` has not run yet (or is still running, for turn-based episodes).
    NotStarted,
    /// A round is being resolved.
    Applying,
    /// Another agent holds the turn.
    NotYourTurn,
    /// A turn just committed and the next one has not been solicited.
    BetweenTurns,
    Ended,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submitter_tags_agent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let submitter = MoveSubmitter::new("robot", tx);
        assert!(submitter.submit(Action::EAST));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.agent, "robot");
        assert_eq!(received.action, Action::EAST);
    }

    #[test]
    fn test_submit_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let submitter = MoveSubmitter::new("robot", tx);
        assert!(!submitter.submit(Action::STAY));
    }
}
