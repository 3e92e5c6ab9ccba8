//! Message types for acton-reactive actor communication.
//!
//! Queries carry a correlation id so the [`EpisodeHandle`] call waiting on the
//! answer can be matched with the reply. Move submissions travel as
//! [`Submission`](crate::submission::Submission) messages.
//!
//! [`EpisodeHandle`]: crate::actors::EpisodeHandle

use crate::environment::Phase;
use crate::geometry::Position;
use crate::world::{AgentId, WorldSnapshot};

/// Request the current position of one agent.
#[derive(Debug, Clone)]
pub struct QueryPosition {
    pub correlation_id: u64,
    pub agent: AgentId,
}

/// Reply to [`QueryPosition`]; `None` for an unknown agent.
#[derive(Debug, Clone)]
pub struct PositionReply {
    pub correlation_id: u64,
    pub position: Option<Position>,
}

/// Request a read-only snapshot of the episode.
#[derive(Debug, Clone)]
pub struct QueryStatus {
    pub correlation_id: u64,
}

/// Reply to [`QueryStatus`].
#[derive(Debug, Clone)]
pub struct StatusReply {
    pub correlation_id: u64,
    pub status: EpisodeStatus,
}

/// Commit a fully staged round. Sent by the episode actor to itself.
#[derive(Debug, Clone)]
pub struct DriveEpisode;

/// The turn delay is over: solicit the next turn.
#[derive(Debug, Clone)]
pub struct ResumeTurns;

/// Read-only view of a running episode.
#[derive(Debug, Clone)]
pub struct EpisodeStatus {
    pub world: WorldSnapshot,
    pub phase: Phase,
    /// Committed rounds or turns so far
    pub steps: usize,
    /// Agent whose turn it is, for turn-based episodes
    pub active_agent: Option<AgentId>,
}
