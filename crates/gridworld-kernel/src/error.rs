//! Configuration errors for grids, agents and episodes.
//!
//! These are the only errors the coordinator surfaces: stray submissions are
//! dropped, policy faults become no-ops, and remote failures hold position.

use thiserror::Error;

use crate::geometry::Position;

/// A malformed grid or agent setup. Fatal: the episode never starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    #[error("grid dimensions must be positive, got {rows}x{cols}")]
    InvalidDimensions { rows: u32, cols: u32 },

    #[error("{kind} cell {position} lies outside the {rows}x{cols} grid")]
    CellOutOfBounds {
        kind: &'static str,
        position: Position,
        rows: u32,
        cols: u32,
    },

    #[error("goal cell {0} is also a wall")]
    GoalOnWall(Position),

    #[error("agent id must not be empty")]
    EmptyAgentId,

    #[error("agent `{0}` is already registered")]
    DuplicateAgent(String),

    #[error("agent `{id}` starts on illegal cell {position}")]
    IllegalStart { id: String, position: Position },

    #[error("an episode needs at least one registered agent")]
    NoAgents,

    #[error("agent `{agent}` tracks unknown agent `{tracked}`")]
    UnknownTrackedAgent { agent: String, tracked: String },

    #[error("end trigger names must be non-empty and unique, got `{0}`")]
    InvalidTrigger(String),

    #[error("the episode has already been initialized")]
    AlreadyInitialized,

    #[error("only 2-dimensional action spaces are supported, got {0}")]
    UnsupportedDimension(usize),

    #[error("the submission inbox has already been taken by a driver")]
    InboxTaken,
}
