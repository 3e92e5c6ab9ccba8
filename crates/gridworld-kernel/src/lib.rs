//! Gridworld Kernel: turn coordination for multi-agent grid-world episodes
//!
//! Agents with pluggable decision policies move on a 2D grid of walls and
//! goals. An [`Environment`] accepts their moves under one of two protocols
//! (all-at-once rounds or round-robin turns), enforces legality, computes
//! rewards and observations, records an [`EpisodeLog`] and ends the episode
//! on the first [`EndTriggers`] entry that holds.

pub mod actors;
pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod log;
pub mod messages;
pub mod policy;
pub mod reward;
pub mod submission;
pub mod trigger;
pub mod world;

pub use actors::{EpisodeActor, EpisodeHandle};
pub use agent::Agent;
pub use config::{AgentSpec, EnvironmentConfig, Protocol, ScenarioConfig};
pub use environment::{Environment, EpisodeCallback, Phase};
pub use error::EnvironmentError;
pub use geometry::{Action, Position};
pub use grid::{GridHeader, GridModel};
pub use log::{EpisodeLog, StepSnapshot};
pub use policy::{Decision, DecisionContext, Policy, Transition};
pub use reward::RewardFn;
pub use submission::{DropReason, MoveSubmitter, SubmitOutcome, Submission};
pub use trigger::{EndTrigger, EndTriggers, EpisodeView};
pub use world::{observe, AgentId, Observation, ObservationFn, WorldSnapshot};
