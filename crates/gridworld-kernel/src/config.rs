//! Configuration types for the environment and scenarios.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::EnvironmentError;
use crate::geometry::Position;
use crate::grid::GridModel;
use crate::world::AgentId;

/// Turn coordination protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Every agent submits, then the round commits at once.
    #[default]
    Simultaneous,
    /// Agents act one at a time in registration order.
    TurnBased,
}

/// Environment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Coordination protocol for the episode
    #[serde(default)]
    pub protocol: Protocol,

    /// Pause before soliciting the next turn (milliseconds). Cosmetic pacing
    /// for turn-based episodes; ignored by the synchronous driver.
    #[serde(default = "default_turn_delay_ms")]
    pub turn_delay_ms: u64,
}

fn default_turn_delay_ms() -> u64 {
    100
}

impl EnvironmentConfig {
    pub fn simultaneous() -> Self {
        Self::default()
    }

    pub fn turn_based() -> Self {
        Self {
            protocol: Protocol::TurnBased,
            ..Self::default()
        }
    }

    pub fn with_turn_delay(mut self, delay: Duration) -> Self {
        self.turn_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn turn_delay(&self) -> Duration {
        Duration::from_millis(self.turn_delay_ms)
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Simultaneous,
            turn_delay_ms: default_turn_delay_ms(),
        }
    }
}

/// Where one agent starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub id: AgentId,
    pub start: Position,
}

/// Grid layout plus agent roster. Immutable once an episode is set up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub rows: u32,
    pub cols: u32,

    #[serde(default)]
    pub walls: Vec<Position>,

    /// Goal cells, in order
    #[serde(default)]
    pub goals: Vec<Position>,

    /// Agents in registration order
    pub agents: Vec<AgentSpec>,

    #[serde(default)]
    pub environment: EnvironmentConfig,
}

impl ScenarioConfig {
    /// Load a scenario from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse scenario")
    }

    pub fn grid(&self) -> Result<GridModel, EnvironmentError> {
        GridModel::new(
            self.rows,
            self.cols,
            self.walls.iter().copied(),
            self.goals.iter().copied(),
        )
    }

    pub fn start_of(&self, agent: &str) -> Option<Position> {
        self.agents
            .iter()
            .find(|spec| spec.id == agent)
            .map(|spec| spec.start)
    }
}
