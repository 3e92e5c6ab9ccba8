//! Episode trace: header, ordered per-step snapshots, result tag.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::Position;
use crate::grid::{GridHeader, GridModel};
use crate::world::AgentId;

/// Every agent's position after one committed step.
pub type StepSnapshot = BTreeMap<AgentId, Position>;

/// The sealed record of one episode.
///
/// `steps[0]` holds the starting positions; each committed round or turn
/// appends one snapshot. Step order is significant and survives a JSON
/// round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeLog {
    pub grid: GridHeader,
    pub agent_ids: Vec<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_order: Option<Vec<AgentId>>,
    pub steps: Vec<StepSnapshot>,
    pub result: String,
}

impl EpisodeLog {
    /// Open an unsealed log; the result stays empty until `seal`.
    pub(crate) fn open(
        grid: &GridModel,
        agent_ids: Vec<AgentId>,
        turn_order: Option<Vec<AgentId>>,
    ) -> Self {
        Self {
            grid: GridHeader::from(grid),
            agent_ids,
            turn_order,
            steps: Vec::new(),
            result: String::new(),
        }
    }

    pub(crate) fn record(&mut self, snapshot: StepSnapshot) {
        self.steps.push(snapshot);
    }

    pub(crate) fn seal(mut self, result: impl Into<String>) -> Self {
        self.result = result.into();
        self
    }

    /// Number of snapshots, including the starting one.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Positions of one agent across the episode.
    pub fn trajectory(&self, agent: &str) -> Vec<Position> {
        self.steps
            .iter()
            .filter_map(|step| step.get(agent).copied())
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize episode log")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse episode log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EpisodeLog {
        let grid = GridModel::new(2, 3, [Position::new(1, 1)], [Position::new(2, 1)]).unwrap();
        let mut log = EpisodeLog::open(&grid, vec!["a".into(), "b".into()], None);
        for x in 0..3 {
            let mut step = StepSnapshot::new();
            step.insert("a".into(), Position::new(x, 0));
            step.insert("b".into(), Position::new(2 - x, 0));
            log.record(step);
        }
        log.seal("done")
    }

    #[test]
    fn test_json_shape() {
        let log = sample();
        let value: serde_json::Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();

        assert_eq!(value["grid"]["rows"], 2);
        assert_eq!(value["grid"]["walls"], serde_json::json!([[1, 1]]));
        assert_eq!(value["agentIds"], serde_json::json!(["a", "b"]));
        assert!(value.get("turnOrder").is_none());
        assert_eq!(value["steps"][1]["a"], serde_json::json!([1, 0]));
        assert_eq!(value["result"], "done");
    }

    #[test]
    fn test_round_trip_preserves_step_order() {
        let log = sample();
        let parsed = EpisodeLog::from_json(&log.to_json().unwrap()).unwrap();
        assert_eq!(parsed, log);
        assert_eq!(
            parsed.trajectory("a"),
            vec![Position::new(0, 0), Position::new(1, 0), Position::new(2, 0)]
        );
    }
}
