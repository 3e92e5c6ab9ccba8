//! Trial records and batch summaries.
//!
//! Captures per robot behaviour:
//! - How often the human reached the goal, got caught, or ran out of steps
//! - Mean episode length

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gridworld_kernel::{EpisodeLog, Position};

use crate::trial::{FAILURE, SUCCESS};

/// How a trial ended, from the human's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    /// Step budget exhausted or stopped early
    Unfinished,
}

impl Outcome {
    pub fn from_result(result: &str) -> Self {
        match result {
            SUCCESS => Self::Success,
            FAILURE => Self::Failure,
            _ => Self::Unfinished,
        }
    }
}

/// One finished trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    pub id: Uuid,
    pub robot: String,
    pub human: String,
    pub trial: usize,
    pub seed: Option<u64>,
    pub goal: Position,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub outcome: Outcome,
    /// Committed steps (snapshots minus the starting one)
    pub steps: usize,
    pub log: EpisodeLog,
}

/// Aggregate numbers for one robot behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotSummary {
    pub robot: String,
    pub trials: usize,
    pub successes: usize,
    pub failures: usize,
    pub unfinished: usize,
    pub success_rate: f64,
    /// Standard error of success rate: sqrt(p(1-p)/n)
    pub success_rate_se: f64,
    pub mean_steps: f64,
}

/// All records of a batch plus per-robot summaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResults {
    pub records: Vec<TrialRecord>,
    pub summary: BTreeMap<String, RobotSummary>,
}

impl BatchResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: TrialRecord) {
        self.records.push(record);
    }

    pub fn compute_summary(&mut self) {
        let mut by_robot: BTreeMap<&str, Vec<&TrialRecord>> = BTreeMap::new();
        for record in &self.records {
            by_robot.entry(record.robot.as_str()).or_default().push(record);
        }

        let mut summary = BTreeMap::new();
        for (robot, records) in by_robot {
            let trials = records.len();
            let n = trials as f64;
            let count = |outcome: Outcome| records.iter().filter(|r| r.outcome == outcome).count();
            let successes = count(Outcome::Success);
            let success_rate = successes as f64 / n;

            let success_rate_se = if trials > 1 {
                (success_rate * (1.0 - success_rate) / n).sqrt()
            } else {
                0.0
            };

            summary.insert(
                robot.to_string(),
                RobotSummary {
                    robot: robot.to_string(),
                    trials,
                    successes,
                    failures: count(Outcome::Failure),
                    unfinished: count(Outcome::Unfinished),
                    success_rate,
                    success_rate_se,
                    mean_steps: records.iter().map(|r| r.steps as f64).sum::<f64>() / n,
                },
            );
        }
        self.summary = summary;
    }

    /// Save results to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write results to {}", path.display()))?;
        Ok(())
    }

    /// Load results from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let results = serde_json::from_str(&json)?;
        Ok(results)
    }
}
