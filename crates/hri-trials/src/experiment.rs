//! Batch runner: every robot behaviour against the scripted human.
//!
//! For each robot the trials of one batch run concurrently, each on its own
//! episode actor with its own generated scenario.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use crate::results::{BatchResults, Outcome, TrialRecord};
use crate::scenario::ScenarioGenerator;
use crate::trial::{run_trial, HumanDriver, RobotKind, TrialConfig};

/// Configuration for a batch of trials.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Trials per robot behaviour
    pub trials: usize,
    pub robots: Vec<RobotKind>,
    /// Step budget per trial
    pub max_steps: usize,
    /// Pause between turns; unattended runs need none
    pub turn_delay: Duration,
    /// Base seed; trial `i` uses `seed + i` (None for random)
    pub seed: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            trials: 10,
            robots: RobotKind::all(),
            max_steps: 100,
            turn_delay: Duration::ZERO,
            seed: None,
        }
    }
}

pub struct BatchRunner {
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<BatchResults> {
        let mut results = BatchResults::new();
        let total = self.config.robots.len() * self.config.trials;
        let mut completed = 0;

        for &robot in &self.config.robots {
            let runs = (0..self.config.trials).map(|trial| self.run_one(robot, trial));
            for (trial, record) in join_all(runs).await.into_iter().enumerate() {
                match record {
                    Ok(record) => {
                        completed += 1;
                        info!(
                            progress = format!("{}/{}", completed, total),
                            robot = robot.name(),
                            trial = trial,
                            outcome = ?record.outcome,
                            "Completed trial"
                        );
                        results.add(record);
                    }
                    Err(e) => warn!(robot = robot.name(), trial = trial, error = %e, "Trial failed"),
                }
            }
        }

        results.compute_summary();
        Ok(results)
    }

    async fn run_one(&self, robot: RobotKind, trial: usize) -> Result<TrialRecord> {
        let seed = self.config.seed.map(|s| s.wrapping_add(trial as u64));
        let scenario = ScenarioGenerator::new(seed).generate()?;
        let config = TrialConfig {
            robot,
            max_steps: Some(self.config.max_steps),
            turn_delay: self.config.turn_delay,
            seed,
        };
        let human = HumanDriver::Scripted;

        let started_at = Utc::now();
        let log = run_trial(&scenario, &config, &human).await?;

        Ok(TrialRecord {
            id: Uuid::new_v4(),
            robot: robot.name().to_string(),
            human: human.name().to_string(),
            trial,
            seed,
            goal: scenario.goal,
            started_at,
            ended_at: Utc::now(),
            outcome: Outcome::from_result(&log.result),
            steps: log.len().saturating_sub(1),
            log,
        })
    }
}
