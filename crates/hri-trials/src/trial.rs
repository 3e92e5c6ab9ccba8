//! Trial catalogue: one robot behaviour per trial, a human who either presses
//! buttons or follows a scripted stand-in, and the shared trial rules.
//!
//! Every trial is turn-based (human first, then robot) and ends with
//! `success` when the human reaches the goal, `failure` when the robot
//! catches the human, or optionally `timeout` after a step budget.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use acton_reactive::prelude::*;
use anyhow::{bail, Result};
use tracing::info;

use gridworld_kernel::messages::EpisodeStatus;
use gridworld_kernel::policy::{
    Blocking, GoalSeeking, InputAdapter, ManualInput, Pursuit, RandomWalk, Stationary,
};
use gridworld_kernel::trigger::{collision, reached_any_goal, step_limit};
use gridworld_kernel::{
    observe, reward, Action, Agent, EndTriggers, Environment, EnvironmentConfig, EpisodeActor,
    EpisodeHandle, EpisodeLog, Policy,
};

use crate::scenario::{Scenario, HUMAN, ROBOT};

pub const SUCCESS: &str = "success";
pub const FAILURE: &str = "failure";
pub const TIMEOUT: &str = "timeout";

/// Robot behaviour under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RobotKind {
    /// Never moves
    Stationary,
    /// Uniform random walk
    Random,
    /// Heads for the human's start cell, ignoring the human
    Passive,
    /// Chases the human's current position
    Chasing,
    /// Stands between the human and the goal
    Blocking,
    /// Keeps out of the human's way to the goal
    AntiBlocking,
}

impl RobotKind {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Stationary,
            Self::Random,
            Self::Passive,
            Self::Chasing,
            Self::Blocking,
            Self::AntiBlocking,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Stationary => "stationary",
            Self::Random => "random",
            Self::Passive => "passive",
            Self::Chasing => "chasing",
            Self::Blocking => "blocking",
            Self::AntiBlocking => "anti_blocking",
        }
    }

    fn policy(self, scenario: &Scenario, seed: Option<u64>) -> Result<Box<dyn Policy>> {
        let actions = Action::CARDINALS.to_vec();
        let policy: Box<dyn Policy> = match self {
            Self::Stationary => Box::new(Stationary::new(2)?),
            Self::Random => Box::new(match seed {
                Some(seed) => RandomWalk::seeded(actions, seed),
                None => RandomWalk::new(actions),
            }),
            Self::Passive => Box::new(match seed {
                Some(seed) => GoalSeeking::seeded(actions, scenario.human_start, seed),
                None => GoalSeeking::new(actions, scenario.human_start),
            }),
            Self::Chasing => Box::new(match seed {
                Some(seed) => Pursuit::seeded(actions, seed),
                None => Pursuit::new(actions),
            }),
            Self::Blocking => Box::new(Blocking::new(actions, HUMAN, scenario.goal)),
            Self::AntiBlocking => Box::new(Blocking::anti(actions, HUMAN, scenario.goal)),
        };
        Ok(policy)
    }
}

impl fmt::Display for RobotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RobotKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "stationary" | "still" => Ok(Self::Stationary),
            "random" | "rand" => Ok(Self::Random),
            "passive" | "goal" => Ok(Self::Passive),
            "chasing" | "chase" | "pursuit" => Ok(Self::Chasing),
            "blocking" | "block" => Ok(Self::Blocking),
            "anti_blocking" | "anti-blocking" | "anti" => Ok(Self::AntiBlocking),
            _ => bail!(
                "Unknown robot: {}. Valid: stationary, random, passive, chasing, blocking, anti_blocking",
                s
            ),
        }
    }
}

/// Who moves the human.
#[derive(Debug, Clone)]
pub enum HumanDriver {
    /// A participant pressing buttons through the adapter
    Buttons(InputAdapter),
    /// Goal-seeking stand-in for unattended batch runs
    Scripted,
}

impl HumanDriver {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Buttons(_) => "buttons",
            Self::Scripted => "scripted",
        }
    }

    fn policy(&self, scenario: &Scenario, seed: Option<u64>) -> Box<dyn Policy> {
        match self {
            Self::Buttons(adapter) => Box::new(ManualInput::new(adapter.clone())),
            Self::Scripted => {
                let actions = Action::CARDINALS.to_vec();
                Box::new(match seed {
                    Some(seed) => GoalSeeking::seeded(actions, scenario.goal, seed),
                    None => GoalSeeking::new(actions, scenario.goal),
                })
            }
        }
    }
}

/// Per-trial settings.
#[derive(Debug, Clone)]
pub struct TrialConfig {
    pub robot: RobotKind,
    /// Steps before the trial ends with `timeout` (None runs until success or failure)
    pub max_steps: Option<usize>,
    /// Pause between turns
    pub turn_delay: Duration,
    /// Seed for the random robot and the scripted human
    pub seed: Option<u64>,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            robot: RobotKind::Stationary,
            max_steps: None,
            turn_delay: Duration::from_millis(100),
            seed: None,
        }
    }
}

/// Trial end conditions, in evaluation order.
pub fn trial_triggers(max_steps: Option<usize>) -> EndTriggers {
    let triggers = EndTriggers::new()
        .with(SUCCESS, reached_any_goal(HUMAN))
        .with(FAILURE, collision(HUMAN, ROBOT));
    match max_steps {
        Some(limit) => triggers.with(TIMEOUT, step_limit(limit)),
        None => triggers,
    }
}

/// Set up the turn-based environment for one trial.
pub fn build_environment(
    scenario: &Scenario,
    config: &TrialConfig,
    human: &HumanDriver,
) -> Result<Environment> {
    let environment = EnvironmentConfig::turn_based().with_turn_delay(config.turn_delay);
    let mut env = Environment::new(scenario.grid.clone(), environment)
        .with_reward(reward::zero())
        .with_triggers(trial_triggers(config.max_steps));

    let human_seed = config.seed.map(|s| s.wrapping_mul(2));
    let robot_seed = config.seed.map(|s| s.wrapping_mul(2).wrapping_add(1));

    env.register(Agent::boxed(
        HUMAN,
        scenario.human_start,
        human.policy(scenario, human_seed),
    ))?;
    env.register(
        Agent::boxed(ROBOT, scenario.robot_start, config.robot.policy(scenario, robot_seed)?)
            .observing(observe::agent(HUMAN)),
    )?;
    Ok(env)
}

/// A trial running on its own actor runtime.
pub struct RunningTrial {
    runtime: ActorRuntime,
    handle: EpisodeHandle,
    robot: RobotKind,
}

impl RunningTrial {
    pub async fn start(
        scenario: &Scenario,
        config: &TrialConfig,
        human: &HumanDriver,
    ) -> Result<Self> {
        let env = build_environment(scenario, config, human)?;

        let mut runtime = ActonApp::launch_async().await;
        let handle = match EpisodeActor::spawn(&mut runtime, env).await {
            Ok(handle) => handle,
            Err(e) => {
                let _ = runtime.shutdown_all().await;
                return Err(e.into());
            }
        };
        info!(
            robot = config.robot.name(),
            human = human.name(),
            goal = %scenario.goal,
            "Trial started"
        );
        Ok(Self {
            runtime,
            handle,
            robot: config.robot,
        })
    }

    pub async fn status(&self) -> Result<EpisodeStatus> {
        self.handle.status().await
    }

    /// Wait for an end trigger, then stop the actors.
    pub async fn finish(mut self) -> Result<EpisodeLog> {
        let log = self.handle.finished().await;
        self.handle.shutdown().await?;
        self.runtime.shutdown_all().await?;
        let log = log?;
        info!(robot = self.robot.name(), result = %log.result, steps = log.len() - 1, "Trial finished");
        Ok(log)
    }
}

/// Run one trial to completion.
pub async fn run_trial(
    scenario: &Scenario,
    config: &TrialConfig,
    human: &HumanDriver,
) -> Result<EpisodeLog> {
    RunningTrial::start(scenario, config, human)
        .await?
        .finish()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridworld_kernel::Position;

    fn config(robot: RobotKind) -> TrialConfig {
        TrialConfig {
            robot,
            max_steps: Some(60),
            turn_delay: Duration::from_millis(1),
            seed: Some(3),
        }
    }

    #[test]
    fn test_robot_names_parse_back() {
        for robot in RobotKind::all() {
            assert_eq!(robot.name().parse::<RobotKind>().unwrap(), robot);
        }
        assert_eq!("Anti-Blocking".parse::<RobotKind>().unwrap(), RobotKind::AntiBlocking);
        assert!("teleporting".parse::<RobotKind>().is_err());
    }

    #[test]
    fn test_trigger_order() {
        let names: Vec<String> = trial_triggers(Some(10)).names().map(str::to_string).collect();
        assert_eq!(names, vec![SUCCESS, FAILURE, TIMEOUT]);
        assert_eq!(trial_triggers(None).len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_human_reaches_goal_past_stationary_robot() {
        let scenario =
            Scenario::new(Position::new(3, 10), Position::new(3, 0), Position::new(2, 4)).unwrap();
        let log = run_trial(&scenario, &config(RobotKind::Stationary), &HumanDriver::Scripted)
            .await
            .unwrap();

        assert_eq!(log.result, SUCCESS);
        assert_eq!(log.turn_order, Some(vec![HUMAN.to_string(), ROBOT.to_string()]));
        // Ten human turns interleaved with nine robot turns.
        assert_eq!(log.len(), 20);
        assert_eq!(log.trajectory(HUMAN).last(), Some(&Position::new(3, 10)));
    }

    #[tokio::test]
    async fn test_chasing_robot_catches_human_in_corridor() {
        let scenario =
            Scenario::new(Position::new(3, 10), Position::new(3, 0), Position::new(3, 4)).unwrap();
        let log = run_trial(&scenario, &config(RobotKind::Chasing), &HumanDriver::Scripted)
            .await
            .unwrap();

        assert_eq!(log.result, FAILURE);
        assert_eq!(log.steps.last().unwrap()[ROBOT], Position::new(3, 2));
        assert_eq!(log.steps.last().unwrap()[HUMAN], Position::new(3, 2));
    }

    #[tokio::test]
    async fn test_step_budget_ends_with_timeout() {
        // Straight north runs into the west wall block: the stand-in stalls.
        let scenario =
            Scenario::new(Position::new(0, 10), Position::new(0, 0), Position::new(4, 6)).unwrap();
        let mut config = config(RobotKind::Stationary);
        config.max_steps = Some(8);
        let log = run_trial(&scenario, &config, &HumanDriver::Scripted).await.unwrap();

        assert_eq!(log.result, TIMEOUT);
        assert_eq!(log.len(), 9);
    }
}
