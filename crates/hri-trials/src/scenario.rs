//! Trial layout generator.
//!
//! Every trial uses the same 11×7 arena: two wall blocks leave a single
//! three-cell corridor in the middle, the human starts on the bottom row and
//! the goal sits on the top row. Randomness picks the goal column, the human
//! start column and the robot's cell inside the corridor.

use anyhow::{bail, Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use gridworld_kernel::{AgentSpec, EnvironmentConfig, GridModel, Position, ScenarioConfig};

pub const ROWS: u32 = 11;
pub const COLS: u32 = 7;

pub const HUMAN: &str = "human";
pub const ROBOT: &str = "robot";

/// Columns the goal and the human start are drawn from.
const LANES: [i32; 3] = [0, 3, 6];

/// Wall cells of the base arena: x ∈ {0, 1, 5, 6}, y ∈ 3..=7.
pub fn base_walls() -> Vec<Position> {
    [0, 1, 5, 6]
        .into_iter()
        .flat_map(|x| (3..=7).map(move |y| Position::new(x, y)))
        .collect()
}

/// One concrete trial layout.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub grid: GridModel,
    pub goal: Position,
    pub human_start: Position,
    pub robot_start: Position,
}

impl Scenario {
    /// Base arena with the given goal and starts.
    pub fn new(goal: Position, human_start: Position, robot_start: Position) -> Result<Self> {
        let grid = GridModel::new(ROWS, COLS, base_walls(), [goal])?;
        Self::checked(grid, goal, human_start, robot_start)
    }

    /// Custom layout from a scenario file. Needs a `human` and a `robot`
    /// agent; the first goal is the human's target.
    pub fn from_config(config: &ScenarioConfig) -> Result<Self> {
        let grid = config.grid()?;
        let goal = *config
            .goals
            .first()
            .context("Scenario needs at least one goal")?;
        let human_start = config
            .start_of(HUMAN)
            .with_context(|| format!("Scenario has no '{}' agent", HUMAN))?;
        let robot_start = config
            .start_of(ROBOT)
            .with_context(|| format!("Scenario has no '{}' agent", ROBOT))?;
        Self::checked(grid, goal, human_start, robot_start)
    }

    fn checked(
        grid: GridModel,
        goal: Position,
        human_start: Position,
        robot_start: Position,
    ) -> Result<Self> {
        for (who, start) in [(HUMAN, human_start), (ROBOT, robot_start)] {
            if !grid.is_legal_position(start) {
                bail!("{} start {} is not a free cell", who, start);
            }
        }
        if human_start == robot_start {
            bail!("human and robot cannot start on the same cell {}", human_start);
        }
        Ok(Self {
            grid,
            goal,
            human_start,
            robot_start,
        })
    }

    /// The same layout as a serializable scenario file.
    pub fn to_config(&self, environment: EnvironmentConfig) -> ScenarioConfig {
        ScenarioConfig {
            rows: self.grid.rows(),
            cols: self.grid.cols(),
            walls: self.grid.walls().to_vec(),
            goals: self.grid.goals().to_vec(),
            agents: vec![
                AgentSpec {
                    id: HUMAN.to_string(),
                    start: self.human_start,
                },
                AgentSpec {
                    id: ROBOT.to_string(),
                    start: self.robot_start,
                },
            ],
            environment,
        }
    }
}

/// Draws base-arena scenarios.
#[derive(Debug, Clone, Default)]
pub struct ScenarioGenerator {
    /// Random seed for reproducibility (None for random)
    seed: Option<u64>,
}

impl ScenarioGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed }
    }

    pub fn generate(&self) -> Result<Scenario> {
        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };

        let goal = Position::new(LANES[rng.random_range(0..LANES.len())], ROWS as i32 - 1);
        let human_start = Position::new(LANES[rng.random_range(0..LANES.len())], 0);

        // Robot anywhere in the 3×3 block at the corridor entrance.
        let cell: i32 = rng.random_range(0..9);
        let robot_start = Position::new(2 + cell % 3, 4 + cell / 3);

        Scenario::new(goal, human_start, robot_start)
    }
}
