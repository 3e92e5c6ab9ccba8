//! Static grid geometry and the move legality oracle.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::EnvironmentError;
use crate::geometry::{Action, Position};

/// Grid geometry fixed for the lifetime of an episode.
///
/// `is_legal` is a bounds check plus a hash lookup; the ordered wall list is
/// only kept so logs reproduce the configured layout.
#[derive(Debug, Clone)]
pub struct GridModel {
    rows: u32,
    cols: u32,
    walls: Vec<Position>,
    wall_set: HashSet<Position>,
    goals: Vec<Position>,
}

impl GridModel {
    /// Build a grid, rejecting zero dimensions, out-of-bounds walls or goals,
    /// and goals placed on walls.
    pub fn new(
        rows: u32,
        cols: u32,
        walls: impl IntoIterator<Item = Position>,
        goals: impl IntoIterator<Item = Position>,
    ) -> Result<Self, EnvironmentError> {
        if rows == 0 || cols == 0 || rows > i32::MAX as u32 || cols > i32::MAX as u32 {
            return Err(EnvironmentError::InvalidDimensions { rows, cols });
        }

        let mut grid = Self {
            rows,
            cols,
            walls: Vec::new(),
            wall_set: HashSet::new(),
            goals: Vec::new(),
        };

        for wall in walls {
            if !grid.in_bounds(wall) {
                return Err(EnvironmentError::CellOutOfBounds {
                    kind: "wall",
                    position: wall,
                    rows,
                    cols,
                });
            }
            if grid.wall_set.insert(wall) {
                grid.walls.push(wall);
            }
        }

        for goal in goals {
            if !grid.in_bounds(goal) {
                return Err(EnvironmentError::CellOutOfBounds {
                    kind: "goal",
                    position: goal,
                    rows,
                    cols,
                });
            }
            if grid.wall_set.contains(&goal) {
                return Err(EnvironmentError::GoalOnWall(goal));
            }
            grid.goals.push(goal);
        }

        Ok(grid)
    }

    /// An open grid without walls or goals.
    pub fn open(rows: u32, cols: u32) -> Result<Self, EnvironmentError> {
        Self::new(rows, cols, [], [])
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Walls in configuration order, duplicates removed.
    pub fn walls(&self) -> &[Position] {
        &self.walls
    }

    pub fn goals(&self) -> &[Position] {
        &self.goals
    }

    fn in_bounds(&self, p: Position) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.cols as i32 && p.y < self.rows as i32
    }

    /// True iff `(x, y)` is inside the grid and not a wall.
    pub fn is_legal(&self, x: i32, y: i32) -> bool {
        let p = Position::new(x, y);
        self.in_bounds(p) && !self.wall_set.contains(&p)
    }

    pub fn is_legal_position(&self, p: Position) -> bool {
        self.is_legal(p.x, p.y)
    }

    pub fn is_wall(&self, p: Position) -> bool {
        self.wall_set.contains(&p)
    }

    pub fn is_goal(&self, p: Position) -> bool {
        self.goals.contains(&p)
    }

    /// Where an agent standing on `from` ends up after `action`.
    ///
    /// Illegal targets resolve to `from`: a blocked move is a no-move. So
    /// does a displacement large enough to overflow the coordinates.
    pub fn resolve(&self, from: Position, action: Action) -> Position {
        match from.checked_offset(action) {
            Some(target) if self.is_legal_position(target) => target,
            _ => from,
        }
    }
}

/// Serialized grid header as it appears in episode logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridHeader {
    pub rows: u32,
    pub cols: u32,
    pub walls: Vec<Position>,
    #[serde(default)]
    pub goals: Vec<Position>,
}

impl From<&GridModel> for GridHeader {
    fn from(grid: &GridModel) -> Self {
        Self {
            rows: grid.rows,
            cols: grid.cols,
            walls: grid.walls.clone(),
            goals: grid.goals.clone(),
        }
    }
}
