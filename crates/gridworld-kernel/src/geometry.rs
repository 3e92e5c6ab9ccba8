//! Cell positions and displacement actions.
//!
//! Both serialize as two-element arrays (`[x, y]`, `[dx, dy]`) so episode logs
//! and remote decision payloads keep the compact wire shape.
//!
//! Coordinates are 0-indexed with `y` growing upward: `NORTH` is `(0, +1)`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A cell on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The cell reached by applying `action`, ignoring legality.
    ///
    /// `None` when the target leaves the `i32` coordinate space.
    pub fn checked_offset(self, action: Action) -> Option<Self> {
        Some(Self::new(
            self.x.checked_add(action.dx)?,
            self.y.checked_add(action.dy)?,
        ))
    }

    /// Manhattan (L1) distance.
    pub fn manhattan(self, other: Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// The displacement that would move `self` onto `target`, if it fits in
    /// an `Action`.
    pub fn displacement_to(self, target: Position) -> Option<Action> {
        Some(Action::new(
            target.x.checked_sub(self.x)?,
            target.y.checked_sub(self.y)?,
        ))
    }
}

impl From<[i32; 2]> for Position {
    fn from([x, y]: [i32; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<Position> for [i32; 2] {
    fn from(p: Position) -> Self {
        [p.x, p.y]
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A displacement vector: one unit of agent intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Action {
    pub dx: i32,
    pub dy: i32,
}

impl Action {
    /// The explicit no-op.
    pub const STAY: Action = Action::new(0, 0);
    pub const NORTH: Action = Action::new(0, 1);
    pub const SOUTH: Action = Action::new(0, -1);
    pub const EAST: Action = Action::new(1, 0);
    pub const WEST: Action = Action::new(-1, 0);

    /// The four orthogonal unit moves in the order trial scripts list them:
    /// west, north, east, south.
    pub const CARDINALS: [Action; 4] = [Action::WEST, Action::NORTH, Action::EAST, Action::SOUTH];

    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    pub fn is_stay(self) -> bool {
        self == Action::STAY
    }
}

impl From<[i32; 2]> for Action {
    fn from([dx, dy]: [i32; 2]) -> Self {
        Self::new(dx, dy)
    }
}

impl From<Action> for [i32; 2] {
    fn from(a: Action) -> Self {
        [a.dx, a.dy]
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.dx, self.dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_and_displacement_are_inverse() {
        let from = Position::new(2, 3);
        let to = Position::new(-1, 7);
        let action = from.displacement_to(to).unwrap();
        assert_eq!(from.checked_offset(action), Some(to));
    }

    #[test]
    fn test_overflowing_coordinates_are_none() {
        let origin = Position::new(1, -1);
        assert_eq!(origin.checked_offset(Action::new(i32::MAX, 0)), None);
        assert_eq!(origin.checked_offset(Action::new(0, i32::MIN)), None);
        assert_eq!(origin.displacement_to(Position::new(i32::MIN, 0)), None);
        assert_eq!(
            origin.displacement_to(Position::new(1, i32::MAX)),
            None
        );
    }

    #[test]
    fn test_manhattan() {
        assert_eq!(Position::new(0, 0).manhattan(Position::new(3, -4)), 7);
        assert_eq!(Position::new(5, 5).manhattan(Position::new(5, 5)), 0);
    }

    #[test]
    fn test_wire_shape_is_array() {
        let json = serde_json::to_string(&Position::new(3, 10)).unwrap();
        assert_eq!(json, "[3,10]");

        let action: Action = serde_json::from_str("[-1,0]").unwrap();
        assert_eq!(action, Action::WEST);
    }
}
