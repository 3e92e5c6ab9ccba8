//! Plain-text board rendering.

use std::collections::BTreeMap;

use gridworld_kernel::{AgentId, GridModel, Position};

const WALL: char = '#';
const GOAL: char = 'G';
const FLOOR: char = '.';
/// Two or more agents on one cell.
const CROWD: char = '*';

/// Characters in a rendered board, newlines included.
fn board_len(grid: &GridModel) -> usize {
    (grid.cols() as usize + 1) * grid.rows() as usize
}

/// Render `positions` on `grid`, top row first so that y grows upward.
///
/// Agents are drawn with their glyph from `glyphs`, falling back to the first
/// letter of their id.
pub fn render(
    grid: &GridModel,
    positions: &BTreeMap<AgentId, Position>,
    glyphs: &[(&str, char)],
) -> String {
    let glyph_of = |id: &str| {
        glyphs
            .iter()
            .find(|(agent, _)| *agent == id)
            .map(|(_, glyph)| *glyph)
            .or_else(|| id.chars().next())
            .unwrap_or('?')
    };

    let mut out = String::with_capacity(board_len(grid));
    for y in (0..grid.rows() as i32).rev() {
        for x in 0..grid.cols() as i32 {
            let cell = Position::new(x, y);
            let mut here = positions.iter().filter(|(_, p)| **p == cell);
            let c = match (here.next(), here.next()) {
                (Some(_), Some(_)) => CROWD,
                (Some((id, _)), None) => glyph_of(id),
                _ if grid.is_wall(cell) => WALL,
                _ if grid.is_goal(cell) => GOAL,
                _ => FLOOR,
            };
            out.push(c);
        }
        out.push('\n');
    }
    out
}
