//! Sensor vector fed to the Q-network.
//!
//! Layout, each block ordered up/down/left/right like [`Dir::ALL`]:
//!
//! | range  | feature                                              |
//! |--------|------------------------------------------------------|
//! | 0..4   | cells until leaving the grid, / grid size            |
//! | 4..8   | Manhattan distance to nearest green fruit on the ray |
//! | 8..12  | same for red fruits                                  |
//! | 12..16 | same for body segments (head excluded)               |
//! | 16..20 | 1.0 if the adjacent cell is a wall or body, else 0.0 |
//!
//! Distances along a ray from an on-grid head never exceed `size - 1`, so a normalized
//! value of exactly `1.0` doubles as the "nothing seen" flag.

use crate::grid::{Dir, Grid, Pos};

pub const STATE_SIZE: usize = 20;

pub type State = [f32; STATE_SIZE];

const WALL: usize = 0;
const GREEN: usize = 4;
const RED: usize = 8;
const BODY: usize = 12;
const DANGER: usize = 16;

/// Encodes the board as seen from `snake[0]`. Pure: same inputs, same vector.
pub fn encode(grid: Grid, snake: &[Pos], green: &[Pos], red: &[Pos]) -> State {
    let mut state = [0.0; STATE_SIZE];
    let Some(&head) = snake.first() else { return state };
    let body = &snake[1..];
    let size = grid.size() as f32;

    for (i, dir) in Dir::ALL.into_iter().enumerate() {
        state[WALL + i] = wall_distance(grid, head, dir) as f32 / size;
        state[GREEN + i] = ray_distance(grid, head, dir, green, size);
        state[RED + i] = ray_distance(grid, head, dir, red, size);
        state[BODY + i] = ray_distance(grid, head, dir, body, size);
        let next = head.step(dir);
        state[DANGER + i] = if !grid.contains(next) || body.contains(&next) { 1.0 } else { 0.0 };
    }
    state
}

// Steps taken until the walker is off the grid; 0 if it already is.
fn wall_distance(grid: Grid, head: Pos, dir: Dir) -> u32 {
    let mut p = head;
    let mut n = 0;
    while grid.contains(p) {
        p = p.step(dir);
        n += 1;
    }
    n
}

fn ray_distance(grid: Grid, head: Pos, dir: Dir, items: &[Pos], size: f32) -> f32 {
    let mut p = head;
    while grid.contains(p) {
        if items.contains(&p) {
            return head.manhattan(p) as f32 / size;
        }
        p = p.step(dir);
    }
    1.0
}
