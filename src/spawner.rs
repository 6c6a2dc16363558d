use ahash::AHashSet;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::ConfigError;
use crate::grid::{Dir, Grid, Pos};

/// Places a straight snake of `size` segments at a random spot.
///
/// Returns the body head-first and the initial heading, which points away from the body
/// so the first move can't fold the snake onto itself.
pub fn spawn_snake<R: Rng + ?Sized>(size: usize, grid: Grid, rng: &mut R) -> Result<(Vec<Pos>, Dir), ConfigError> {
    if size == 0 {
        return Err(ConfigError::EmptySnake);
    }
    if size > grid.size() {
        return Err(ConfigError::SnakeTooLong { size, grid_size: grid.size() });
    }
    let n = grid.size() as i32;
    let reach = size as i32 - 1;
    loop {
        let head = Pos::new(rng.gen_range(0..n), rng.gen_range(0..n));
        let valid: Vec<Dir> = Dir::ALL
            .into_iter()
            .filter(|&d| {
                let (dr, dc) = d.offset();
                grid.contains(Pos::new(head.row + dr * reach, head.col + dc * reach))
            })
            .collect();
        let Some(&body_dir) = valid.choose(rng) else { continue };
        let mut body = Vec::with_capacity(size);
        let mut p = head;
        body.push(p);
        for _ in 1..size {
            p = p.step(body_dir);
            body.push(p);
        }
        return Ok((body, body_dir.opposite()));
    }
}

/// Picks a free cell uniformly among every cell not in `occupied`, or `None` on a full board.
pub fn spawn_item<R: Rng + ?Sized>(occupied: &AHashSet<Pos>, grid: Grid, rng: &mut R) -> Option<Pos> {
    let free: Vec<Pos> = grid.cells().filter(|p| !occupied.contains(p)).collect();
    free.choose(rng).copied()
}
