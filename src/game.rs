use ahash::AHashSet;
use rand::Rng;
use std::collections::VecDeque;

use crate::config::{Config, Rewards};
use crate::error::ConfigError;
use crate::grid::{Dir, Grid, Pos};
use crate::observation::{self, State};
use crate::reward::{classify, Event};
use crate::spawner::{spawn_item, spawn_snake};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepOutcome {
    pub reward: f32,
    pub done: bool,
    pub event: Event,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Fruit {
    Green,
    Red,
}

/// One episode's board: the snake (head first), its heading and both fruit sets.
#[derive(Clone, Debug)]
pub struct World {
    grid: Grid,
    snake: VecDeque<Pos>,
    dir: Dir,
    green: Vec<Pos>,
    red: Vec<Pos>,
    red_target: usize,
}

impl World {
    /// Spawns the snake then every fruit on free cells.
    pub fn spawn<R: Rng + ?Sized>(cfg: &Config, rng: &mut R) -> Result<Self, ConfigError> {
        cfg.validate_world()?;
        let grid = Grid::new(cfg.grid_size);
        let (body, dir) = spawn_snake(cfg.snake_size, grid, rng)?;
        let mut world = Self {
            grid,
            snake: body.into(),
            dir,
            green: Vec::with_capacity(cfg.green_fruits),
            red: Vec::with_capacity(cfg.red_fruits),
            red_target: cfg.red_fruits,
        };
        for _ in 0..cfg.green_fruits { world.place(Fruit::Green, rng); }
        for _ in 0..cfg.red_fruits { world.place(Fruit::Red, rng); }
        world.snake.make_contiguous();
        Ok(world)
    }

    /// Builds a board from explicit positions. The red fruit target is `red.len()`.
    pub fn from_parts(grid_size: usize, snake: Vec<Pos>, dir: Dir, green: Vec<Pos>, red: Vec<Pos>) -> Self {
        let red_target = red.len();
        let mut snake: VecDeque<Pos> = snake.into();
        snake.make_contiguous();
        Self { grid: Grid::new(grid_size), snake, dir, green, red, red_target }
    }

    pub fn grid(&self) -> Grid { self.grid }
    pub fn direction(&self) -> Dir { self.dir }
    pub fn green_fruits(&self) -> &[Pos] { &self.green }
    pub fn red_fruits(&self) -> &[Pos] { &self.red }
    pub fn len(&self) -> usize { self.snake.len() }
    pub fn is_empty(&self) -> bool { self.snake.is_empty() }

    /// Body segments, head first.
    pub fn snake(&self) -> &[Pos] {
        // kept contiguous after every mutation
        self.snake.as_slices().0
    }

    pub fn head(&self) -> Pos {
        self.snake[0]
    }

    pub fn set_direction(&mut self, dir: Dir) {
        self.dir = dir;
    }

    pub fn state(&self) -> State {
        observation::encode(self.grid, self.snake(), &self.green, &self.red)
    }

    /// Turns toward `dir` and moves one cell.
    pub fn step<R: Rng + ?Sized>(&mut self, dir: Dir, rewards: &Rewards, rng: &mut R) -> StepOutcome {
        self.dir = dir;
        let head = self.head().step(dir);
        self.apply(head, rewards, rng)
    }

    /// Moves the head onto `head` and settles the consequences.
    ///
    /// Green grows by one (tail kept), red shrinks by one (tail popped twice), a plain move
    /// pops the tail once. Eaten fruit is respawned on a free cell when one is left.
    /// On a collision the offending head is kept so the next observation sees it.
    pub fn apply<R: Rng + ?Sized>(&mut self, head: Pos, rewards: &Rewards, rng: &mut R) -> StepOutcome {
        let mut event = classify(self.grid, self.snake(), head, &self.green, &self.red);
        self.snake.push_front(head);
        match event {
            Event::AteGreen => {
                self.consume(Fruit::Green, head, rng);
                if self.snake.len() >= self.grid.capacity().saturating_sub(self.red_target) {
                    event = Event::Won;
                }
            }
            Event::AteRed => {
                self.snake.pop_back();
                self.snake.pop_back();
                self.consume(Fruit::Red, head, rng);
            }
            Event::Moved | Event::HitWall | Event::HitSelf | Event::Starved | Event::Won => {
                self.snake.pop_back();
            }
        }
        self.snake.make_contiguous();
        StepOutcome { reward: event.reward(rewards), done: event.is_terminal(), event }
    }

    fn occupied(&self) -> AHashSet<Pos> {
        self.snake.iter().chain(&self.green).chain(&self.red).copied().collect()
    }

    fn place<R: Rng + ?Sized>(&mut self, kind: Fruit, rng: &mut R) {
        if let Some(p) = spawn_item(&self.occupied(), self.grid, rng) {
            match kind {
                Fruit::Green => self.green.push(p),
                Fruit::Red => self.red.push(p),
            }
        }
    }

    fn consume<R: Rng + ?Sized>(&mut self, kind: Fruit, at: Pos, rng: &mut R) {
        let list = match kind {
            Fruit::Green => &mut self.green,
            Fruit::Red => &mut self.red,
        };
        list.retain(|&p| p != at);
        self.place(kind, rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn line() -> Vec<Pos> {
        vec![Pos::new(5, 5), Pos::new(5, 4), Pos::new(5, 3)]
    }

    fn assert_disjoint(w: &World) {
        let occ = w.occupied();
        assert_eq!(occ.len(), w.len() + w.green_fruits().len() + w.red_fruits().len());
    }

    #[test]
    fn spawned_world_has_no_overlaps() {
        let mut rng = SmallRng::seed_from_u64(42);
        let cfg = Config { green_fruits: 5, red_fruits: 4, ..Config::default() };
        for _ in 0..50 {
            let w = World::spawn(&cfg, &mut rng).unwrap();
            assert_eq!(w.len(), cfg.snake_size);
            assert_eq!(w.green_fruits().len(), 5);
            assert_eq!(w.red_fruits().len(), 4);
            assert_disjoint(&w);
        }
    }

    #[test]
    fn crowded_spawn_is_rejected() {
        let mut rng = SmallRng::seed_from_u64(0);
        let cfg = Config { grid_size: 3, snake_size: 3, green_fruits: 5, red_fruits: 1, ..Config::default() };
        assert!(matches!(World::spawn(&cfg, &mut rng), Err(ConfigError::NotEnoughRoom { .. })));
    }

    #[test]
    fn plain_move_keeps_length() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut w = World::from_parts(10, line(), Dir::Right, vec![], vec![]);
        let out = w.step(Dir::Right, &Rewards::default(), &mut rng);
        assert_eq!(out.event, Event::Moved);
        assert_eq!(out.reward, Rewards::default().step);
        assert!(!out.done);
        assert_eq!(w.snake(), &[Pos::new(5, 6), Pos::new(5, 5), Pos::new(5, 4)]);
    }

    #[test]
    fn green_grows_and_red_shrinks_by_one() {
        let rewards = Rewards::default();
        let mut rng = SmallRng::seed_from_u64(2);

        let mut plain = World::from_parts(10, line(), Dir::Right, vec![], vec![]);
        plain.step(Dir::Right, &rewards, &mut rng);

        let mut green = World::from_parts(10, line(), Dir::Right, vec![Pos::new(5, 6)], vec![]);
        let out = green.step(Dir::Right, &rewards, &mut rng);
        assert_eq!(out.event, Event::AteGreen);
        assert_eq!(green.len(), plain.len() + 1);
        assert_eq!(green.green_fruits().len(), 1);
        assert_disjoint(&green);

        let mut red = World::from_parts(10, line(), Dir::Right, vec![], vec![Pos::new(5, 6)]);
        let out = red.step(Dir::Right, &rewards, &mut rng);
        assert_eq!(out.event, Event::AteRed);
        assert_eq!(out.reward, rewards.red_fruit);
        assert_eq!(red.len(), plain.len() - 1);
        assert_eq!(red.snake(), &[Pos::new(5, 6), Pos::new(5, 5)]);
        assert_eq!(red.red_fruits().len(), 1);
        assert_ne!(red.red_fruits()[0], Pos::new(5, 6));
        assert_disjoint(&red);
    }

    #[test]
    fn reversing_into_the_neck_is_a_self_hit() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut w = World::from_parts(10, line(), Dir::Right, vec![], vec![]);
        let out = w.step(Dir::Left, &Rewards::default(), &mut rng);
        assert_eq!(out.event, Event::HitSelf);
        assert!(out.done);
        assert_eq!(w.len(), 3);
    }

    #[test]
    fn moving_off_the_top_hits_the_wall() {
        let mut rng = SmallRng::seed_from_u64(4);
        let body = vec![Pos::new(0, 2), Pos::new(1, 2)];
        let mut w = World::from_parts(10, body, Dir::Up, vec![Pos::new(0, 3)], vec![]);
        let out = w.step(Dir::Up, &Rewards::default(), &mut rng);
        assert_eq!(out.event, Event::HitWall);
        assert_eq!(out.reward, Rewards::default().collision);
        assert_eq!(w.head(), Pos::new(-1, 2));
        assert_eq!(w.green_fruits(), &[Pos::new(0, 3)]);
    }

    #[test]
    fn filling_the_board_wins() {
        let mut rng = SmallRng::seed_from_u64(5);
        // 2x2 board, snake of 3, last free cell holds green
        let body = vec![Pos::new(0, 1), Pos::new(0, 0), Pos::new(1, 0)];
        let mut w = World::from_parts(2, body, Dir::Down, vec![Pos::new(1, 1)], vec![]);
        let out = w.step(Dir::Down, &Rewards::default(), &mut rng);
        assert_eq!(out.event, Event::Won);
        assert!(out.done);
        assert_eq!(out.reward, Rewards::default().win);
        assert_eq!(w.len(), 4);
        assert!(w.green_fruits().is_empty());
    }
}
