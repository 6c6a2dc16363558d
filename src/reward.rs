use serde::Serialize;

use crate::config::Rewards;
use crate::grid::{Grid, Pos};

/// What a single move did to the snake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Event {
    Moved,
    AteGreen,
    AteRed,
    HitWall,
    HitSelf,
    /// Red fruit eaten by a snake with nothing left to lose.
    Starved,
    /// Board filled up to the red fruits.
    Won,
}

impl Event {
    pub fn is_terminal(self) -> bool {
        matches!(self, Event::HitWall | Event::HitSelf | Event::Starved | Event::Won)
    }

    pub fn reward(self, table: &Rewards) -> f32 {
        match self {
            Event::Moved => table.step,
            Event::AteGreen => table.green_fruit,
            Event::AteRed => table.red_fruit,
            Event::HitWall | Event::HitSelf | Event::Starved => table.collision,
            Event::Won => table.win,
        }
    }
}

/// Classifies a head move before anything is mutated.
///
/// Collisions take priority over fruit so a stale fruit coordinate can never mask a death.
/// `body` is the snake as it was before the move, tail included.
pub fn classify(grid: Grid, body: &[Pos], head: Pos, green: &[Pos], red: &[Pos]) -> Event {
    if body.contains(&head) {
        Event::HitSelf
    } else if !grid.contains(head) {
        Event::HitWall
    } else if green.contains(&head) {
        Event::AteGreen
    } else if red.contains(&head) {
        if body.len() <= 1 { Event::Starved } else { Event::AteRed }
    } else {
        Event::Moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_beats_fruit() {
        let grid = Grid::new(10);
        let head = Pos::new(-1, 4);
        let e = classify(grid, &[Pos::new(0, 4)], head, &[head], &[head]);
        assert_eq!(e, Event::HitWall);
        assert_eq!(e.reward(&Rewards::default()), Rewards::default().collision);
    }

    #[test]
    fn body_beats_fruit() {
        let body = [Pos::new(2, 2), Pos::new(2, 3), Pos::new(3, 3), Pos::new(3, 2)];
        let e = classify(Grid::new(10), &body, Pos::new(3, 2), &[Pos::new(3, 2)], &[]);
        assert_eq!(e, Event::HitSelf);
    }

    #[test]
    fn single_segment_starves_on_red() {
        let grid = Grid::new(10);
        let red = [Pos::new(4, 5)];
        assert_eq!(classify(grid, &[Pos::new(4, 4)], red[0], &[], &red), Event::Starved);
        assert_eq!(classify(grid, &[Pos::new(4, 4), Pos::new(4, 3)], red[0], &[], &red), Event::AteRed);
    }

    #[test]
    fn terminal_events() {
        assert!(!Event::Moved.is_terminal());
        assert!(!Event::AteGreen.is_terminal());
        assert!(!Event::AteRed.is_terminal());
        assert!(Event::Starved.is_terminal());
        assert!(Event::Won.is_terminal());
    }
}
