use serde::{Deserialize, Serialize};

/// A cell on the board. `row` grows downward, `col` grows to the right.
/// Values outside `[0, size)` only appear transiently, for a head that just left the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub row: i32,
    pub col: i32,
}

impl Pos {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn step(self, dir: Dir) -> Self {
        let (dr, dc) = dir.offset();
        Self::new(self.row + dr, self.col + dc)
    }

    pub fn manhattan(self, other: Pos) -> i32 {
        (self.row - other.row).abs() + (self.col - other.col).abs()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dir {
    Up,
    Down,
    Left,
    Right,
}

/// (row, col) offsets, indexed like `Dir::ALL`.
const OFFSETS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

impl Dir {
    /// Action order used by the network output layer.
    pub const ALL: [Dir; 4] = [Dir::Up, Dir::Down, Dir::Left, Dir::Right];
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        match self { Dir::Up => 0, Dir::Down => 1, Dir::Left => 2, Dir::Right => 3 }
    }

    pub fn from_index(i: usize) -> Option<Dir> {
        Self::ALL.get(i).copied()
    }

    pub fn offset(self) -> (i32, i32) {
        OFFSETS[self.index()]
    }

    pub fn opposite(self) -> Dir {
        match self { Dir::Up => Dir::Down, Dir::Down => Dir::Up, Dir::Left => Dir::Right, Dir::Right => Dir::Left }
    }
}

/// Square board of `size * size` cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grid {
    size: i32,
}

impl Grid {
    pub fn new(size: usize) -> Self {
        Self { size: size as i32 }
    }

    pub fn size(&self) -> usize { self.size as usize }

    pub fn capacity(&self) -> usize { self.size() * self.size() }

    pub fn contains(&self, p: Pos) -> bool {
        p.row >= 0 && p.col >= 0 && p.row < self.size && p.col < self.size
    }

    pub fn cells(&self) -> impl Iterator<Item = Pos> + '_ {
        (0..self.size).flat_map(move |row| (0..self.size).map(move |col| Pos::new(row, col)))
    }
}
