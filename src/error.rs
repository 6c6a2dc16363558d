use thiserror::Error;

/// Settings that make a run impossible. Detected before the first step and never retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("grid size must be at least 1")]
    EmptyGrid,
    #[error("snake size must be at least 1")]
    EmptySnake,
    #[error("snake of length {size} can't fit in a {grid_size}x{grid_size} grid")]
    SnakeTooLong { size: usize, grid_size: usize },
    #[error("not enough place to spawn {fruits} fruits next to a snake of length {snake} ({cells} cells)")]
    NotEnoughRoom { fruits: usize, snake: usize, cells: usize },
    #[error("invalid agent setting `{field}`: {reason}")]
    Agent { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum SnakeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("model error: {0}")]
    Model(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, SnakeError>;
