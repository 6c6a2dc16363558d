//! Grid snake with two kinds of fruit, driven by a DQN agent (candle) with experience
//! replay and a lagged target network.

pub mod config;
pub mod dqn;
pub mod episode;
pub mod error;
pub mod game;
pub mod grid;
pub mod observation;
pub mod replay;
pub mod reward;
pub mod spawner;
pub mod stats;

pub use config::{AgentConfig, Config, Rewards};
pub use dqn::{DqnAgent, QNetwork};
pub use episode::{Autonomous, Control, EpisodeSummary, Observer, Scripted, Snapshot, Tick, Trainer};
pub use error::{ConfigError, SnakeError};
pub use game::{StepOutcome, World};
pub use grid::{Dir, Grid, Pos};
pub use observation::{STATE_SIZE, State};
pub use replay::{Batch, Replay, Transition};
pub use reward::Event;
pub use stats::TrainingStats;
