use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Reward table for one simulation step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rewards {
    pub green_fruit: f32,
    pub red_fruit: f32,
    /// Wall hit, self hit and starvation.
    pub collision: f32,
    /// Board full except for red fruits.
    pub win: f32,
    /// Plain move without any event.
    pub step: f32,
}

impl Default for Rewards {
    fn default() -> Self {
        Self { green_fruit: 10.0, red_fruit: -10.0, collision: -20.0, win: 100.0, step: 0.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub hidden: usize,
    pub learning_rate: f64,
    pub gamma: f32,
    pub batch_size: usize,
    pub memory_size: usize,
    /// Learning steps between two hard copies of the online net into the target net.
    pub target_update_freq: u64,
    pub epsilon_start: f32,
    pub epsilon_min: f32,
    pub epsilon_decay: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            hidden: 128,
            learning_rate: 5e-4,
            gamma: 0.90,
            batch_size: 1000,
            memory_size: 100_000,
            target_update_freq: 2000,
            epsilon_start: 0.9,
            epsilon_min: 0.05,
            epsilon_decay: 0.998,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad = |field, reason: &str| Err(ConfigError::Agent { field, reason: reason.to_string() });
        if self.hidden < 2 { return bad("hidden", "needs at least 2 units"); }
        if self.batch_size == 0 { return bad("batch_size", "must be positive"); }
        if self.memory_size < self.batch_size { return bad("memory_size", "must hold at least one batch"); }
        if self.target_update_freq == 0 { return bad("target_update_freq", "must be positive"); }
        if !(0.0..=1.0).contains(&self.gamma) { return bad("gamma", "must be within [0, 1]"); }
        for (field, v) in [("epsilon_start", self.epsilon_start), ("epsilon_min", self.epsilon_min), ("epsilon_decay", self.epsilon_decay)] {
            if !(0.0..=1.0).contains(&v) { return bad(field, "must be within [0, 1]"); }
        }
        if !(self.learning_rate > 0.0) { return bad("learning_rate", "must be positive"); }
        Ok(())
    }
}

/// Run settings, loadable from JSON. Missing keys fall back to defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid_size: usize,
    pub snake_size: usize,
    pub green_fruits: usize,
    pub red_fruits: usize,
    pub episodes: usize,
    pub training: bool,
    pub seed: Option<u64>,
    pub model_in: Option<PathBuf>,
    pub model_out: Option<PathBuf>,
    pub checkpoint_dir: Option<PathBuf>,
    pub rewards: Rewards,
    pub agent: AgentConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid_size: 10,
            snake_size: 3,
            green_fruits: 2,
            red_fruits: 1,
            episodes: 10,
            training: true,
            seed: None,
            model_in: None,
            model_out: None,
            checkpoint_dir: None,
            rewards: Rewards::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl Config {
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }

    /// Checks the board can host the snake and every fruit with at least one free cell left.
    pub fn validate_world(&self) -> Result<(), ConfigError> {
        if self.grid_size == 0 { return Err(ConfigError::EmptyGrid); }
        if self.snake_size == 0 { return Err(ConfigError::EmptySnake); }
        if self.snake_size > self.grid_size {
            return Err(ConfigError::SnakeTooLong { size: self.snake_size, grid_size: self.grid_size });
        }
        let fruits = self.green_fruits + self.red_fruits;
        let cells = self.grid_size * self.grid_size;
        if fruits + self.snake_size >= cells {
            return Err(ConfigError::NotEnoughRoom { fruits, snake: self.snake_size, cells });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_world()?;
        self.agent.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.rewards.step, 0.0);
    }

    #[test]
    fn snake_longer_than_grid_is_rejected() {
        let cfg = Config { grid_size: 4, snake_size: 5, ..Config::default() };
        assert_eq!(cfg.validate_world(), Err(ConfigError::SnakeTooLong { size: 5, grid_size: 4 }));
    }

    #[test]
    fn crowded_board_is_rejected() {
        // 9 cells, 3 snake + 6 fruits leaves nothing free
        let cfg = Config { grid_size: 3, snake_size: 3, green_fruits: 4, red_fruits: 2, ..Config::default() };
        assert!(matches!(cfg.validate_world(), Err(ConfigError::NotEnoughRoom { fruits: 6, snake: 3, cells: 9 })));
        let cfg = Config { green_fruits: 3, ..cfg };
        assert!(cfg.validate_world().is_ok());
    }

    #[test]
    fn memory_must_hold_a_batch() {
        let agent = AgentConfig { batch_size: 64, memory_size: 32, ..AgentConfig::default() };
        assert!(matches!(agent.validate(), Err(ConfigError::Agent { field: "memory_size", .. })));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg: Config = serde_json::from_str(r#"{ "grid_size": 12, "agent": { "batch_size": 32 } }"#).unwrap();
        assert_eq!(cfg.grid_size, 12);
        assert_eq!(cfg.agent.batch_size, 32);
        assert_eq!(cfg.agent.memory_size, AgentConfig::default().memory_size);
        assert_eq!(cfg.rewards, Rewards::default());
    }
}
