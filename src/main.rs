use anyhow::{Context, Result};
use log::info;

use snake_dqn::{Autonomous, Config, Trainer, TrainingStats};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional JSON config as the only argument
    let cfg = match std::env::args().nth(1) {
        Some(path) => Config::from_json_file(&path)?,
        None => Config::default(),
    };
    info!(
        "grid {}x{}, snake {}, fruits {} green / {} red, {} episodes, training {}",
        cfg.grid_size, cfg.grid_size, cfg.snake_size, cfg.green_fruits, cfg.red_fruits, cfg.episodes, cfg.training
    );

    let mut trainer = Trainer::from_config(cfg.clone()).context("setting up trainer")?;
    if let Some(path) = cfg.model_in.as_ref() {
        trainer.agent_mut().load(path)?;
    }

    let mut stats = TrainingStats::default();
    let summaries = trainer.run(cfg.episodes, &mut Autonomous, &mut stats)?;

    if let Some(last) = summaries.last() {
        info!(
            "done: {} episodes, last length {}, record {}, mean(100) {:.2}, epsilon {:.4}",
            summaries.len(),
            last.length,
            trainer.max_length(),
            stats.recent_mean(100),
            trainer.agent().epsilon()
        );
    }
    if cfg.training {
        if let Some(path) = cfg.model_out.as_ref() {
            trainer.save_model(path);
        }
    }
    Ok(())
}
