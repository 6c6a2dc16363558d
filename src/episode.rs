use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;

use crate::config::Config;
use crate::dqn::{DqnAgent, preferred_device};
use crate::error::Result;
use crate::game::{StepOutcome, World};
use crate::grid::Dir;
use crate::observation::State;
use crate::replay::Transition;
use crate::reward::Event;

/// What the step loop should do on this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Execute one step; `Some` overrides the agent's choice.
    Run(Option<Dir>),
    /// Leave the world untouched this tick.
    Skip,
    /// Abandon the episode before the next step.
    Quit,
}

/// Source of per-tick decisions: autonomous play, a human at the keyboard, a test script.
pub trait Control {
    fn poll(&mut self, world: &World) -> Tick;
}

/// Always lets the agent pick.
#[derive(Clone, Copy, Debug, Default)]
pub struct Autonomous;

impl Control for Autonomous {
    fn poll(&mut self, _world: &World) -> Tick {
        Tick::Run(None)
    }
}

/// Replays a fixed list of ticks, then quits.
#[derive(Clone, Debug, Default)]
pub struct Scripted {
    ticks: VecDeque<Tick>,
}

impl Scripted {
    pub fn new(ticks: impl IntoIterator<Item = Tick>) -> Self {
        Self { ticks: ticks.into_iter().collect() }
    }

    pub fn push(&mut self, tick: Tick) {
        self.ticks.push_back(tick);
    }
}

impl Control for Scripted {
    fn poll(&mut self, _world: &World) -> Tick {
        self.ticks.pop_front().unwrap_or(Tick::Quit)
    }
}

/// Read-only view handed to observers after every executed step.
pub struct Snapshot<'a> {
    pub episode: usize,
    pub step: usize,
    pub world: &'a World,
    pub state: &'a State,
    pub action: Dir,
    pub outcome: StepOutcome,
    pub q_values: Option<[f32; Dir::COUNT]>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EpisodeSummary {
    /// 1-based count of finished episodes.
    pub episode: usize,
    pub length: usize,
    pub steps: usize,
    pub total_reward: f32,
    pub event: Event,
    pub epsilon: f32,
    pub max_length: usize,
}

/// Renderers and statistics hook in here; they never touch the simulation.
pub trait Observer {
    fn wants_q_values(&self) -> bool { false }
    fn on_step(&mut self, _snap: &Snapshot<'_>) {}
    fn on_episode_end(&mut self, _summary: &EpisodeSummary) {}
}

impl Observer for () {}

/// Drives episodes: spawn, then observe, act, move, score, encode and learn until done.
pub struct Trainer {
    cfg: Config,
    agent: DqnAgent,
    rng: SmallRng,
    episode: usize,
    max_length: usize,
    stop: Arc<AtomicBool>,
}

impl Trainer {
    pub fn new(cfg: Config, agent: DqnAgent) -> Result<Self> {
        cfg.validate()?;
        let rng = match cfg.seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_entropy(),
        };
        Ok(Self { cfg, agent, rng, episode: 0, max_length: 0, stop: Arc::new(AtomicBool::new(false)) })
    }

    /// Builds the agent described by `cfg` on the preferred device.
    pub fn from_config(cfg: Config) -> Result<Self> {
        let agent_seed = cfg.seed.map(|s| s.wrapping_add(1));
        let agent = DqnAgent::new(&cfg.agent, cfg.training, &preferred_device(), agent_seed)?;
        Self::new(cfg, agent)
    }

    pub fn config(&self) -> &Config { &self.cfg }
    pub fn agent(&self) -> &DqnAgent { &self.agent }
    pub fn agent_mut(&mut self) -> &mut DqnAgent { &mut self.agent }
    pub fn episodes_done(&self) -> usize { self.episode }
    pub fn max_length(&self) -> usize { self.max_length }

    /// Setting the flag ends the current episode before its next step.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn spawn_world(&mut self) -> Result<World> {
        Ok(World::spawn(&self.cfg, &mut self.rng)?)
    }

    /// Runs up to `episodes` episodes, stopping early on quit.
    pub fn run(&mut self, episodes: usize, control: &mut dyn Control, observer: &mut dyn Observer) -> Result<Vec<EpisodeSummary>> {
        let mut done = Vec::with_capacity(episodes);
        for _ in 0..episodes {
            match self.run_episode(control, observer)? {
                Some(summary) => done.push(summary),
                None => {
                    info!("stopped after {} episodes", self.episode);
                    break;
                }
            }
        }
        Ok(done)
    }

    /// Spawns a fresh world and plays it out. `None` when interrupted.
    pub fn run_episode(&mut self, control: &mut dyn Control, observer: &mut dyn Observer) -> Result<Option<EpisodeSummary>> {
        let world = self.spawn_world()?;
        self.play(world, control, observer)
    }

    /// Plays `world` until a terminal event, a quit tick or the stop flag.
    pub fn play(&mut self, mut world: World, control: &mut dyn Control, observer: &mut dyn Observer) -> Result<Option<EpisodeSummary>> {
        let mut state = world.state();
        let mut step = 0usize;
        let mut total_reward = 0.0;
        let event = loop {
            if self.stop.load(Ordering::Relaxed) {
                return Ok(None);
            }
            let action = match control.poll(&world) {
                Tick::Quit => return Ok(None),
                Tick::Skip => continue,
                Tick::Run(Some(dir)) => dir,
                Tick::Run(None) => self.agent.select_action(&state)?,
            };
            let outcome = world.step(action, &self.cfg.rewards, &mut self.rng);
            let next_state = world.state();
            debug!("step {step}: {action:?} -> {:?} reward {} done {}", outcome.event, outcome.reward, outcome.done);

            if self.agent.is_training() {
                self.agent.update(Transition {
                    state,
                    action: action.index(),
                    reward: outcome.reward,
                    next_state,
                    done: outcome.done,
                })?;
            }
            step += 1;
            total_reward += outcome.reward;

            let q_values = if observer.wants_q_values() { Some(self.agent.q_values(&next_state)?) } else { None };
            observer.on_step(&Snapshot { episode: self.episode + 1, step, world: &world, state: &next_state, action, outcome, q_values });

            state = next_state;
            if outcome.done {
                break outcome.event;
            }
        };

        self.episode += 1;
        self.max_length = self.max_length.max(world.len());
        let summary = EpisodeSummary {
            episode: self.episode,
            length: world.len(),
            steps: step,
            total_reward,
            event,
            epsilon: self.agent.epsilon(),
            max_length: self.max_length,
        };
        observer.on_episode_end(&summary);
        self.checkpoint();
        Ok(Some(summary))
    }

    /// Saves the online net, logging instead of failing.
    pub fn save_model(&self, path: &Path) -> bool {
        match self.agent.save(path) {
            Ok(()) => true,
            Err(e) => {
                warn!("could not save model to {}: {e:#}", path.display());
                false
            }
        }
    }

    fn checkpoint(&self) {
        let Some(dir) = self.cfg.checkpoint_dir.as_ref() else { return };
        if !self.agent.is_training() {
            return;
        }
        let ep = self.episode;
        if matches!(ep, 10 | 50 | 100) || ep % 400 == 0 {
            self.save_model(&dir.join(format!("{ep}_ep.safetensors")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::grid::Pos;

    fn tiny() -> Config {
        Config {
            grid_size: 6,
            seed: Some(17),
            agent: AgentConfig { hidden: 8, batch_size: 4, memory_size: 64, target_update_freq: 5, ..AgentConfig::default() },
            ..Config::default()
        }
    }

    #[derive(Default)]
    struct Recorder {
        steps: usize,
        ends: Vec<EpisodeSummary>,
        saw_q: bool,
    }

    impl Observer for Recorder {
        fn wants_q_values(&self) -> bool { true }
        fn on_step(&mut self, snap: &Snapshot<'_>) {
            self.steps += 1;
            self.saw_q |= snap.q_values.is_some();
            assert_eq!(*snap.state, snap.world.state());
        }
        fn on_episode_end(&mut self, summary: &EpisodeSummary) {
            self.ends.push(summary.clone());
        }
    }

    #[test]
    fn every_training_step_is_stored() {
        let mut trainer = Trainer::from_config(tiny()).unwrap();
        let mut rec = Recorder::default();
        let out = trainer.run(3, &mut Autonomous, &mut rec).unwrap();
        assert_eq!(out.len(), 3);
        let steps: usize = out.iter().map(|s| s.steps).sum();
        assert_eq!(trainer.agent().memory_len(), steps.min(64));
        assert_eq!(rec.steps, steps);
        assert!(rec.saw_q);
        assert_eq!(rec.ends, out);
        assert!(out.iter().all(|s| s.event.is_terminal()));
        assert_eq!(trainer.max_length(), out.iter().map(|s| s.length).max().unwrap());
        assert_eq!(trainer.episodes_done(), 3);
    }

    #[test]
    fn override_replaces_agent_action() {
        let mut trainer = Trainer::from_config(tiny()).unwrap();
        let world = World::from_parts(6, vec![Pos::new(2, 2), Pos::new(3, 2)], Dir::Up, vec![], vec![]);
        let mut control = Scripted::new([Tick::Run(Some(Dir::Up)), Tick::Skip, Tick::Run(Some(Dir::Up)), Tick::Run(Some(Dir::Up))]);
        let summary = trainer.play(world, &mut control, &mut ()).unwrap().unwrap();
        assert_eq!(summary.event, Event::HitWall);
        assert_eq!(summary.steps, 3);
        assert_eq!(trainer.agent().memory_len(), 3);
    }

    #[test]
    fn quit_abandons_the_episode() {
        let mut trainer = Trainer::from_config(tiny()).unwrap();
        let world = World::from_parts(6, vec![Pos::new(2, 2), Pos::new(3, 2)], Dir::Up, vec![], vec![]);
        let mut control = Scripted::new([Tick::Run(Some(Dir::Right)), Tick::Quit]);
        assert_eq!(trainer.play(world, &mut control, &mut ()).unwrap(), None);
        assert_eq!(trainer.episodes_done(), 0);
        assert_eq!(trainer.agent().memory_len(), 1);
    }

    #[test]
    fn stop_flag_is_checked_between_steps() {
        let mut trainer = Trainer::from_config(tiny()).unwrap();
        trainer.stop_handle().store(true, Ordering::Relaxed);
        assert!(trainer.run(5, &mut Autonomous, &mut ()).unwrap().is_empty());
        assert_eq!(trainer.agent().memory_len(), 0);
    }

    #[test]
    fn crowded_board_fails_before_any_step() {
        let cfg = Config { grid_size: 3, snake_size: 3, green_fruits: 4, red_fruits: 2, ..tiny() };
        assert!(Trainer::from_config(cfg).is_err());
    }

    #[test]
    fn checkpoints_land_in_the_configured_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config { checkpoint_dir: Some(dir.path().to_path_buf()), ..tiny() };
        let mut trainer = Trainer::from_config(cfg).unwrap();
        trainer.run(10, &mut Autonomous, &mut ()).unwrap();
        assert!(dir.path().join("10_ep.safetensors").exists());
        assert!(!dir.path().join("9_ep.safetensors").exists());
    }
}
