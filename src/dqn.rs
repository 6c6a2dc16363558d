use std::path::{Path, PathBuf};

use anyhow::Context;
use candle_core as candle;
use candle::{DType, Device, Tensor};
use candle_nn as nn;
use candle_nn::{Module, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;
use crate::error::SnakeError;
use crate::grid::Dir;
use crate::observation::{STATE_SIZE, State};
use crate::replay::{Replay, Transition};

const ACTIONS: usize = Dir::COUNT;

/// MLP `STATE_SIZE -> hidden -> hidden/2 -> 4` owning its own parameter set.
pub struct QNetwork {
    varmap: VarMap,
    fc1: nn::Linear,
    fc2: nn::Linear,
    out: nn::Linear,
    device: Device,
}

impl QNetwork {
    pub fn new(hidden: usize, device: &Device) -> candle::Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        // IMPORTANT: Scope variable names to avoid collisions across layers.
        let fc1 = nn::linear(STATE_SIZE, hidden, vb.pp("fc1"))?;
        let fc2 = nn::linear(hidden, hidden / 2, vb.pp("fc2"))?;
        let out = nn::linear(hidden / 2, ACTIONS, vb.pp("out"))?;
        Ok(Self { varmap, fc1, fc2, out, device: device.clone() })
    }

    /// `xs`: [batch, STATE_SIZE] -> [batch, ACTIONS]
    pub fn forward(&self, xs: &Tensor) -> candle::Result<Tensor> {
        let x = self.fc1.forward(xs)?.relu()?;
        let x = self.fc2.forward(&x)?.relu()?;
        self.out.forward(&x)
    }

    pub fn q_values(&self, state: &State) -> candle::Result<[f32; ACTIONS]> {
        let x = Tensor::from_slice(&state[..], (1, STATE_SIZE), &self.device)?;
        let q = self.forward(&x)?.squeeze(0)?.to_vec1::<f32>()?;
        let mut out = [0.0; ACTIONS];
        out.copy_from_slice(&q);
        Ok(out)
    }

    /// Hard copy of every parameter of `src` into `self`.
    pub fn copy_from(&self, src: &QNetwork) -> candle::Result<()> {
        let src_vars = src.varmap.data().lock().map_err(|_| candle::Error::Msg("lock failed".into()))?;
        let dst_vars = self.varmap.data().lock().map_err(|_| candle::Error::Msg("lock failed".into()))?;
        for (name, dst) in dst_vars.iter() {
            let v = src_vars.get(name).ok_or_else(|| candle::Error::Msg(format!("missing var {name}")))?;
            dst.set(&v.as_tensor().detach())?;
        }
        Ok(())
    }

    /// Flattened parameters sorted by variable name.
    pub fn parameters(&self) -> candle::Result<Vec<(String, Vec<f32>)>> {
        let vars = self.varmap.data().lock().map_err(|_| candle::Error::Msg("lock failed".into()))?;
        let mut params = Vec::with_capacity(vars.len());
        for (name, var) in vars.iter() {
            params.push((name.clone(), var.as_tensor().flatten_all()?.to_vec1::<f32>()?));
        }
        params.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(params)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> candle::Result<()> {
        self.varmap.save(path)
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> candle::Result<()> {
        self.varmap.load(path)
    }

    fn vars(&self) -> Vec<candle::Var> {
        self.varmap.all_vars()
    }
}

/// Index of the largest value, first one on ties.
pub fn argmax(q: &[f32; ACTIONS]) -> usize {
    let mut best = 0usize;
    for i in 1..ACTIONS {
        if q[i] > q[best] { best = i; }
    }
    best
}

/// Training-only half of the agent: lagged target net, optimizer and experience.
struct Learner {
    target: QNetwork,
    opt: nn::AdamW,
    replay: Replay,
    steps: u64,
}

#[derive(Serialize, Deserialize)]
struct Progress {
    epsilon: f32,
    learn_steps: u64,
}

pub struct DqnAgent {
    online: QNetwork,
    learner: Option<Learner>,
    cfg: AgentConfig,
    epsilon: f32,
    rng: SmallRng,
    device: Device,
}

impl DqnAgent {
    /// A training agent owns a target network, optimizer and replay memory; an inference
    /// agent only has the online net and never explores.
    pub fn new(cfg: &AgentConfig, training: bool, device: &Device, seed: Option<u64>) -> Result<Self, SnakeError> {
        cfg.validate()?;
        let online = QNetwork::new(cfg.hidden, device)?;
        let learner = if training {
            let target = QNetwork::new(cfg.hidden, device)?;
            target.copy_from(&online)?;
            let params = ParamsAdamW { lr: cfg.learning_rate, weight_decay: 0.0, ..Default::default() };
            let opt = nn::AdamW::new(online.vars(), params)?;
            Some(Learner { target, opt, replay: Replay::new(cfg.memory_size), steps: 0 })
        } else {
            None
        };
        let rng = match seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_entropy(),
        };
        Ok(Self {
            online,
            learner,
            cfg: cfg.clone(),
            epsilon: if training { cfg.epsilon_start } else { 0.0 },
            rng,
            device: device.clone(),
        })
    }

    pub fn is_training(&self) -> bool { self.learner.is_some() }
    pub fn epsilon(&self) -> f32 { self.epsilon }
    pub fn online(&self) -> &QNetwork { &self.online }
    pub fn target(&self) -> Option<&QNetwork> { self.learner.as_ref().map(|l| &l.target) }
    pub fn learn_steps(&self) -> u64 { self.learner.as_ref().map_or(0, |l| l.steps) }
    pub fn memory_len(&self) -> usize { self.learner.as_ref().map_or(0, |l| l.replay.len()) }

    pub fn q_values(&self, state: &State) -> candle::Result<[f32; ACTIONS]> {
        self.online.q_values(state)
    }

    /// Epsilon-greedy over the online network.
    pub fn select_action(&mut self, state: &State) -> candle::Result<Dir> {
        if self.rng.r#gen::<f32>() < self.epsilon {
            return Ok(Dir::ALL[self.rng.gen_range(0..ACTIONS)]);
        }
        let q = self.online.q_values(state)?;
        Ok(Dir::ALL[argmax(&q)])
    }

    /// Stores the transition then runs one learning step. No-op for inference agents.
    pub fn update(&mut self, t: Transition) -> candle::Result<Option<f32>> {
        match self.learner.as_mut() {
            Some(l) => l.replay.push(t),
            None => return Ok(None),
        }
        self.learn()
    }

    /// One TD update on a replay minibatch against the target net.
    ///
    /// Returns `None` until the memory holds a full batch. Every `target_update_freq`
    /// learning steps the online weights are copied into the target net.
    pub fn learn(&mut self) -> candle::Result<Option<f32>> {
        let Some(l) = self.learner.as_mut() else { return Ok(None) };
        if l.replay.len() < self.cfg.batch_size {
            return Ok(None);
        }
        let batch = l.replay.sample(self.cfg.batch_size, &mut self.rng);
        let n = batch.len();
        let dev = &self.device;
        let flat = |xs: &[State]| xs.iter().flatten().copied().collect::<Vec<f32>>();
        let s_t = Tensor::from_vec(flat(&batch.states[..]), (n, STATE_SIZE), dev)?;      // [B, S]
        let ns_t = Tensor::from_vec(flat(&batch.next_states[..]), (n, STATE_SIZE), dev)?; // [B, S]
        let a_t = Tensor::from_vec(batch.actions, n, dev)?;                           // [B]
        let r_t = Tensor::from_vec(batch.rewards, n, dev)?;                           // [B]
        let done_t = Tensor::from_vec(batch.dones, n, dev)?;                          // [B]

        let q_a = self.online.forward(&s_t)?.gather(&a_t.unsqueeze(1)?, 1)?.squeeze(1)?; // [B]
        let max_nq = l.target.forward(&ns_t)?.max(1)?.detach();                            // [B]
        let not_done = done_t.affine(-1.0, 1.0)?;
        let target = (r_t + (max_nq.affine(self.cfg.gamma as f64, 0.0)? * not_done)?)?;
        let loss = nn::loss::mse(&q_a, &target.detach())?;

        l.opt.backward_step(&loss)?;
        l.steps += 1;
        if l.steps % self.cfg.target_update_freq == 0 {
            l.target.copy_from(&self.online)?;
            debug!("target network synced at learn step {}", l.steps);
        }
        self.epsilon = (self.epsilon * self.cfg.epsilon_decay).max(self.cfg.epsilon_min);
        Ok(Some(loss.to_scalar::<f32>()?))
    }

    /// Forces the target net to match the online net.
    pub fn sync_target(&mut self) -> candle::Result<()> {
        match &self.learner {
            Some(l) => l.target.copy_from(&self.online),
            None => Ok(()),
        }
    }

    /// Writes the online weights (safetensors) and a JSON progress sidecar.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        self.online.save(path).with_context(|| format!("saving model to {}", path.display()))?;
        let progress = Progress { epsilon: self.epsilon, learn_steps: self.learn_steps() };
        std::fs::write(sidecar(path), serde_json::to_vec_pretty(&progress)?)
            .with_context(|| format!("writing progress for {}", path.display()))?;
        info!("Model saved to {}", path.display());
        Ok(())
    }

    /// Loads online weights; a training agent also resyncs its target and resumes progress.
    pub fn load(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        self.online.load(path).with_context(|| format!("loading model from {}", path.display()))?;
        self.sync_target()?;
        if let Some(l) = self.learner.as_mut() {
            if let Ok(raw) = std::fs::read(sidecar(path)) {
                let p: Progress = serde_json::from_slice(&raw).context("parsing progress sidecar")?;
                self.epsilon = p.epsilon;
                l.steps = p.learn_steps;
            }
        }
        info!("Model loaded from {}", path.display());
        Ok(())
    }
}

fn sidecar(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

pub fn preferred_device() -> Device {
    // Try CUDA if feature enabled, else CPU
    #[cfg(feature = "dqn-gpu-cuda")]
    if let Ok(dev) = Device::new_cuda(0) { return dev; }
    Device::Cpu
}
