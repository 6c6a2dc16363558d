use rand::Rng;

use crate::observation::State;

/// One unit of experience.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: State,
    pub action: usize,
    pub reward: f32,
    pub next_state: State,
    pub done: bool,
}

/// Parallel columns of a sampled minibatch.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    pub states: Vec<State>,
    pub actions: Vec<u32>,
    pub rewards: Vec<f32>,
    pub next_states: Vec<State>,
    pub dones: Vec<f32>,
}

impl Batch {
    pub fn len(&self) -> usize { self.actions.len() }
    pub fn is_empty(&self) -> bool { self.actions.is_empty() }
}

/// Fixed-capacity ring buffer; the write cursor wraps and overwrites the oldest entry.
pub struct Replay {
    s: Vec<State>,
    a: Vec<u32>,
    r: Vec<f32>,
    ns: Vec<State>,
    done: Vec<f32>,
    cap: usize,
    idx: usize,
}

impl Replay {
    pub fn new(cap: usize) -> Self {
        assert!(cap > 0, "replay capacity must be positive");
        Self {
            s: Vec::with_capacity(cap),
            a: Vec::with_capacity(cap),
            r: Vec::with_capacity(cap),
            ns: Vec::with_capacity(cap),
            done: Vec::with_capacity(cap),
            cap,
            idx: 0,
        }
    }

    pub fn push(&mut self, t: Transition) {
        let done = if t.done { 1.0 } else { 0.0 };
        if self.s.len() == self.cap {
            let i = self.idx;
            self.s[i] = t.state;
            self.a[i] = t.action as u32;
            self.r[i] = t.reward;
            self.ns[i] = t.next_state;
            self.done[i] = done;
        } else {
            self.s.push(t.state); self.a.push(t.action as u32); self.r.push(t.reward); self.ns.push(t.next_state); self.done.push(done);
        }
        self.idx = (self.idx + 1) % self.cap;
    }

    pub fn len(&self) -> usize { self.s.len() }
    pub fn is_empty(&self) -> bool { self.s.is_empty() }
    pub fn capacity(&self) -> usize { self.cap }

    pub fn get(&self, i: usize) -> Option<Transition> {
        (i < self.len()).then(|| Transition {
            state: self.s[i],
            action: self.a[i] as usize,
            reward: self.r[i],
            next_state: self.ns[i],
            done: self.done[i] != 0.0,
        })
    }

    /// `min(n, len)` indices drawn uniformly with replacement from `[0, len)`.
    pub fn sample_indices<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<usize> {
        let len = self.len();
        if len == 0 {
            return Vec::new();
        }
        (0..n.min(len)).map(|_| rng.gen_range(0..len)).collect()
    }

    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Batch {
        let idxs = self.sample_indices(n, rng);
        let mut b = Batch {
            states: Vec::with_capacity(idxs.len()),
            actions: Vec::with_capacity(idxs.len()),
            rewards: Vec::with_capacity(idxs.len()),
            next_states: Vec::with_capacity(idxs.len()),
            dones: Vec::with_capacity(idxs.len()),
        };
        for i in idxs {
            b.states.push(self.s[i]);
            b.actions.push(self.a[i]);
            b.rewards.push(self.r[i]);
            b.next_states.push(self.ns[i]);
            b.dones.push(self.done[i]);
        }
        b
    }
}
