use std::time::Instant;

use log::info;

use crate::episode::{EpisodeSummary, Observer};

/// Episode-boundary statistics: final lengths, running record, periodic log report.
pub struct TrainingStats {
    lengths: Vec<usize>,
    records: Vec<usize>,
    max_length: usize,
    epsilon: f32,
    report_every: usize,
    window: usize,
    started: Instant,
}

impl Default for TrainingStats {
    fn default() -> Self {
        Self::new(100, 20)
    }
}

impl TrainingStats {
    pub fn new(report_every: usize, window: usize) -> Self {
        Self {
            lengths: Vec::new(),
            records: Vec::new(),
            max_length: 0,
            epsilon: 0.0,
            report_every: report_every.max(1),
            window: window.max(1),
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, length: usize, epsilon: f32) {
        self.lengths.push(length);
        self.max_length = self.max_length.max(length);
        self.records.push(self.max_length);
        self.epsilon = epsilon;
        if self.lengths.len() % self.report_every == 0 {
            self.report();
        }
    }

    pub fn episodes(&self) -> usize { self.lengths.len() }
    pub fn lengths(&self) -> &[usize] { &self.lengths }
    pub fn records(&self) -> &[usize] { &self.records }
    pub fn max_length(&self) -> usize { self.max_length }

    /// Mean of the last `n` lengths.
    pub fn recent_mean(&self, n: usize) -> f64 {
        let tail = &self.lengths[self.lengths.len().saturating_sub(n)..];
        if tail.is_empty() {
            return 0.0;
        }
        tail.iter().sum::<usize>() as f64 / tail.len() as f64
    }

    /// Sliding mean over `window` episodes; empty until that many were recorded.
    pub fn moving_average(&self) -> Vec<f64> {
        self.lengths
            .windows(self.window)
            .map(|w| w.iter().sum::<usize>() as f64 / w.len() as f64)
            .collect()
    }

    pub fn report(&self) {
        info!("=== Episode stats {} ===", self.episodes());
        info!("Time elapsed: {:.1?}", self.started.elapsed());
        info!("Mean length ({} last): {:.2}", self.report_every, self.recent_mean(self.report_every));
        info!("Length record: {}", self.max_length);
        info!("Agent epsilon: {:.4}", self.epsilon);
    }
}

impl Observer for TrainingStats {
    fn on_episode_end(&mut self, summary: &EpisodeSummary) {
        self.record(summary.length, summary.epsilon);
    }
}
