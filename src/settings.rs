use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How the event range is split across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardPolicy {
    /// Worker k gets one contiguous block of events
    #[default]
    Contiguous,
    /// Event i goes to worker i mod n
    Interleaved,
}

impl ShardPolicy {
    /// Event ids handled by `worker` out of `workers` for a run of `events`.
    pub fn events_for(&self, worker: usize, workers: usize, events: u64) -> Vec<u64> {
        let workers = workers.max(1);
        if worker >= workers {
            return Vec::new();
        }
        match self {
            ShardPolicy::Contiguous => contiguous_block(worker, workers, events).collect(),
            ShardPolicy::Interleaved => (worker as u64..events).step_by(workers).collect(),
        }
    }
}

/// Blocks differ in size by at most one; the first `events % workers` get the extra event.
fn contiguous_block(worker: usize, workers: usize, events: u64) -> Range<u64> {
    let n = workers as u64;
    let k = worker as u64;
    let base = events / n;
    let extra = events % n;
    let start = k * base + k.min(extra);
    let len = base + u64::from(k < extra);
    start..start + len
}

/// Run-control parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub workers: usize,
    pub events: u64,
    pub seed: u64,
    /// Hits require a deposit strictly above this (MeV)
    pub threshold: f64,
    pub include_non_sensitive: bool,
    pub shard_policy: ShardPolicy,
    pub verbose: u8,
    /// Log progress every this many events; 0 disables
    pub progress_interval: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            events: 10,
            seed: 1,
            threshold: 0.0,
            include_non_sensitive: false,
            shard_policy: ShardPolicy::Contiguous,
            verbose: 0,
            progress_interval: 100,
        }
    }
}

impl RunSettings {
    /// Worker count actually used: never zero, never more than events (but at least one).
    pub fn effective_workers(&self) -> usize {
        let wanted = self.workers.max(1) as u64;
        wanted.min(self.events.max(1)) as usize
    }
}
