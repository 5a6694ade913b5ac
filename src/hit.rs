use log::debug;
use nalgebra::Vector3;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::sensitive::{DetectorId, SensitiveIndex};
use crate::step::StepInfo;

/// Energy deposit recorded for one qualifying step in a sensitive volume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitRecord {
    pub event_id: u64,
    pub track_id: i32,
    pub parent_id: i32,
    pub particle: String,
    pub pdg_code: i32,
    pub detector_id: DetectorId,
    pub copy_number: u32,
    pub position: Vector3<f64>,
    pub momentum: Vector3<f64>,
    pub kinetic_energy: f64,
    pub energy_deposit: f64,
    pub global_time: f64,
    pub local_time: f64,
    pub process: Option<String>,
}

impl fmt::Display for HitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hit: chamber={} track={} particle={} edep={:.4} keV pos=({:.2}, {:.2}, {:.2}) mm time={:.3} ns",
            self.copy_number,
            self.track_id,
            self.particle,
            self.energy_deposit * 1000.0,
            self.position.x,
            self.position.y,
            self.position.z,
            self.global_time
        )
    }
}

/// Something that can turn transport steps into hits.
pub trait StepScorer {
    /// Inspect one step. Returns true when the step produced a hit.
    fn on_step(&mut self, step: &StepInfo) -> bool;
}

/// Per-worker hit buffer for the event in progress.
///
/// The buffer is reused from one event to the next: `begin_event` drops the
/// previous event's hits in one go and keeps the allocation.
#[derive(Debug)]
pub struct HitCollector {
    index: Arc<SensitiveIndex>,
    threshold: f64,
    verbose: u8,
    event_id: u64,
    hits: Vec<HitRecord>,
    non_sensitive_edep: f64,
}

impl HitCollector {
    /// `threshold` is the deposit a step must exceed to make a hit; negative
    /// values are treated as 0.
    pub fn new(index: Arc<SensitiveIndex>, threshold: f64) -> Self {
        Self {
            index,
            threshold: threshold.max(0.0),
            verbose: 0,
            event_id: 0,
            hits: Vec::new(),
            non_sensitive_edep: 0.0,
        }
    }

    pub fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn begin_event(&mut self, event_id: u64) {
        self.event_id = event_id;
        self.hits.clear();
        self.non_sensitive_edep = 0.0;
    }

    pub fn event_id(&self) -> u64 {
        self.event_id
    }

    /// Hits of the current event in step order.
    pub fn finish(&self) -> &[HitRecord] {
        &self.hits
    }

    /// Log the hit count per collection when verbose, and every hit above
    /// verbose level 1.
    pub fn log_event(&self, worker: usize) {
        if self.verbose == 0 {
            return;
        }
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for hit in &self.hits {
            if let Some(entry) = self.index.entry(hit.detector_id) {
                *counts.entry(entry.collection_name.as_str()).or_default() += 1;
            }
        }
        for (collection, n) in &counts {
            debug!(
                "Worker {} event {}: SD {}: {} hits",
                worker, self.event_id, collection, n
            );
        }
        if self.verbose > 1 && !self.hits.is_empty() {
            debug!("---------- Hit Details (event {}) ----------", self.event_id);
            for hit in &self.hits {
                debug!("{}", hit);
            }
        }
    }

    /// Deposit from steps outside any sensitive volume in the current event.
    pub fn non_sensitive_edep(&self) -> f64 {
        self.non_sensitive_edep
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

impl StepScorer for HitCollector {
    fn on_step(&mut self, step: &StepInfo) -> bool {
        let edep = step.energy_deposit;
        if edep.is_nan() || edep <= 0.0 {
            return false;
        }
        let detector_id = match self.index.detector_id(step.volume) {
            Some(id) => id,
            None => {
                self.non_sensitive_edep += edep;
                return false;
            }
        };
        if edep <= self.threshold {
            return false;
        }

        self.hits.push(HitRecord {
            event_id: self.event_id,
            track_id: step.track_id,
            parent_id: step.parent_id,
            particle: step.particle.clone(),
            pdg_code: step.pdg_code,
            detector_id,
            copy_number: step.copy_number,
            position: step.pre.position,
            momentum: step.pre.momentum,
            kinetic_energy: step.pre.kinetic_energy,
            energy_deposit: edep,
            global_time: step.pre.global_time,
            local_time: step.pre.local_time,
            process: step.process.clone(),
        });
        true
    }
}
