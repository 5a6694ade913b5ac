use nalgebra::Vector3;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::hit::HitRecord;
use crate::sensitive::DetectorId;

/// Per-event reduction of the hits collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub event_id: u64,
    /// Total energy deposit (MeV)
    pub total_edep: f64,
    pub hit_count: usize,
    pub edep_by_detector: BTreeMap<DetectorId, f64>,
    /// Energy-weighted mean hit position; None without hits
    pub centroid: Option<Vector3<f64>>,
    /// Earliest hit global time; None without hits
    pub first_hit_time: Option<f64>,
}

impl EventSummary {
    pub fn empty(event_id: u64) -> Self {
        Self {
            event_id,
            total_edep: 0.0,
            hit_count: 0,
            edep_by_detector: BTreeMap::new(),
            centroid: None,
            first_hit_time: None,
        }
    }
}

/// Reduces one event's hits to an `EventSummary`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventAccumulator {
    /// Also count deposit from steps outside sensitive volumes
    pub include_non_sensitive: bool,
}

impl EventAccumulator {
    pub fn new(include_non_sensitive: bool) -> Self {
        Self {
            include_non_sensitive,
        }
    }

    pub fn summarize(&self, event_id: u64, hits: &[HitRecord], non_sensitive_edep: f64) -> EventSummary {
        let mut summary = EventSummary::empty(event_id);
        let mut weighted = Vector3::zeros();
        let mut hit_edep = 0.0;

        for hit in hits {
            hit_edep += hit.energy_deposit;
            weighted += hit.position * hit.energy_deposit;
            *summary.edep_by_detector.entry(hit.detector_id).or_insert(0.0) += hit.energy_deposit;
            summary.first_hit_time = Some(match summary.first_hit_time {
                Some(t) => t.min(hit.global_time),
                None => hit.global_time,
            });
        }

        summary.hit_count = hits.len();
        if hit_edep > 0.0 {
            summary.centroid = Some(weighted / hit_edep);
        }
        summary.total_edep = hit_edep;
        if self.include_non_sensitive {
            summary.total_edep += non_sensitive_edep;
        }
        summary
    }
}
