use serde::{Deserialize, Serialize};

use crate::event::EventSummary;

/// Per-event quantity that can be written as a column or histogrammed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    EventId,
    /// Total deposit (MeV)
    Edep,
    /// Energy-weighted hit centroid (mm)
    PosX,
    PosY,
    PosZ,
    /// Earliest hit time (ns)
    Time,
    HitCount,
}

impl Quantity {
    pub fn column_name(&self) -> &'static str {
        match self {
            Quantity::EventId => "eventId",
            Quantity::Edep => "edep",
            Quantity::PosX => "posX",
            Quantity::PosY => "posY",
            Quantity::PosZ => "posZ",
            Quantity::Time => "time",
            Quantity::HitCount => "hits",
        }
    }

    /// Value for one event; None when the event has no hits to locate.
    pub fn value(&self, summary: &EventSummary) -> Option<f64> {
        match self {
            Quantity::EventId => Some(summary.event_id as f64),
            Quantity::Edep => Some(summary.total_edep),
            Quantity::PosX => summary.centroid.map(|c| c.x),
            Quantity::PosY => summary.centroid.map(|c| c.y),
            Quantity::PosZ => summary.centroid.map(|c| c.z),
            Quantity::Time => summary.first_hit_time,
            Quantity::HitCount => Some(summary.hit_count as f64),
        }
    }

    /// Text cell for a row table; missing values are empty.
    pub fn cell(&self, summary: &EventSummary) -> String {
        match self {
            Quantity::EventId => summary.event_id.to_string(),
            Quantity::HitCount => summary.hit_count.to_string(),
            other => other.value(summary).map(|v| v.to_string()).unwrap_or_default(),
        }
    }
}

/// Row-per-event table layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ntuple {
    pub name: String,
    pub title: String,
    pub columns: Vec<Quantity>,
}

impl Default for Ntuple {
    fn default() -> Self {
        Self {
            name: "hits".to_string(),
            title: "Hit data".to_string(),
            columns: vec![
                Quantity::EventId,
                Quantity::Edep,
                Quantity::PosX,
                Quantity::PosY,
                Quantity::PosZ,
                Quantity::Time,
            ],
        }
    }
}

impl Ntuple {
    pub fn header(&self) -> Vec<&'static str> {
        self.columns.iter().map(Quantity::column_name).collect()
    }

    pub fn row(&self, summary: &EventSummary) -> Vec<String> {
        self.columns.iter().map(|q| q.cell(summary)).collect()
    }
}
