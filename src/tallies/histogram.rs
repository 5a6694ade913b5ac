use serde::{Deserialize, Serialize};

use crate::event::EventSummary;
use crate::tallies::bins::BinEdges;
use crate::tallies::ntuple::Quantity;

/// Booking of a one-dimensional histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct H1Booking {
    pub name: String,
    pub title: String,
    pub quantity: Quantity,
    pub bins: usize,
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub unit: String,
}

/// Booking of a two-dimensional histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct H2Booking {
    pub name: String,
    pub title: String,
    pub x: Quantity,
    pub x_bins: usize,
    pub x_min: f64,
    pub x_max: f64,
    pub y: Quantity,
    pub y_bins: usize,
    pub y_min: f64,
    pub y_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct H1 {
    pub name: String,
    pub title: String,
    pub unit: String,
    pub quantity: Quantity,
    pub bins: BinEdges,
    pub counts: Vec<f64>,
    pub underflow: f64,
    pub overflow: f64,
    pub entries: u64,
    sum_w: f64,
    sum_wx: f64,
    sum_wx2: f64,
}

impl H1 {
    pub fn book(booking: &H1Booking) -> Result<Self, String> {
        let bins = BinEdges::uniform(booking.bins, booking.min, booking.max)
            .map_err(|e| format!("histogram '{}': {}", booking.name, e))?;
        Ok(Self {
            name: booking.name.clone(),
            title: booking.title.clone(),
            unit: booking.unit.clone(),
            quantity: booking.quantity,
            counts: vec![0.0; bins.num_bins()],
            bins,
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
            sum_w: 0.0,
            sum_wx: 0.0,
            sum_wx2: 0.0,
        })
    }

    pub fn fill(&mut self, x: f64, weight: f64) {
        self.entries += 1;
        match self.bins.get_bin(x) {
            Some(i) => {
                self.counts[i] += weight;
                self.sum_w += weight;
                self.sum_wx += weight * x;
                self.sum_wx2 += weight * x * x;
            }
            None if x < self.bins.min() => self.underflow += weight,
            None => self.overflow += weight,
        }
    }

    /// Fill from an event if the booked quantity is defined for it.
    pub fn fill_event(&mut self, summary: &EventSummary) {
        if let Some(x) = self.quantity.value(summary) {
            self.fill(x, 1.0);
        }
    }

    /// Mean of in-range entries.
    pub fn mean(&self) -> f64 {
        if self.sum_w > 0.0 {
            self.sum_wx / self.sum_w
        } else {
            0.0
        }
    }

    pub fn std_dev(&self) -> f64 {
        if self.sum_w > 0.0 {
            let mean = self.mean();
            (self.sum_wx2 / self.sum_w - mean * mean).max(0.0).sqrt()
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct H2 {
    pub name: String,
    pub title: String,
    pub x_quantity: Quantity,
    pub y_quantity: Quantity,
    pub x_bins: BinEdges,
    pub y_bins: BinEdges,
    /// Row-major, x index outer
    pub counts: Vec<f64>,
    pub outside: f64,
    pub entries: u64,
}

impl H2 {
    pub fn book(booking: &H2Booking) -> Result<Self, String> {
        let named = |e: String| format!("histogram '{}': {}", booking.name, e);
        let x_bins = BinEdges::uniform(booking.x_bins, booking.x_min, booking.x_max).map_err(named)?;
        let y_bins = BinEdges::uniform(booking.y_bins, booking.y_min, booking.y_max).map_err(named)?;
        Ok(Self {
            name: booking.name.clone(),
            title: booking.title.clone(),
            x_quantity: booking.x,
            y_quantity: booking.y,
            counts: vec![0.0; x_bins.num_bins() * y_bins.num_bins()],
            x_bins,
            y_bins,
            outside: 0.0,
            entries: 0,
        })
    }

    pub fn fill(&mut self, x: f64, y: f64, weight: f64) {
        self.entries += 1;
        match (self.x_bins.get_bin(x), self.y_bins.get_bin(y)) {
            (Some(i), Some(j)) => self.counts[i * self.y_bins.num_bins() + j] += weight,
            _ => self.outside += weight,
        }
    }

    pub fn fill_event(&mut self, summary: &EventSummary) {
        if let (Some(x), Some(y)) = (self.x_quantity.value(summary), self.y_quantity.value(summary)) {
            self.fill(x, y, 1.0);
        }
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.counts[i * self.y_bins.num_bins() + j]
    }
}
