use serde::Serialize;

/// Fixed bucket edges [E0, E1, ..., En] giving bins [E0, E1), ..., [En-1, En).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinEdges {
    pub edges: Vec<f64>,
}

impl BinEdges {
    /// Edges must be strictly ascending, at least two of them.
    pub fn new(edges: Vec<f64>) -> Result<Self, String> {
        if edges.len() < 2 {
            return Err("at least 2 bin edges are required (to create at least 1 bin)".to_string());
        }
        if edges.windows(2).any(|w| !(w[1] > w[0])) {
            return Err("bin edges must be in strictly ascending order".to_string());
        }
        Ok(Self { edges })
    }

    /// `bins` equal-width buckets over [min, max).
    pub fn uniform(bins: usize, min: f64, max: f64) -> Result<Self, String> {
        if bins == 0 {
            return Err("number of bins must be positive".to_string());
        }
        if !(min.is_finite() && max.is_finite() && max > min) {
            return Err(format!("invalid range [{}, {})", min, max));
        }
        let width = (max - min) / bins as f64;
        let mut edges: Vec<f64> = (0..bins).map(|i| min + i as f64 * width).collect();
        edges.push(max);
        Self::new(edges)
    }

    /// Index of the bucket holding `value`, None outside [first, last).
    pub fn get_bin(&self, value: f64) -> Option<usize> {
        let last = self.edges[self.edges.len() - 1];
        if !(value >= self.edges[0] && value < last) {
            return None;
        }
        // First edge strictly above value, minus one
        let upper = self.edges.partition_point(|&edge| edge <= value);
        upper.checked_sub(1)
    }

    pub fn num_bins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn min(&self) -> f64 {
        self.edges[0]
    }

    pub fn max(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }
}
