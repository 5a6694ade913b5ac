use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::InvalidStateError;
use crate::event::EventSummary;

/// Lifecycle of a `RunAccumulator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccumulatorState {
    Idle,
    Accumulating,
    Merged,
}

/// Sufficient statistics of the per-event deposit for one worker (or, after
/// merging, for the whole run).
///
/// A worker's accumulator is owned by that worker alone for the whole run, so
/// there is no interior locking. Cross-worker combination happens only through
/// `merge_from` on the master after every worker has finished.
#[derive(Debug, Clone, PartialEq)]
pub struct RunAccumulator {
    state: AccumulatorState,
    sum_edep: f64,
    sum_edep2: f64,
    event_count: u64,
}

impl Default for RunAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl RunAccumulator {
    pub fn new() -> Self {
        Self {
            state: AccumulatorState::Idle,
            sum_edep: 0.0,
            sum_edep2: 0.0,
            event_count: 0,
        }
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    pub fn sum_edep(&self) -> f64 {
        self.sum_edep
    }

    pub fn sum_edep2(&self) -> f64 {
        self.sum_edep2
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Zero the sums and start accumulating. Allowed from any state.
    pub fn reset(&mut self) {
        self.state = AccumulatorState::Accumulating;
        self.sum_edep = 0.0;
        self.sum_edep2 = 0.0;
        self.event_count = 0;
    }

    pub fn update(&mut self, summary: &EventSummary) -> Result<(), InvalidStateError> {
        self.add_edep(summary.total_edep)
    }

    /// Record one event's total deposit.
    pub fn add_edep(&mut self, edep: f64) -> Result<(), InvalidStateError> {
        self.require("update", &[AccumulatorState::Accumulating])?;
        self.sum_edep += edep;
        self.sum_edep2 += edep * edep;
        self.event_count += 1;
        Ok(())
    }

    /// Fold another accumulator's sums into this one (field-wise addition).
    ///
    /// `self` must be accumulating or already merged; `other` must have been
    /// reset at least once. Leaves `self` in the `Merged` state.
    pub fn merge_from(&mut self, other: &RunAccumulator) -> Result<(), InvalidStateError> {
        self.require(
            "merge into",
            &[AccumulatorState::Accumulating, AccumulatorState::Merged],
        )?;
        other.require(
            "merge from",
            &[AccumulatorState::Accumulating, AccumulatorState::Merged],
        )?;
        self.sum_edep += other.sum_edep;
        self.sum_edep2 += other.sum_edep2;
        self.event_count += other.event_count;
        self.state = AccumulatorState::Merged;
        Ok(())
    }

    /// Run statistics from the merged sums.
    pub fn derive(&self) -> Result<RunStatistics, InvalidStateError> {
        self.require("derive", &[AccumulatorState::Merged])?;
        Ok(RunStatistics::from_sums(
            self.sum_edep,
            self.sum_edep2,
            self.event_count,
        ))
    }

    fn require(
        &self,
        operation: &'static str,
        allowed: &[AccumulatorState],
    ) -> Result<(), InvalidStateError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            // Contract violations abort debug builds outside unit tests.
            debug_assert!(
                cfg!(test),
                "accumulator contract violated: cannot {} while {:?}",
                operation,
                self.state
            );
            Err(InvalidStateError {
                operation,
                state: self.state,
            })
        }
    }
}

/// Run-level deposit statistics (MeV).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub event_count: u64,
    pub total_edep: f64,
    pub sum_edep2: f64,
    pub mean_edep: f64,
    /// `sqrt(max(0, sum2 - sum^2/N)) / N`, without Bessel correction
    pub rms: f64,
    /// Output rows lost to sink errors during the run
    pub dropped_rows: u64,
}

impl RunStatistics {
    /// Zero events yield mean 0 and rms 0.
    pub fn from_sums(sum_edep: f64, sum_edep2: f64, event_count: u64) -> Self {
        let (mean_edep, rms) = if event_count == 0 {
            (0.0, 0.0)
        } else {
            let n = event_count as f64;
            let spread = sum_edep2 - sum_edep * sum_edep / n;
            (sum_edep / n, spread.max(0.0).sqrt() / n)
        };
        Self {
            event_count,
            total_edep: sum_edep,
            sum_edep2,
            mean_edep,
            rms,
            dropped_rows: 0,
        }
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--------------------End of Run------------------------------")?;
        writeln!(f, " Events processed:       {}", self.event_count)?;
        writeln!(f, " Total energy deposited: {:.6} MeV", self.total_edep)?;
        writeln!(
            f,
            " Mean energy per event:  {:.6} MeV +/- {:.6} MeV",
            self.mean_edep, self.rms
        )?;
        if self.dropped_rows > 0 {
            writeln!(f, " Dropped output rows:    {}", self.dropped_rows)?;
        }
        write!(f, "------------------------------------------------------------")
    }
}
