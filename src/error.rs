//! Error types for geometry construction, accumulator sequencing and output

use thiserror::Error;

use crate::stats::AccumulatorState;

/// Fatal problems found while building the volume tree.
///
/// Any of these aborts construction before a run starts.
#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("Invalid setup: chamber spacing {spacing} mm is smaller than chamber width {width} mm")]
    SpacingSmallerThanWidth { spacing: f64, width: f64 },

    #[error("Overlap detected in mother volume '{mother}': '{first}' overlaps '{second}'")]
    Overlap {
        mother: String,
        first: String,
        second: String,
    },

    #[error("Duplicate placement '{name}' with copy number {copy_number} in mother volume '{mother}'")]
    DuplicatePlacement {
        mother: String,
        name: String,
        copy_number: u32,
    },

    #[error("Invalid shape for volume '{name}': {reason}")]
    InvalidShape { name: String, reason: String },

    #[error("Geometry description contains no volumes")]
    Empty,

    #[error("Failed to read geometry description: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse geometry description: {0}")]
    Parse(#[from] serde_json::Error),
}

/// An accumulator operation was called in a state that does not allow it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid accumulator state: cannot {operation} while {state:?}")]
pub struct InvalidStateError {
    pub operation: &'static str,
    pub state: AccumulatorState,
}

/// Output sink failures. Recovered by the run controller for per-event rows.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid booking: {0}")]
    InvalidBooking(String),

    #[error("Output sink used before booking")]
    NotBooked,

    #[error("Run summary already recorded for run {0}")]
    SummaryAlreadyRecorded(u32),
}

/// Run configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, Error>;
