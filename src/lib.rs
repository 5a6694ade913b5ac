//! Hit capture and energy-deposit tallies for particle transport runs.
//!
//! A [`GeometryModel`] is built once, its sensitive volumes are indexed by a
//! [`SensitiveIndex`], and a [`RunManager`] then drives a pool of workers that
//! turn the step stream of a [`TransportEngine`] into per-event
//! [`EventSummary`] values and merged [`RunStatistics`].

pub mod bounding_box;
pub mod config;
pub mod error;
pub mod event;
pub mod fast_rng;
pub mod geometry;
pub mod hit;
pub mod output;
pub mod run;
pub mod sensitive;
pub mod settings;
pub mod stats;
pub mod step;
pub mod tallies;
pub mod transport;
pub mod volume;

pub use config::{AnalysisConfig, SimulationConfig};
pub use error::{ConfigError, Error, GeometryError, InvalidStateError, OutputError, Result};
pub use event::{EventAccumulator, EventSummary};
pub use fast_rng::FastRng;
pub use geometry::{ChamberTrackerConfig, GeometryConfig, GeometryDescription, GeometryModel};
pub use hit::{HitCollector, HitRecord, StepScorer};
pub use output::{AnalysisSink, MemorySink, OutputSink};
pub use run::{RunManager, Worker};
pub use sensitive::{DetectorId, SensitiveIndex};
pub use settings::{RunSettings, ShardPolicy};
pub use stats::{AccumulatorState, RunAccumulator, RunStatistics};
pub use step::{StepInfo, StepPoint};
pub use transport::{PencilBeam, TransportEngine};
pub use volume::{Shape, Volume, VolumeId, VolumeRole};
