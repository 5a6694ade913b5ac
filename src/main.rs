//! # edep-tally
//!
//! Runs the pencil-beam demo engine through a chamber tracker (or a JSON
//! geometry description) and writes per-event rows, histograms and the run
//! summary.
//!
//! ```bash
//! edep-tally --events 1000 --workers 4 --output out/
//! edep-tally --config run.json --geometry detector.json -v 2
//! ```

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use edep_tally::{
    AnalysisSink, Error, GeometryConfig, GeometryModel, PencilBeam, RunManager, SimulationConfig,
};

/// Energy deposit tallies for a chamber tracker
#[derive(Parser, Debug)]
#[command(name = "edep-tally", version)]
#[command(about = "Collect sensitive-volume hits and run statistics on a pool of workers")]
struct Args {
    /// JSON run configuration (geometry, run, analysis)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// JSON geometry description, replaces the configured geometry
    #[arg(long, short = 'g')]
    geometry: Option<PathBuf>,

    /// Number of chambers in the parametric tracker
    #[arg(long)]
    chambers: Option<u32>,

    /// Number of events to process
    #[arg(long, short = 'n')]
    events: Option<u64>,

    /// Worker threads
    #[arg(long, short = 'j')]
    workers: Option<usize>,

    /// Base random seed
    #[arg(long, short = 's')]
    seed: Option<u64>,

    /// Output directory
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Minimum deposit for a hit (MeV)
    #[arg(long)]
    threshold: Option<f64>,

    /// Count deposit outside sensitive volumes in the event total
    #[arg(long)]
    include_non_sensitive: bool,

    /// Skip the sibling overlap check
    #[arg(long)]
    no_overlap_check: bool,

    /// Verbose level; 2 dumps every hit
    #[arg(long, short = 'v', default_value = "0")]
    verbose: u8,
}

impl Args {
    fn apply(&self, config: &mut SimulationConfig) {
        if let Some(path) = &self.geometry {
            config.geometry = GeometryConfig::File { path: path.clone() };
        }
        if let GeometryConfig::Parametric(tracker) = &mut config.geometry {
            if let Some(chambers) = self.chambers {
                tracker.chambers = chambers;
            }
            if self.no_overlap_check {
                tracker.check_overlaps = false;
            }
        }
        if let GeometryConfig::Described(description) = &mut config.geometry {
            if self.no_overlap_check {
                description.check_overlaps = false;
            }
        }
        if let Some(events) = self.events {
            config.run.events = events;
        }
        if let Some(workers) = self.workers {
            config.run.workers = workers;
        }
        if let Some(seed) = self.seed {
            config.run.seed = seed;
        }
        if let Some(threshold) = self.threshold {
            config.run.threshold = threshold;
        }
        if self.include_non_sensitive {
            config.run.include_non_sensitive = true;
        }
        if self.verbose > 0 {
            config.run.verbose = self.verbose;
        }
        if let Some(output) = &self.output {
            config.analysis.output_dir = output.clone();
        }
    }
}

/// Returns whether every output file was written.
fn run(config: SimulationConfig) -> Result<bool, Error> {
    let geometry = Arc::new(GeometryModel::build(&config.geometry)?);
    let engine = PencilBeam::new(Arc::clone(&geometry), config.run.seed);
    let mut manager = RunManager::new(geometry, config.run);
    let mut sink = AnalysisSink::new(config.analysis);

    let stats = manager.run(&engine, &mut sink)?;
    println!("{}", stats);
    if manager.summary_failed() {
        error!("Output in {} is incomplete", sink.output_dir().display());
        return Ok(false);
    }
    info!("Output written to {}", sink.output_dir().display());
    Ok(true)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match SimulationConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                return ExitCode::from(1);
            }
        },
        None => SimulationConfig::default(),
    };
    args.apply(&mut config);
    let shown = config.to_json_pretty();

    match run(config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(Error::Geometry(e)) => {
            error!("{}", e);
            eprintln!("Offending configuration:\n{}", shown);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(1)
        }
    }
}
