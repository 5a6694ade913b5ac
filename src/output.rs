//! Output sinks for event summaries and run statistics.
//!
//! A sink is owned by the run controller and only ever touched from the
//! controller's thread. Per-event failures are reported back as
//! `OutputError` for the controller to log and count; they never end a run.

use csv::Writer;
use log::{debug, info};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::AnalysisConfig;
use crate::error::OutputError;
use crate::event::EventSummary;
use crate::stats::RunStatistics;
use crate::tallies::{Ntuple, H1, H2};

/// Receives the event stream and the final statistics of a run.
pub trait OutputSink {
    /// Prepare for a new run. Clears anything booked for a previous run.
    fn book(&mut self, run_id: u32) -> Result<(), OutputError>;

    fn record_event(&mut self, summary: &EventSummary) -> Result<(), OutputError>;

    /// Called once per run after all workers merged; flushes everything.
    fn record_run_summary(&mut self, stats: &RunStatistics) -> Result<(), OutputError>;
}

struct OpenRun {
    run_id: u32,
    rows: Writer<BufWriter<File>>,
    h1: Vec<H1>,
    h2: Vec<H2>,
    summary_written: bool,
}

/// Writes CSV files and a JSON run summary under the configured directory.
///
/// Files per run: `{stem}_nt_{ntuple}.csv`, `{stem}_h1_{name}.csv` for each
/// 1D histogram, `{stem}_h2_{name}.csv` for each 2D histogram and
/// `{stem}_run.json`.
pub struct AnalysisSink {
    config: AnalysisConfig,
    run: Option<OpenRun>,
}

impl AnalysisSink {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config, run: None }
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    pub fn ntuple_path(&self) -> PathBuf {
        self.file(&format!("nt_{}.csv", self.config.ntuple.name))
    }

    pub fn h1_path(&self, name: &str) -> PathBuf {
        self.file(&format!("h1_{}.csv", name))
    }

    pub fn h2_path(&self, name: &str) -> PathBuf {
        self.file(&format!("h2_{}.csv", name))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.file("run.json")
    }

    fn file(&self, suffix: &str) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{}_{}", self.config.file_stem, suffix))
    }

    fn write_histograms(&self, run: &OpenRun) -> Result<(), OutputError> {
        for h in &run.h1 {
            let mut w = Writer::from_path(self.h1_path(&h.name))?;
            w.write_record(["bin", "low", "high", "content"])?;
            w.write_record([
                "underflow".to_string(),
                String::new(),
                h.bins.min().to_string(),
                h.underflow.to_string(),
            ])?;
            for (i, content) in h.counts.iter().enumerate() {
                w.write_record([
                    i.to_string(),
                    h.bins.edges[i].to_string(),
                    h.bins.edges[i + 1].to_string(),
                    content.to_string(),
                ])?;
            }
            w.write_record([
                "overflow".to_string(),
                h.bins.max().to_string(),
                String::new(),
                h.overflow.to_string(),
            ])?;
            w.flush()?;
            debug!(
                "H1 {}: {} entries, mean {:.4} {}, std dev {:.4}",
                h.name,
                h.entries,
                h.mean(),
                h.unit,
                h.std_dev()
            );
        }
        for h in &run.h2 {
            let mut w = Writer::from_path(self.h2_path(&h.name))?;
            w.write_record(["xbin", "ybin", "xlow", "ylow", "content"])?;
            for i in 0..h.x_bins.num_bins() {
                for j in 0..h.y_bins.num_bins() {
                    w.write_record([
                        i.to_string(),
                        j.to_string(),
                        h.x_bins.edges[i].to_string(),
                        h.y_bins.edges[j].to_string(),
                        h.get(i, j).to_string(),
                    ])?;
                }
            }
            w.flush()?;
        }
        Ok(())
    }
}

impl OutputSink for AnalysisSink {
    fn book(&mut self, run_id: u32) -> Result<(), OutputError> {
        fs::create_dir_all(&self.config.output_dir)?;
        let h1 = self
            .config
            .h1
            .iter()
            .map(H1::book)
            .collect::<Result<Vec<_>, _>>()
            .map_err(OutputError::InvalidBooking)?;
        let h2 = self
            .config
            .h2
            .iter()
            .map(H2::book)
            .collect::<Result<Vec<_>, _>>()
            .map_err(OutputError::InvalidBooking)?;

        let file = File::create(self.ntuple_path())?;
        let mut rows = Writer::from_writer(BufWriter::new(file));
        rows.write_record(self.config.ntuple.header())?;

        info!(
            "Booked run {} output in {} ({} + {} histograms)",
            run_id,
            self.config.output_dir.display(),
            h1.len(),
            h2.len()
        );
        self.run = Some(OpenRun {
            run_id,
            rows,
            h1,
            h2,
            summary_written: false,
        });
        Ok(())
    }

    fn record_event(&mut self, summary: &EventSummary) -> Result<(), OutputError> {
        let ntuple: &Ntuple = &self.config.ntuple;
        let run = self.run.as_mut().ok_or(OutputError::NotBooked)?;
        run.rows.write_record(ntuple.row(summary))?;
        for h in &mut run.h1 {
            h.fill_event(summary);
        }
        for h in &mut run.h2 {
            h.fill_event(summary);
        }
        Ok(())
    }

    fn record_run_summary(&mut self, stats: &RunStatistics) -> Result<(), OutputError> {
        let run = self.run.as_mut().ok_or(OutputError::NotBooked)?;
        if run.summary_written {
            return Err(OutputError::SummaryAlreadyRecorded(run.run_id));
        }
        run.summary_written = true;
        let rows = run.rows.flush();

        // Histograms and the summary file are still written when the rows fail
        let run = self.run.as_ref().ok_or(OutputError::NotBooked)?;
        let histograms = self.write_histograms(run);

        let file = File::create(self.summary_path())?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, stats)?;
        w.flush()?;
        debug!("Wrote run summary to {}", self.summary_path().display());
        rows?;
        histograms
    }
}

/// Keeps every recorded value in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub run_id: Option<u32>,
    pub events: Vec<EventSummary>,
    pub summaries: Vec<RunStatistics>,
    /// Make `record_event` fail for these event ids
    pub fail_events: Vec<u64>,
    /// Make `record_run_summary` fail
    pub fail_summary: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(event_ids: &[u64]) -> Self {
        Self {
            fail_events: event_ids.to_vec(),
            ..Self::default()
        }
    }

    pub fn summary(&self) -> Option<&RunStatistics> {
        self.summaries.last()
    }
}

impl OutputSink for MemorySink {
    fn book(&mut self, run_id: u32) -> Result<(), OutputError> {
        self.run_id = Some(run_id);
        self.events.clear();
        self.summaries.clear();
        Ok(())
    }

    fn record_event(&mut self, summary: &EventSummary) -> Result<(), OutputError> {
        if self.run_id.is_none() {
            return Err(OutputError::NotBooked);
        }
        if self.fail_events.contains(&summary.event_id) {
            return Err(OutputError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("refusing row for event {}", summary.event_id),
            )));
        }
        self.events.push(summary.clone());
        Ok(())
    }

    fn record_run_summary(&mut self, stats: &RunStatistics) -> Result<(), OutputError> {
        let run_id = self.run_id.ok_or(OutputError::NotBooked)?;
        if !self.summaries.is_empty() {
            return Err(OutputError::SummaryAlreadyRecorded(run_id));
        }
        if self.fail_summary {
            return Err(OutputError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("refusing summary for run {}", run_id),
            )));
        }
        self.summaries.push(*stats);
        Ok(())
    }
}
