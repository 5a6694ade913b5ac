use log::{debug, info, warn};
use std::sync::mpsc;
use std::sync::Arc;

use crate::error::{Error, GeometryError, InvalidStateError, OutputError};
use crate::event::{EventAccumulator, EventSummary};
use crate::geometry::{GeometryConfig, GeometryModel};
use crate::hit::{HitCollector, StepScorer};
use crate::output::OutputSink;
use crate::sensitive::SensitiveIndex;
use crate::settings::RunSettings;
use crate::stats::{RunAccumulator, RunStatistics};
use crate::step::StepInfo;
use crate::transport::TransportEngine;

/// Events with a total deposit above this (MeV) get a debug line.
const NOTABLE_EDEP: f64 = 0.1;

/// Per-thread event processing state.
///
/// Everything here is owned by one worker for the whole run. Nothing is
/// shared except the read-only sensitive index.
pub struct Worker {
    id: usize,
    collector: HitCollector,
    events: EventAccumulator,
    accumulator: RunAccumulator,
    processed: u64,
}

impl Worker {
    pub fn new(id: usize, index: Arc<SensitiveIndex>, settings: &RunSettings) -> Self {
        Self {
            id,
            collector: HitCollector::new(index, settings.threshold).with_verbose(settings.verbose),
            events: EventAccumulator::new(settings.include_non_sensitive),
            accumulator: RunAccumulator::new(),
            processed: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn accumulator(&self) -> &RunAccumulator {
        &self.accumulator
    }

    pub fn begin_run(&mut self) {
        self.accumulator.reset();
        self.processed = 0;
    }

    pub fn begin_event(&mut self, event_id: u64) {
        self.collector.begin_event(event_id);
    }

    /// Summarize the current event and fold it into this worker's sums.
    pub fn end_event(&mut self) -> Result<EventSummary, InvalidStateError> {
        self.collector.log_event(self.id);
        let summary = self.events.summarize(
            self.collector.event_id(),
            self.collector.finish(),
            self.collector.non_sensitive_edep(),
        );
        self.accumulator.update(&summary)?;
        self.processed += 1;
        Ok(summary)
    }

    /// Run one event through the engine and summarize it.
    pub fn process_event(
        &mut self,
        event_id: u64,
        engine: &dyn TransportEngine,
    ) -> Result<EventSummary, InvalidStateError> {
        self.begin_event(event_id);
        engine.transport(event_id, &mut self.collector);
        self.end_event()
    }
}

impl StepScorer for Worker {
    fn on_step(&mut self, step: &StepInfo) -> bool {
        self.collector.on_step(step)
    }
}

enum WorkerMessage {
    Event(EventSummary),
    Finished {
        worker: usize,
        accumulator: RunAccumulator,
        processed: u64,
    },
    Failed(InvalidStateError),
}

/// Owns the shared geometry and the master accumulator, and drives runs.
pub struct RunManager {
    geometry: Arc<GeometryModel>,
    index: Arc<SensitiveIndex>,
    settings: RunSettings,
    master: RunAccumulator,
    run_id: u32,
    processed: u64,
    dropped_rows: u64,
    summary_recorded: bool,
    summary_failed: bool,
}

impl RunManager {
    pub fn new(geometry: Arc<GeometryModel>, settings: RunSettings) -> Self {
        let index = Arc::new(SensitiveIndex::discover(&geometry));
        Self {
            geometry,
            index,
            settings,
            master: RunAccumulator::new(),
            run_id: 0,
            processed: 0,
            dropped_rows: 0,
            summary_recorded: false,
            summary_failed: false,
        }
    }

    /// Build the geometry and index. Fails before any run can start.
    pub fn build(config: &GeometryConfig, settings: RunSettings) -> Result<Self, GeometryError> {
        let geometry = GeometryModel::build(config)?;
        Ok(Self::new(Arc::new(geometry), settings))
    }

    pub fn geometry(&self) -> &Arc<GeometryModel> {
        &self.geometry
    }

    pub fn index(&self) -> &Arc<SensitiveIndex> {
        &self.index
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RunSettings {
        &mut self.settings
    }

    pub fn master(&self) -> &RunAccumulator {
        &self.master
    }

    /// Id the next (or current) run uses.
    pub fn run_id(&self) -> u32 {
        self.run_id
    }

    pub fn dropped_rows(&self) -> u64 {
        self.dropped_rows
    }

    /// Whether the sink failed to record the last run's summary.
    pub fn summary_failed(&self) -> bool {
        self.summary_failed
    }

    pub fn new_worker(&self, id: usize) -> Worker {
        Worker::new(id, Arc::clone(&self.index), &self.settings)
    }

    /// Reset the master accumulator and book the sink for a new run.
    pub fn begin_run(&mut self, sink: &mut dyn OutputSink) -> Result<(), Error> {
        self.master.reset();
        self.processed = 0;
        self.dropped_rows = 0;
        self.summary_recorded = false;
        self.summary_failed = false;
        sink.book(self.run_id)?;
        info!(
            "### Run {} start: {} events on {} worker(s)",
            self.run_id,
            self.settings.events,
            self.settings.effective_workers()
        );
        Ok(())
    }

    /// Pass one summary to the sink; failures are logged and counted.
    pub fn record_event(&mut self, sink: &mut dyn OutputSink, summary: &EventSummary) {
        if summary.total_edep > NOTABLE_EDEP {
            debug!(
                "Event {}: {} hits, total edep {:.4} MeV",
                summary.event_id, summary.hit_count, summary.total_edep
            );
        }
        if let Err(e) = sink.record_event(summary) {
            self.dropped_rows += 1;
            warn!("Dropped output row for event {}: {}", summary.event_id, e);
        }
    }

    /// Fold one worker's final sums into the master.
    pub fn merge_worker(&mut self, accumulator: &RunAccumulator, processed: u64) -> Result<(), Error> {
        self.master.merge_from(accumulator)?;
        self.processed += processed;
        Ok(())
    }

    /// Derive the run statistics and record them, exactly once per run.
    ///
    /// A sink that fails to record the summary is logged and flagged in
    /// `summary_failed`; the statistics are still returned.
    pub fn end_run(&mut self, sink: &mut dyn OutputSink) -> Result<RunStatistics, Error> {
        if self.summary_recorded {
            return Err(OutputError::SummaryAlreadyRecorded(self.run_id).into());
        }
        let mut stats = self.master.derive()?;
        stats.dropped_rows = self.dropped_rows;
        self.summary_recorded = true;

        info!("### Run {} end: {} events processed", self.run_id, self.processed);
        info!("\n{}", stats);
        if self.dropped_rows > 0 {
            warn!(
                "{} output row(s) were dropped during run {}",
                self.dropped_rows, self.run_id
            );
        }
        if let Err(e) = sink.record_run_summary(&stats) {
            self.summary_failed = true;
            warn!("Run {} output is incomplete: {}", self.run_id, e);
        }
        self.run_id += 1;
        Ok(stats)
    }

    /// Process the whole event range on a pool of workers.
    ///
    /// Workers stream summaries back to this thread, which alone writes to
    /// `sink`. Once every worker has reported its final accumulator, the
    /// accumulators are merged in worker order and the run is ended.
    pub fn run(
        &mut self,
        engine: &dyn TransportEngine,
        sink: &mut dyn OutputSink,
    ) -> Result<RunStatistics, Error> {
        self.begin_run(sink)?;

        let workers = self.settings.effective_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("edep-worker-{}", i))
            .build()?;

        let settings = self.settings.clone();
        let settings = &settings;
        let index = Arc::clone(&self.index);
        let mut finished: Vec<Option<(RunAccumulator, u64)>> = vec![None; workers];
        let mut failure = None;
        let mut received = 0u64;

        let (tx, rx) = mpsc::channel::<WorkerMessage>();
        pool.in_place_scope(|scope| {
            for worker_id in 0..workers {
                let tx = tx.clone();
                let index = Arc::clone(&index);
                scope.spawn(move |_| {
                    let mut worker = Worker::new(worker_id, index, settings);
                    worker.begin_run();
                    debug!("Worker {} started", worker.id());
                    let events = settings
                        .shard_policy
                        .events_for(worker_id, workers, settings.events);
                    for event_id in events {
                        match worker.process_event(event_id, engine) {
                            Ok(summary) => {
                                if tx.send(WorkerMessage::Event(summary)).is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                let _ = tx.send(WorkerMessage::Failed(e));
                                return;
                            }
                        }
                    }
                    let _ = tx.send(WorkerMessage::Finished {
                        worker: worker_id,
                        processed: worker.processed(),
                        accumulator: worker.accumulator,
                    });
                });
            }
            drop(tx);

            // Ends once every worker has dropped its sender
            for message in rx {
                match message {
                    WorkerMessage::Event(summary) => {
                        received += 1;
                        self.record_event(sink, &summary);
                        if settings.progress_interval > 0 && received % settings.progress_interval == 0 {
                            info!("--> {} / {} events processed", received, settings.events);
                        }
                    }
                    WorkerMessage::Finished {
                        worker,
                        accumulator,
                        processed,
                    } => {
                        debug!("Worker {} finished after {} events", worker, processed);
                        finished[worker] = Some((accumulator, processed));
                    }
                    WorkerMessage::Failed(e) => {
                        if failure.is_none() {
                            failure = Some(e);
                        }
                    }
                }
            }
        });

        if let Some(e) = failure {
            return Err(e.into());
        }
        for (worker, result) in finished.into_iter().enumerate() {
            match result {
                Some((accumulator, processed)) => self.merge_worker(&accumulator, processed)?,
                None => warn!("Worker {} did not report its accumulator", worker),
            }
        }
        self.end_run(sink)
    }
}
