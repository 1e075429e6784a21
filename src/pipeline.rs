//! Scan Pipeline
//!
//! Runs one acquire → preprocess → extract → filter → dedup → lookup → report
//! pass per tick. Only the history persists between ticks.

use image::{GrayImage, RgbImage};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::capture::FrameSource;
use crate::config::AppConfig;
use crate::lookup::{LookupStatus, LookupWorker, SerialRecord};
use crate::shared::{OperatorControls, RuntimeState};
use crate::storage::SerialHistory;
use crate::vision::{CandidateFilter, ImagePreprocessor, TextExtractor};

/// Report text when a tick could not acquire a frame
pub const NO_FRAME: &str = "No frame";
/// Report text when no candidate passed the filter
pub const NO_READS: &str = "No successful reads";

/// Outcome of a single tick
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Operator-facing summary: the status lines, or a placeholder
    pub text: String,
    /// One status line per accepted candidate
    pub lines: Vec<String>,
    /// Whether a frame was acquired this tick
    pub frame_acquired: bool,
    /// Lookups that finished since the previous tick
    pub completed: Vec<SerialRecord>,
    /// Whether `text` differs from the previous tick's
    pub changed: bool,
}

/// The per-tick orchestrator
pub struct ScanPipeline {
    source: Box<dyn FrameSource>,
    extractor: Box<dyn TextExtractor>,
    preprocessor: ImagePreprocessor,
    filter: CandidateFilter,
    history: SerialHistory,
    lookups: LookupWorker,
    controls: Arc<RwLock<OperatorControls>>,
    last_raw: Option<RgbImage>,
    last_processed: Option<GrayImage>,
    runtime: RuntimeState,
}

impl ScanPipeline {
    /// Wire a pipeline from configuration and its collaborators
    pub fn new(
        config: &AppConfig,
        source: Box<dyn FrameSource>,
        extractor: Box<dyn TextExtractor>,
        lookups: LookupWorker,
        history: SerialHistory,
    ) -> Self {
        Self {
            source,
            extractor,
            preprocessor: ImagePreprocessor::from_settings(&config.preprocess),
            filter: CandidateFilter::from_settings(&config.filter),
            history,
            lookups,
            controls: Arc::new(RwLock::new(OperatorControls::from_settings(
                &config.preprocess,
            ))),
            last_raw: None,
            last_processed: None,
            runtime: RuntimeState::default(),
        }
    }

    /// Run one tick
    pub fn tick(&mut self) -> TickReport {
        self.runtime.mark_tick(Instant::now());
        let completed = self.apply_finished_lookups();

        let frame = match self.source.grab() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("No frame acquired: {}", e);
                self.runtime.missed_frames += 1;
                return self.finish(TickReport {
                    text: NO_FRAME.to_string(),
                    completed,
                    ..TickReport::default()
                });
            }
        };

        let controls = *self.controls.read();
        let processed = self.preprocessor.process(&frame, &controls);

        let candidates = match self.extractor.extract(&processed.image) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Text extraction failed: {}", e);
                Vec::new()
            }
        };

        let mut lines = Vec::new();
        for candidate in candidates.iter().filter(|c| self.filter.is_valid(c)) {
            if self
                .history
                .append_if_absent(SerialRecord::pending(&candidate.text))
            {
                info!("New serial {} (conf {})", candidate.text, candidate.confidence);
                self.lookups.submit(&candidate.text);
            }

            let (name, status) = self
                .history
                .find(&candidate.text)
                .unwrap_or(("", LookupStatus::Pending));
            lines.push(format!(
                "Conf: {} {} Total: {} Matches: {}/{} Successful: {}",
                candidate.confidence,
                candidate.text,
                self.history.len(),
                name,
                status,
                self.history.success_count()
            ));
        }

        self.last_raw = Some(frame.image);
        self.last_processed = Some(processed.image);

        let text = if lines.is_empty() {
            NO_READS.to_string()
        } else {
            lines.join("\n")
        };

        debug!(
            "Tick {}: {} candidates, {} accepted, skew {:.1}°, {:.1} fps",
            self.runtime.ticks,
            candidates.len(),
            lines.len(),
            processed.skew_degrees,
            self.runtime.fps
        );

        self.finish(TickReport {
            text,
            lines,
            frame_acquired: true,
            completed,
            changed: false,
        })
    }

    fn finish(&mut self, mut report: TickReport) -> TickReport {
        report.changed = self.runtime.update_report(&report.text);
        report
    }

    fn apply_finished_lookups(&mut self) -> Vec<SerialRecord> {
        let mut completed = Vec::new();
        for record in self.lookups.try_drain() {
            if self.history.complete(record.clone()) {
                info!("Lookup for {}: {}", record.serial_number, record.status);
                completed.push(record);
            }
        }
        completed
    }

    /// Submit lookups for records that are still pending, as after resuming
    /// an exported history. Returns how many were submitted.
    pub fn resubmit_pending(&mut self) -> usize {
        let pending: Vec<&str> = self
            .history
            .iter()
            .filter(|r| r.status == LookupStatus::Pending)
            .map(|r| r.serial_number.as_str())
            .collect();

        for serial in &pending {
            self.lookups.submit(serial);
        }
        if !pending.is_empty() {
            info!("Resubmitted {} pending lookups", pending.len());
        }
        pending.len()
    }

    /// Block until every pending lookup has finished or `timeout` elapses.
    ///
    /// Returns how many records were completed.
    pub fn await_lookups(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut completed = 0;

        while self.history.pending_count() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(
                    "Gave up waiting on {} pending lookups",
                    self.history.pending_count()
                );
                break;
            }
            match self.lookups.recv_timeout(remaining) {
                Some(record) => {
                    if self.history.complete(record) {
                        completed += 1;
                    }
                }
                None => continue,
            }
        }

        completed
    }

    /// Last successfully acquired frame and its preprocessed image
    pub fn last_images(&self) -> (Option<&RgbImage>, Option<&GrayImage>) {
        (self.last_raw.as_ref(), self.last_processed.as_ref())
    }

    /// Session history
    pub fn history(&self) -> &SerialHistory {
        &self.history
    }

    /// Record for a single serial
    pub fn record(&self, serial_number: &str) -> Option<&SerialRecord> {
        self.history.get(serial_number)
    }

    /// Shared operator controls, for the input adapter
    pub fn controls(&self) -> Arc<RwLock<OperatorControls>> {
        self.controls.clone()
    }

    /// Loop counters and measured rate
    pub fn runtime(&self) -> &RuntimeState {
        &self.runtime
    }

    /// Lookups still running on the worker
    pub fn lookups_in_flight(&self) -> usize {
        self.lookups.in_flight()
    }
}
