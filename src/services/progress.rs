//! Progress reporting service
//!
//! This module separates progress reporting concerns from the workflow,
//! allowing different frontends to implement their own progress handling.

use instant::Instant;
use std::sync::{Arc, Mutex, PoisonError};

/// Progress stages of a single processing request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Sending the multipart request
    Uploading,
    /// Waiting for the service to answer
    AwaitingResponse,
    /// Receiving the processed image
    Receiving,
    /// Processing completed
    Completed,
    /// Request cancelled by the user or by teardown
    Cancelled,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Uploading => "Uploading image",
            ProcessingStage::AwaitingResponse => "Removing background",
            ProcessingStage::Receiving => "Receiving result",
            ProcessingStage::Completed => "Processing completed",
            ProcessingStage::Cancelled => "Processing cancelled",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::Uploading => 20,
            ProcessingStage::AwaitingResponse => 50,
            ProcessingStage::Receiving => 90,
            ProcessingStage::Completed | ProcessingStage::Cancelled => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since the request started (milliseconds)
    pub elapsed_ms: u64,
    /// Bytes of the result received so far, while receiving
    pub bytes_received: Option<u64>,
}

impl ProgressUpdate {
    /// Create a new progress update
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            bytes_received: None,
            stage,
        }
    }

    /// Attach a received byte count
    #[must_use]
    pub fn with_bytes_received(mut self, bytes: u64) -> Self {
        self.bytes_received = Some(bytes);
        self
    }
}

/// Trait for reporting progress of processing requests
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report completion with the total request time
    fn report_completion(&self, total_ms: u64);

    /// Report an error during processing
    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _total_ms: u64) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Console progress reporter that logs progress
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        match (self.verbose, update.bytes_received) {
            (true, Some(bytes)) => log::info!(
                "[{}%] {} ({} bytes, {}ms elapsed)",
                update.progress,
                update.description,
                bytes,
                update.elapsed_ms
            ),
            (true, None) => log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            ),
            (false, _) => log::info!("[{}%] {}", update.progress, update.description),
        }
    }

    fn report_completion(&self, total_ms: u64) {
        log::info!("✅ Background removed in {}ms", total_ms);
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("❌ Error during {}: {}", stage.description(), error);
    }
}

/// Per-request progress tracker
///
/// Shared by reference with the backend while the request is in flight.
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Mutex<Option<ProcessingStage>>,
}

impl ProgressTracker {
    /// Create a new progress tracker with the specified reporter
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: Mutex::new(None),
        }
    }

    /// Create a progress tracker with no-op reporter (for testing/disabled progress)
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Arc::new(NoOpProgressReporter))
    }

    fn set_stage(&self, stage: ProcessingStage) {
        *self
            .current_stage
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(stage);
    }

    /// Report progress for a specific stage
    pub fn report_stage(&self, stage: ProcessingStage) {
        self.set_stage(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    /// Report bytes of the result received so far
    pub fn report_received(&self, bytes: u64) {
        self.set_stage(ProcessingStage::Receiving);
        self.reporter.report_progress(
            ProgressUpdate::new(ProcessingStage::Receiving, self.start_time)
                .with_bytes_received(bytes),
        );
    }

    /// Report completion
    pub fn report_completion(&self) {
        self.reporter.report_completion(self.elapsed_ms());
    }

    /// Report an error at the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self
            .current_stage()
            .unwrap_or(ProcessingStage::Uploading);
        self.reporter.report_error(stage, error);
    }

    /// Get the elapsed time since tracking started
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Get the current processing stage
    #[must_use]
    pub fn current_stage(&self) -> Option<ProcessingStage> {
        *self
            .current_stage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CollectingReporter {
        stages: Mutex<Vec<ProcessingStage>>,
        errors: Mutex<Vec<(ProcessingStage, String)>>,
        completions: Mutex<u32>,
    }

    impl ProgressReporter for CollectingReporter {
        fn report_progress(&self, update: ProgressUpdate) {
            self.stages.lock().unwrap().push(update.stage);
        }

        fn report_completion(&self, _total_ms: u64) {
            *self.completions.lock().unwrap() += 1;
        }

        fn report_error(&self, stage: ProcessingStage, error: &str) {
            self.errors.lock().unwrap().push((stage, error.to_string()));
        }
    }

    #[test]
    fn test_stage_percentages_increase() {
        let ordered = [
            ProcessingStage::Uploading,
            ProcessingStage::AwaitingResponse,
            ProcessingStage::Receiving,
            ProcessingStage::Completed,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].progress_percentage() < pair[1].progress_percentage());
        }
    }

    #[test]
    fn test_tracker_records_stages_and_errors() {
        let reporter = Arc::new(CollectingReporter::default());
        let tracker = ProgressTracker::new(reporter.clone());

        assert!(tracker.current_stage().is_none());
        tracker.report_stage(ProcessingStage::Uploading);
        tracker.report_received(512);
        assert_eq!(tracker.current_stage(), Some(ProcessingStage::Receiving));

        tracker.report_error("connection reset");
        tracker.report_completion();

        assert_eq!(
            *reporter.stages.lock().unwrap(),
            vec![ProcessingStage::Uploading, ProcessingStage::Receiving]
        );
        assert_eq!(
            reporter.errors.lock().unwrap().first().cloned(),
            Some((ProcessingStage::Receiving, "connection reset".to_string()))
        );
        assert_eq!(*reporter.completions.lock().unwrap(), 1);
    }

    #[test]
    fn test_update_with_bytes() {
        let update = ProgressUpdate::new(ProcessingStage::Receiving, Instant::now())
            .with_bytes_received(42);
        assert_eq!(update.bytes_received, Some(42));
        assert_eq!(update.progress, 90);
        assert_eq!(update.description, "Receiving result");
    }
}
