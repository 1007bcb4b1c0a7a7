//! Image workflow controller
//!
//! Owns the source image, the processed image and the processing state, and
//! drives the select → submit → preview → download cycle against a
//! `RemovalBackend`.

use crate::{
    backends::{RemovalBackend, RemovalRequest, RemovalResponse},
    blob::BlobStore,
    config::{ServiceConfig, SizeMode, WorkflowOptions},
    error::{Result, WorkflowError},
    services::{
        ImageIOService, LogNotifier, NoOpProgressReporter, Notifier, ProcessingStage,
        ProgressReporter, ProgressTracker,
    },
    types::{ProcessedImage, ProcessingState, SaveAction, SourceImage, WorkflowView},
};
use bytes::Bytes;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Result of a call to [`ImageWorkflowController::submit`]
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Preconditions not met; nothing was sent
    Skipped,
    /// The service returned a processed image
    Completed(ProcessedImage),
    /// The attempt failed and the user was alerted
    Failed(WorkflowError),
    /// The request was cancelled before it finished
    Cancelled,
}

impl SubmitOutcome {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Cancels the request currently in flight, from any task
#[derive(Debug, Clone)]
pub struct AbortHandle {
    in_flight: Arc<Mutex<Option<CancellationToken>>>,
}

impl AbortHandle {
    /// Cancel the outstanding request. Returns false if nothing was in flight.
    pub fn abort(&self) -> bool {
        let guard = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(token) => {
                token.cancel();
                true
            },
            None => false,
        }
    }
}

/// Clears the in-flight slot when a submission ends, including when its
/// future is dropped before completion
struct InFlightGuard {
    slot: Arc<Mutex<Option<CancellationToken>>>,
}

impl InFlightGuard {
    fn install(slot: &Arc<Mutex<Option<CancellationToken>>>, token: CancellationToken) -> Self {
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Self {
            slot: Arc::clone(slot),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Image workflow controller
///
/// The processing state is derived from the in-flight slot, so a submission
/// that is dropped mid-request leaves the controller idle.
///
/// # Examples
///
/// ```rust,no_run
/// use remote_bgremove::{ImageWorkflowController, RemoveBgBackend, ServiceConfig, SubmitOutcome};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = ServiceConfig::resolve(None)?;
/// let backend = Arc::new(RemoveBgBackend::new(&config)?);
/// let mut controller = ImageWorkflowController::new(backend, &config);
///
/// controller.select_path("portrait.jpg").await;
/// if let SubmitOutcome::Completed(_) = controller.submit().await {
///     controller.download_to(".").await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct ImageWorkflowController {
    backend: Arc<dyn RemovalBackend>,
    notifier: Arc<dyn Notifier>,
    progress: Arc<dyn ProgressReporter>,
    size: SizeMode,
    timeout: Option<Duration>,
    options: WorkflowOptions,
    blobs: BlobStore,
    source: Option<SourceImage>,
    processed: Option<ProcessedImage>,
    session: CancellationToken,
    in_flight: Arc<Mutex<Option<CancellationToken>>>,
}

impl ImageWorkflowController {
    /// Create an idle controller with no images
    #[must_use]
    pub fn new(backend: Arc<dyn RemovalBackend>, config: &ServiceConfig) -> Self {
        Self {
            backend,
            notifier: Arc::new(LogNotifier::default()),
            progress: Arc::new(NoOpProgressReporter),
            size: config.size,
            timeout: config.request_timeout(),
            options: WorkflowOptions::default(),
            blobs: BlobStore::new(),
            source: None,
            processed: None,
            session: CancellationToken::new(),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Set where user alerts go
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Set where request progress goes
    #[must_use]
    pub fn with_progress_reporter(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Set behaviour switches
    #[must_use]
    pub fn with_options(mut self, options: WorkflowOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn state(&self) -> ProcessingState {
        let in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        if in_flight {
            ProcessingState::Processing
        } else {
            ProcessingState::Idle
        }
    }

    #[must_use]
    pub fn source_image(&self) -> Option<&SourceImage> {
        self.source.as_ref()
    }

    #[must_use]
    pub fn processed_image(&self) -> Option<&ProcessedImage> {
        self.processed.as_ref()
    }

    /// Bytes of the processed image, while its handle is live
    #[must_use]
    pub fn processed_bytes(&self) -> Option<&Bytes> {
        self.processed
            .as_ref()
            .and_then(|processed| self.blobs.resolve(&processed.handle))
    }

    /// Number of live blob handles held by this controller
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.blobs.live_count()
    }

    /// Whether "Remove Background" is enabled
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.source.is_some() && self.state() == ProcessingState::Idle
    }

    /// Whether "Download" is enabled
    #[must_use]
    pub fn can_download(&self) -> bool {
        self.processed_bytes().is_some()
    }

    /// Handle that cancels the request in flight
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Snapshot for rendering
    #[must_use]
    pub fn view(&self) -> WorkflowView {
        WorkflowView {
            source_preview: self.source.as_ref().map(SourceImage::data_uri),
            processed_preview: self.processed.as_ref().map(|p| p.handle.clone()),
            submit_enabled: self.can_submit(),
            submit_label: self.state().label(),
            download_enabled: self.can_download(),
        }
    }

    /// Select file content as the new source image
    ///
    /// Empty content counts as an unreadable file and leaves everything as it was.
    pub fn select_file<B: Into<Bytes>>(
        &mut self,
        bytes: B,
        mime_type: &str,
        file_name: Option<String>,
    ) -> Option<&SourceImage> {
        self.select_source(SourceImage::new(bytes, mime_type, file_name))
    }

    /// Select a file from disk as the new source image
    ///
    /// Read failures are logged and otherwise ignored.
    pub async fn select_path<P: AsRef<Path>>(&mut self, path: P) -> Option<&SourceImage> {
        match ImageIOService::read_source(path.as_ref()).await {
            Ok(source) => self.select_source(source),
            Err(e) => {
                warn!(path = %path.as_ref().display(), error = %e, "Ignoring unreadable file");
                None
            },
        }
    }

    fn select_source(&mut self, source: SourceImage) -> Option<&SourceImage> {
        if source.is_empty() {
            debug!("Ignoring empty selection");
            return None;
        }

        if !self.options.keep_stale_output {
            self.release_processed();
        }

        debug!(
            bytes = source.len(),
            mime = source.mime_type(),
            "Source image selected"
        );
        self.source = Some(source);
        self.source.as_ref()
    }

    /// Send the current source image for processing
    ///
    /// A no-op unless a source image is selected and nothing is in flight.
    /// Failures are alerted once and leave the processed image untouched.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn submit(&mut self) -> SubmitOutcome {
        if !self.can_submit() {
            debug!(state = %self.state(), has_source = self.source.is_some(), "Submit not available");
            return SubmitOutcome::Skipped;
        }
        let Some(source) = self.source.clone() else {
            return SubmitOutcome::Skipped;
        };

        let token = self.session.child_token();
        let guard = InFlightGuard::install(&self.in_flight, token.clone());

        let request = RemovalRequest {
            source,
            size: self.size,
        };
        let tracker = ProgressTracker::new(Arc::clone(&self.progress));
        info!(bytes = request.source.len(), size = %request.size, "Submitting image");

        let result = self.run_request(&request, &tracker, &token).await;

        drop(guard);

        match result {
            Ok(response) => {
                let processed = self.install_processed(response, tracker.elapsed_ms());
                tracker.report_stage(ProcessingStage::Completed);
                tracker.report_completion();
                info!(
                    handle = %processed.handle,
                    bytes = processed.size_bytes,
                    latency_ms = processed.latency_ms,
                    "Background removed"
                );
                SubmitOutcome::Completed(processed)
            },
            Err(WorkflowError::Cancelled) => {
                tracker.report_stage(ProcessingStage::Cancelled);
                info!("Processing cancelled");
                SubmitOutcome::Cancelled
            },
            Err(e) => {
                error!(error = %e, "Error removing background");
                tracker.report_error(&e.to_string());
                self.notifier.alert(e.user_message());
                SubmitOutcome::Failed(e)
            },
        }
    }

    async fn run_request(
        &self,
        request: &RemovalRequest,
        tracker: &ProgressTracker,
        token: &CancellationToken,
    ) -> Result<RemovalResponse> {
        let call = async {
            let call = self.backend.remove_background(request, tracker);
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .map_err(|_| WorkflowError::Timeout(limit))?,
                None => call.await,
            }
        };

        let response = tokio::select! {
            biased;
            () = token.cancelled() => return Err(WorkflowError::Cancelled),
            result = call => result?,
        };

        if response.bytes.is_empty() {
            return Err(WorkflowError::network_error(
                format!("{} returned", self.backend.name()),
                "empty response body",
            ));
        }
        Ok(response)
    }

    fn install_processed(&mut self, response: RemovalResponse, latency_ms: u64) -> ProcessedImage {
        self.release_processed();

        let size_bytes = response.bytes.len();
        let handle = self.blobs.create(response.bytes);
        let processed = ProcessedImage {
            handle,
            content_type: response.content_type,
            size_bytes,
            received_at: Utc::now(),
            latency_ms,
        };
        self.processed = Some(processed.clone());
        processed
    }

    fn release_processed(&mut self) {
        if let Some(previous) = self.processed.take() {
            self.blobs.revoke(&previous.handle);
        }
    }

    /// Save action for the processed image, if there is one
    #[must_use]
    pub fn download(&self) -> Option<SaveAction> {
        self.processed_bytes().cloned().map(SaveAction::new)
    }

    /// Write the processed image into `dir` as `processed-image.png`
    ///
    /// Returns `Ok(None)` when there is nothing to download.
    pub async fn download_to<P: AsRef<Path>>(&self, dir: P) -> Result<Option<PathBuf>> {
        match self.download() {
            Some(action) => ImageIOService::write_save_action(dir, &action)
                .await
                .map(Some),
            None => Ok(None),
        }
    }

    /// Cancel anything in flight and forget both images
    pub fn reset(&mut self) {
        self.abort_handle().abort();
        self.release_processed();
        self.source = None;
        debug!("Workflow reset");
    }
}

impl Drop for ImageWorkflowController {
    fn drop(&mut self) {
        self.session.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{MockBackend, MockBehavior};
    use crate::services::RecordingNotifier;

    fn controller_with(backend: Arc<MockBackend>) -> (ImageWorkflowController, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        let controller = ImageWorkflowController::new(backend, &ServiceConfig::default())
            .with_notifier(Arc::new(notifier.clone()));
        (controller, notifier)
    }

    #[test]
    fn test_initial_state() {
        let (controller, _) = controller_with(Arc::new(MockBackend::echo()));
        assert_eq!(controller.state(), ProcessingState::Idle);
        assert!(controller.source_image().is_none());
        assert!(controller.processed_image().is_none());
        assert!(!controller.can_submit());
        assert!(!controller.can_download());
        assert!(controller.download().is_none());
        assert!(!controller.abort_handle().abort());

        let view = controller.view();
        assert!(!view.submit_enabled);
        assert!(!view.download_enabled);
        assert_eq!(view.submit_label, "Remove Background");
    }

    #[test]
    fn test_select_file_keeps_exact_bytes() {
        let (mut controller, _) = controller_with(Arc::new(MockBackend::echo()));
        let selected = controller
            .select_file(vec![1u8, 2, 3], "image/png", Some("a.png".to_string()))
            .cloned()
            .unwrap();

        assert_eq!(selected.bytes().as_ref(), &[1, 2, 3]);
        assert!(controller.processed_image().is_none());
        assert!(controller.can_submit());
        assert_eq!(
            controller.view().source_preview.as_deref(),
            Some("data:image/png;base64,AQID")
        );
    }

    #[test]
    fn test_empty_selection_is_ignored() {
        let (mut controller, _) = controller_with(Arc::new(MockBackend::echo()));
        controller.select_file(vec![9u8], "image/png", None);
        assert!(controller.select_file(Vec::new(), "image/png", None).is_none());
        assert_eq!(controller.source_image().unwrap().bytes().as_ref(), &[9]);
    }

    #[tokio::test]
    async fn test_submit_without_source_is_noop() {
        let backend = Arc::new(MockBackend::echo());
        let (mut controller, notifier) = controller_with(backend.clone());

        assert!(matches!(controller.submit().await, SubmitOutcome::Skipped));
        assert_eq!(backend.calls(), 0);
        assert_eq!(notifier.count(), 0);
    }

    #[tokio::test]
    async fn test_new_selection_clears_previous_result() {
        let backend = Arc::new(MockBackend::succeeding(&b"cutout"[..]));
        let (mut controller, _) = controller_with(backend);

        controller.select_file(&b"one"[..], "image/jpeg", None);
        assert!(controller.submit().await.is_completed());
        assert_eq!(controller.live_handles(), 1);

        controller.select_file(&b"two"[..], "image/jpeg", None);
        assert!(controller.processed_image().is_none());
        assert!(!controller.can_download());
        assert_eq!(controller.live_handles(), 0);
    }

    #[tokio::test]
    async fn test_keep_stale_output_option() {
        let backend = Arc::new(MockBackend::succeeding(&b"cutout"[..]));
        let (controller, _) = controller_with(backend);
        let mut controller = controller.with_options(WorkflowOptions {
            keep_stale_output: true,
        });

        controller.select_file(&b"one"[..], "image/jpeg", None);
        controller.submit().await;
        controller.select_file(&b"two"[..], "image/jpeg", None);

        assert_eq!(
            controller.processed_bytes().unwrap(),
            &Bytes::from_static(b"cutout")
        );
        assert_eq!(controller.source_image().unwrap().bytes().as_ref(), b"two");
    }

    #[tokio::test]
    async fn test_empty_response_is_a_failure() {
        let backend = Arc::new(MockBackend::succeeding(Bytes::new()));
        let (mut controller, notifier) = controller_with(backend);

        controller.select_file(&b"img"[..], "image/png", None);
        assert!(controller.submit().await.is_failed());
        assert!(controller.processed_image().is_none());
        assert_eq!(notifier.count(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_alerts_once() {
        let backend = Arc::new(MockBackend::new(MockBehavior::FailTransport(
            "connection refused".to_string(),
        )));
        let (mut controller, notifier) = controller_with(backend);

        controller.select_file(&b"img"[..], "image/png", None);
        let outcome = controller.submit().await;

        assert!(matches!(
            outcome,
            SubmitOutcome::Failed(WorkflowError::Network(_))
        ));
        assert_eq!(controller.state(), ProcessingState::Idle);
        assert_eq!(
            notifier.alerts(),
            vec!["Failed to remove background. Please try again.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_reset_forgets_everything() {
        let backend = Arc::new(MockBackend::echo());
        let (mut controller, _) = controller_with(backend);

        controller.select_file(&b"img"[..], "image/png", None);
        controller.submit().await;
        assert!(controller.can_download());

        controller.reset();
        assert!(controller.source_image().is_none());
        assert!(controller.processed_image().is_none());
        assert_eq!(controller.live_handles(), 0);
        assert!(!controller.can_submit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_submit_returns_to_idle() {
        let backend =
            Arc::new(MockBackend::succeeding(&b"cutout"[..]).with_delay(Duration::from_secs(60)));
        let (mut controller, notifier) = controller_with(backend.clone());
        controller.select_file(&b"img"[..], "image/png", None);

        let dropped = tokio::time::timeout(Duration::from_secs(1), controller.submit()).await;
        assert!(dropped.is_err());

        assert_eq!(controller.state(), ProcessingState::Idle);
        assert!(controller.can_submit());
        assert!(!controller.abort_handle().abort());
        assert_eq!(notifier.count(), 0);

        assert!(controller.submit().await.is_completed());
        assert_eq!(backend.calls(), 2);
        assert_eq!(controller.live_handles(), 1);
    }

    #[tokio::test]
    async fn test_select_path_ignores_unreadable_file() {
        let backend = Arc::new(MockBackend::echo());
        let (mut controller, notifier) = controller_with(backend);

        assert!(controller
            .select_path("/no/such/file.png")
            .await
            .is_none());
        assert!(controller.source_image().is_none());
        assert_eq!(notifier.count(), 0);
    }
}
