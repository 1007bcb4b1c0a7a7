#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Remote Background Removal Workflow
//!
//! A client for third-party background removal services such as remove.bg.
//! The crate models the upload → process → preview → download cycle of an
//! image editor as an explicit state machine:
//!
//! - **Select** a file (kept as a `SourceImage`, previewable as a data URI)
//! - **Submit** it to the service as a multipart POST
//! - **Preview** the result through a revocable blob handle
//! - **Download** it as `processed-image.png`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use remote_bgremove::{ImageWorkflowController, RemoveBgBackend, ServiceConfig, SubmitOutcome};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! // API key from REMOVE_BG_API_KEY or the config file
//! let config = ServiceConfig::resolve(None)?;
//! let backend = Arc::new(RemoveBgBackend::new(&config)?);
//! let mut controller = ImageWorkflowController::new(backend, &config);
//!
//! controller.select_path("input.jpg").await;
//! match controller.submit().await {
//!     SubmitOutcome::Completed(processed) => {
//!         println!("{} bytes received", processed.size_bytes);
//!         controller.download_to("out").await?;
//!     },
//!     other => println!("not processed: {:?}", other),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): command-line interface and progress spinner
//! - `tracing-json`: JSON log output for the CLI
//! - `tracing-files`: log file output for the CLI

pub mod backends;
pub mod blob;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

use std::sync::Arc;

// Public API exports
pub use backends::{
    MockBackend, MockBehavior, RemovalBackend, RemovalRequest, RemovalResponse, RemoveBgBackend,
};
pub use blob::{BlobHandle, BlobStore};
pub use config::{ServiceConfig, ServiceConfigBuilder, SizeMode, WorkflowOptions};
pub use controller::{AbortHandle, ImageWorkflowController, SubmitOutcome};
pub use error::{Result, WorkflowError, GENERIC_FAILURE_MESSAGE};
pub use services::{
    ConsoleProgressReporter, ImageIOService, LogNotifier, NoOpProgressReporter, Notifier,
    ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate, RecordingNotifier,
};
pub use types::{
    ProcessedImage, ProcessingState, SaveAction, SourceImage, WorkflowView, DOWNLOAD_FILE_NAME,
};

#[cfg(feature = "cli")]
pub use tracing_config::{TracingConfig, TracingFormat, TracingOutput};

/// Remove the background of an image held in memory
///
/// Runs one full select → submit → download cycle against the service
/// described by `config` and returns the processed bytes.
///
/// # Examples
/// ```rust,no_run
/// use remote_bgremove::{remove_background_from_bytes, ServiceConfig};
///
/// # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let config = ServiceConfig::builder().api_key("my-key").build()?;
/// let png = remove_background_from_bytes(upload, "image/jpeg", &config).await?;
/// std::fs::write("processed-image.png", &png)?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_bytes<B: Into<bytes::Bytes>>(
    image_bytes: B,
    mime_type: &str,
    config: &ServiceConfig,
) -> Result<bytes::Bytes> {
    let backend = Arc::new(RemoveBgBackend::new(config)?);
    run_single_cycle(backend, image_bytes.into(), mime_type, config).await
}

/// Remove the background of an image file
pub async fn remove_background_from_file<P: AsRef<std::path::Path>>(
    path: P,
    config: &ServiceConfig,
) -> Result<bytes::Bytes> {
    let source = ImageIOService::read_source(path).await?;
    remove_background_from_bytes(source.bytes().clone(), source.mime_type(), config).await
}

async fn run_single_cycle(
    backend: Arc<dyn RemovalBackend>,
    image_bytes: bytes::Bytes,
    mime_type: &str,
    config: &ServiceConfig,
) -> Result<bytes::Bytes> {
    let mut controller = ImageWorkflowController::new(backend, config);
    if controller.select_file(image_bytes, mime_type, None).is_none() {
        return Err(WorkflowError::invalid_state("No image data to process"));
    }

    match controller.submit().await {
        SubmitOutcome::Completed(_) => controller
            .download()
            .map(|action| action.bytes)
            .ok_or_else(|| WorkflowError::internal("Processed image handle was released")),
        SubmitOutcome::Failed(e) => Err(e),
        SubmitOutcome::Cancelled => Err(WorkflowError::Cancelled),
        SubmitOutcome::Skipped => Err(WorkflowError::invalid_state("Submit was not available")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_cycle_with_mock() {
        let backend = Arc::new(MockBackend::succeeding(&b"cutout"[..]));
        let bytes = run_single_cycle(
            backend,
            bytes::Bytes::from_static(b"photo"),
            "image/jpeg",
            &ServiceConfig::default(),
        )
        .await
        .unwrap();
        assert_eq!(bytes, bytes::Bytes::from_static(b"cutout"));
    }

    #[tokio::test]
    async fn test_single_cycle_rejects_empty_input() {
        let backend = Arc::new(MockBackend::echo());
        let result = run_single_cycle(
            backend.clone(),
            bytes::Bytes::new(),
            "image/png",
            &ServiceConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(WorkflowError::InvalidState(_))));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_single_cycle_surfaces_failure() {
        let backend = Arc::new(MockBackend::failing_with_status(402));
        let result = run_single_cycle(
            backend,
            bytes::Bytes::from_static(b"photo"),
            "image/png",
            &ServiceConfig::default(),
        )
        .await;
        assert!(matches!(
            result,
            Err(WorkflowError::HttpStatus { status: 402, .. })
        ));
    }
}
