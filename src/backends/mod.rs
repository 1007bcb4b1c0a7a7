//! Background removal backends
//!
//! The actual removal happens in an external service. A backend turns a
//! `RemovalRequest` into the bytes of the processed image.

pub mod mock;
pub mod remove_bg;

pub use mock::{MockBackend, MockBehavior};
pub use remove_bg::RemoveBgBackend;

use crate::{config::SizeMode, error::Result, services::ProgressTracker, types::SourceImage};
use async_trait::async_trait;
use bytes::Bytes;

/// A single processing request
#[derive(Debug, Clone)]
pub struct RemovalRequest {
    /// The image as originally selected
    pub source: SourceImage,
    /// Requested result size
    pub size: SizeMode,
}

/// Body of a successful service response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalResponse {
    /// Processed image bytes
    pub bytes: Bytes,
    /// `Content-Type` reported by the service
    pub content_type: Option<String>,
}

/// Trait for background removal backends
#[async_trait]
pub trait RemovalBackend: Send + Sync {
    /// Send one request and wait for the processed image
    ///
    /// # Errors
    /// - Transport failures
    /// - Non-success status from the service
    async fn remove_background(
        &self,
        request: &RemovalRequest,
        progress: &ProgressTracker,
    ) -> Result<RemovalResponse>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}
