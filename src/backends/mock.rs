//! Mock backend implementation for testing and dry runs

use super::{RemovalBackend, RemovalRequest, RemovalResponse};
use crate::error::{Result, WorkflowError};
use crate::services::{ProcessingStage, ProgressTracker};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// What the mock answers with
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return the source bytes unchanged
    Echo,
    /// Return fixed bytes
    Succeed {
        bytes: Bytes,
        content_type: Option<String>,
    },
    /// Fail as if the service answered with this status
    FailStatus(u16),
    /// Fail as if the connection broke
    FailTransport(String),
}

/// Mock backend for testing and debugging purposes
///
/// Never touches the network. Records how often it was called and the last
/// request it saw.
#[derive(Debug)]
pub struct MockBackend {
    behavior: Mutex<MockBehavior>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_request: Mutex<Option<RemovalRequest>>,
}

impl MockBackend {
    /// Create a mock with the given behavior
    #[must_use]
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            delay: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Mock returning the input bytes, used by `--dry-run`
    #[must_use]
    pub fn echo() -> Self {
        Self::new(MockBehavior::Echo)
    }

    /// Mock returning fixed PNG bytes
    #[must_use]
    pub fn succeeding<B: Into<Bytes>>(bytes: B) -> Self {
        Self::new(MockBehavior::Succeed {
            bytes: bytes.into(),
            content_type: Some("image/png".to_string()),
        })
    }

    /// Mock failing with an HTTP status
    #[must_use]
    pub fn failing_with_status(status: u16) -> Self {
        Self::new(MockBehavior::FailStatus(status))
    }

    /// Wait this long before answering
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Change the answer for subsequent calls
    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    /// Number of requests received
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most recent request received
    #[must_use]
    pub fn last_request(&self) -> Option<RemovalRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::echo()
    }
}

#[async_trait]
impl RemovalBackend for MockBackend {
    async fn remove_background(
        &self,
        request: &RemovalRequest,
        progress: &ProgressTracker,
    ) -> Result<RemovalResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(request.clone());

        progress.report_stage(ProcessingStage::Uploading);
        progress.report_stage(ProcessingStage::AwaitingResponse);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let behavior = self
            .behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let response = match behavior {
            MockBehavior::Echo => RemovalResponse {
                bytes: request.source.bytes().clone(),
                content_type: Some(request.source.mime_type().to_string()),
            },
            MockBehavior::Succeed {
                bytes,
                content_type,
            } => RemovalResponse {
                bytes,
                content_type,
            },
            MockBehavior::FailStatus(status) => {
                return Err(WorkflowError::HttpStatus {
                    status,
                    url: "mock://removebg".to_string(),
                })
            },
            MockBehavior::FailTransport(reason) => {
                return Err(WorkflowError::network_error("mock transport", reason))
            },
        };

        progress.report_received(response.bytes.len() as u64);
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SizeMode, types::SourceImage};

    fn request(bytes: &'static [u8]) -> RemovalRequest {
        RemovalRequest {
            source: SourceImage::new(bytes, "image/jpeg", Some("in.jpg".to_string())),
            size: SizeMode::Auto,
        }
    }

    #[tokio::test]
    async fn test_echo_returns_source() {
        let backend = MockBackend::echo();
        let response = backend
            .remove_background(&request(b"abc"), &ProgressTracker::no_op())
            .await
            .unwrap();
        assert_eq!(response.bytes, Bytes::from_static(b"abc"));
        assert_eq!(response.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(backend.calls(), 1);
        assert_eq!(
            backend.last_request().unwrap().source.file_name(),
            Some("in.jpg")
        );
    }

    #[tokio::test]
    async fn test_failures_and_behavior_switch() {
        let backend = MockBackend::failing_with_status(503);
        let err = backend
            .remove_background(&request(b"x"), &ProgressTracker::no_op())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::HttpStatus { status: 503, .. }));

        backend.set_behavior(MockBehavior::FailTransport("reset".to_string()));
        let err = backend
            .remove_background(&request(b"x"), &ProgressTracker::no_op())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Network(_)));

        backend.set_behavior(MockBehavior::Echo);
        assert!(backend
            .remove_background(&request(b"x"), &ProgressTracker::no_op())
            .await
            .is_ok());
        assert_eq!(backend.calls(), 3);
    }
}
