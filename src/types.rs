//! Data model of the upload → process → download workflow

use crate::blob::BlobHandle;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// File name used for every download, whatever the source format was
pub const DOWNLOAD_FILE_NAME: &str = "processed-image.png";

/// The image picked by the user, before processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    bytes: Bytes,
    mime_type: String,
    file_name: Option<String>,
}

impl SourceImage {
    /// Wrap raw file content and its declared MIME type
    pub fn new<B, M>(bytes: B, mime_type: M, file_name: Option<String>) -> Self
    where
        B: Into<Bytes>,
        M: Into<String>,
    {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            file_name,
        }
    }

    /// Raw file content, exactly as selected
    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Declared MIME type
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Original file name, if the picker supplied one
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// File name sent in the multipart `image_file` part
    #[must_use]
    pub fn upload_file_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("image")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Displayable form: `data:<mime>;base64,<payload>`
    #[must_use]
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// The image returned by the removal service
///
/// The bytes live in the controller's blob store; this value only carries the
/// handle and some metadata about the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedImage {
    /// Revocable handle of the stored bytes
    pub handle: BlobHandle,
    /// `Content-Type` of the service response, if any
    pub content_type: Option<String>,
    /// Size of the response body
    pub size_bytes: usize,
    /// When the response was received
    pub received_at: DateTime<Utc>,
    /// Time between sending the request and receiving the full body
    pub latency_ms: u64,
}

/// Whether a processing call is outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ProcessingState {
    #[default]
    Idle,
    Processing,
}

impl ProcessingState {
    /// Caption of the submit button in this state
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Remove Background",
            Self::Processing => "Processing...",
        }
    }

    #[must_use]
    pub fn is_processing(self) -> bool {
        self == Self::Processing
    }
}

impl std::fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Processing => f.write_str("processing"),
        }
    }
}

/// A client-side save of the processed bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveAction {
    /// Always `processed-image.png`
    pub file_name: &'static str,
    /// Byte-identical copy of the processed image
    pub bytes: Bytes,
}

impl SaveAction {
    pub(crate) fn new(bytes: Bytes) -> Self {
        Self {
            file_name: DOWNLOAD_FILE_NAME,
            bytes,
        }
    }
}

/// Snapshot of everything a front end needs to render the workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowView {
    /// Data URI of the source image, if one is selected
    pub source_preview: Option<String>,
    /// Handle of the processed image, if one exists
    pub processed_preview: Option<BlobHandle>,
    /// Whether "Remove Background" can be pressed
    pub submit_enabled: bool,
    /// Caption of the submit button
    pub submit_label: &'static str,
    /// Whether "Download" can be pressed
    pub download_enabled: bool,
}
