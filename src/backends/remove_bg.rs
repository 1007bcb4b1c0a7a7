//! HTTP backend for the remove.bg API and compatible services

use super::{RemovalBackend, RemovalRequest, RemovalResponse};
use crate::{
    config::ServiceConfig,
    error::{Result, WorkflowError},
    services::{ProcessingStage, ProgressTracker},
};
use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    multipart::{Form, Part},
    Body, Client,
};
use tracing::{debug, instrument};

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Longest error body excerpt written to the debug log
const ERROR_BODY_PREVIEW: usize = 200;

/// Backend posting multipart requests to a remove.bg style endpoint
pub struct RemoveBgBackend {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for RemoveBgBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoveBgBackend")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl RemoveBgBackend {
    /// Create a backend from a validated configuration
    ///
    /// # Errors
    /// - Invalid configuration or missing API key
    /// - Failed to create HTTP client
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config.require_api_key()?.to_string();

        let client = Client::builder()
            .user_agent(concat!("remote-bgremove/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WorkflowError::network_error("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }

    /// Multipart body: `image_file` with the original bytes, `size` with the mode
    fn build_form(request: &RemovalRequest) -> Form {
        let source = &request.source;
        let make_part = || {
            Part::stream_with_length(Body::from(source.bytes().clone()), source.len() as u64)
                .file_name(source.upload_file_name().to_string())
        };

        let part = make_part().mime_str(source.mime_type()).unwrap_or_else(|e| {
            log::warn!(
                "Declared MIME type '{}' is not valid ({}), sending without it",
                source.mime_type(),
                e
            );
            make_part()
        });

        Form::new()
            .part("image_file", part)
            .text("size", request.size.as_str())
    }
}

#[async_trait]
impl RemovalBackend for RemoveBgBackend {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, bytes = request.source.len()))]
    async fn remove_background(
        &self,
        request: &RemovalRequest,
        progress: &ProgressTracker,
    ) -> Result<RemovalResponse> {
        progress.report_stage(ProcessingStage::Uploading);
        let form = Self::build_form(request);

        let send = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .header(ACCEPT, "image/*")
            .multipart(form)
            .send();
        progress.report_stage(ProcessingStage::AwaitingResponse);

        let response = send.await.map_err(|e| {
            WorkflowError::network_error(format!("POST {} failed", self.endpoint), e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
            debug!(status = status.as_u16(), body = %preview, "Service rejected request");
            return Err(WorkflowError::HttpStatus {
                status: status.as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);

        let mut body = BytesMut::with_capacity(
            response
                .content_length()
                .map_or(0, |len| len as usize),
        );
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                WorkflowError::network_error("Failed to read response body", e)
            })?;
            body.extend_from_slice(&chunk);
            progress.report_received(body.len() as u64);
        }

        debug!(
            received = body.len(),
            content_type = content_type.as_deref().unwrap_or("unknown"),
            "Service returned processed image"
        );

        Ok(RemovalResponse {
            bytes: body.freeze(),
            content_type,
        })
    }

    fn name(&self) -> &'static str {
        "remove.bg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let config = ServiceConfig::default();
        let err = RemoveBgBackend::new(&config).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_invalid_endpoint() {
        let mut config = ServiceConfig::builder().api_key("key").build().unwrap();
        config.endpoint = "localhost:8080".to_string();
        assert!(RemoveBgBackend::new(&config).is_err());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = ServiceConfig::builder().api_key("top-secret").build().unwrap();
        let backend = RemoveBgBackend::new(&config).unwrap();
        let debug = format!("{:?}", backend);
        assert!(debug.contains("api.remove.bg"));
        assert!(!debug.contains("top-secret"));
        assert_eq!(backend.name(), "remove.bg");
    }
}
