//! File I/O operations service
//!
//! This module separates reading picked files and writing downloads from the
//! workflow logic, making the controller testable without a filesystem.

use crate::{
    error::{Result, WorkflowError},
    types::{SaveAction, SourceImage},
};
use image::ImageFormat;
use std::path::{Path, PathBuf};

/// MIME type used when nothing better can be determined
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Read a picked file into a `SourceImage`
    ///
    /// The MIME type is sniffed from the content first and from the extension
    /// second. No validation of the content is performed.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use remote_bgremove::services::ImageIOService;
    ///
    /// # async fn example() -> remote_bgremove::Result<()> {
    /// let source = ImageIOService::read_source("portrait.jpg").await?;
    /// println!("{} bytes of {}", source.len(), source.mime_type());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn read_source<P: AsRef<Path>>(path: P) -> Result<SourceImage> {
        let path_ref = path.as_ref();
        let bytes = tokio::fs::read(path_ref)
            .await
            .map_err(|e| WorkflowError::file_io_error("read image file", path_ref, &e))?;

        let mime_type = Self::detect_mime(&bytes, Some(path_ref));
        let file_name = path_ref
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToString::to_string);

        log::debug!(
            "Read {} ({} bytes, {})",
            path_ref.display(),
            bytes.len(),
            mime_type
        );
        Ok(SourceImage::new(bytes, mime_type, file_name))
    }

    /// Determine the MIME type of file content
    #[must_use]
    pub fn detect_mime(bytes: &[u8], path: Option<&Path>) -> String {
        if let Ok(format) = image::guess_format(bytes) {
            return format.to_mime_type().to_string();
        }

        path.and_then(Path::extension)
            .and_then(ImageFormat::from_extension)
            .map_or_else(
                || FALLBACK_MIME_TYPE.to_string(),
                |format| format.to_mime_type().to_string(),
            )
    }

    /// The `image/*` filter of the file picker
    #[must_use]
    pub fn accepts_image(mime_type: &str) -> bool {
        mime_type
            .split('/')
            .next()
            .is_some_and(|top| top.eq_ignore_ascii_case("image"))
            && mime_type.contains('/')
    }

    /// Check an upload against an optional size limit
    pub fn check_upload_size(len: u64, limit: Option<u64>) -> Result<()> {
        match limit {
            Some(max) if len > max => Err(WorkflowError::config_value_error(
                "upload size",
                len,
                &format!("0-{} bytes", max),
                None,
            )),
            _ => Ok(()),
        }
    }

    /// Write a save action into a directory, creating it if needed
    ///
    /// Returns the path of the written file.
    pub async fn write_save_action<P: AsRef<Path>>(dir: P, action: &SaveAction) -> Result<PathBuf> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| WorkflowError::file_io_error("create output directory", dir, &e))?;

        let target = dir.join(action.file_name);
        tokio::fs::write(&target, &action.bytes)
            .await
            .map_err(|e| WorkflowError::file_io_error("write processed image", &target, &e))?;

        log::info!("Saved {} bytes to {}", action.bytes.len(), target.display());
        Ok(target)
    }
}
