//! Configuration types for the remote background removal workflow

use crate::error::{Result, WorkflowError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default endpoint of the remove.bg API
pub const DEFAULT_ENDPOINT: &str = "https://api.remove.bg/v1.0/removebg";

/// Environment variable holding the service API key
pub const API_KEY_ENV: &str = "REMOVE_BG_API_KEY";

/// Environment variable overriding the service endpoint
pub const ENDPOINT_ENV: &str = "REMOVE_BG_ENDPOINT";

/// Size of the result requested from the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeMode {
    /// Highest resolution available for the account (default)
    #[default]
    Auto,
    /// Low resolution preview (up to 0.25 megapixels)
    Preview,
    /// Alias of `Preview`
    Small,
    /// Alias of `Preview`
    Regular,
    /// Up to 1.5 megapixels
    Medium,
    /// Up to 4 megapixels
    Hd,
    /// Original resolution, up to 25 megapixels
    Full,
    /// Alias of `Full`
    #[serde(rename = "4k")]
    FourK,
}

impl SizeMode {
    /// Value sent in the `size` form field
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Preview => "preview",
            Self::Small => "small",
            Self::Regular => "regular",
            Self::Medium => "medium",
            Self::Hd => "hd",
            Self::Full => "full",
            Self::FourK => "4k",
        }
    }
}

impl std::fmt::Display for SizeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SizeMode {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "preview" => Ok(Self::Preview),
            "small" => Ok(Self::Small),
            "regular" => Ok(Self::Regular),
            "medium" => Ok(Self::Medium),
            "hd" => Ok(Self::Hd),
            "full" => Ok(Self::Full),
            "4k" => Ok(Self::FourK),
            other => Err(WorkflowError::invalid_config(format!(
                "Unknown size mode '{}'. Expected one of: auto, preview, small, regular, medium, hd, full, 4k",
                other
            ))),
        }
    }
}

/// Connection settings for the background removal service
///
/// The API key is resolved at runtime (command line, environment or config file)
/// and is never written back out when the configuration is serialized.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Endpoint receiving the multipart POST
    pub endpoint: String,

    /// Credential sent in the `X-Api-Key` header
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Value of the `size` form field
    pub size: SizeMode,

    /// Request timeout in seconds (None = wait for the transport to give up)
    pub timeout_secs: Option<u64>,

    /// Refuse uploads larger than this many bytes (None = no limit)
    pub max_upload_bytes: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            size: SizeMode::Auto,
            timeout_secs: None,
            max_upload_bytes: None,
        }
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("size", &self.size)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use remote_bgremove::{ServiceConfig, SizeMode};
    ///
    /// let config = ServiceConfig::builder()
    ///     .api_key("my-key")
    ///     .size(SizeMode::Preview)
    ///     .timeout_secs(30)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.size.as_str(), "preview");
    /// ```
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Request timeout as a `Duration`
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// The API key, or an error explaining where to put one
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(WorkflowError::invalid_config(format!(
                "No API key configured. Pass --api-key, set {} or add \"api_key\" to the config file",
                API_KEY_ENV
            ))),
        }
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Endpoint is not an http(s) URL
    /// - Timeout outside 1-3600 seconds
    /// - Upload limit of zero bytes
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(WorkflowError::invalid_config(format!(
                "Endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }

        if let Some(timeout) = self.timeout_secs {
            if timeout == 0 || timeout > 3600 {
                return Err(WorkflowError::config_value_error(
                    "timeout",
                    timeout,
                    "1-3600 seconds",
                    Some(60),
                ));
            }
        }

        if self.max_upload_bytes == Some(0) {
            return Err(WorkflowError::config_value_error(
                "max upload bytes",
                0,
                "1 or more",
                Some(10 * 1024 * 1024),
            ));
        }

        Ok(())
    }

    /// Default location of the JSON config file
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("remote-bgremove").join("config.json"))
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WorkflowError::file_io_error("read config file", path, &e))?;
        serde_json::from_str(&contents).map_err(|e| {
            WorkflowError::invalid_config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Apply `REMOVE_BG_API_KEY` and `REMOVE_BG_ENDPOINT` on top of this configuration
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|e| !e.trim().is_empty()) {
            self.endpoint = endpoint;
        }
        self
    }

    /// Resolve the effective configuration: defaults, then the config file, then the environment
    ///
    /// An explicit `config_path` must exist; the default path is only read when present.
    pub fn resolve(config_path: Option<&Path>) -> Result<Self> {
        let base = match config_path {
            Some(path) => Self::from_json_file(path)?,
            None => match Self::default_config_path() {
                Some(path) if path.is_file() => {
                    log::debug!("Loading config from {}", path.display());
                    Self::from_json_file(path)?
                },
                _ => Self::default(),
            },
        };
        Ok(base.with_env_overrides())
    }
}

/// Builder for `ServiceConfig`
#[derive(Debug, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Start from an existing configuration
    #[must_use]
    pub fn from_config(config: ServiceConfig) -> Self {
        Self { config }
    }

    /// Set the endpoint URL
    #[must_use]
    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the API key
    #[must_use]
    pub fn api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Set the requested result size
    #[must_use]
    pub fn size(mut self, size: SizeMode) -> Self {
        self.config.size = size;
        self
    }

    /// Set the request timeout in seconds
    #[must_use]
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = Some(secs);
        self
    }

    /// Set the upload size limit in bytes
    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = Some(bytes);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ServiceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Behaviour switches for the workflow controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkflowOptions {
    /// Keep the previous processed image visible after a new file is selected
    ///
    /// Off by default: a new selection invalidates the old result so input and
    /// output never mismatch.
    pub keep_stale_output: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.size, SizeMode::Auto);
        assert!(config.api_key.is_none());
        assert!(config.request_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_edge_cases() {
        let mut config = ServiceConfig::default();
        config.endpoint = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.timeout_secs = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout"));

        config.timeout_secs = Some(3600);
        assert!(config.validate().is_ok());
        config.timeout_secs = Some(3601);
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.max_upload_bytes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_require_api_key() {
        let config = ServiceConfig::default();
        let err = config.require_api_key().unwrap_err();
        assert!(err.to_string().contains(API_KEY_ENV));

        let config = ServiceConfig::builder().api_key("   ").build().unwrap();
        assert!(config.require_api_key().is_err());

        let config = ServiceConfig::builder().api_key("abc").build().unwrap();
        assert_eq!(config.require_api_key().unwrap(), "abc");
    }

    #[test]
    fn test_api_key_is_never_serialized_or_printed() {
        let config = ServiceConfig::builder().api_key("secret-key").build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret-key"));
        assert!(!format!("{:?}", config).contains("secret-key"));
    }

    #[test]
    fn test_json_file_round_trip_keeps_key_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"endpoint":"http://localhost:9000/removebg","api_key":"from-file","size":"4k","timeout_secs":30}"#,
        )
        .unwrap();

        let config = ServiceConfig::from_json_file(&path).unwrap();
        assert_eq!(config.endpoint, "http://localhost:9000/removebg");
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.size, SizeMode::FourK);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert!(config.max_upload_bytes.is_none());
    }

    #[test]
    fn test_missing_explicit_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ServiceConfig::resolve(Some(&dir.path().join("nope.json")));
        assert!(matches!(result, Err(WorkflowError::Io(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (API_KEY_ENV, "env-key"),
            (ENDPOINT_ENV, "http://127.0.0.1:1234/removebg"),
        ]
        .into_iter()
        .collect();

        let config = ServiceConfig::default()
            .with_overrides_from(|name| env.get(name).map(|v| (*v).to_string()));
        assert_eq!(config.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.endpoint, "http://127.0.0.1:1234/removebg");

        let config = ServiceConfig::builder()
            .api_key("kept")
            .build()
            .unwrap()
            .with_overrides_from(|_| Some(String::new()));
        assert_eq!(config.api_key.as_deref(), Some("kept"));
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_size_mode_parsing() {
        assert_eq!("AUTO".parse::<SizeMode>().unwrap(), SizeMode::Auto);
        assert_eq!("4k".parse::<SizeMode>().unwrap(), SizeMode::FourK);
        assert_eq!(SizeMode::Hd.to_string(), "hd");
        assert!("huge".parse::<SizeMode>().is_err());
    }
}
