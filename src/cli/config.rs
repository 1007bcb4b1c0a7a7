//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::{ServiceConfig, ServiceConfigBuilder};
use anyhow::{Context, Result};

/// Convert CLI arguments to a `ServiceConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Layer the CLI flags over the config file and environment
    pub(crate) fn from_cli(cli: &Cli) -> Result<ServiceConfig> {
        let base = ServiceConfig::resolve(cli.config.as_deref())
            .context("Failed to load configuration")?;

        let mut builder = ServiceConfigBuilder::from_config(base);
        if let Some(key) = &cli.api_key {
            builder = builder.api_key(key.clone());
        }
        if let Some(endpoint) = &cli.endpoint {
            builder = builder.endpoint(endpoint.clone());
        }
        if let Some(size) = cli.size {
            builder = builder.size(size.into());
        }
        if let Some(timeout) = cli.timeout {
            builder = builder.timeout_secs(timeout);
        }
        if let Some(limit) = cli.max_upload_bytes {
            builder = builder.max_upload_bytes(limit);
        }

        builder.build().context("Invalid configuration")
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.timeout == Some(0) {
            anyhow::bail!("--timeout must be at least 1 second");
        }
        if cli.max_upload_bytes == Some(0) {
            anyhow::bail!("--max-upload-bytes must be at least 1");
        }
        if cli.output.is_file() {
            anyhow::bail!(
                "Output path exists and is a file, not a directory: {}",
                cli.output.display()
            );
        }
        Ok(())
    }
}
