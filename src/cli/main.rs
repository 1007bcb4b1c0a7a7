//! Remote Background Removal CLI Tool
//!
//! Command-line front end for one select → submit → download cycle.

use super::config::CliConfigBuilder;
use crate::{
    backends::{MockBackend, RemovalBackend, RemoveBgBackend},
    config::{ServiceConfig, SizeMode},
    controller::{AbortHandle, ImageWorkflowController, SubmitOutcome},
    services::{
        ConsoleProgressReporter, ImageIOService, LogNotifier, ProcessingStage, ProgressReporter,
        ProgressUpdate,
    },
    tracing_config::{TracingConfig, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Remove image backgrounds through a remote service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "remote-bgremove")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Image file to process
    #[arg(value_name = "INPUT", required_unless_present = "show_config")]
    pub input: Option<PathBuf>,

    /// Directory the processed image is saved into (as processed-image.png)
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// API key for the removal service
    #[arg(long, env = "REMOVE_BG_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Service endpoint [default: https://api.remove.bg/v1.0/removebg]
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Requested result size
    #[arg(short, long, value_enum)]
    pub size: Option<CliSizeMode>,

    /// Abort the request after this many seconds
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Refuse input files larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    pub max_upload_bytes: Option<u64>,

    /// JSON config file [default: <config dir>/remote-bgremove/config.json]
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run the full workflow against a local echo backend instead of the service
    #[arg(long)]
    pub dry_run: bool,

    /// Print the resolved configuration (API key redacted) and exit
    #[arg(long)]
    pub show_config: bool,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliSizeMode {
    Auto,
    Preview,
    Small,
    Regular,
    Medium,
    Hd,
    Full,
    #[value(name = "4k")]
    FourK,
}

impl From<CliSizeMode> for SizeMode {
    fn from(mode: CliSizeMode) -> Self {
        match mode {
            CliSizeMode::Auto => SizeMode::Auto,
            CliSizeMode::Preview => SizeMode::Preview,
            CliSizeMode::Small => SizeMode::Small,
            CliSizeMode::Regular => SizeMode::Regular,
            CliSizeMode::Medium => SizeMode::Medium,
            CliSizeMode::Hd => SizeMode::Hd,
            CliSizeMode::Full => SizeMode::Full,
            CliSizeMode::FourK => SizeMode::FourK,
        }
    }
}

/// Spinner shown while a request is in flight
struct SpinnerProgressReporter {
    bar: ProgressBar,
}

impl SpinnerProgressReporter {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl ProgressReporter for SpinnerProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        match update.bytes_received {
            Some(bytes) => self.bar.set_message(format!(
                "{} ({:.1} KB)",
                update.description,
                bytes as f64 / 1024.0
            )),
            None => self.bar.set_message(update.description),
        }
        if update.stage == ProcessingStage::Cancelled {
            self.bar.abandon_with_message("Processing cancelled");
        }
    }

    fn report_completion(&self, total_ms: u64) {
        self.bar
            .finish_with_message(format!("✅ Background removed in {}ms", total_ms));
    }

    fn report_error(&self, stage: ProcessingStage, _error: &str) {
        self.bar
            .abandon_with_message(format!("❌ Failed while {}", stage.description().to_lowercase()));
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _tracing_guard = init_tracing(cli.verbose).context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    if cli.show_config {
        return show_config(&config);
    }

    let input = cli
        .input
        .as_ref()
        .context("An input image is required")?;

    let backend: Arc<dyn RemovalBackend> = if cli.dry_run {
        println!("🧪 Dry run: the image is echoed back without contacting the service");
        Arc::new(MockBackend::echo())
    } else {
        Arc::new(RemoveBgBackend::new(&config).context("Failed to create service backend")?)
    };
    info!("Backend: {}, endpoint: {}", backend.name(), config.endpoint);

    // Spinner redraws would interleave with log lines
    let progress: Arc<dyn ProgressReporter> = if cli.verbose > 0 {
        Arc::new(ConsoleProgressReporter::new(cli.verbose > 1))
    } else {
        Arc::new(SpinnerProgressReporter::new())
    };
    let mut controller = ImageWorkflowController::new(backend, &config)
        .with_notifier(Arc::new(LogNotifier::with_stderr()))
        .with_progress_reporter(progress);

    // Ctrl-C cancels an in-flight request; otherwise it ends the process
    let abort = controller.abort_handle();
    let ctrl_c = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt_should_exit(&abort) {
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
            warn!("Cancellation requested");
        }
    });

    let result = run_cycle(&cli, &config, input, &mut controller).await;
    ctrl_c.abort();
    result
}

/// Conventional exit status for SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cancel the request in flight; true when there was none to cancel
fn interrupt_should_exit(abort: &AbortHandle) -> bool {
    !abort.abort()
}

/// Pick → submit → download, the way the page's three buttons do it
async fn run_cycle(
    cli: &Cli,
    config: &ServiceConfig,
    input: &Path,
    controller: &mut ImageWorkflowController,
) -> Result<()> {
    let source = ImageIOService::read_source(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    if !ImageIOService::accepts_image(source.mime_type()) {
        anyhow::bail!(
            "{} is not an image (detected {})",
            input.display(),
            source.mime_type()
        );
    }
    ImageIOService::check_upload_size(source.len() as u64, config.max_upload_bytes)
        .with_context(|| format!("{} is too large", input.display()))?;

    let file_name = source.file_name().map(ToString::to_string);
    if controller
        .select_file(source.bytes().clone(), source.mime_type(), file_name)
        .is_none()
    {
        anyhow::bail!("{} is empty", input.display());
    }
    println!(
        "🖼️  Selected {} ({} bytes, {})",
        input.display(),
        source.len(),
        source.mime_type()
    );

    match controller.submit().await {
        SubmitOutcome::Completed(processed) => {
            println!(
                "🔗 Preview handle: {} ({} bytes, {})",
                processed.handle,
                processed.size_bytes,
                processed.content_type.as_deref().unwrap_or("unknown type")
            );
        },
        SubmitOutcome::Failed(e) => {
            return Err(anyhow::Error::new(e).context("Background removal failed"));
        },
        SubmitOutcome::Cancelled => anyhow::bail!("Processing cancelled"),
        SubmitOutcome::Skipped => anyhow::bail!("Nothing to submit"),
    }

    let saved = controller
        .download_to(&cli.output)
        .await
        .context("Failed to save processed image")?
        .context("No processed image to download")?;
    println!("✅ Saved {}", saved.display());

    Ok(())
}

/// Initialize tracing based on verbosity level, honouring RUST_LOG when set
fn init_tracing(verbose_count: u8) -> Result<crate::tracing_config::TracingGuard> {
    let mut tracing = TracingConfig::new()
        .with_verbosity(verbose_count)
        .with_format(TracingFormat::Console);
    if let Ok(filter) = std::env::var("RUST_LOG") {
        tracing = tracing.with_env_filter(filter);
    }
    tracing
        .init()
        .context("Failed to initialize tracing subscriber")
}

/// Print the effective configuration
fn show_config(config: &ServiceConfig) -> Result<()> {
    println!("⚙️  Resolved configuration");
    println!("{}", serde_json::to_string_pretty(config)?);
    println!(
        "   API key: {}",
        if config.api_key.is_some() {
            "configured"
        } else {
            "missing"
        }
    );
    if let Some(path) = ServiceConfig::default_config_path() {
        println!("   Default config file: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_exits_when_idle() {
        let controller =
            ImageWorkflowController::new(Arc::new(MockBackend::echo()), &ServiceConfig::default());
        assert!(interrupt_should_exit(&controller.abort_handle()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_cancels_request_in_flight() {
        let backend = Arc::new(MockBackend::echo().with_delay(Duration::from_secs(60)));
        let mut controller = ImageWorkflowController::new(backend, &ServiceConfig::default());
        controller.select_file(&b"img"[..], "image/png", None);

        let abort = controller.abort_handle();
        let (outcome, should_exit) = tokio::join!(controller.submit(), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            interrupt_should_exit(&abort)
        });

        assert!(!should_exit);
        assert!(matches!(outcome, SubmitOutcome::Cancelled));
        assert!(interrupt_should_exit(&abort));
    }
}
