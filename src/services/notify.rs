//! User-facing notifications
//!
//! A failed processing attempt raises exactly one alert. Front ends decide how
//! an alert is shown; the library only decides when.

use std::sync::{Arc, Mutex, PoisonError};

/// Sink for user-facing alerts
pub trait Notifier: Send + Sync {
    /// Show an alert to the user
    fn alert(&self, message: &str);
}

/// Notifier that writes alerts to the log, and optionally to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier {
    echo_stderr: bool,
}

impl LogNotifier {
    /// Notifier that also prints alerts on stderr (for terminal front ends)
    #[must_use]
    pub fn with_stderr() -> Self {
        Self { echo_stderr: true }
    }
}

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        tracing::warn!(alert = %message, "User alert raised");
        if self.echo_stderr {
            eprintln!("⚠️  {}", message);
        }
    }
}

/// Notifier that keeps every alert, for tests and embedding front ends
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All alerts raised so far, oldest first
    #[must_use]
    pub fn alerts(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of alerts raised so far
    #[must_use]
    pub fn count(&self) -> usize {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
