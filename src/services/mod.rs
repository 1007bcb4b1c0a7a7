//! Service layer
//!
//! Service types that keep infrastructure concerns (files, alerts, progress)
//! out of the workflow controller.

pub mod io;
pub mod notify;
pub mod progress;

pub use io::ImageIOService;
pub use notify::{LogNotifier, Notifier, RecordingNotifier};
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
