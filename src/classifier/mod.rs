//! Classifier boundary
//!
//! The object-detection model is an external collaborator. The pipeline only
//! sees the [`Classifier`] trait: given a photo path it returns the dominant
//! object label, `None` when nothing was detected, or a
//! [`ClassificationError`]. A classification error is not a processing
//! failure: the pipeline records an absent label and still consumes the item.
//!
//! # Submodules
//!
//! - `command` - Classifier backed by an external program

pub mod command;

pub use command::CommandClassifier;

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Label of the dominant object found in a photo
pub type Label = String;

/// Why a single classification failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    /// The classifier could not be started
    #[error("failed to start classifier '{program}': {message}")]
    Spawn { program: String, message: String },

    /// The classifier ran but reported failure
    #[error("classifier exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// The classifier produced output that is not a label
    #[error("classifier produced invalid output: {0}")]
    InvalidOutput(String),

    /// The classifier panicked
    #[error("classifier panicked: {0}")]
    Panicked(String),

    /// The classifier did not finish before its deadline and was stopped
    #[error("classifier timed out after {0:?}")]
    TimedOut(Duration),
}

/// Classifies a single photo
///
/// Implementations must be shareable across threads: the pipeline may run
/// several classifications at once. A classifier that cannot stop its own
/// work is run on a helper thread to enforce the timeout.
pub trait Classifier: Send + Sync {
    /// Classify the photo at `path`
    fn classify(&self, path: &Path) -> Result<Option<Label>, ClassificationError>;

    /// Whether [`classify_with_deadline`](Self::classify_with_deadline)
    /// stops the work itself once the deadline passes
    fn supports_deadline(&self) -> bool {
        false
    }

    /// Classify, giving up after `timeout` with
    /// [`ClassificationError::TimedOut`]. Only called when
    /// [`supports_deadline`](Self::supports_deadline) is true.
    fn classify_with_deadline(
        &self,
        path: &Path,
        timeout: Duration,
    ) -> Result<Option<Label>, ClassificationError> {
        let _ = timeout;
        self.classify(path)
    }

    /// Short name for log messages
    fn name(&self) -> &str {
        "classifier"
    }
}
