//! Error types for the photo batch tracker
//!
//! Registry invariant violations (`InvalidInput`, `UnknownDataset`) abort
//! only the operation that raised them. `CorruptStore` and `Discovery` are
//! fatal for a whole pipeline run.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the photo batch tracker
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Bad caller arguments (empty or duplicate photo ids, empty names)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The operation referenced a dataset that was never registered
    #[error("Unknown dataset: '{0}'")]
    UnknownDataset(String),

    /// The registry file exists but does not match the expected schema
    #[error("Registry file '{}' is corrupt: {message}. Refusing to continue so prior progress is not discarded.", path.display())]
    CorruptStore { path: PathBuf, message: String },

    /// Dataset discovery failed
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Writing a results file failed
    #[error("Failed to write results for dataset '{dataset_id}': {message}")]
    ResultWrite { dataset_id: String, message: String },

    /// A thread panicked while holding the registry lock
    #[error("Registry state lock poisoned")]
    StatePoisoned,

    /// General I/O error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TrackerError>;

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::IoError(err.to_string())
    }
}

impl TrackerError {
    /// Whether this error must halt the whole pipeline run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TrackerError::CorruptStore { .. }
                | TrackerError::Discovery(_)
                | TrackerError::StatePoisoned
                | TrackerError::IoError(_)
        )
    }
}
