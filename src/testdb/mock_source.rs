//! Fixed dataset discovery and in-memory result collection

use crate::core::error::{Result, TrackerError};
use crate::core::results::{ResultSet, ResultWriter};
use crate::source::{DiscoveredDataset, Discoverer};
use std::path::PathBuf;
use std::sync::Mutex;

/// Discoverer that always reports the same datasets, or always fails
#[derive(Debug, Clone)]
pub struct StaticDiscoverer {
    outcome: std::result::Result<Vec<DiscoveredDataset>, String>,
}

impl StaticDiscoverer {
    pub fn new(datasets: Vec<DiscoveredDataset>) -> Self {
        Self {
            outcome: Ok(datasets),
        }
    }

    /// Discoverer whose every call fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
        }
    }
}

impl Discoverer for StaticDiscoverer {
    fn discover(&self) -> Result<Vec<DiscoveredDataset>> {
        self.outcome.clone().map_err(TrackerError::Discovery)
    }
}

/// Result writer that keeps every write in memory
#[derive(Debug, Default)]
pub struct RecordingWriter {
    written: Mutex<Vec<(String, ResultSet)>>,
    fail: bool,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer whose every write fails
    pub fn failing() -> Self {
        Self {
            written: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// All successful writes, oldest first
    pub fn written(&self) -> Vec<(String, ResultSet)> {
        self.written
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }
}

impl ResultWriter for RecordingWriter {
    fn write(&self, dataset_id: &str, results: &ResultSet) -> Result<PathBuf> {
        if self.fail {
            return Err(TrackerError::ResultWrite {
                dataset_id: dataset_id.to_string(),
                message: "Simulated write failure".to_string(),
            });
        }

        self.written
            .lock()
            .map_err(|_| TrackerError::StatePoisoned)?
            .push((dataset_id.to_string(), results.clone()));
        Ok(PathBuf::from(format!("memory://results_{}.json", dataset_id)))
    }
}
