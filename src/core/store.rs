//! Persistent store for the dataset registry
//!
//! The registry document is stored as pretty-printed JSON:
//!
//! ```json
//! {
//!   "minor_datasets": { "ds1": ["001", "002", "003"] },
//!   "progress": {
//!     "ds1": { "processed": ["002"], "pending": ["001", "003"] }
//!   }
//! }
//! ```
//!
//! `processed` is kept in completion order, `pending` in catalog order.
//! Saves go to a temporary file in the target directory that is then
//! renamed over the registry file, so a reader sees either the previous
//! document or the new one.

use crate::core::error::{Result, TrackerError};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// The full durable representation of the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDocument {
    /// Immutable catalog of photo ids per dataset
    pub minor_datasets: BTreeMap<String, Vec<String>>,

    /// Pending/processed partition per dataset
    pub progress: BTreeMap<String, DatasetProgress>,
}

/// Processing progress of a single dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetProgress {
    /// Processed photo ids, in completion order
    pub processed: Vec<String>,

    /// Pending photo ids, in catalog order
    pub pending: Vec<String>,
}

impl RegistryDocument {
    /// Check that every dataset's progress partitions its catalog.
    ///
    /// Returns a human-readable description of the first violation found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for dataset_id in self.progress.keys() {
            if !self.minor_datasets.contains_key(dataset_id) {
                return Err(format!(
                    "progress entry for '{}' has no catalog",
                    dataset_id
                ));
            }
        }

        for (dataset_id, catalog) in &self.minor_datasets {
            let progress = self
                .progress
                .get(dataset_id)
                .ok_or_else(|| format!("dataset '{}' has no progress entry", dataset_id))?;

            let catalog_set: HashSet<&str> = catalog.iter().map(String::as_str).collect();
            if catalog_set.len() != catalog.len() {
                return Err(format!(
                    "catalog of '{}' contains duplicate photo ids",
                    dataset_id
                ));
            }

            let mut seen = HashSet::with_capacity(catalog.len());
            for photo_id in progress.processed.iter().chain(progress.pending.iter()) {
                if !catalog_set.contains(photo_id.as_str()) {
                    return Err(format!(
                        "photo '{}' of '{}' is not in its catalog",
                        photo_id, dataset_id
                    ));
                }
                if !seen.insert(photo_id.as_str()) {
                    return Err(format!(
                        "photo '{}' of '{}' is listed more than once",
                        photo_id, dataset_id
                    ));
                }
            }

            if seen.len() != catalog_set.len() {
                return Err(format!(
                    "progress of '{}' covers {} of {} catalog entries",
                    dataset_id,
                    seen.len(),
                    catalog_set.len()
                ));
            }
        }

        Ok(())
    }
}

/// Durable storage for the registry document
///
/// The registry is the only caller; it serializes access under its own lock.
pub trait DocumentStore: Send {
    /// Load the stored document, or the empty document if none exists yet
    fn load(&self) -> Result<RegistryDocument>;

    /// Replace the stored document with `document`
    fn save(&mut self, document: &RegistryDocument) -> Result<()>;

    /// Human-readable location for log messages
    fn location(&self) -> String;
}

/// Registry document stored as a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by the file at `path`
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    fn corrupt(&self, message: impl Into<String>) -> TrackerError {
        TrackerError::CorruptStore {
            path: self.path.clone(),
            message: message.into(),
        }
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self) -> Result<RegistryDocument> {
        if !self.path.exists() {
            debug!(
                "No registry file at {}, starting empty",
                self.path.display()
            );
            return Ok(RegistryDocument::default());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            TrackerError::IoError(format!(
                "Failed to read registry file '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        let document: RegistryDocument =
            serde_json::from_str(&content).map_err(|e| self.corrupt(e.to_string()))?;
        document.validate().map_err(|e| self.corrupt(e))?;

        trace!(
            "Loaded registry with {} datasets from {}",
            document.minor_datasets.len(),
            self.path.display()
        );
        Ok(document)
    }

    fn save(&mut self, document: &RegistryDocument) -> Result<()> {
        write_json_atomic(&self.path, document)?;
        trace!("Saved registry to {}", self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Write `value` as pretty JSON to `path` by way of a temporary sibling file.
///
/// The temporary file is created in the target directory so the final
/// rename never crosses a filesystem boundary.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    fs::create_dir_all(&dir).map_err(|e| {
        TrackerError::IoError(format!(
            "Failed to create directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| {
        TrackerError::IoError(format!(
            "Failed to create temporary file in '{}': {}",
            dir.display(),
            e
        ))
    })?;

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value).map_err(|e| {
            TrackerError::IoError(format!("Failed to serialize '{}': {}", path.display(), e))
        })?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| {
        TrackerError::IoError(format!(
            "Failed to replace '{}': {}",
            path.display(),
            e.error
        ))
    })?;

    Ok(())
}
