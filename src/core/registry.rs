//! Dataset registry and progress tracking
//!
//! The registry is the authoritative record of which datasets are known,
//! which photos belong to each of them, and which photos have already been
//! processed. For every registered dataset the processed and pending lists
//! partition the catalog, and a photo only ever moves from pending to
//! processed.
//!
//! Every mutation is persisted through the [`DocumentStore`] before the call
//! returns. If persisting fails the in-memory change is rolled back, so the
//! registry never reports state that is not on disk.
//!
//! # Example
//!
//! ```rust,no_run
//! use photo_batch_tracker::core::registry::Registry;
//! use photo_batch_tracker::core::store::JsonFileStore;
//!
//! let registry = Registry::open(Box::new(JsonFileStore::new("registry.json")))?;
//! registry.register("ds1", &["001".to_string(), "002".to_string()])?;
//! registry.mark_processed("ds1", "001")?;
//! assert_eq!(registry.pending_items("ds1")?, vec!["002".to_string()]);
//! # Ok::<(), photo_batch_tracker::core::error::TrackerError>(())
//! ```

use crate::core::error::{Result, TrackerError};
use crate::core::store::{DatasetProgress, DocumentStore, RegistryDocument};
use log::{debug, info};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// Processing counts for one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetStatus {
    pub dataset_id: String,
    pub total: usize,
    pub processed: usize,
    pub pending: usize,
}

impl DatasetStatus {
    /// Whether every photo of the dataset has been processed
    pub fn is_complete(&self) -> bool {
        self.pending == 0
    }
}

struct RegistryState {
    document: RegistryDocument,
    store: Box<dyn DocumentStore>,
}

/// Registry of datasets and their per-photo processing state
///
/// All methods take `&self`; one lock guards both the document and the
/// store, so at most one mutate-then-persist sequence is in flight.
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    /// Open a registry from `store`, starting empty if nothing is stored yet
    pub fn open(store: Box<dyn DocumentStore>) -> Result<Self> {
        let document = store.load()?;
        info!(
            "Loaded registry from {} ({} datasets)",
            store.location(),
            document.minor_datasets.len()
        );

        Ok(Self {
            state: Mutex::new(RegistryState { document, store }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistryState>> {
        self.state.lock().map_err(|_| TrackerError::StatePoisoned)
    }

    /// Register a dataset with its catalog of photo ids.
    ///
    /// Registering a dataset that is already known is a no-op: the stored
    /// catalog and progress are left untouched. Returns `true` when the
    /// dataset was newly added.
    pub fn register(&self, dataset_id: &str, photo_ids: &[String]) -> Result<bool> {
        validate_registration(dataset_id, photo_ids)?;

        let mut state = self.lock()?;
        if state.document.minor_datasets.contains_key(dataset_id) {
            debug!("Dataset '{}' already registered, skipping", dataset_id);
            return Ok(false);
        }

        state
            .document
            .minor_datasets
            .insert(dataset_id.to_string(), photo_ids.to_vec());
        state.document.progress.insert(
            dataset_id.to_string(),
            DatasetProgress {
                processed: Vec::new(),
                pending: photo_ids.to_vec(),
            },
        );

        let RegistryState { document, store } = &mut *state;
        if let Err(e) = store.save(document) {
            document.minor_datasets.remove(dataset_id);
            document.progress.remove(dataset_id);
            return Err(e);
        }

        info!(
            "Registered dataset '{}' ({} photos)",
            dataset_id,
            photo_ids.len()
        );
        Ok(true)
    }

    /// Pending photo ids of a dataset, in catalog order
    pub fn pending_items(&self, dataset_id: &str) -> Result<Vec<String>> {
        let state = self.lock()?;
        state
            .document
            .progress
            .get(dataset_id)
            .map(|p| p.pending.clone())
            .ok_or_else(|| TrackerError::UnknownDataset(dataset_id.to_string()))
    }

    /// Move a photo from pending to processed.
    ///
    /// Marking a photo that is already processed, or that is not part of the
    /// dataset, is a no-op. Returns `true` when a transition happened.
    pub fn mark_processed(&self, dataset_id: &str, photo_id: &str) -> Result<bool> {
        let mut state = self.lock()?;
        let RegistryState { document, store } = &mut *state;

        let progress = document
            .progress
            .get_mut(dataset_id)
            .ok_or_else(|| TrackerError::UnknownDataset(dataset_id.to_string()))?;

        let Some(index) = progress.pending.iter().position(|p| p == photo_id) else {
            debug!(
                "Photo '{}' of '{}' is not pending, nothing to mark",
                photo_id, dataset_id
            );
            return Ok(false);
        };

        let moved = progress.pending.remove(index);
        progress.processed.push(moved);

        if let Err(e) = store.save(document) {
            // Restore the exact previous position so catalog order is kept
            if let Some(progress) = document.progress.get_mut(dataset_id) {
                if let Some(moved) = progress.processed.pop() {
                    progress.pending.insert(index, moved);
                }
            }
            return Err(e);
        }

        debug!("Marked {}/{} as processed", dataset_id, photo_id);
        Ok(true)
    }

    /// Whether a dataset has been registered
    pub fn contains(&self, dataset_id: &str) -> Result<bool> {
        Ok(self.lock()?.document.minor_datasets.contains_key(dataset_id))
    }

    /// Ids of all registered datasets, sorted
    pub fn dataset_ids(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.document.minor_datasets.keys().cloned().collect())
    }

    /// The registration-time catalog of a dataset
    pub fn catalog(&self, dataset_id: &str) -> Result<Vec<String>> {
        let state = self.lock()?;
        state
            .document
            .minor_datasets
            .get(dataset_id)
            .cloned()
            .ok_or_else(|| TrackerError::UnknownDataset(dataset_id.to_string()))
    }

    /// Processed photo ids of a dataset, in completion order
    pub fn processed_items(&self, dataset_id: &str) -> Result<Vec<String>> {
        let state = self.lock()?;
        state
            .document
            .progress
            .get(dataset_id)
            .map(|p| p.processed.clone())
            .ok_or_else(|| TrackerError::UnknownDataset(dataset_id.to_string()))
    }

    /// Processing counts for one dataset
    pub fn progress(&self, dataset_id: &str) -> Result<DatasetStatus> {
        let state = self.lock()?;
        let catalog = state
            .document
            .minor_datasets
            .get(dataset_id)
            .ok_or_else(|| TrackerError::UnknownDataset(dataset_id.to_string()))?;
        let progress = state
            .document
            .progress
            .get(dataset_id)
            .ok_or_else(|| TrackerError::UnknownDataset(dataset_id.to_string()))?;

        Ok(DatasetStatus {
            dataset_id: dataset_id.to_string(),
            total: catalog.len(),
            processed: progress.processed.len(),
            pending: progress.pending.len(),
        })
    }

    /// Processing counts for every registered dataset, sorted by id
    pub fn status(&self) -> Result<Vec<DatasetStatus>> {
        let state = self.lock()?;
        Ok(state
            .document
            .minor_datasets
            .iter()
            .map(|(dataset_id, catalog)| {
                let progress = state.document.progress.get(dataset_id);
                DatasetStatus {
                    dataset_id: dataset_id.clone(),
                    total: catalog.len(),
                    processed: progress.map_or(0, |p| p.processed.len()),
                    pending: progress.map_or(0, |p| p.pending.len()),
                }
            })
            .collect())
    }

    /// A copy of the full registry document
    pub fn snapshot(&self) -> Result<RegistryDocument> {
        Ok(self.lock()?.document.clone())
    }
}

fn validate_registration(dataset_id: &str, photo_ids: &[String]) -> Result<()> {
    if dataset_id.is_empty() {
        return Err(TrackerError::InvalidInput(
            "dataset id must not be empty".to_string(),
        ));
    }

    if photo_ids.is_empty() {
        return Err(TrackerError::InvalidInput(format!(
            "dataset '{}' has no photo ids",
            dataset_id
        )));
    }

    let mut seen = HashSet::with_capacity(photo_ids.len());
    for photo_id in photo_ids {
        if photo_id.is_empty() {
            return Err(TrackerError::InvalidInput(format!(
                "dataset '{}' contains an empty photo id",
                dataset_id
            )));
        }
        if !seen.insert(photo_id.as_str()) {
            return Err(TrackerError::InvalidInput(format!(
                "dataset '{}' lists photo '{}' more than once",
                dataset_id, photo_id
            )));
        }
    }

    Ok(())
}
