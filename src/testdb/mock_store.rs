//! In-memory registry store for testing without touching the disk

use crate::core::error::{Result, TrackerError};
use crate::core::store::{DocumentStore, RegistryDocument};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    document: Option<RegistryDocument>,
    fail_saves: bool,
    save_count: usize,
}

/// Document store that keeps the saved document in memory.
///
/// Clones share state, so a test can keep a handle after moving the store
/// into a [`Registry`](crate::core::registry::Registry) and inspect or
/// sabotage it from outside.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Empty store, as if no registry file existed yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following save fail until turned off again
    pub fn fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// The last successfully saved document
    pub fn saved(&self) -> Option<RegistryDocument> {
        self.lock().document.clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self) -> Result<RegistryDocument> {
        Ok(self.lock().document.clone().unwrap_or_default())
    }

    fn save(&mut self, document: &RegistryDocument) -> Result<()> {
        let mut state = self.lock();
        if state.fail_saves {
            return Err(TrackerError::IoError(
                "Simulated write failure".to_string(),
            ));
        }
        state.document = Some(document.clone());
        state.save_count += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let mut store = MemoryStore::new();
        let handle = store.clone();
        assert!(handle.saved().is_none());

        let mut document = RegistryDocument::default();
        document
            .minor_datasets
            .insert("ds1".to_string(), vec!["001".to_string()]);
        store.save(&document).unwrap();

        assert_eq!(handle.saved(), Some(document));
        assert_eq!(handle.save_count(), 1);
    }

    #[test]
    fn test_fail_saves() {
        let mut store = MemoryStore::new();
        store.fail_saves(true);
        assert!(store.save(&RegistryDocument::default()).is_err());
        assert_eq!(store.save_count(), 0);

        store.fail_saves(false);
        assert!(store.save(&RegistryDocument::default()).is_ok());
    }
}
