//! Source abstraction traits for testability

use crate::core::error::Result;
use std::path::PathBuf;

/// A dataset found by a [`Discoverer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDataset {
    /// Dataset identifier
    pub dataset_id: String,
    /// Photo ids, sorted lexicographically
    pub photo_ids: Vec<String>,
}

impl DiscoveredDataset {
    pub fn new<S: Into<String>>(dataset_id: S, photo_ids: Vec<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            photo_ids,
        }
    }
}

/// Finds the datasets available for processing
pub trait Discoverer {
    /// Discover datasets in processing order.
    ///
    /// Datasets without photos are omitted. Any error here is fatal for the
    /// pipeline run.
    fn discover(&self) -> Result<Vec<DiscoveredDataset>>;
}

/// Maps a photo to its location on disk
pub trait PhotoResolver: Send + Sync {
    /// Expected path of a photo. The file may not exist.
    fn photo_path(&self, dataset_id: &str, photo_id: &str) -> PathBuf;
}
