//! Filesystem dataset source
//!
//! Layout under the datasets root:
//!
//! ```text
//! datasets/
//!   dataset_001/
//!     001.jpg
//!     002.png
//!   dataset_002/
//!     010.JPEG
//! ```
//!
//! Every subdirectory is a dataset. A photo id is the stem of a `.jpg`,
//! `.jpeg` or `.png` file (any case) that consists only of ASCII digits.
//! Symbolic links to directories and photos are followed; broken links are
//! skipped.

use super::traits::{DiscoveredDataset, Discoverer, PhotoResolver};
use crate::core::error::{Result, TrackerError};
use log::{debug, info, trace, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions that count as photos
const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Extension of the canonical photo path
const CANONICAL_EXTENSION: &str = "jpg";

/// Dataset source backed by a directory tree
#[derive(Debug, Clone)]
pub struct FsDatasetSource {
    root: PathBuf,
}

impl FsDatasetSource {
    /// Create a source rooted at `root`
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// The datasets root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collect photo ids from a single dataset directory
    fn scan_dataset(&self, dir: &Path) -> Result<BTreeSet<String>> {
        let mut photo_ids = BTreeSet::new();

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
            let Some(entry) = usable_entry(entry, dir)? else {
                continue;
            };

            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(photo_id) = photo_id_of(entry.path()) {
                photo_ids.insert(photo_id);
            } else {
                trace!("Ignoring non-photo file {}", entry.path().display());
            }
        }

        Ok(photo_ids)
    }
}

/// Unwrap a walk entry. A directory that cannot be read fails discovery;
/// an entry whose link cannot be followed is skipped.
fn usable_entry(
    entry: walkdir::Result<walkdir::DirEntry>,
    dir: &Path,
) -> Result<Option<walkdir::DirEntry>> {
    match entry {
        Ok(entry) => Ok(Some(entry)),
        Err(e) if e.depth() > 0 => {
            warn!("Skipping unreadable entry in '{}': {}", dir.display(), e);
            Ok(None)
        }
        Err(e) => Err(TrackerError::Discovery(format!(
            "Failed to read '{}': {}",
            dir.display(),
            e
        ))),
    }
}

impl Discoverer for FsDatasetSource {
    fn discover(&self) -> Result<Vec<DiscoveredDataset>> {
        if !self.root.is_dir() {
            return Err(TrackerError::Discovery(format!(
                "Datasets directory '{}' does not exist or is not a directory",
                self.root.display()
            )));
        }

        let mut datasets = BTreeMap::new();

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1).follow_links(true) {
            let Some(entry) = usable_entry(entry, &self.root)? else {
                continue;
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let Some(dataset_id) = entry.file_name().to_str().map(str::to_string) else {
                debug!(
                    "Skipping dataset directory with non UTF-8 name: {}",
                    entry.path().display()
                );
                continue;
            };

            let photo_ids = self.scan_dataset(entry.path())?;
            if photo_ids.is_empty() {
                debug!("Dataset '{}' has no photos, skipping", dataset_id);
                continue;
            }

            info!(
                "Discovered dataset: {} ({} photos)",
                dataset_id,
                photo_ids.len()
            );
            datasets.insert(dataset_id, photo_ids.into_iter().collect::<Vec<_>>());
        }

        Ok(datasets
            .into_iter()
            .map(|(dataset_id, photo_ids)| DiscoveredDataset::new(dataset_id, photo_ids))
            .collect())
    }
}

impl PhotoResolver for FsDatasetSource {
    fn photo_path(&self, dataset_id: &str, photo_id: &str) -> PathBuf {
        let dir = self.root.join(dataset_id);
        let canonical = dir.join(format!("{}.{}", photo_id, CANONICAL_EXTENSION));
        if canonical.is_file() {
            return canonical;
        }

        // The photo may have been discovered under another supported extension
        let Ok(entries) = fs::read_dir(&dir) else {
            return canonical;
        };

        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && photo_id_of(path).as_deref() == Some(photo_id))
            .min_by_key(|path| extension_rank(path))
            .unwrap_or(canonical)
    }
}

/// Position of the path's extension in `PHOTO_EXTENSIONS`
fn extension_rank(path: &Path) -> usize {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .and_then(|e| PHOTO_EXTENSIONS.iter().position(|known| *known == e))
        .unwrap_or(PHOTO_EXTENSIONS.len())
}

/// Photo id of `path`, if it names a supported photo with a numeric stem
fn photo_id_of(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    if !PHOTO_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }

    let stem = path.file_stem()?.to_str()?;
    if !stem.is_empty() && stem.bytes().all(|b| b.is_ascii_digit()) {
        Some(stem.to_string())
    } else {
        None
    }
}
