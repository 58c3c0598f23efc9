//! Per-dataset classification results
//!
//! Results of one dataset are written to `results_<dataset>.json` as a JSON
//! object keyed by `"<dataset>_<photo>"`, in processing order:
//!
//! ```json
//! {
//!   "ds1_001": {
//!     "dataset_id": "ds1",
//!     "photo_id": "001",
//!     "dominant_object": "cat",
//!     "timestamp": 1718031023.52
//!   }
//! }
//! ```
//!
//! `dominant_object` is `null` when classification failed or found nothing.

use crate::core::error::{Result, TrackerError};
use crate::core::store::write_json_atomic;
use log::{debug, info, warn};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome recorded for one processed photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub dataset_id: String,
    pub photo_id: String,
    pub dominant_object: Option<String>,
    /// Photo modification time, seconds since the Unix epoch
    pub timestamp: f64,
}

impl ResultRecord {
    /// Key of this record in a results file
    pub fn key(&self) -> String {
        format!("{}_{}", self.dataset_id, self.photo_id)
    }
}

/// Ordered collection of result records, unique by key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    records: Vec<ResultRecord>,
    index: HashMap<String, usize>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, replacing an earlier record with the same key in place
    pub fn push(&mut self, record: ResultRecord) {
        let key = record.key();
        match self.index.get(&key) {
            Some(&i) => self.records[i] = record,
            None => {
                self.index.insert(key, self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Append all records of `other`
    pub fn extend(&mut self, other: ResultSet) {
        for record in other.records {
            self.push(record);
        }
    }

    pub fn get(&self, key: &str) -> Option<&ResultRecord> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<ResultRecord> for ResultSet {
    fn from_iter<I: IntoIterator<Item = ResultRecord>>(iter: I) -> Self {
        let mut set = ResultSet::new();
        for record in iter {
            set.push(record);
        }
        set
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for record in &self.records {
            map.serialize_entry(&record.key(), record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ResultSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ResultSetVisitor;

        impl<'de> Visitor<'de> for ResultSetVisitor {
            type Value = ResultSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of result records")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<ResultSet, A::Error> {
                let mut set = ResultSet::new();
                while let Some((_key, record)) = map.next_entry::<String, ResultRecord>()? {
                    set.push(record);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(ResultSetVisitor)
    }
}

/// Persists the results of one dataset
pub trait ResultWriter {
    /// Write `results` for `dataset_id`, returning where they went
    fn write(&self, dataset_id: &str, results: &ResultSet) -> Result<PathBuf>;
}

/// Writes `results_<dataset>.json` files into a directory
#[derive(Debug, Clone)]
pub struct JsonResultWriter {
    output_dir: PathBuf,
    merge_existing: bool,
}

impl JsonResultWriter {
    pub fn new<P: Into<PathBuf>>(output_dir: P, merge_existing: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            merge_existing,
        }
    }

    /// Path of the results file for a dataset
    pub fn results_path(&self, dataset_id: &str) -> PathBuf {
        self.output_dir.join(format!("results_{}.json", dataset_id))
    }

    /// Load the existing results file, moving it aside if it cannot be read
    fn load_existing(&self, path: &Path) -> ResultSet {
        if !path.exists() {
            return ResultSet::new();
        }

        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<ResultSet>(&content).map_err(|e| e.to_string())
            });

        match parsed {
            Ok(existing) => {
                debug!(
                    "Merging with {} existing results in {}",
                    existing.len(),
                    path.display()
                );
                existing
            }
            Err(e) => {
                let backup = path.with_extension("json.bak");
                warn!(
                    "Existing results file {} is unreadable ({}); moving it to {}",
                    path.display(),
                    e,
                    backup.display()
                );
                if let Err(e) = fs::rename(path, &backup) {
                    warn!("Failed to back up {}: {}", path.display(), e);
                }
                ResultSet::new()
            }
        }
    }
}

impl ResultWriter for JsonResultWriter {
    fn write(&self, dataset_id: &str, results: &ResultSet) -> Result<PathBuf> {
        let path = self.results_path(dataset_id);

        let merged;
        let to_write = if self.merge_existing {
            let mut existing = self.load_existing(&path);
            existing.extend(results.clone());
            merged = existing;
            &merged
        } else {
            results
        };

        write_json_atomic(&path, to_write).map_err(|e| TrackerError::ResultWrite {
            dataset_id: dataset_id.to_string(),
            message: e.to_string(),
        })?;

        info!("Saved {} results to {}", results.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(dataset_id: &str, photo_id: &str, label: Option<&str>) -> ResultRecord {
        ResultRecord {
            dataset_id: dataset_id.to_string(),
            photo_id: photo_id.to_string(),
            dominant_object: label.map(str::to_string),
            timestamp: 1_700_000_000.5,
        }
    }

    #[test]
    fn test_serializes_as_ordered_map() {
        let set: ResultSet = vec![
            record("ds1", "003", Some("dog")),
            record("ds1", "001", None),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&set).unwrap();
        assert!(json.find("ds1_003").unwrap() < json.find("ds1_001").unwrap());

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["ds1_003"]["dominant_object"], "dog");
        assert!(value["ds1_001"]["dominant_object"].is_null());
        assert_eq!(value["ds1_001"]["photo_id"], "001");
    }

    #[test]
    fn test_push_replaces_same_key() {
        let mut set = ResultSet::new();
        set.push(record("ds1", "001", None));
        set.push(record("ds1", "002", None));
        set.push(record("ds1", "001", Some("cat")));

        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].dominant_object.as_deref(), Some("cat"));
        assert_eq!(set.get("ds1_002").unwrap().photo_id, "002");
    }

    #[test]
    fn test_writer_creates_pretty_file() {
        let dir = TempDir::new().unwrap();
        let writer = JsonResultWriter::new(dir.path(), true);
        let set: ResultSet = vec![record("ds1", "001", Some("cat"))].into_iter().collect();

        let path = writer.write("ds1", &set).unwrap();
        assert_eq!(path, dir.path().join("results_ds1.json"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n  \"ds1_001\": {"));
        let loaded: ResultSet = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded, set);
    }

    #[test]
    fn test_writer_merges_with_previous_run() {
        let dir = TempDir::new().unwrap();
        let writer = JsonResultWriter::new(dir.path(), true);

        let first: ResultSet = vec![record("ds1", "001", Some("cat"))].into_iter().collect();
        writer.write("ds1", &first).unwrap();
        let second: ResultSet = vec![record("ds1", "002", None)].into_iter().collect();
        let path = writer.write("ds1", &second).unwrap();

        let loaded: ResultSet = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        let keys: Vec<String> = loaded.records().iter().map(ResultRecord::key).collect();
        assert_eq!(keys, vec!["ds1_001".to_string(), "ds1_002".to_string()]);
    }

    #[test]
    fn test_writer_overwrites_without_merge() {
        let dir = TempDir::new().unwrap();
        let writer = JsonResultWriter::new(dir.path(), false);

        writer
            .write("ds1", &vec![record("ds1", "001", None)].into_iter().collect())
            .unwrap();
        let path = writer
            .write("ds1", &vec![record("ds1", "002", None)].into_iter().collect())
            .unwrap();

        let loaded: ResultSet = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.get("ds1_002").is_some());
    }

    #[test]
    fn test_unreadable_existing_file_is_backed_up() {
        let dir = TempDir::new().unwrap();
        let writer = JsonResultWriter::new(dir.path(), true);
        fs::write(writer.results_path("ds1"), "garbage").unwrap();

        writer
            .write("ds1", &vec![record("ds1", "001", None)].into_iter().collect())
            .unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("results_ds1.json.bak")).unwrap(),
            "garbage"
        );
    }
}
