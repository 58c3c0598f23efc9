//! Test Database Module
//!
//! Fixtures and mock implementations for exercising the registry and the
//! pipeline without a real classifier program or a hand-made datasets
//! directory.
//!
//! # Contents
//!
//! - **Dataset trees**: temporary dataset directories filled with small but
//!   well-formed JPEG and PNG files
//! - **Memory store**: registry persistence that can be told to fail
//! - **Scripted classifier**: per-photo labels, failures, delays and panics
//! - **Static sources**: fixed discovery results and in-memory result writes
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use crate::testdb::{DatasetTree, MemoryStore, ScriptedClassifier};
//!
//! let tree = DatasetTree::new().with_photos("ds1", &["001.jpg", "002.png"]);
//! let registry = Registry::open(Box::new(MemoryStore::new()))?;
//! let classifier = Arc::new(ScriptedClassifier::new().with_label("001", "cat"));
//! ```

pub mod generator;
pub mod mock_classifier;
pub mod mock_source;
pub mod mock_store;

pub use generator::{DatasetTree, MockDataGenerator};
pub use mock_classifier::{ScriptedClassifier, ScriptedResponse};
pub use mock_source::{RecordingWriter, StaticDiscoverer};
pub use mock_store::MemoryStore;
