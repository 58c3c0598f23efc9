//! Photo Batch Tracker Library
//!
//! A resumable driver for running an object-detection classifier over many
//! photo datasets. Every dataset's photo catalog and per-photo progress is
//! kept in a durable registry, so an interrupted run picks up exactly where
//! it stopped and no photo is classified twice.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`core`] - Registry, persistent store, pipeline driver, results files,
//!   configuration and error handling
//! - [`source`] - Dataset discovery and photo path resolution
//! - [`classifier`] - The classifier boundary and an external-program
//!   implementation
//! - [`cli`] - Command-line interface (only used by the binary)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use photo_batch_tracker::classifier::CommandClassifier;
//! use photo_batch_tracker::core::config::Config;
//! use photo_batch_tracker::core::pipeline::{Pipeline, PipelineOptions};
//! use photo_batch_tracker::core::registry::Registry;
//! use photo_batch_tracker::core::results::JsonResultWriter;
//! use photo_batch_tracker::core::store::JsonFileStore;
//! use photo_batch_tracker::source::FsDatasetSource;
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!
//!     let registry = Registry::open(Box::new(JsonFileStore::new(&config.paths.registry_file)))?;
//!     let source = FsDatasetSource::new(&config.paths.datasets_dir);
//!     let writer = JsonResultWriter::new(&config.paths.results_dir, true);
//!     let classifier = Arc::new(CommandClassifier::new("detect", vec![]));
//!
//!     let summary = Pipeline::new(&registry, &source, &source, classifier, &writer)
//!         .with_options(PipelineOptions::from(&config.classifier))
//!         .run(|_event| {})?;
//!
//!     println!("Processed {} photos", summary.total_processed());
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Resume Support** - Progress is saved after every photo
//! - **Crash Safety** - Registry and results files are replaced atomically
//! - **Timeouts** - A hung classifier leaves the photo pending instead of
//!   blocking the run
//! - **Parallel Classification** - Optional worker pool per dataset
//! - **Graceful Shutdown** - Ctrl+C stops between photos

pub mod classifier;
pub mod cli;
pub mod core;
pub mod source;

#[cfg(test)]
pub mod testdb;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
