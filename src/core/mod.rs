//! Core functionality module
//!
//! This module contains the core logic of the tracker: the persisted
//! registry of datasets and their progress, the pipeline that drives
//! classification, and the configuration and error types they share.
//!
//! # Submodules
//!
//! - `config` - Configuration loading, saving, and management
//! - `error` - Error types and result aliases
//! - `pipeline` - Discovery, classification and resume logic
//! - `registry` - Dataset catalog and per-photo progress
//! - `results` - Per-dataset results files
//! - `store` - Durable storage of the registry document

pub mod config;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod results;
pub mod store;
