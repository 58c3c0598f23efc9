//! Dataset sources
//!
//! A source tells the pipeline which datasets exist and where each photo
//! lives. The traits make it possible to drive the pipeline from the
//! filesystem in production and from in-memory fixtures in tests.
//!
//! # Submodules
//!
//! - `traits` - `Discoverer` and `PhotoResolver` abstractions
//! - `filesystem` - Directory-tree implementation of both

pub mod filesystem;
pub mod traits;

pub use filesystem::FsDatasetSource;
pub use traits::{DiscoveredDataset, Discoverer, PhotoResolver};
