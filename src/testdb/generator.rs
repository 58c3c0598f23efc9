//! Dataset directory fixtures
//!
//! Builds a throw-away datasets root on disk, with photo files that carry a
//! realistic JPEG or PNG header so nothing downstream mistakes them for
//! empty placeholders.

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Default content size for generated photos
pub const TEST_PHOTO_SIZE: usize = 512;

/// Generates small photo file contents
pub struct MockDataGenerator;

impl MockDataGenerator {
    /// Minimal JPEG: SOI, a JFIF APP0 segment, filler, EOI
    pub fn generate_jpeg(size: usize, seed: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(size);
        data.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]);
        data.extend_from_slice(b"JFIF\0");
        data.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
        Self::fill(&mut data, size.saturating_sub(2), seed);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    /// Minimal PNG: signature, IHDR, filler, IEND
    pub fn generate_png(size: usize, seed: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(size);
        data.extend_from_slice(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&[
            0x00, 0x00, 0x00, 0x64, // Width: 100
            0x00, 0x00, 0x00, 0x64, // Height: 100
            0x08, 0x02, 0x00, 0x00, 0x00,
        ]);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        Self::fill(&mut data, size.saturating_sub(12), seed);
        data.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        data.extend_from_slice(b"IEND");
        data.extend_from_slice(&[0xAE, 0x42, 0x60, 0x82]);
        data
    }

    /// Content for a file name, chosen by extension
    pub fn generate_for_name(name: &str) -> Vec<u8> {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        let seed = hasher.finish();

        let lower = name.to_lowercase();
        if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            Self::generate_jpeg(TEST_PHOTO_SIZE, seed)
        } else if lower.ends_with(".png") {
            Self::generate_png(TEST_PHOTO_SIZE, seed)
        } else {
            format!("not a photo: {}\n", name).into_bytes()
        }
    }

    fn fill(data: &mut Vec<u8>, until: usize, seed: u64) {
        let mut current = seed;
        while data.len() < until {
            current = current.wrapping_mul(6364136223846793005).wrapping_add(1);
            data.push((current >> 33) as u8);
        }
    }
}

/// A temporary datasets root, removed when dropped
pub struct DatasetTree {
    dir: TempDir,
}

impl Default for DatasetTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Create `dataset` (which may be a nested path) holding `files`
    pub fn with_photos(self, dataset: &str, files: &[&str]) -> Self {
        let dir = self.dir.path().join(dataset);
        fs::create_dir_all(&dir).expect("failed to create dataset dir");
        for name in files {
            self.add_photo(dataset, name);
        }
        self
    }

    /// Write one file into `dataset`
    pub fn add_photo(&self, dataset: &str, name: &str) -> PathBuf {
        let dir = self.dir.path().join(dataset);
        fs::create_dir_all(&dir).expect("failed to create dataset dir");
        let path = dir.join(name);
        fs::write(&path, MockDataGenerator::generate_for_name(name))
            .expect("failed to write photo");
        path
    }

    /// Delete one file from `dataset`
    pub fn remove_photo(&self, dataset: &str, name: &str) {
        fs::remove_file(self.dir.path().join(dataset).join(name))
            .expect("failed to remove photo");
    }

    /// The datasets root
    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_headers() {
        let jpeg = MockDataGenerator::generate_for_name("001.JPG");
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
        assert_eq!(jpeg.len(), TEST_PHOTO_SIZE);

        let png = MockDataGenerator::generate_for_name("002.png");
        assert_eq!(&png[1..4], b"PNG");
        assert_eq!(&png[png.len() - 8..png.len() - 4], b"IEND");
    }

    #[test]
    fn test_tree_layout() {
        let tree = DatasetTree::new()
            .with_photos("ds1", &["001.jpg"])
            .with_photos("ds1/nested", &["002.jpg"]);

        assert!(tree.root().join("ds1/001.jpg").is_file());
        assert!(tree.root().join("ds1/nested/002.jpg").is_file());

        tree.remove_photo("ds1", "001.jpg");
        assert!(!tree.root().join("ds1/001.jpg").exists());
    }
}
