use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::object::DEFAULT_HEADER_SCAN_LIMIT;

/// Configuration for a loose object store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the `xx/yyyy...` fan-out of object files.
    pub objects_dir: PathBuf,
    /// zlib compression level, 0 (none) through 9 (best).
    pub compression_level: u32,
    /// How many leading bytes of an inflated object are searched for the
    /// header's NUL terminator before the header is declared corrupt.
    pub header_scan_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            objects_dir: PathBuf::from(".git").join("objects"),
            compression_level: 6,
            header_scan_limit: DEFAULT_HEADER_SCAN_LIMIT,
        }
    }
}

impl StoreConfig {
    /// Configuration rooted at a repository directory (`<git_dir>/objects`).
    pub fn for_git_dir(git_dir: &Path) -> Self {
        Self {
            objects_dir: git_dir.join("objects"),
            ..Default::default()
        }
    }

    /// Override the compression level, clamped to 0..=9.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }
}
