//! Test utilities for filesystem-backed storage tests
//!
//! The temporary directory is removed when the environment is dropped, even
//! if the test panics.
use anyhow::Result;
use std::path::PathBuf;
use tempfile::TempDir;

use super::file_store::FileKeyValueStore;

pub struct TestEnvironment {
    /// Kept alive so the directory survives until drop
    _temp_dir: TempDir,
    pub base_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::with_prefix("mirror_test_")?;
        let base_path = temp_dir.path().to_path_buf();
        Ok(Self {
            _temp_dir: temp_dir,
            base_path,
        })
    }

    pub fn file_store(&self) -> FileKeyValueStore {
        FileKeyValueStore::new(&self.base_path).expect("temp dir is writable")
    }
}
