//! # File Key-Value Store
//!
//! Stores each key as a JSON file inside the data directory.
//!
//! ## File Structure
//!
//! ```text
//! data/
//! ├── mirror.yaml
//! ├── mirror_bills.json
//! ├── mirror_payments.json
//! ├── mirror_profile.json
//! └── mirror_savings.json
//! ```
//!
//! Writes go to a temporary file first and are renamed over the target, so a
//! crash mid-write leaves the previous blob intact.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::traits::KeyValueStorage;

const VALUE_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    base_directory: PathBuf,
}

impl FileKeyValueStore {
    /// Create a store rooted at `base_directory`, creating it if needed
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self> {
        let base_path = base_directory.as_ref().to_path_buf();
        if !base_path.exists() {
            std::fs::create_dir_all(&base_path)
                .with_context(|| format!("creating data directory {}", base_path.display()))?;
        }
        Ok(Self {
            base_directory: base_path,
        })
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    fn value_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            anyhow::bail!("invalid storage key: {:?}", key);
        }
        Ok(self
            .base_directory
            .join(format!("{}.{}", key, VALUE_EXTENSION)))
    }
}

#[async_trait]
impl KeyValueStorage for FileKeyValueStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let path = self.value_path(key)?;
        match fs::read_to_string(&path).await {
            Ok(content) => {
                debug!("Read {} bytes from {:?}", content.len(), path);
                Ok(Some(content))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {:?}", path)),
        }
    }

    async fn put_value(&self, key: &str, value: &str) -> Result<()> {
        let path = self.value_path(key)?;
        let temp_path = path.with_extension("json.tmp");

        fs::write(&temp_path, value)
            .await
            .with_context(|| format!("writing {:?}", temp_path))?;
        fs::rename(&temp_path, &path)
            .await
            .with_context(|| format!("replacing {:?}", path))?;

        debug!("Wrote {} bytes to {:?}", value.len(), path);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.base_directory)
            .await
            .with_context(|| format!("listing {:?}", self.base_directory))?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
