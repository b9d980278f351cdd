//! # Configuration
//!
//! Application settings stored in a single YAML file, `mirror.yaml`.
//!
//! ```yaml
//! data_directory: "/home/me/.local/share/Mirror"
//! currency_symbol: "$"
//! log_level: "info"
//! ```
//!
//! Every field is optional; missing fields take their defaults. The
//! `MIRROR_DATA_DIR` environment variable overrides `data_directory`.

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::money::{
    format_currency_compact_with, format_currency_with, DEFAULT_CURRENCY_SYMBOL,
};

pub const CONFIG_FILE_NAME: &str = "mirror.yaml";
pub const DATA_DIR_ENV: &str = "MIRROR_DATA_DIR";
const APP_DIR_NAME: &str = "Mirror";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Where the collections live; the platform data directory when unset
    pub data_directory: Option<PathBuf>,
    pub currency_symbol: String,
    /// `log` filter passed to env_logger, e.g. "debug" or "mirror_backend=trace"
    pub log_level: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            data_directory: None,
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl MirrorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let yaml_content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: MirrorConfig = serde_yaml::from_str(&yaml_content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Like [`MirrorConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let yaml_content = serde_yaml::to_string(self)?;

        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, yaml_content)?;
        fs::rename(&temp_path, path)?;

        debug!("Saved config to {:?}", path);
        Ok(())
    }

    /// Format an amount with the configured currency symbol.
    pub fn format_currency(&self, amount: f64) -> String {
        format_currency_with(amount, &self.currency_symbol)
    }

    pub fn format_currency_compact(&self, amount: f64) -> String {
        format_currency_compact_with(amount, &self.currency_symbol)
    }

    /// Directory holding the collections: `MIRROR_DATA_DIR`, then
    /// `data_directory`, then `<platform data dir>/Mirror`.
    pub fn resolve_data_directory(&self) -> Result<PathBuf> {
        let from_env = std::env::var_os(DATA_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        self.resolve_data_directory_with(from_env)
    }

    fn resolve_data_directory_with(&self, env_override: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = env_override {
            return Ok(path);
        }
        if let Some(path) = &self.data_directory {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or_else(|| anyhow!("Could not determine the platform data directory"))
    }

    /// Default location of the config file itself
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }
}
