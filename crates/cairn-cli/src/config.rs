use std::fs;
use std::path::Path;

use anyhow::Context;
use cairn_pack::PackConfig;
use cairn_store::{BuildOptions, StoreConfig};
use serde::{Deserialize, Serialize};

/// Name of the optional config file inside the git dir.
pub const CONFIG_FILE: &str = "cairn.toml";

/// Settings read from `<git-dir>/cairn.toml`. Every table is optional.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CairnConfig {
    pub store: StoreSettings,
    pub tree: BuildOptions,
    pub pack: PackConfig,
}

/// The `[store]` table. The objects directory always follows `--git-dir`.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub compression_level: u32,
    pub header_scan_limit: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let defaults = StoreConfig::default();
        Self {
            compression_level: defaults.compression_level,
            header_scan_limit: defaults.header_scan_limit,
        }
    }
}

impl CairnConfig {
    /// Load the config for `git_dir`, falling back to defaults when the file
    /// is absent.
    pub fn load(git_dir: &Path) -> anyhow::Result<Self> {
        let path = git_dir.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn store_config(&self, git_dir: &Path) -> StoreConfig {
        StoreConfig {
            header_scan_limit: self.store.header_scan_limit,
            ..StoreConfig::for_git_dir(git_dir)
        }
        .with_compression_level(self.store.compression_level)
    }
}
