//! Engine configuration.
//!
//! Loaded from a JSON file (missing or broken files fall back to defaults),
//! then adjusted by `SIMPLE_LABELS_*` environment variables.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::LabelDefaults;

/// Folder name used under the mod data root when no root is configured.
const DEFAULT_MOD_DATA_DIR: &str = "ModData";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Style applied to fields a create leaves out.
    pub defaults: LabelDefaults,
    /// Root holding the legacy global label folder. `None` uses the
    /// platform data directory.
    pub mod_data_root: Option<PathBuf>,
    /// Disable to run single-peer even when a transport is present.
    pub replication_enabled: bool,
    /// Delay between a legacy load and the migration pass, so scene objects
    /// have time to bind.
    pub migration_delay_ms: u64,
    /// Minimum gap between two full broadcasts triggered by sync requests.
    pub sync_request_min_interval_ms: u64,
    /// Catch-up attempts a client makes when the host state is empty.
    pub retry_attempts: u32,
    pub retry_interval_ms: u64,
    /// Host republishes the full state at this interval.
    pub full_sync_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            defaults: LabelDefaults::default(),
            mod_data_root: None,
            replication_enabled: true,
            migration_delay_ms: 3_000,
            sync_request_min_interval_ms: 2_000,
            retry_attempts: 5,
            retry_interval_ms: 2_000,
            full_sync_interval_ms: 30_000,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `path`.
    /// Returns default config if the file doesn't exist or fails to parse.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config = serde_json::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply environment overrides:
    /// - `SIMPLE_LABELS_DATA_DIR` - mod data root
    /// - `SIMPLE_LABELS_REPLICATION` - `0`/`false` disables replication
    /// - `SIMPLE_LABELS_RETRY_ATTEMPTS` - client catch-up attempts
    pub fn with_env(mut self) -> Self {
        if let Ok(dir) = std::env::var("SIMPLE_LABELS_DATA_DIR") {
            self.mod_data_root = Some(PathBuf::from(dir));
        }

        if let Ok(flag) = std::env::var("SIMPLE_LABELS_REPLICATION") {
            self.replication_enabled = !matches!(flag.trim(), "0" | "false" | "off");
        }

        if let Some(attempts) = std::env::var("SIMPLE_LABELS_RETRY_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        {
            self.retry_attempts = attempts;
        }

        self
    }

    /// Root directory the legacy `SimpleLabels` folder lives under.
    pub fn mod_data_root(&self) -> PathBuf {
        if let Some(root) = &self.mod_data_root {
            return root.clone();
        }

        match directories::BaseDirs::new() {
            Some(dirs) => dirs.data_local_dir().join(DEFAULT_MOD_DATA_DIR),
            None => PathBuf::from(DEFAULT_MOD_DATA_DIR),
        }
    }

    pub fn migration_delay(&self) -> Duration {
        Duration::from_millis(self.migration_delay_ms)
    }

    pub fn sync_request_min_interval(&self) -> Duration {
        Duration::from_millis(self.sync_request_min_interval_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn full_sync_interval(&self) -> Duration {
        Duration::from_millis(self.full_sync_interval_ms)
    }
}
