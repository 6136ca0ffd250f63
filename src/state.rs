//! Mutable sync state and the configuration provider seam.
//!
//! The TOML config is read-only; everything the tool itself changes
//! between runs (last scan and build times, user overrides for
//! auto-update) lives in `sync_state.json` under the state directory.
//! [`ConfigProvider`] merges the two behind the handful of accessors the
//! synchronizer needs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;

/// Contents of `sync_state.json`. Timestamps are Unix seconds; `0.0`
/// means "never".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncState {
    pub last_build_timestamp: f64,
    pub last_scan_timestamp: f64,
    /// Overrides `[auto_update].enabled` when set.
    pub auto_update_enabled: Option<bool>,
    /// Overrides `[auto_update].interval_secs` when set.
    pub auto_update_interval_secs: Option<u64>,
}

impl SyncState {
    /// Read the state file. A missing file is the default state; a corrupt
    /// one is logged and also read as default.
    pub fn load(path: &Path) -> Self {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "could not read sync state: {}", e);
                return Self::default();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring corrupt sync state: {}", e);
                Self::default()
            }
        }
    }

    /// Write the state file via a temporary sibling and rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Effective auto-update settings after overrides are applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoUpdateSettings {
    pub enabled: bool,
    pub interval_secs: u64,
    pub last_scan_timestamp: f64,
}

/// What the synchronizer needs from the surrounding application.
pub trait ConfigProvider {
    /// Document root, or `None` when none is configured.
    fn root_path(&self) -> Option<PathBuf>;
    fn last_build_timestamp(&self) -> f64;
    fn set_last_build_timestamp(&mut self, ts: f64) -> Result<()>;
    fn auto_update_settings(&self) -> AutoUpdateSettings;
    fn set_last_scan_timestamp(&mut self, ts: f64) -> Result<()>;
}

/// [`ConfigProvider`] over the TOML config plus `sync_state.json`.
pub struct FileConfigProvider {
    config: Config,
    state_path: PathBuf,
    state: SyncState,
}

impl FileConfigProvider {
    pub fn new(config: Config) -> Self {
        let state_path = config.sync_state_path();
        let state = SyncState::load(&state_path);
        Self {
            config,
            state_path,
            state,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Replace and persist the whole state.
    pub fn store_state(&mut self, state: SyncState) -> Result<()> {
        state.save(&self.state_path)?;
        self.state = state;
        Ok(())
    }

    /// Persist user overrides for auto-update. `None` leaves a field as is.
    pub fn set_auto_update(&mut self, enabled: Option<bool>, interval_secs: Option<u64>) -> Result<()> {
        let mut state = self.state;
        if enabled.is_some() {
            state.auto_update_enabled = enabled;
        }
        if interval_secs.is_some() {
            state.auto_update_interval_secs = interval_secs;
        }
        self.store_state(state)
    }

    pub fn rebuild_threshold(&self) -> u64 {
        self.config.auto_update.rebuild_threshold
    }
}

impl ConfigProvider for FileConfigProvider {
    fn root_path(&self) -> Option<PathBuf> {
        let root = self.config.vault_root();
        if root.as_os_str().is_empty() {
            None
        } else {
            Some(root)
        }
    }

    fn last_build_timestamp(&self) -> f64 {
        self.state.last_build_timestamp
    }

    fn set_last_build_timestamp(&mut self, ts: f64) -> Result<()> {
        let mut state = self.state;
        state.last_build_timestamp = ts;
        self.store_state(state)
    }

    fn auto_update_settings(&self) -> AutoUpdateSettings {
        AutoUpdateSettings {
            enabled: self
                .state
                .auto_update_enabled
                .unwrap_or(self.config.auto_update.enabled),
            interval_secs: self
                .state
                .auto_update_interval_secs
                .unwrap_or(self.config.auto_update.interval_secs),
            last_scan_timestamp: self.state.last_scan_timestamp,
        }
    }

    fn set_last_scan_timestamp(&mut self, ts: f64) -> Result<()> {
        let mut state = self.state;
        state.last_scan_timestamp = ts;
        self.store_state(state)
    }
}
