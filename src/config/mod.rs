//! Runtime configuration for the `cividle` binary.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::{EngineSettings, DEFAULT_CATCH_UP_BATCH, DEFAULT_MAX_OFFLINE_SECONDS};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Ruleset to load instead of the bundled one.
    #[serde(default)]
    pub content: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub offline: OfflineConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// 0 disables periodic checkpoints.
    #[serde(default)]
    pub interval_ticks: u64,
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("snapshots")
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            interval_ticks: 0,
            dir: default_snapshot_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineConfig {
    #[serde(default = "default_max_offline_seconds")]
    pub max_offline_seconds: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

fn default_max_offline_seconds() -> u64 {
    DEFAULT_MAX_OFFLINE_SECONDS
}

fn default_batch_size() -> u64 {
    DEFAULT_CATCH_UP_BATCH
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            max_offline_seconds: default_max_offline_seconds(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    /// Ticks per wall-clock tick while Petra's time warp is on.
    #[serde(default = "default_warp_speed")]
    pub warp_speed: u32,
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_warp_speed() -> u32 {
    2
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
            warp_speed: default_warp_speed(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            content: None,
            logging: LoggingConfig::default(),
            snapshot: SnapshotConfig::default(),
            offline: OfflineConfig::default(),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            snapshot_interval_ticks: self.snapshot.interval_ticks,
            snapshot_dir: self.snapshot.dir.clone(),
            max_offline_seconds: self.offline.max_offline_seconds,
            catch_up_batch: self.offline.batch_size,
        }
    }
}
