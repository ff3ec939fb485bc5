//! Save files and periodic checkpoints.
//!
//! Only [`GameState`] is written. Tick buffers and caches are rebuilt after loading, see
//! [`crate::engine::Engine::prime`].

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::world::GameState;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub tick: u64,
    pub saved_at: DateTime<Utc>,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveFile {
    pub metadata: SnapshotMetadata,
    pub state: GameState,
}

pub fn to_json(state: &GameState) -> Result<String, SnapshotError> {
    let save = SaveFile {
        metadata: SnapshotMetadata {
            tick: state.tick,
            saved_at: Utc::now(),
            city: state.city.to_string(),
        },
        state: state.clone(),
    };
    Ok(serde_json::to_string_pretty(&save)?)
}

pub fn from_json(json: &str) -> Result<SaveFile, SnapshotError> {
    Ok(serde_json::from_str(json)?)
}

pub fn save(state: &GameState, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, to_json(state)?)?;
    debug!(path = %path.display(), tick = state.tick, "game saved");
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<SaveFile, SnapshotError> {
    let text = fs::read_to_string(path)?;
    from_json(&text)
}

/// Writes `tick_{tick:06}.json` under `dir/<city>/` every `interval_ticks` ticks.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
    interval_ticks: u64,
}

impl SnapshotWriter {
    pub fn new(dir: impl AsRef<Path>, interval_ticks: u64) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            interval_ticks,
        }
    }

    pub fn should_write(&self, tick: u64) -> bool {
        self.interval_ticks > 0 && tick > 0 && tick % self.interval_ticks == 0
    }

    pub fn maybe_write(&self, state: &GameState) -> Result<Option<PathBuf>, SnapshotError> {
        if !self.should_write(state.tick) {
            return Ok(None);
        }
        let path = self
            .dir
            .join(state.city.as_str())
            .join(format!("tick_{:06}.json", state.tick));
        save(state, &path)?;
        Ok(Some(path))
    }

    /// Checkpoints already written for `city`, oldest first.
    pub fn list(&self, city: &str) -> Result<Vec<PathBuf>, SnapshotError> {
        let dir = self.dir.join(city);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_checkpoint = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with("tick_") && name.ends_with(".json"))
                .unwrap_or(false);
            if is_checkpoint {
                snapshots.push(path);
            }
        }
        snapshots.sort();
        Ok(snapshots)
    }
}
