//! File-backed cache of downloaded API documents.
//!
//! Layout under the root:
//! - `stations.json`
//! - `{station}/sensors.json`
//! - `{station}/{sensor}/{last}_to_{first}.json`

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde_json::Value;

use crate::error::SyncError;

const STATIONS_FILE: &str = "stations.json";
const SENSORS_FILE: &str = "sensors.json";

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ==================== Layout ====================

    pub fn stations_path(&self) -> PathBuf {
        self.root.join(STATIONS_FILE)
    }

    pub fn station_dir(&self, station_id: i64) -> PathBuf {
        self.root.join(station_id.to_string())
    }

    pub fn sensors_path(&self, station_id: i64) -> PathBuf {
        self.station_dir(station_id).join(SENSORS_FILE)
    }

    pub fn sensor_dir(&self, station_id: i64, sensor_id: i64) -> PathBuf {
        self.station_dir(station_id).join(sensor_id.to_string())
    }

    // ==================== File Operations ====================

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    pub fn read_json(&self, path: &Path) -> Result<Value, SyncError> {
        let text = fs::read_to_string(path).map_err(|e| SyncError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| SyncError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// Write `value` as pretty JSON (two-space indent), creating parent directories.
    ///
    /// The text goes to a temporary sibling first and is renamed into place,
    /// so `path` either holds the complete document or does not exist.
    pub fn write_json(&self, path: &Path, value: &Value) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            self.create_dirs(parent)?;
        }
        let text = serde_json::to_string_pretty(value)?;

        let tmp = temp_path(path);
        if let Err(e) = fs::write(&tmp, text) {
            let _ = fs::remove_file(&tmp);
            return Err(SyncError::io(&tmp, e));
        }
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            SyncError::io(path, e)
        })
    }

    /// [`write_json`](Self::write_json) on the blocking thread pool.
    pub async fn persist_json(&self, path: PathBuf, value: Value) -> Result<(), SyncError> {
        let store = self.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || store.write_json(&target, &value))
            .await
            .map_err(|e| SyncError::io(&path, e))?
    }

    pub fn create_dirs(&self, dir: &Path) -> Result<(), SyncError> {
        fs::create_dir_all(dir).map_err(|e| SyncError::io(dir, e))
    }

    /// File names in `dir` with the given extension, sorted. A missing directory is empty.
    pub fn list_files(&self, dir: &Path, extension: &str) -> Result<Vec<String>, SyncError> {
        let mut names = Vec::new();
        for entry in read_dir_if_present(dir)? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Ids of subdirectories of `dir` whose names are all digits, sorted.
    pub fn numeric_dirs(&self, dir: &Path) -> Result<Vec<i64>, SyncError> {
        let mut ids: Vec<i64> = read_dir_if_present(dir)?
            .into_iter()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                name.parse().ok()
            })
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

/// `dir/name.json` -> `dir/.name.json.tmp`
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

fn read_dir_if_present(dir: &Path) -> Result<Vec<fs::DirEntry>, SyncError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    fs::read_dir(dir)
        .map_err(|e| SyncError::io(dir, e))?
        .map(|entry| entry.map_err(|e| SyncError::io(dir, e)))
        .collect()
}

/// Keep the items whose id appears in `ids`, preserving order.
pub fn filter_by_ids<T>(items: Vec<T>, ids: &[i64], id_of: impl Fn(&T) -> i64) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| ids.contains(&id_of(item)))
        .collect()
}
