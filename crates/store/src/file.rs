use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use tracker_core::{MilestoneState, PendingResponse, PriceTable, TrackingConfig};

use crate::error::{Result, StoreError};
use crate::{HistoryEntry, Store, StoreGuard};

/// A lock file older than this is left over from a crashed run.
const STALE_LOCK_AGE: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug)]
pub struct StorePaths {
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
    pub milestones_path: PathBuf,
    pub pending_path: PathBuf,
    pub prices_path: PathBuf,
    pub history_path: PathBuf,
    pub lock_path: PathBuf,
}

impl StorePaths {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            config_path: data_dir.join("tracking_config.json"),
            milestones_path: data_dir.join("last_alert_cost.json"),
            pending_path: data_dir.join("cost_alert_state.json"),
            prices_path: data_dir.join("model_prices.json"),
            history_path: data_dir.join("usage_history.jsonl"),
            lock_path: data_dir.join(".tracker.lock"),
            data_dir,
        }
    }
}

/// JSON documents in a data directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    paths: StorePaths,
}

enum ReadOutcome<T> {
    Found(T),
    Missing,
    Corrupt(String),
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<ReadOutcome<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ReadOutcome::Missing),
        Err(err) if err.kind() == ErrorKind::InvalidData => {
            return Ok(ReadOutcome::Corrupt(err.to_string()));
        }
        Err(err) => return Err(err.into()),
    };
    if content.trim().is_empty() {
        return Ok(ReadOutcome::Missing);
    }
    match serde_json::from_str(&content) {
        Ok(value) => Ok(ReadOutcome::Found(value)),
        Err(err) => Ok(ReadOutcome::Corrupt(err.to_string())),
    }
}

/// Reads a state document, using the default when it is absent or corrupt.
fn read_state<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match read_json(path)? {
        ReadOutcome::Found(value) => Ok(value),
        ReadOutcome::Missing => Ok(T::default()),
        ReadOutcome::Corrupt(message) => {
            warn!(path = %path.display(), error = %message, "state document is corrupt; using defaults");
            Ok(T::default())
        }
    }
}

fn write_synced(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(content.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()
}

/// Writes `value` to a sibling temp file, syncs it, then renames it over `path`.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    let temp_path = path.with_extension("json.tmp");
    if let Err(err) = write_synced(&temp_path, &content) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }
    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }
    Ok(())
}

fn lock_is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

fn create_lock_file(path: &Path) -> std::io::Result<()> {
    create_lock_file_with(path, |file| writeln!(file, "{}", std::process::id()))
}

/// A lock file whose owner could not be written is removed again, so a
/// failed attempt never leaves the store locked.
fn create_lock_file_with<F>(path: &Path, write_owner: F) -> std::io::Result<()>
where
    F: FnOnce(&mut fs::File) -> std::io::Result<()>,
{
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    if let Err(err) = write_owner(&mut file) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(err);
    }
    Ok(())
}

impl FileStore {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(StorePaths::new(data_dir.into()))
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }
}

impl Store for FileStore {
    fn load_config(&self) -> Result<TrackingConfig> {
        let path = &self.paths.config_path;
        match read_json(path)? {
            ReadOutcome::Found(config) => Ok(config),
            ReadOutcome::Missing => Err(StoreError::Missing(path.clone())),
            ReadOutcome::Corrupt(message) => Err(StoreError::Corrupt {
                path: path.clone(),
                message,
            }),
        }
    }

    fn save_config(&self, config: &TrackingConfig) -> Result<()> {
        write_json_atomic(&self.paths.config_path, config)
    }

    fn load_milestones(&self) -> Result<MilestoneState> {
        read_state(&self.paths.milestones_path)
    }

    fn save_milestones(&self, state: &MilestoneState) -> Result<()> {
        write_json_atomic(&self.paths.milestones_path, state)
    }

    fn load_pending(&self) -> Result<PendingResponse> {
        read_state(&self.paths.pending_path)
    }

    fn save_pending(&self, state: &PendingResponse) -> Result<()> {
        write_json_atomic(&self.paths.pending_path, state)
    }

    fn load_prices(&self) -> PriceTable {
        let path = &self.paths.prices_path;
        match read_json(path) {
            Ok(ReadOutcome::Found(prices)) => prices,
            Ok(ReadOutcome::Missing) => {
                warn!(path = %path.display(), "price table not found; all costs are zero");
                PriceTable::new()
            }
            Ok(ReadOutcome::Corrupt(message)) => {
                warn!(path = %path.display(), error = %message, "price table is malformed; all costs are zero");
                PriceTable::new()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read price table; all costs are zero");
                PriceTable::new()
            }
        }
    }

    fn append_history(&self, entry: &HistoryEntry) -> Result<()> {
        let path = &self.paths.history_path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn lock(&self) -> Result<StoreGuard> {
        let path = &self.paths.lock_path;
        fs::create_dir_all(&self.paths.data_dir)?;
        match create_lock_file(path) {
            Ok(()) => return Ok(StoreGuard::file(path.clone())),
            Err(err) if err.kind() != ErrorKind::AlreadyExists => return Err(err.into()),
            Err(_) => {}
        }
        if !lock_is_stale(path) {
            return Err(StoreError::Locked(path.clone()));
        }
        debug!(path = %path.display(), "replacing stale store lock");
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        match create_lock_file(path) {
            Ok(()) => Ok(StoreGuard::file(path.clone())),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(StoreError::Locked(path.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
