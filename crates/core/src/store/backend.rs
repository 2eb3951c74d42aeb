use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::StoreError;
use crate::models::GameRecord;

/// Serialized contents of the game table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSnapshot {
    /// Next id handed out by the store.
    pub next_id: i64,
    /// Stored records in insertion order.
    #[serde(default)]
    pub games: Vec<GameRecord>,
}

impl Default for TableSnapshot {
    fn default() -> Self {
        Self {
            next_id: 1,
            games: Vec::new(),
        }
    }
}

/// Durable medium behind a [`GameStore`](super::GameStore).
///
/// `persist` must not return until the snapshot is durable.
pub trait StorageBackend: Send + Sync {
    /// Read the last persisted snapshot, or an empty table.
    fn load(&self) -> Result<TableSnapshot, StoreError>;
    /// Replace the persisted snapshot.
    fn persist(&self, snapshot: &TableSnapshot) -> Result<(), StoreError>;
}

/// Volatile backend, mostly for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshot: Mutex<TableSnapshot>,
}

impl MemoryBackend {
    /// Create an empty in-memory table.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self) -> Result<TableSnapshot, StoreError> {
        Ok(self.snapshot.lock().clone())
    }

    fn persist(&self, snapshot: &TableSnapshot) -> Result<(), StoreError> {
        *self.snapshot.lock() = snapshot.clone();
        Ok(())
    }
}

/// Backend storing the table as a pretty-printed JSON document.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers never observe a half-written table.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Create a backend for the given file path. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for JsonFileBackend {
    fn load(&self) -> Result<TableSnapshot, StoreError> {
        if !self.path.exists() {
            return Ok(TableSnapshot::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn persist(&self, snapshot: &TableSnapshot) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;

        let serialised = serde_json::to_vec_pretty(snapshot).map_err(StoreError::Serialize)?;
        let io_err = |source: io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        let mut file = NamedTempFile::new_in(&dir).map_err(io_err)?;
        file.write_all(&serialised).map_err(io_err)?;
        file.as_file().sync_all().map_err(io_err)?;
        file.persist(&self.path).map_err(|err| StoreError::Persist {
            path: self.path.clone(),
            source: err.error,
        })?;
        Ok(())
    }
}
