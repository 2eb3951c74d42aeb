//! Persistence store for backlog entries.
//!
//! The store owns the game table, serializes writes and publishes the freshly
//! ordered table to every subscriber after each committed mutation.

mod backend;

use std::{path::PathBuf, sync::Arc};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::models::{sort_for_display, GameId, GameRecord, NewGame};

pub use backend::{JsonFileBackend, MemoryBackend, StorageBackend, TableSnapshot};

/// Failures reported by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The backing file is not a valid game table.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// The game table could not be serialized.
    #[error("failed to serialize game table: {0}")]
    Serialize(#[source] serde_json::Error),
    /// The written table could not be moved into place.
    #[error("failed to replace {path}: {source}")]
    Persist {
        /// Target file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A background worker running a store call did not finish.
    #[error("store worker failed: {0}")]
    Worker(String),
}

/// Game table with serialized writes and a live, ordered view.
pub struct GameStore {
    backend: Box<dyn StorageBackend>,
    table: Mutex<TableSnapshot>,
    live: watch::Sender<Vec<GameRecord>>,
}

impl GameStore {
    /// Open a store over the given backend, loading whatever it persisted.
    pub fn open(backend: impl StorageBackend + 'static) -> Result<Self, StoreError> {
        let mut table = backend.load()?;
        let highest = table.games.iter().map(|game| game.id.0).max().unwrap_or(0);
        if table.next_id <= highest {
            table.next_id = highest + 1;
        }
        let (live, _) = watch::channel(ordered(&table.games));
        debug!(games = table.games.len(), "Game store opened");
        Ok(Self {
            backend: Box::new(backend),
            table: Mutex::new(table),
            live,
        })
    }

    /// Open a volatile store.
    pub fn in_memory() -> Self {
        let (live, _) = watch::channel(Vec::new());
        Self {
            backend: Box::new(MemoryBackend::new()),
            table: Mutex::new(TableSnapshot::default()),
            live,
        }
    }

    /// Convenience for sharing the store with a repository.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Insert a game and return it with its assigned id.
    pub fn create(&self, game: NewGame) -> Result<GameRecord, StoreError> {
        let mut table = self.table.lock();
        let mut next = table.clone();
        let record = GameRecord::from_new(GameId(next.next_id), game);
        next.next_id += 1;
        next.games.push(record.clone());
        self.commit(&mut table, next)?;
        info!(id = record.id.0, title = %record.title, "Game stored");
        Ok(record)
    }

    /// Every stored game ordered by release date, ties by id.
    pub fn list(&self) -> Vec<GameRecord> {
        ordered(&self.table.lock().games)
    }

    /// Live view of the ordered table, updated after every committed write.
    pub fn subscribe(&self) -> watch::Receiver<Vec<GameRecord>> {
        self.live.subscribe()
    }

    /// Remove a game. Returns `false` when no game had that id.
    pub fn delete(&self, id: GameId) -> Result<bool, StoreError> {
        let mut table = self.table.lock();
        if !table.games.iter().any(|game| game.id == id) {
            debug!(id = id.0, "Delete skipped, game not stored");
            return Ok(false);
        }
        let mut next = table.clone();
        next.games.retain(|game| game.id != id);
        self.commit(&mut table, next)?;
        info!(id = id.0, "Game deleted");
        Ok(true)
    }

    /// Remove every game and return how many were removed.
    pub fn delete_all(&self) -> Result<usize, StoreError> {
        let mut table = self.table.lock();
        let removed = table.games.len();
        let next = TableSnapshot {
            next_id: table.next_id,
            games: Vec::new(),
        };
        self.commit(&mut table, next)?;
        info!(removed, "Backlog cleared");
        Ok(removed)
    }

    /// Remove the given games and return how many were stored.
    ///
    /// Games that are absent are skipped and games not listed are kept.
    pub fn delete_many(&self, ids: &[GameId]) -> Result<usize, StoreError> {
        let mut table = self.table.lock();
        let mut next = table.clone();
        next.games.retain(|game| !ids.contains(&game.id));
        let removed = table.games.len() - next.games.len();
        if removed == 0 {
            debug!(requested = ids.len(), "Batch delete skipped, nothing stored");
            return Ok(0);
        }
        self.commit(&mut table, next)?;
        info!(removed, "Games deleted");
        Ok(removed)
    }

    fn commit(&self, current: &mut TableSnapshot, next: TableSnapshot) -> Result<(), StoreError> {
        self.backend.persist(&next)?;
        *current = next;
        self.live.send_replace(ordered(&current.games));
        Ok(())
    }
}

fn ordered(games: &[GameRecord]) -> Vec<GameRecord> {
    let mut games = games.to_vec();
    sort_for_display(&mut games);
    games
}
