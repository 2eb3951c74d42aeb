//! Async access to the game store.

use std::sync::Arc;

use tokio::{sync::watch, task};

use crate::{
    models::{GameId, GameRecord, NewGame},
    store::{GameStore, StoreError},
};

/// Thin pass-through over [`GameStore`] that runs every store call on the
/// blocking worker pool so callers never stall on disk I/O.
#[derive(Clone)]
pub struct GameRepository {
    store: Arc<GameStore>,
}

impl GameRepository {
    /// Wrap a shared store.
    pub fn new(store: Arc<GameStore>) -> Self {
        Self { store }
    }

    /// Insert a validated game.
    pub async fn insert(&self, game: NewGame) -> Result<GameRecord, StoreError> {
        self.run(move |store| store.create(game)).await
    }

    /// Delete a game by id; `Ok(false)` when it was already gone.
    pub async fn delete(&self, id: GameId) -> Result<bool, StoreError> {
        self.run(move |store| store.delete(id)).await
    }

    /// Delete every game.
    pub async fn delete_all(&self) -> Result<usize, StoreError> {
        self.run(|store| store.delete_all()).await
    }

    /// Delete the listed games; returns how many were stored.
    pub async fn delete_many(&self, ids: Vec<GameId>) -> Result<usize, StoreError> {
        self.run(move |store| store.delete_many(&ids)).await
    }

    /// Current ordered table.
    pub async fn list(&self) -> Result<Vec<GameRecord>, StoreError> {
        self.run(|store| Ok(store.list())).await
    }

    /// Live ordered table.
    pub fn games(&self) -> watch::Receiver<Vec<GameRecord>> {
        self.store.subscribe()
    }

    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&GameStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || op(&store))
            .await
            .map_err(|err| StoreError::Worker(err.to_string()))?
    }
}
