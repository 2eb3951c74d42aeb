#![warn(clippy::all, missing_docs)]

//! Core logic of the game backlog.
//!
//! This crate hosts the data model, form validation, the persistence
//! store and repository, and the backlog controller with its
//! delete-with-undo protocol used by the terminal UI.

pub mod config;
pub mod controller;
pub mod dates;
pub mod models;
pub mod notify;
pub mod repository;
pub mod store;
pub mod undo;
pub mod validate;

pub use config::AppConfig;
pub use controller::{BacklogController, BacklogEvent, ControllerSettings, Operation};
pub use models::{GameId, GameRecord, NewGame};
pub use notify::{ChannelNotifier, Notice, Notifier};
pub use repository::GameRepository;
pub use store::{GameStore, JsonFileBackend, MemoryBackend, StorageBackend, StoreError};
pub use undo::{DeletionState, DeletionTarget, PendingDeletion, UndoError};
pub use validate::{validate, GameForm, ValidationError};
