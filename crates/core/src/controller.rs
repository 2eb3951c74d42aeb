//! Backlog controller: the live game list plus asynchronous mutations and
//! the delete-with-undo protocol.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::{
    config::AppConfig,
    models::{GameId, GameRecord, NewGame},
    notify::{Notice, Notifier},
    repository::GameRepository,
    store::StoreError,
    undo::{DeletionState, DeletionTarget, PendingDeletion, UndoError},
    validate::{GameForm, ValidationError},
};

const EVENT_CAPACITY: usize = 64;

/// Timing used by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Undo window for deletions.
    pub undo_window: Duration,
    /// Display time of plain messages.
    pub message_duration: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            undo_window: Duration::from_secs(10),
            message_duration: Duration::from_secs(2),
        }
    }
}

impl From<&AppConfig> for ControllerSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            undo_window: config.undo_window(),
            message_duration: config.message_duration(),
        }
    }
}

/// Store operation issued by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Insert a game.
    Insert,
    /// Delete one game.
    Delete,
    /// Clear the backlog.
    DeleteAll,
}

/// Completion of an asynchronous store operation.
#[derive(Debug)]
pub enum BacklogEvent {
    /// A game was stored.
    Inserted(GameRecord),
    /// A delete finished; `removed` is false when the game was already gone.
    Deleted {
        /// Targeted game.
        id: GameId,
        /// Whether a row was actually removed.
        removed: bool,
    },
    /// The backlog was cleared.
    Cleared {
        /// Number of removed games.
        removed: usize,
    },
    /// A store operation failed.
    Failed {
        /// Failed operation.
        operation: Operation,
        /// Cause.
        error: StoreError,
    },
}

/// Mediates between the presentation layer and the repository.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct BacklogController {
    shared: Arc<Shared>,
}

struct Shared {
    repository: GameRepository,
    games: watch::Receiver<Vec<GameRecord>>,
    notifier: Arc<dyn Notifier>,
    events: mpsc::Sender<BacklogEvent>,
    settings: ControllerSettings,
    pending_rows: Mutex<HashMap<GameId, PendingDeletion>>,
    pending_all: Mutex<Option<PendingDeletion>>,
}

impl BacklogController {
    /// Create a controller and the receiver for its completion events.
    pub fn new(
        repository: GameRepository,
        notifier: Arc<dyn Notifier>,
        settings: ControllerSettings,
    ) -> (Self, mpsc::Receiver<BacklogEvent>) {
        let (events, receiver) = mpsc::channel(EVENT_CAPACITY);
        let games = repository.games();
        let controller = Self {
            shared: Arc::new(Shared {
                repository,
                games,
                notifier,
                events,
                settings,
                pending_rows: Mutex::new(HashMap::new()),
                pending_all: Mutex::new(None),
            }),
        };
        (controller, receiver)
    }

    /// Snapshot of the stored games in display order.
    pub fn games(&self) -> Vec<GameRecord> {
        self.shared.games.borrow().clone()
    }

    /// Live view of the stored games.
    pub fn subscribe(&self) -> watch::Receiver<Vec<GameRecord>> {
        self.shared.games.clone()
    }

    /// Games to display: the stored games minus those awaiting deletion.
    pub fn visible_games(&self) -> Vec<GameRecord> {
        self.prune_resolved();
        let pending: Vec<PendingDeletion> = self
            .shared
            .pending_all
            .lock()
            .iter()
            .cloned()
            .chain(self.shared.pending_rows.lock().values().cloned())
            .collect();
        self.games()
            .into_iter()
            .filter(|game| !pending.iter().any(|p| p.target().covers(game.id)))
            .collect()
    }

    /// Validate a form and insert the resulting game.
    ///
    /// Rejections are reported through the notifier and nothing is stored.
    pub fn add_game(&self, form: &GameForm) -> Result<(), ValidationError> {
        match form.validate() {
            Ok(game) => {
                self.insert(game);
                Ok(())
            }
            Err(err) => {
                self.shared.notifier.notify(Notice::message(
                    err.to_string(),
                    self.shared.settings.message_duration,
                ));
                Err(err)
            }
        }
    }

    /// Store a validated game in the background.
    pub fn insert(&self, game: NewGame) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let event = match shared.repository.insert(game).await {
                Ok(record) => BacklogEvent::Inserted(record),
                Err(error) => shared.failure(Operation::Insert, error),
            };
            shared.emit(event).await;
        });
    }

    /// Delete one game in the background. Absent games are ignored.
    ///
    /// Undo windows armed for the game are left untouched.
    pub fn delete_one(&self, record: &GameRecord) {
        let shared = Arc::clone(&self.shared);
        let id = record.id;
        tokio::spawn(async move {
            let event = shared.delete_row(id).await;
            shared.emit(event).await;
        });
    }

    /// Clear the backlog in the background.
    ///
    /// An armed clear keeps its window and still runs when it expires.
    pub fn delete_all(&self) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let event = match shared.repository.delete_all().await {
                Ok(removed) => BacklogEvent::Cleared { removed },
                Err(error) => shared.failure(Operation::DeleteAll, error),
            };
            shared.emit(event).await;
        });
    }

    // Commit path of an armed row deletion.
    fn commit_delete_one(&self, id: GameId) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let event = shared.delete_row(id).await;
            shared.release_row(id);
            shared.emit(event).await;
        });
    }

    // Commit path of an armed clear: only the games hidden at arming go.
    fn commit_clear(&self, ids: Vec<GameId>) {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let event = match shared.repository.delete_many(ids).await {
                Ok(removed) => BacklogEvent::Cleared { removed },
                Err(error) => shared.failure(Operation::DeleteAll, error),
            };
            shared.release_clear();
            shared.emit(event).await;
        });
    }

    /// Hide a game and delete it once the undo window elapses.
    ///
    /// Arming a game that is already pending returns the existing handle.
    pub fn arm_delete_one(&self, record: GameRecord) -> PendingDeletion {
        self.prune_resolved();
        let mut rows = self.shared.pending_rows.lock();
        if let Some(existing) = rows.get(&record.id) {
            return existing.clone();
        }

        let controller = self.clone();
        let id = record.id;
        let pending = PendingDeletion::arm(
            DeletionTarget::One(record.clone()),
            self.shared.settings.undo_window,
            move || controller.commit_delete_one(id),
        );
        rows.insert(record.id, pending.clone());
        drop(rows);

        self.shared.notifier.notify(Notice::undo_prompt(
            format!("Deleted {}", record.title),
            pending.clone(),
        ));
        pending
    }

    /// Hide every listed game and delete those games once the undo window
    /// elapses. Games added while the window is open are kept.
    pub fn arm_delete_all(&self) -> Result<PendingDeletion, UndoError> {
        let ids: Vec<GameId> = self.visible_games().iter().map(|game| game.id).collect();
        let mut slot = self.shared.pending_all.lock();
        if slot.is_some() {
            return Err(UndoError::DeleteAllPending);
        }

        let controller = self.clone();
        let pending = PendingDeletion::arm(
            DeletionTarget::All(ids.clone()),
            self.shared.settings.undo_window,
            move || controller.commit_clear(ids),
        );
        *slot = Some(pending.clone());
        drop(slot);

        self.shared.notifier.notify(Notice::undo_prompt(
            "Backlog deleted",
            pending.clone(),
        ));
        Ok(pending)
    }

    /// Commit every armed deletion now. Returns how many were committed.
    pub fn commit_pending(&self) -> usize {
        let pending: Vec<PendingDeletion> = self
            .shared
            .pending_all
            .lock()
            .iter()
            .cloned()
            .chain(self.shared.pending_rows.lock().values().cloned())
            .collect();
        pending.iter().filter(|p| p.commit_now()).count()
    }

    /// Whether any deletion is still armed.
    pub fn has_pending(&self) -> bool {
        self.shared
            .pending_all
            .lock()
            .as_ref()
            .map(PendingDeletion::is_armed)
            .unwrap_or(false)
            || self
                .shared
                .pending_rows
                .lock()
                .values()
                .any(PendingDeletion::is_armed)
    }

    // Undone deletions are dropped here; committed ones are removed by their
    // store task once the delete has landed.
    fn prune_resolved(&self) {
        self.shared
            .pending_rows
            .lock()
            .retain(|_, pending| pending.state() != DeletionState::Cancelled);
        let mut slot = self.shared.pending_all.lock();
        let cancelled = slot
            .as_ref()
            .map(|pending| pending.state() == DeletionState::Cancelled)
            .unwrap_or(false);
        if cancelled {
            *slot = None;
        }
    }
}

impl Shared {
    async fn delete_row(&self, id: GameId) -> BacklogEvent {
        match self.repository.delete(id).await {
            Ok(removed) => BacklogEvent::Deleted { id, removed },
            Err(error) => self.failure(Operation::Delete, error),
        }
    }

    // A committed handle is resolved; an armed one belongs to a window that
    // is still open and stays.
    fn release_row(&self, id: GameId) {
        let mut rows = self.pending_rows.lock();
        let resolved = rows
            .get(&id)
            .map(|pending| !pending.is_armed())
            .unwrap_or(false);
        if resolved {
            rows.remove(&id);
        }
    }

    fn release_clear(&self) {
        let mut slot = self.pending_all.lock();
        let resolved = slot
            .as_ref()
            .map(|pending| !pending.is_armed())
            .unwrap_or(false);
        if resolved {
            *slot = None;
        }
    }

    fn failure(&self, operation: Operation, error: StoreError) -> BacklogEvent {
        error!(?operation, %error, "Store operation failed");
        let message = match operation {
            Operation::Insert => format!("Could not save game: {error}"),
            Operation::Delete => format!("Could not delete game: {error}"),
            Operation::DeleteAll => format!("Could not clear backlog: {error}"),
        };
        self.notifier
            .notify(Notice::message(message, self.settings.message_duration));
        BacklogEvent::Failed { operation, error }
    }

    async fn emit(&self, event: BacklogEvent) {
        if let BacklogEvent::Inserted(record) = &event {
            info!(id = record.id.0, "Insert completed");
        }
        if let Err(err) = self.events.send(event).await {
            debug!(event = ?err.0, "Backlog event dropped, no receiver");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{notify::ChannelNotifier, store::GameStore};
    use chrono::NaiveDate;
    use tokio::{sync::mpsc::UnboundedReceiver, time::timeout};

    const WAIT: Duration = Duration::from_secs(5);

    struct Harness {
        controller: BacklogController,
        events: mpsc::Receiver<BacklogEvent>,
        notices: UnboundedReceiver<Notice>,
        store: Arc<GameStore>,
    }

    fn harness(undo_window: Duration) -> Harness {
        let store = GameStore::in_memory().shared();
        let (notifier, notices) = ChannelNotifier::new();
        let (controller, events) = BacklogController::new(
            GameRepository::new(Arc::clone(&store)),
            Arc::new(notifier),
            ControllerSettings {
                undo_window,
                message_duration: Duration::from_millis(100),
            },
        );
        Harness {
            controller,
            events,
            notices,
            store,
        }
    }

    fn game(title: &str, year: i32, month: u32, day: u32) -> NewGame {
        NewGame {
            title: title.to_string(),
            platform: "Switch".to_string(),
            release: NaiveDate::from_ymd_opt(year, month, day).expect("valid date"),
        }
    }

    async fn next_event(events: &mut mpsc::Receiver<BacklogEvent>) -> BacklogEvent {
        timeout(WAIT, events.recv())
            .await
            .expect("event before timeout")
            .expect("controller alive")
    }

    async fn insert(h: &mut Harness, new_game: NewGame) -> GameRecord {
        h.controller.insert(new_game);
        match next_event(&mut h.events).await {
            BacklogEvent::Inserted(record) => record,
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_follows_release_order_regardless_of_inserts() {
        let mut h = harness(Duration::from_secs(30));
        insert(&mut h, game("Mid", 2020, 5, 1)).await;
        insert(&mut h, game("Old", 1999, 1, 1)).await;
        insert(&mut h, game("New", 2020, 5, 2)).await;

        let titles: Vec<String> = h.controller.games().into_iter().map(|g| g.title).collect();
        assert_eq!(titles, vec!["Old", "Mid", "New"]);
    }

    #[tokio::test]
    async fn add_game_rejects_invalid_form_without_storing() {
        let mut h = harness(Duration::from_secs(30));
        let form = GameForm {
            title: "X".to_string(),
            day: "30".to_string(),
            month: "02".to_string(),
            year: "2023".to_string(),
            ..GameForm::default()
        };

        assert_eq!(h.controller.add_game(&form), Err(ValidationError::InvalidDate));
        let notice = h.notices.try_recv().expect("error surfaced");
        assert_eq!(notice.message, ValidationError::InvalidDate.to_string());
        assert!(notice.action_label.is_none());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.events.try_recv().is_err());
        assert!(h.store.list().is_empty());
    }

    #[tokio::test]
    async fn add_game_stores_valid_form() {
        let mut h = harness(Duration::from_secs(30));
        let form = GameForm {
            title: "Halo".to_string(),
            platform: "Xbox".to_string(),
            month: "11".to_string(),
            year: "2001".to_string(),
            ..GameForm::default()
        };

        assert_eq!(h.controller.add_game(&form), Ok(()));
        match next_event(&mut h.events).await {
            BacklogEvent::Inserted(record) => {
                assert_eq!(record.release, NaiveDate::from_ymd_opt(2001, 11, 1).expect("date"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(h.controller.games().len(), 1);
    }

    #[tokio::test]
    async fn undo_keeps_the_row() {
        let mut h = harness(Duration::from_secs(30));
        let kept = insert(&mut h, game("Kept", 2001, 1, 1)).await;
        let other = insert(&mut h, game("Other", 2002, 1, 1)).await;

        let pending = h.controller.arm_delete_one(kept.clone());
        let visible: Vec<GameId> = h.controller.visible_games().iter().map(|g| g.id).collect();
        assert_eq!(visible, vec![other.id]);

        let prompt = h.notices.try_recv().expect("undo prompt");
        assert_eq!(prompt.message, "Deleted Kept");
        assert_eq!(prompt.action_label.as_deref(), Some("Undo"));
        assert!(prompt.trigger_action());
        assert_eq!(pending.state(), DeletionState::Cancelled);

        assert_eq!(h.controller.visible_games().len(), 2);
        assert_eq!(h.store.list(), vec![kept, other]);
        assert!(!h.controller.has_pending());
    }

    #[tokio::test]
    async fn expiry_removes_only_the_target() {
        let mut h = harness(Duration::from_millis(30));
        let doomed = insert(&mut h, game("Doomed", 2001, 1, 1)).await;
        let survivor = insert(&mut h, game("Survivor", 2002, 1, 1)).await;

        let pending = h.controller.arm_delete_one(doomed.clone());
        match next_event(&mut h.events).await {
            BacklogEvent::Deleted { id, removed } => {
                assert_eq!(id, doomed.id);
                assert!(removed);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(pending.state(), DeletionState::Committed);
        assert_eq!(h.store.list(), vec![survivor.clone()]);
        assert_eq!(h.controller.visible_games(), vec![survivor.clone()]);

        assert!(!pending.undo(), "late undo is a no-op");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.store.list(), vec![survivor]);
    }

    #[tokio::test]
    async fn rows_have_independent_windows() {
        let mut h = harness(Duration::from_millis(100));
        let first = insert(&mut h, game("First", 2001, 1, 1)).await;
        let second = insert(&mut h, game("Second", 2002, 1, 1)).await;

        let first_pending = h.controller.arm_delete_one(first.clone());
        let second_pending = h.controller.arm_delete_one(second.clone());
        assert!(!first_pending.same_as(&second_pending));
        assert!(h.controller.arm_delete_one(first.clone()).same_as(&first_pending));
        assert!(h.controller.visible_games().is_empty());

        assert!(second_pending.undo());
        match next_event(&mut h.events).await {
            BacklogEvent::Deleted { id, .. } => assert_eq!(id, first.id),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(h.store.list(), vec![second]);
    }

    #[tokio::test]
    async fn delete_all_has_a_single_window() {
        let mut h = harness(Duration::from_millis(50));
        insert(&mut h, game("One", 2001, 1, 1)).await;
        insert(&mut h, game("Two", 2002, 1, 1)).await;

        let pending = h.controller.arm_delete_all().expect("armed");
        assert_eq!(
            h.controller.arm_delete_all().err(),
            Some(UndoError::DeleteAllPending)
        );
        assert!(h.controller.visible_games().is_empty());
        assert_eq!(h.store.list().len(), 2);

        match next_event(&mut h.events).await {
            BacklogEvent::Cleared { removed } => assert_eq!(removed, 2),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(pending.state(), DeletionState::Committed);
        assert!(h.store.list().is_empty());
        assert!(h.controller.games().is_empty());
        assert!(h.controller.arm_delete_all().is_ok());
    }

    #[tokio::test]
    async fn insert_during_clear_all_survives() {
        let mut h = harness(Duration::from_millis(200));
        insert(&mut h, game("Old", 2001, 1, 1)).await;

        let pending = h.controller.arm_delete_all().expect("armed");
        let fresh = insert(&mut h, game("Fresh", 1990, 1, 1)).await;
        assert_eq!(h.controller.visible_games(), vec![fresh.clone()]);

        match next_event(&mut h.events).await {
            BacklogEvent::Cleared { removed } => assert_eq!(removed, 1),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(pending.state(), DeletionState::Committed);
        assert_eq!(h.store.list(), vec![fresh.clone()]);
        assert_eq!(h.controller.visible_games(), vec![fresh]);
    }

    #[tokio::test]
    async fn direct_deletes_leave_armed_windows_in_place() {
        let mut h = harness(Duration::from_secs(30));
        let record = insert(&mut h, game("Armed", 2001, 1, 1)).await;
        insert(&mut h, game("Other", 2002, 1, 1)).await;

        let row = h.controller.arm_delete_one(record.clone());
        h.controller.delete_one(&record);
        match next_event(&mut h.events).await {
            BacklogEvent::Deleted { id, removed } => {
                assert_eq!(id, record.id);
                assert!(removed);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(row.is_armed());
        assert!(h.controller.arm_delete_one(record).same_as(&row));

        let clear = h.controller.arm_delete_all().expect("armed");
        h.controller.delete_all();
        match next_event(&mut h.events).await {
            BacklogEvent::Cleared { removed } => assert_eq!(removed, 1),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(clear.is_armed());
        assert_eq!(
            h.controller.arm_delete_all().err(),
            Some(UndoError::DeleteAllPending)
        );
        assert!(h.controller.has_pending());
    }

    #[tokio::test]
    async fn undone_delete_all_restores_display() {
        let mut h = harness(Duration::from_secs(30));
        insert(&mut h, game("One", 2001, 1, 1)).await;
        insert(&mut h, game("Two", 2002, 1, 1)).await;

        let pending = h.controller.arm_delete_all().expect("armed");
        assert!(h.controller.visible_games().is_empty());
        assert!(pending.undo());
        assert_eq!(h.controller.visible_games().len(), 2);
        assert_eq!(h.store.list().len(), 2);
        assert!(h.controller.arm_delete_all().is_ok());
    }

    #[tokio::test]
    async fn deleting_absent_game_is_not_an_error() {
        let mut h = harness(Duration::from_secs(30));
        let kept = insert(&mut h, game("Kept", 2001, 1, 1)).await;
        let ghost = GameRecord {
            id: GameId(404),
            ..kept.clone()
        };

        h.controller.delete_one(&ghost);
        match next_event(&mut h.events).await {
            BacklogEvent::Deleted { id, removed } => {
                assert_eq!(id, GameId(404));
                assert!(!removed);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(h.store.list(), vec![kept]);
    }

    #[tokio::test]
    async fn commit_pending_flushes_armed_deletions() {
        let mut h = harness(Duration::from_secs(30));
        let record = insert(&mut h, game("Flushed", 2001, 1, 1)).await;
        h.controller.arm_delete_one(record.clone());
        assert!(h.controller.has_pending());

        assert_eq!(h.controller.commit_pending(), 1);
        match next_event(&mut h.events).await {
            BacklogEvent::Deleted { id, removed } => {
                assert_eq!(id, record.id);
                assert!(removed);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(h.store.list().is_empty());
        assert!(!h.controller.has_pending());
    }
}
