//! Shared domain models.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates;

/// Store-assigned identifier of a backlog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub i64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A validated game that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGame {
    /// Game title, never empty.
    pub title: String,
    /// Platform as entered by the user; may be empty.
    pub platform: String,
    /// Release date.
    pub release: NaiveDate,
}

/// A game stored in the backlog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Identifier assigned by the store. Only the store sets it.
    pub(crate) id: GameId,
    /// Game title, never empty.
    pub title: String,
    /// Platform as entered by the user; may be empty.
    pub platform: String,
    /// Release date.
    pub release: NaiveDate,
}

impl GameRecord {
    /// Attach a store-assigned id to a validated game.
    pub fn from_new(id: GameId, game: NewGame) -> Self {
        Self {
            id,
            title: game.title,
            platform: game.platform,
            release: game.release,
        }
    }

    /// Identifier assigned by the store.
    pub fn id(&self) -> GameId {
        self.id
    }

    /// Release date formatted for display.
    pub fn release_label(&self) -> String {
        dates::format_release(self.release)
    }

    /// Key used for display ordering: release date first, then id.
    pub fn sort_key(&self) -> (NaiveDate, GameId) {
        (self.release, self.id)
    }
}

/// Sort records the way the backlog is displayed.
pub fn sort_for_display(records: &mut [GameRecord]) {
    records.sort_by_key(GameRecord::sort_key);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, year: i32) -> GameRecord {
        GameRecord::from_new(
            GameId(id),
            NewGame {
                title: format!("Game {id}"),
                platform: String::new(),
                release: NaiveDate::from_ymd_opt(year, 1, 1).expect("valid date"),
            },
        )
    }

    #[test]
    fn display_order_uses_release_then_id() {
        let mut records = vec![record(3, 2000), record(1, 2005), record(2, 2000)];
        sort_for_display(&mut records);
        let ids: Vec<GameId> = records.iter().map(GameRecord::id).collect();
        assert_eq!(ids, vec![GameId(2), GameId(3), GameId(1)]);
        assert_eq!(records[0].id().to_string(), "#2");
    }
}
