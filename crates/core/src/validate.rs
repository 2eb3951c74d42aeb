//! Validation of raw form input into a [`NewGame`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{dates, models::NewGame};

/// Day used when the user leaves the day field empty.
pub const DEFAULT_DAY: &str = "01";

/// Reasons a game form is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The title field is empty.
    #[error("Please enter a title")]
    EmptyTitle,
    /// The month field is empty.
    #[error("Please enter a release month")]
    EmptyMonth,
    /// The month is not a number between 1 and 12.
    #[error("Release month must be between 1 and 12")]
    InvalidMonth,
    /// The year has fewer than four characters.
    #[error("Release year must have four digits")]
    InvalidYear,
    /// The day/month/year triple is not a calendar date.
    #[error("Release date is not a valid date")]
    InvalidDate,
}

/// Raw strings collected by the add-game form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameForm {
    /// Title input.
    pub title: String,
    /// Platform input.
    pub platform: String,
    /// Day of month input; may be empty.
    pub day: String,
    /// Month input.
    pub month: String,
    /// Year input.
    pub year: String,
}

impl GameForm {
    /// Validate the form contents.
    pub fn validate(&self) -> Result<NewGame, ValidationError> {
        validate(&self.title, &self.platform, &self.day, &self.month, &self.year)
    }
}

/// Turn raw form strings into a game ready for insertion.
///
/// Rules are checked in order and the first failure is returned.
pub fn validate(
    title: &str,
    platform: &str,
    day: &str,
    month: &str,
    year: &str,
) -> Result<NewGame, ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }

    let day = day.trim();
    let day = if day.is_empty() {
        DEFAULT_DAY.to_string()
    } else {
        zero_pad(day)
    };

    let month = month.trim();
    if month.is_empty() {
        return Err(ValidationError::EmptyMonth);
    }
    let month = zero_pad(month);
    let numeric_month = month
        .chars()
        .all(|ch| ch.is_ascii_digit())
        .then(|| month.parse::<u32>().ok())
        .flatten();
    if !matches!(numeric_month, Some(1..=12)) {
        return Err(ValidationError::InvalidMonth);
    }

    let year = year.trim();
    if year.chars().count() < 4 {
        return Err(ValidationError::InvalidYear);
    }

    let release =
        dates::parse_release(&day, &month, year).ok_or(ValidationError::InvalidDate)?;

    Ok(NewGame {
        title: title.to_string(),
        platform: platform.to_string(),
        release,
    })
}

fn zero_pad(value: &str) -> String {
    if value.chars().count() == 1 {
        format!("0{value}")
    } else {
        value.to_string()
    }
}
