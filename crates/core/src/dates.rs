//! Release date parsing and formatting.

use chrono::NaiveDate;

/// Display format used for release dates, e.g. `01 November 2001`.
pub const RELEASE_FORMAT: &str = "%d %B %Y";

/// Parse a day/month/year triple of decimal strings into a calendar date.
///
/// Returns `None` for non-digit input or dates that do not exist.
pub fn parse_release(day: &str, month: &str, year: &str) -> Option<NaiveDate> {
    let day = parse_digits(day)?;
    let month = parse_digits(month)?;
    let year = parse_digits(year)?;
    let year = i32::try_from(year).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Format a release date for display.
pub fn format_release(date: NaiveDate) -> String {
    date.format(RELEASE_FORMAT).to_string()
}

fn parse_digits(value: &str) -> Option<u32> {
    if value.is_empty() || !value.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_real_dates() {
        assert_eq!(
            parse_release("01", "11", "2001"),
            NaiveDate::from_ymd_opt(2001, 11, 1)
        );
        assert_eq!(
            parse_release("29", "02", "2024"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
    }

    #[test]
    fn rejects_impossible_or_malformed_dates() {
        assert_eq!(parse_release("30", "02", "2023"), None);
        assert_eq!(parse_release("29", "02", "2023"), None);
        assert_eq!(parse_release("00", "01", "2023"), None);
        assert_eq!(parse_release("1a", "01", "2023"), None);
        assert_eq!(parse_release("01", "01", "-202"), None);
        assert_eq!(parse_release("01", "01", "99999999999"), None);
    }

    #[test]
    fn formats_for_display() {
        let date = NaiveDate::from_ymd_opt(2001, 11, 1).expect("valid date");
        assert_eq!(format_release(date), "01 November 2001");
    }
}
