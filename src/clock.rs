//! Source of "today" for date filtering.

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, NaiveDate};

use crate::models::DateFormat;

pub trait Clock {
    /// The viewer's local calendar day.
    fn today(&self) -> NaiveDate;
}

/// Reads the local system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same day. Used for `--date` and in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Render `date` the way a source prints it, e.g. `Friday 14 November 2025`.
///
/// Returns `None` for a pattern chrono cannot render.
pub fn format_for_source(date: NaiveDate, format: &DateFormat) -> Option<String> {
    let pattern = match format {
        DateFormat::Iso => "%Y-%m-%d",
        DateFormat::Pattern(pattern) => pattern.as_str(),
    };
    let mut out = String::new();
    write!(out, "{}", date.format(pattern)).ok()?;
    Some(out)
}

/// Whether chrono understands every specifier in `pattern`.
pub fn is_valid_pattern(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}
