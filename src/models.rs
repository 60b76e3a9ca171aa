//! Data models for schedule sources and the events extracted from them.
//!
//! This module defines the core data structures used throughout the application:
//! - [`SourceSpec`]: One upstream schedule website and how to read it
//! - [`Probe`] / [`FieldSelectors`]: Ordered structural patterns for locating events
//! - [`RawFields`]: Unvalidated text pulled out of one page fragment
//! - [`Event`]: The canonical, normalized output record
//! - [`EventBatch`]: All events of one run, in source order
//! - [`SourceReport`]: Per-source diagnostics for the run report
//!
//! Sources are configuration: they are deserialized from YAML once and never
//! mutated afterwards.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default chrono pattern for sources that print dates as
/// `Friday 14 November 2025`.
pub const DEFAULT_DATE_PATTERN: &str = "%A %d %B %Y";

/// One upstream schedule website.
///
/// Each source carries its own ordered probe list, so supporting a new site
/// (or a new layout of an existing one) is a configuration change rather than
/// a new code path.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceSpec {
    /// Short identifier used in logs, reports and debug file names.
    pub id: String,
    /// Page to fetch.
    pub url: String,
    /// Structural probes, tried in order until one matches at least one fragment.
    pub probes: Vec<Probe>,
    /// How this source prints dates.
    #[serde(default)]
    pub date_format: DateFormat,
    /// `false` for sources without a time-of-day concept; their events are timed `"TBD"`.
    #[serde(default = "default_true")]
    pub has_time: bool,
}

fn default_true() -> bool {
    true
}

/// A structural pattern used to locate candidate event fragments.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Probe {
    /// CSS selector matching one element per candidate event.
    pub selector: String,
    /// Per-field sub-selectors. Absent means the fragment's whole text is one
    /// combined blob and fields are split out positionally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldSelectors>,
}

impl Probe {
    pub fn mode(&self) -> ExtractionMode<'_> {
        match &self.fields {
            Some(fields) => ExtractionMode::Fields(fields),
            None => ExtractionMode::Blob,
        }
    }
}

/// How fields are pulled out of a fragment.
#[derive(Debug, Clone, Copy)]
pub enum ExtractionMode<'a> {
    /// Independent sub-selectors per field.
    Fields(&'a FieldSelectors),
    /// One free-text line per event; time and channel are located by pattern.
    Blob,
}

/// Sub-selectors evaluated relative to a fragment. Every field is optional
/// at this level; required fields are enforced during normalization.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FieldSelectors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
}

impl FieldSelectors {
    /// All configured selectors, labelled by field name.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("date", &self.date),
            ("time", &self.time),
            ("title", &self.title),
            ("channel", &self.channel),
            ("sport", &self.sport),
        ]
        .into_iter()
        .filter_map(|(name, sel)| sel.as_deref().map(|s| (name, s)))
    }
}

/// How a source prints the date of an event.
///
/// Configured as the string `"iso"` or as a chrono strftime pattern such as
/// `"%A %d %B %Y"`; the target date is rendered with the pattern and searched
/// for in the raw date text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum DateFormat {
    Iso,
    Pattern(String),
}

impl Default for DateFormat {
    fn default() -> Self {
        DateFormat::Pattern(DEFAULT_DATE_PATTERN.to_string())
    }
}

impl From<String> for DateFormat {
    fn from(s: String) -> Self {
        if s.trim().eq_ignore_ascii_case("iso") {
            DateFormat::Iso
        } else {
            DateFormat::Pattern(s)
        }
    }
}

impl From<DateFormat> for String {
    fn from(f: DateFormat) -> Self {
        match f {
            DateFormat::Iso => "iso".to_string(),
            DateFormat::Pattern(p) => p,
        }
    }
}

/// Unvalidated text extracted from one fragment.
///
/// `blob` is set instead of the discrete fields when the probe runs in
/// combined-text mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFields {
    pub date: Option<String>,
    pub time: Option<String>,
    pub title: Option<String>,
    pub channel: Option<String>,
    pub sport: Option<String>,
    pub blob: Option<String>,
}

/// A televised sport event, the canonical output unit.
///
/// Field order is part of the output contract: downstream consumers expect
/// `date`, `sport`, `title`, `time`, `channel`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Event {
    /// The viewer's local day, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub sport: String,
    pub title: String,
    /// `HH:MM` (24-hour) or `"TBD"`.
    pub time: String,
    /// Exact spelling of the matching allow-list entry.
    pub channel: String,
}

/// Ordered events of one run: source order first, fragment order within a source.
///
/// No cross-source deduplication happens here; two sites listing the same
/// fixture produce two events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct EventBatch {
    events: Vec<Event>,
}

impl EventBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one source's surviving events after those already collected.
    pub fn append(&mut self, events: Vec<Event>) {
        self.events.extend(events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

/// What happened to one source during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    /// A probe matched; `events` survived normalization out of `fragments`.
    Ok {
        probe: usize,
        fragments: usize,
        events: usize,
    },
    /// The page was fetched but no probe matched anything.
    NoMatch,
    /// The source could not be processed at all.
    Failed { error: String },
}

/// Diagnostic record for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

/// Summary written alongside the events when a report path is configured.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub date: NaiveDate,
    pub total_events: usize,
    pub sources: &'a [SourceReport],
}
