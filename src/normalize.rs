//! Field normalization: time-of-day, titles, and combined-text splitting.
//!
//! Schedule pages write times as `7:45`, `19:30` or `19.30`, pad titles with
//! marketing copy ("Watch LIVE today on Sky Sports"), and sometimes put every
//! field of an event in one text node. The helpers here turn that into the
//! canonical [`Event`](crate::models::Event) field values or reject the
//! fragment with a [`FieldError`].

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::error::FieldError;
use crate::filter::AllowList;
use crate::utils::normalize_ws;

/// Sentinel time for sources without a time-of-day concept.
pub const TBD: &str = "TBD";

/// Titles longer than this usually mean a probe matched a whole listing block.
pub const DEFAULT_MAX_TITLE_LEN: usize = 150;

static TIME: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"\b([01]?\d|2[0-3])[:.]([0-5]\d)(?:\s?([ap])m\b)?")
        .case_insensitive(true)
        .build()
        .unwrap()
});

/// Words left dangling at either end once a channel or boilerplate word is cut.
const CONNECTIVES: &[&str] = &["on", "via", "at"];

/// Locate the first time-of-day in `text`, returning it as zero-padded
/// 24-hour `HH:MM` together with the byte span of the original mention.
///
/// A trailing `am`/`pm` is honoured. Letters may follow directly
/// (`19:30GMT`) but digits may not.
pub fn find_time(text: &str) -> Option<(String, Range<usize>)> {
    TIME.captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        if text[whole.end()..].starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        let mut hour: u32 = caps[1].parse().ok()?;
        match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
            Some("p") if hour < 12 => hour += 12,
            Some("a") if hour == 12 => hour = 0,
            _ => {}
        }
        Some((format!("{:02}:{}", hour, &caps[2]), whole.range()))
    })
}

/// Normalize a discrete time field to `HH:MM`.
pub fn normalize_time(raw: &str) -> Result<String, FieldError> {
    find_time(raw)
        .map(|(time, _)| time)
        .ok_or_else(|| FieldError::BadTime(normalize_ws(raw)))
}

/// Title cleanup rules derived from configuration.
#[derive(Debug, Clone)]
pub struct TitleRules {
    boilerplate: Option<Regex>,
    max_len: usize,
}

impl TitleRules {
    /// `boilerplate` words are removed as whole words, case-insensitively.
    pub fn new(boilerplate: &[String], max_len: usize) -> Result<Self, regex::Error> {
        let words: Vec<String> = boilerplate
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(regex::escape)
            .collect();
        let boilerplate = if words.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&format!(r"\b(?:{})\b", words.join("|")))
                    .case_insensitive(true)
                    .build()?,
            )
        };
        Ok(Self {
            boilerplate,
            max_len,
        })
    }

    /// Clean a raw title: drop allow-list channel mentions and boilerplate
    /// words, collapse whitespace, trim separators, then enforce the length
    /// bounds. Repeats until stable so removals cannot splice a new
    /// channel name or boilerplate word together.
    pub fn clean(&self, raw: &str, channels: &AllowList) -> Result<String, FieldError> {
        let mut title = trim_separators(&normalize_ws(raw)).to_string();
        loop {
            let next = self.strip_once(&title, channels);
            if next == title {
                break;
            }
            title = next;
        }

        let len = title.chars().count();
        if len == 0 {
            Err(FieldError::EmptyTitle)
        } else if len > self.max_len {
            Err(FieldError::TitleTooLong(len))
        } else {
            Ok(title)
        }
    }

    fn strip_once(&self, title: &str, channels: &AllowList) -> String {
        let mut out = channels.strip(title);
        if let Some(re) = &self.boilerplate {
            out = re.replace_all(&out, " ").into_owned();
        }
        let removed = normalize_ws(&out) != title;
        let out = normalize_ws(&out);
        let out = trim_separators(&out);
        if removed {
            trim_connectives(out)
        } else {
            out.to_string()
        }
    }
}

fn trim_separators(s: &str) -> &str {
    s.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '-' | '–' | '—' | '|' | ':' | ',' | '•' | '·' | '/')
    })
}

fn trim_connectives(s: &str) -> String {
    let mut words: Vec<&str> = s.split(' ').filter(|w| !w.is_empty()).collect();
    while words
        .first()
        .is_some_and(|w| CONNECTIVES.iter().any(|c| w.eq_ignore_ascii_case(c)))
    {
        words.remove(0);
    }
    while words
        .last()
        .is_some_and(|w| CONNECTIVES.iter().any(|c| w.eq_ignore_ascii_case(c)))
    {
        words.pop();
    }
    trim_separators(&words.join(" ")).to_string()
}

/// Fields recovered from one combined text line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobParts {
    /// Normalized time, or `None` when the line carries no time.
    pub time: Option<String>,
    /// Canonical allow-list channel found in the line.
    pub channel: String,
    /// Text that reads as the event title, before title cleanup.
    pub title: String,
    /// Text trailing the channel mention (often a sport label).
    pub residue: String,
}

/// Split a combined line such as `19:30 Team A v Team B Sky Sports Football`.
///
/// The first time mention and the earliest allow-list mention are removed by
/// position. Text before the channel is the title and text after it is
/// residue; when nothing precedes the channel, the trailing text is the title.
pub fn split_blob(blob: &str, channels: &AllowList) -> Result<BlobParts, FieldError> {
    let blob = normalize_ws(blob);

    let (time, rest) = match find_time(&blob) {
        Some((time, span)) => {
            let mut rest = String::with_capacity(blob.len());
            rest.push_str(&blob[..span.start]);
            rest.push(' ');
            rest.push_str(&blob[span.end..]);
            (Some(time), rest)
        }
        None => (None, blob.clone()),
    };

    let (channel, span) = channels
        .locate(&rest)
        .ok_or_else(|| FieldError::UnknownChannel(blob.clone()))?;
    let before = normalize_ws(&rest[..span.start]);
    let after = normalize_ws(&rest[span.end..]);

    let (title, residue) = if trim_separators(&before).is_empty() {
        (after, String::new())
    } else {
        (before, after)
    };

    Ok(BlobParts {
        time,
        channel: channel.to_string(),
        title,
        residue,
    })
}
