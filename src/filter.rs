//! Channel allow-list and target-date filtering.
//!
//! Raw channel text from schedule sites is noisy ("Sky Sports Main Event HD",
//! "TNT Sports 1 / discovery+"). An event is kept only if some allow-list
//! entry occurs in that text, case-insensitively, and it is then reported
//! under the entry's exact spelling.

use std::ops::Range;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use crate::clock::format_for_source;
use crate::error::FieldError;
use crate::models::DateFormat;
use crate::utils::normalize_ws;

static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})").unwrap());
static TODAY_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\btoday\b").unwrap());

/// The caller's ordered list of canonical channel names.
#[derive(Debug, Clone)]
pub struct AllowList {
    entries: Vec<(String, Regex)>,
}

impl AllowList {
    pub fn new(channels: &[String]) -> Result<Self, regex::Error> {
        let entries = channels
            .iter()
            .map(|name| {
                let re = RegexBuilder::new(&regex::escape(name.trim()))
                    .case_insensitive(true)
                    .build()?;
                Ok((name.trim().to_string(), re))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { entries })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Map raw channel text to the canonical allow-list spelling.
    ///
    /// When several entries match ("Sky Sports" and "Sky Sports Main Event"),
    /// the longest wins; ties go to the earlier entry.
    pub fn canonicalize(&self, raw: &str) -> Result<&str, FieldError> {
        let mut best: Option<&str> = None;
        for (name, re) in &self.entries {
            if re.is_match(raw) && best.is_none_or(|b| name.len() > b.len()) {
                best = Some(name.as_str());
            }
        }
        best.ok_or_else(|| FieldError::UnknownChannel(normalize_ws(raw)))
    }

    /// Find the earliest allow-list mention in free text, returning the
    /// canonical name and the byte span of the mention. At equal positions the
    /// longer mention wins.
    pub fn locate(&self, text: &str) -> Option<(&str, Range<usize>)> {
        self.entries
            .iter()
            .filter_map(|(name, re)| re.find(text).map(|m| (name.as_str(), m.range())))
            .min_by(|(_, a), (_, b)| a.start.cmp(&b.start).then(b.len().cmp(&a.len())))
    }

    /// Remove every allow-list mention from `text`, longest names first.
    pub fn strip(&self, text: &str) -> String {
        let mut by_len: Vec<&(String, Regex)> = self.entries.iter().collect();
        by_len.sort_by_key(|(name, _)| std::cmp::Reverse(name.len()));
        by_len
            .into_iter()
            .fold(text.to_string(), |acc, (_, re)| re.replace_all(&acc, " ").into_owned())
    }
}

/// Decide which day an event belongs to.
///
/// A missing or blank date means the source has no date concept and the event
/// is assumed to be on `target`. Otherwise the raw text must denote `target`:
/// - ISO sources: the first `YYYY-MM-DD` in the text must equal `target`.
/// - Pattern sources: `target` rendered with the pattern (also with an
///   unpadded day) must occur in the text, case-insensitively.
/// - The bare word "Today" always denotes `target`.
pub fn match_date(
    raw: Option<&str>,
    format: &DateFormat,
    target: NaiveDate,
) -> Result<NaiveDate, FieldError> {
    let raw = match raw.map(normalize_ws) {
        Some(text) if !text.is_empty() => text,
        _ => return Ok(target),
    };

    if TODAY_WORD.is_match(&raw) {
        return Ok(target);
    }

    let matched = match format {
        DateFormat::Iso => ISO_DATE
            .captures(&raw)
            .and_then(|caps| {
                NaiveDate::from_ymd_opt(
                    caps[1].parse().ok()?,
                    caps[2].parse().ok()?,
                    caps[3].parse().ok()?,
                )
            })
            .is_some_and(|date| date == target),
        DateFormat::Pattern(pattern) => {
            let haystack = raw.to_lowercase();
            let mut candidates = vec![pattern.clone()];
            if pattern.contains("%d") {
                candidates.push(pattern.replace("%d", "%-d"));
            }
            candidates.iter().any(|p| {
                format_for_source(target, &DateFormat::Pattern(p.clone()))
                    .is_some_and(|needle| contains_date(&haystack, &needle.to_lowercase()))
            })
        }
    };

    if matched {
        Ok(target)
    } else {
        Err(FieldError::OtherDate(raw))
    }
}

/// Substring search where the match may not continue a number on either
/// side, so "4 november" is not found inside "14 november".
fn contains_date(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, found)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + found.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
    })
}
