//! Sport classification for events whose source gives no category.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Category for events no keyword matches.
pub const CATCH_ALL: &str = "Sport";

/// Ordered keyword vocabulary. The first category (in this order) with a
/// keyword in the text wins.
const VOCABULARY: &[(&str, &[&str])] = &[
    ("Football", &["football"]),
    ("Rugby", &["rugby"]),
    ("Cricket", &["cricket"]),
    ("Tennis", &["tennis"]),
    ("Golf", &["golf"]),
    ("Boxing", &["boxing"]),
    ("Basketball", &["basketball"]),
    ("Hockey", &["hockey"]),
    ("Motorsport", &["motorsport", "formula", "f1"]),
    ("MMA", &["mma"]),
];

// Keywords match at the start of a word: "footballer" counts, "Emma" does not.
static KEYWORDS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    VOCABULARY
        .iter()
        .map(|(category, words)| {
            let pattern = format!(r"\b(?:{})", words.join("|"));
            let re = RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .unwrap();
            (*category, re)
        })
        .collect()
});

/// Pick the sport category for an event.
///
/// A non-blank `supplied` category is passed through trimmed. Otherwise `text`
/// (the cleaned title, plus any leftover text from a combined line) is
/// scanned against the vocabulary.
pub fn classify(supplied: Option<&str>, text: &str) -> String {
    if let Some(sport) = supplied.map(str::trim).filter(|s| !s.is_empty()) {
        return sport.to_string();
    }
    KEYWORDS
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(category, _)| category.to_string())
        .unwrap_or_else(|| CATCH_ALL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supplied_category_passes_through() {
        assert_eq!(classify(Some("  Darts "), "Premier League Darts"), "Darts");
        assert_eq!(classify(Some("football"), "anything"), "football");
    }

    #[test]
    fn test_blank_supplied_category_is_ignored() {
        assert_eq!(classify(Some("   "), "Rugby Union: Saints v Tigers"), "Rugby");
    }

    #[test]
    fn test_keyword_classification() {
        assert_eq!(classify(None, "Team A v Team B Football"), "Football");
        assert_eq!(classify(None, "ICC CRICKET World Cup"), "Cricket");
        assert_eq!(classify(None, "Formula 1: Abu Dhabi GP"), "Motorsport");
        assert_eq!(classify(None, "F1 Qualifying"), "Motorsport");
        assert_eq!(classify(None, "UFC 300 MMA Prelims"), "MMA");
        assert_eq!(classify(None, "NHL Ice Hockey"), "Hockey");
    }

    #[test]
    fn test_no_keyword_is_catch_all() {
        assert_eq!(classify(None, "Evening Round-up"), "Sport");
        assert_eq!(classify(None, "Emma Raducanu interview"), "Sport");
    }

    #[test]
    fn test_vocabulary_order_breaks_ties() {
        assert_eq!(classify(None, "Golf and Football highlights"), "Football");
        assert_eq!(classify(None, "Basketball then Boxing"), "Boxing");
    }
}
