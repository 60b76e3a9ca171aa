//! Per-source processing: extract, normalize, filter, classify.
//!
//! [`Pipeline`] turns one fetched page into the events it contributes. It is
//! synchronous and holds no state between pages, so the same page and
//! configuration always produce the same events.

use chrono::NaiveDate;
use tracing::instrument;

use crate::classify::classify;
use crate::config::Config;
use crate::error::{ConfigError, FieldError, SourceError};
use crate::filter::{AllowList, match_date};
use crate::models::{Event, RawFields, SourceSpec};
use crate::normalize::{TBD, TitleRules, normalize_time, split_blob};
use crate::observer::PipelineObserver;
use crate::scrapers::extractor::extract;

/// Events one source contributed, plus what the report needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRun {
    pub probe: usize,
    pub fragments: usize,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    channels: AllowList,
    titles: TitleRules,
}

impl Pipeline {
    pub fn new(
        channels: &[String],
        boilerplate: &[String],
        max_title_len: usize,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            channels: AllowList::new(channels)?,
            titles: TitleRules::new(boilerplate, max_title_len)?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(&config.channels, &config.boilerplate, config.max_title_len)
            .map_err(|e| ConfigError::Invalid(format!("cannot compile text rules: {e}")))
    }

    pub fn channels(&self) -> &AllowList {
        &self.channels
    }

    /// Run one page through the pipeline.
    ///
    /// `Ok(None)` means no probe matched. Fragments failing validation are
    /// reported to `observer` and dropped; they never fail the source.
    #[instrument(level = "info", skip_all, fields(source = %source.id))]
    pub fn process_page(
        &self,
        source: &SourceSpec,
        html: &str,
        target: NaiveDate,
        observer: &dyn PipelineObserver,
    ) -> Result<Option<SourceRun>, SourceError> {
        let Some(extraction) = extract(html, &source.probes)? else {
            return Ok(None);
        };
        let fragments = extraction.fragments.len();
        observer.probe_adopted(source, extraction.probe, fragments);

        let mut events = Vec::with_capacity(fragments);
        for (index, raw) in extraction.fragments.into_iter().enumerate() {
            match self.process_fragment(raw, source, target) {
                Ok(event) => events.push(event),
                Err(reason) => observer.fragment_dropped(source, index, &reason),
            }
        }

        Ok(Some(SourceRun {
            probe: extraction.probe,
            fragments,
            events,
        }))
    }

    /// Turn one fragment's raw text into an [`Event`], or say why it was dropped.
    pub fn process_fragment(
        &self,
        raw: RawFields,
        source: &SourceSpec,
        target: NaiveDate,
    ) -> Result<Event, FieldError> {
        match raw.blob.as_deref() {
            Some(blob) => self.from_blob(blob, source, target),
            None => self.from_fields(&raw, source, target),
        }
    }

    fn from_fields(
        &self,
        raw: &RawFields,
        source: &SourceSpec,
        target: NaiveDate,
    ) -> Result<Event, FieldError> {
        let title = raw.title.as_deref().ok_or(FieldError::MissingField("title"))?;
        let channel = raw.channel.as_deref().ok_or(FieldError::MissingField("channel"))?;
        if source.has_time && raw.time.is_none() {
            return Err(FieldError::MissingField("time"));
        }

        let date = match_date(raw.date.as_deref(), &source.date_format, target)?;
        let time = match raw.time.as_deref() {
            Some(time) if source.has_time => normalize_time(time)?,
            Some(time) => normalize_time(time).unwrap_or_else(|_| TBD.to_string()),
            None => TBD.to_string(),
        };
        let channel = self.channels.canonicalize(channel)?.to_string();
        let title = self.titles.clean(title, &self.channels)?;
        let sport = classify(raw.sport.as_deref(), &title);

        Ok(Event {
            date,
            sport,
            title,
            time,
            channel,
        })
    }

    // Combined lines carry no separate date; the event is taken to be on `target`.
    fn from_blob(
        &self,
        blob: &str,
        source: &SourceSpec,
        target: NaiveDate,
    ) -> Result<Event, FieldError> {
        let parts = split_blob(blob, &self.channels)?;
        let time = match parts.time {
            Some(time) => time,
            None if source.has_time => return Err(FieldError::MissingField("time")),
            None => TBD.to_string(),
        };
        let title = self.titles.clean(&parts.title, &self.channels)?;
        let sport = classify(None, &format!("{} {}", title, parts.residue));

        Ok(Event {
            date: target,
            sport,
            title,
            time,
            channel: parts.channel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldSelectors, Probe};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(
            &strings(&["Sky Sports", "TNT Sports"]),
            &strings(&["watch", "live", "today", "tonight", "stream"]),
            150,
        )
        .unwrap()
    }

    fn target() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 14).unwrap()
    }

    fn source(has_time: bool) -> SourceSpec {
        SourceSpec {
            id: "test".to_string(),
            url: "https://example.com".to_string(),
            probes: vec![
                Probe {
                    selector: "div.schedule-item".to_string(),
                    fields: Some(FieldSelectors {
                        date: Some(".date".to_string()),
                        time: Some(".time".to_string()),
                        title: Some(".event".to_string()),
                        channel: Some(".channel".to_string()),
                        sport: Some(".sport".to_string()),
                    }),
                },
                Probe {
                    selector: "li.listing".to_string(),
                    fields: None,
                },
            ],
            date_format: Default::default(),
            has_time,
        }
    }

    fn fields(time: Option<&str>, title: Option<&str>, channel: Option<&str>) -> RawFields {
        RawFields {
            time: time.map(String::from),
            title: title.map(String::from),
            channel: channel.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_combined_blob_scenario() {
        let raw = RawFields {
            blob: Some("19:30 Team A v Team B Sky Sports Football".to_string()),
            ..Default::default()
        };
        let event = pipeline().process_fragment(raw, &source(true), target()).unwrap();
        assert_eq!(
            event,
            Event {
                date: target(),
                sport: "Football".to_string(),
                title: "Team A v Team B".to_string(),
                time: "19:30".to_string(),
                channel: "Sky Sports".to_string(),
            }
        );
    }

    #[test]
    fn test_no_keyword_and_no_sport_field_is_catch_all() {
        let raw = fields(Some("18:00"), Some("Evening Round-up"), Some("Sky Sports News"));
        let event = pipeline().process_fragment(raw, &source(true), target()).unwrap();
        assert_eq!(event.sport, "Sport");
        assert_eq!(event.channel, "Sky Sports");
        assert_eq!(event.title, "Evening Round-up");
    }

    #[test]
    fn test_supplied_sport_passes_through() {
        let mut raw = fields(Some("9.05"), Some("Watch: Ashes Day 2 LIVE"), Some("TNT Sports 1"));
        raw.sport = Some(" Cricket ".to_string());
        raw.date = Some("Friday 14 November 2025".to_string());
        let event = pipeline().process_fragment(raw, &source(true), target()).unwrap();
        assert_eq!(event.sport, "Cricket");
        assert_eq!(event.time, "09:05");
        assert_eq!(event.title, "Ashes Day 2");
        assert_eq!(event.channel, "TNT Sports");
    }

    #[test]
    fn test_missing_required_fields_are_dropped() {
        let p = pipeline();
        let s = source(true);
        assert_eq!(
            p.process_fragment(fields(None, Some("A v B"), Some("Sky Sports")), &s, target()),
            Err(FieldError::MissingField("time"))
        );
        assert_eq!(
            p.process_fragment(fields(Some("19:30"), None, Some("Sky Sports")), &s, target()),
            Err(FieldError::MissingField("title"))
        );
        assert_eq!(
            p.process_fragment(fields(Some("19:30"), Some("A v B"), None), &s, target()),
            Err(FieldError::MissingField("channel"))
        );
    }

    #[test]
    fn test_source_without_time_concept_uses_tbd() {
        let p = pipeline();
        let s = source(false);
        let event = p
            .process_fragment(fields(None, Some("Open Championship"), Some("Sky Sports Golf")), &s, target())
            .unwrap();
        assert_eq!(event.time, "TBD");
        assert_eq!(event.sport, "Sport");

        let event = p
            .process_fragment(fields(Some("All day"), Some("Golf: Open"), Some("Sky Sports")), &s, target())
            .unwrap();
        assert_eq!(event.time, "TBD");

        let raw = RawFields {
            blob: Some("Tour de France Stage 4 TNT Sports".to_string()),
            ..Default::default()
        };
        assert_eq!(p.process_fragment(raw, &s, target()).unwrap().time, "TBD");
    }

    #[test]
    fn test_other_dates_and_channels_are_dropped() {
        let p = pipeline();
        let s = source(true);
        let mut raw = fields(Some("19:30"), Some("A v B"), Some("Sky Sports"));
        raw.date = Some("Saturday 15 November 2025".to_string());
        assert!(matches!(
            p.process_fragment(raw, &s, target()),
            Err(FieldError::OtherDate(_))
        ));

        let raw = fields(Some("19:30"), Some("A v B"), Some("BBC One"));
        assert!(matches!(
            p.process_fragment(raw, &s, target()),
            Err(FieldError::UnknownChannel(_))
        ));

        let raw = fields(Some("late"), Some("A v B"), Some("Sky Sports"));
        assert!(matches!(
            p.process_fragment(raw, &s, target()),
            Err(FieldError::BadTime(_))
        ));
    }

    #[test]
    fn test_process_page_drops_invalid_fragments_only() {
        let html = r#"
            <div class="schedule-item">
              <span class="time">19:30</span><span class="event">Team A v Team B</span>
              <span class="channel">Sky Sports Premier League</span>
            </div>
            <div class="schedule-item">
              <span class="time">20:00</span><span class="event">Snooker</span>
              <span class="channel">Eurosport</span>
            </div>
            <div class="schedule-item">
              <span class="time">21:00</span><span class="event">NBA: Lakers v Celtics Basketball</span>
              <span class="channel">TNT Sports 2</span>
            </div>
        "#;
        let run = pipeline()
            .process_page(&source(true), html, target(), &crate::observer::TracingObserver::default())
            .unwrap()
            .unwrap();
        assert_eq!(run.probe, 0);
        assert_eq!(run.fragments, 3);
        assert_eq!(run.events.len(), 2);
        assert_eq!(run.events[0].title, "Team A v Team B");
        assert_eq!(run.events[0].sport, "Sport");
        assert_eq!(run.events[1].channel, "TNT Sports");
        assert_eq!(run.events[1].sport, "Basketball");
    }

    #[test]
    fn test_process_page_no_match() {
        let run = pipeline()
            .process_page(&source(true), "<p>No sport today</p>", target(), &crate::observer::TracingObserver::default())
            .unwrap();
        assert_eq!(run, None);
    }
}
