//! Multi-source aggregation.
//!
//! The [`Aggregator`] walks the configured sources in order, one at a time:
//! fetch, then run the page through the [`Pipeline`]. A source that cannot be
//! fetched or read is reported and skipped; it never stops the others. The
//! surviving events are concatenated in source order, then fragment order,
//! with no sorting or deduplication.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use tracing::{info, instrument};

use crate::clock::Clock;
use crate::error::SourceError;
use crate::models::{Event, EventBatch, SourceOutcome, SourceReport, SourceSpec};
use crate::observer::PipelineObserver;
use crate::pipeline::Pipeline;
use crate::scrapers::connector::Fetch;

/// Everything a run produced: the events and a diagnostic record per source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub date: NaiveDate,
    pub batch: EventBatch,
    pub reports: Vec<SourceReport>,
}

impl RunOutcome {
    pub fn failed(&self) -> impl Iterator<Item = &SourceReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, SourceOutcome::Failed { .. }))
    }
}

pub struct Aggregator<'a, F> {
    fetcher: F,
    pipeline: &'a Pipeline,
    clock: &'a dyn Clock,
    observer: &'a dyn PipelineObserver,
}

impl<'a, F> Aggregator<'a, F>
where
    F: Fetch,
{
    pub fn new(
        fetcher: F,
        pipeline: &'a Pipeline,
        clock: &'a dyn Clock,
        observer: &'a dyn PipelineObserver,
    ) -> Self {
        Self {
            fetcher,
            pipeline,
            clock,
            observer,
        }
    }

    /// Process every source in order and collect the results. Never fails:
    /// the worst case is an empty batch with every source reported as failed.
    #[instrument(level = "info", skip_all, fields(sources = sources.len()))]
    pub async fn run(&self, sources: &[SourceSpec]) -> RunOutcome {
        let date = self.clock.today();
        info!(%date, "Collecting events");

        let results: Vec<(Vec<Event>, SourceReport)> = stream::iter(sources)
            .then(|source| self.run_source(source, date))
            .collect()
            .await;

        let mut batch = EventBatch::new();
        let mut reports = Vec::with_capacity(results.len());
        for (events, report) in results {
            batch.append(events);
            reports.push(report);
        }

        let outcome = RunOutcome {
            date,
            batch,
            reports,
        };
        info!(
            events = outcome.batch.len(),
            failed = %outcome.failed().map(|r| r.source.as_str()).join(", "),
            "Collection finished"
        );
        outcome
    }

    async fn run_source(&self, source: &SourceSpec, date: NaiveDate) -> (Vec<Event>, SourceReport) {
        self.observer.source_started(source);

        let result = match self.fetcher.fetch(source).await {
            Ok(html) => self
                .pipeline
                .process_page(source, &html, date, self.observer)
                .map(|run| (run, html)),
            Err(e) => Err(SourceError::from(e)),
        };

        let (events, outcome) = match result {
            Ok((Some(run), html)) => {
                self.observer.source_completed(source, &run.events, &html);
                let outcome = SourceOutcome::Ok {
                    probe: run.probe,
                    fragments: run.fragments,
                    events: run.events.len(),
                };
                (run.events, outcome)
            }
            Ok((None, html)) => {
                self.observer.no_match(source, &html);
                (Vec::new(), SourceOutcome::NoMatch)
            }
            Err(e) => {
                self.observer.source_failed(source, &e);
                (
                    Vec::new(),
                    SourceOutcome::Failed {
                        error: e.to_string(),
                    },
                )
            }
        };

        let report = SourceReport {
            source: source.id.clone(),
            outcome,
        };
        (events, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::{FetchError, FieldError};
    use crate::models::{FieldSelectors, Probe};
    use crate::normalize::TBD;
    use reqwest::StatusCode;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned pages by source id; unknown ids fail like a 503.
    struct CannedFetcher {
        pages: HashMap<String, String>,
    }

    impl CannedFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(id, html)| (id.to_string(), html.to_string()))
                    .collect(),
            }
        }
    }

    impl Fetch for CannedFetcher {
        async fn fetch(&self, source: &SourceSpec) -> Result<String, FetchError> {
            self.pages
                .get(&source.id)
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: source.url.clone(),
                    status: StatusCode::SERVICE_UNAVAILABLE,
                })
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        log: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn push(&self, line: String) {
            self.log.lock().unwrap().push(line);
        }

        fn lines(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl PipelineObserver for RecordingObserver {
        fn source_started(&self, source: &SourceSpec) {
            self.push(format!("start {}", source.id));
        }
        fn probe_adopted(&self, source: &SourceSpec, probe: usize, fragments: usize) {
            self.push(format!("probe {} {} {}", source.id, probe, fragments));
        }
        fn no_match(&self, source: &SourceSpec, _page: &str) {
            self.push(format!("no_match {}", source.id));
        }
        fn fragment_dropped(&self, source: &SourceSpec, index: usize, reason: &FieldError) {
            self.push(format!("drop {} {} {}", source.id, index, reason));
        }
        fn source_failed(&self, source: &SourceSpec, _error: &SourceError) {
            self.push(format!("failed {}", source.id));
        }
        fn source_completed(&self, source: &SourceSpec, events: &[Event], _page: &str) {
            self.push(format!("done {} {}", source.id, events.len()));
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(
            &strings(&["Sky Sports", "TNT Sports"]),
            &strings(&["watch", "live", "today"]),
            150,
        )
        .unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 14).unwrap()
    }

    fn row_source(id: &str) -> SourceSpec {
        SourceSpec {
            id: id.to_string(),
            url: format!("https://{id}.example/"),
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
                    selector: "ul.listings li".to_string(),
                    fields: None,
                },
            ],
            date_format: Default::default(),
            has_time: true,
        }
    }

    const ROWS: &str = r#"
        <div class="schedule-item">
          <span class="date">Friday 14 November 2025</span><span class="time">12:30</span>
          <span class="event">Arsenal v Spurs</span><span class="channel">TNT Sports 1</span>
          <span class="sport">Football</span>
        </div>
        <div class="schedule-item">
          <span class="date">Friday 14 November 2025</span><span class="time">15:00</span>
          <span class="event">Watch England v Wales LIVE</span><span class="channel">Sky Sports Main Event</span>
        </div>
        <div class="schedule-item">
          <span class="date">Saturday 15 November 2025</span><span class="time">15:00</span>
          <span class="event">Tomorrow's match</span><span class="channel">Sky Sports</span>
        </div>
        <div class="schedule-item">
          <span class="time">20:00</span><span class="event">Evening Round-up</span>
          <span class="channel">Sky Sports News</span>
        </div>
    "#;

    const LINES: &str = r#"
        <ul class="listings">
          <li>19:30 Team A v Team B Sky Sports Football</li>
          <li>21:00 Late Movie Film4</li>
        </ul>
    "#;

    async fn run(fetcher: CannedFetcher, sources: &[SourceSpec], observer: &RecordingObserver) -> RunOutcome {
        let pipeline = pipeline();
        let clock = FixedClock(today());
        Aggregator::new(fetcher, &pipeline, &clock, observer).run(sources).await
    }

    #[tokio::test]
    async fn test_events_keep_source_then_fragment_order() {
        let fetcher = CannedFetcher::new(&[("rows", ROWS), ("lines", LINES)]);
        let sources = vec![row_source("rows"), row_source("lines")];
        let observer = RecordingObserver::default();
        let outcome = run(fetcher, &sources, &observer).await;

        let titles: Vec<&str> = outcome.batch.events().iter().map(|e| e.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Arsenal v Spurs", "England v Wales", "Evening Round-up", "Team A v Team B"]
        );
        assert_eq!(outcome.date, today());
        assert_eq!(
            outcome.reports,
            vec![
                SourceReport {
                    source: "rows".to_string(),
                    outcome: SourceOutcome::Ok { probe: 0, fragments: 4, events: 3 },
                },
                SourceReport {
                    source: "lines".to_string(),
                    outcome: SourceOutcome::Ok { probe: 1, fragments: 2, events: 1 },
                },
            ]
        );
        assert!(observer.lines().contains(&"probe lines 1 2".to_string()));
    }

    #[tokio::test]
    async fn test_every_event_satisfies_output_invariants() {
        let fetcher = CannedFetcher::new(&[("rows", ROWS), ("lines", LINES)]);
        let sources = vec![row_source("rows"), row_source("lines")];
        let outcome = run(fetcher, &sources, &RecordingObserver::default()).await;

        let allow = ["Sky Sports", "TNT Sports"];
        let time_re = regex::Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").unwrap();
        let boilerplate = regex::Regex::new(r"(?i)\b(watch|live|today)\b").unwrap();
        for event in outcome.batch.events() {
            assert!(allow.contains(&event.channel.as_str()), "{event:?}");
            assert!(event.time == TBD || time_re.is_match(&event.time), "{event:?}");
            assert!(!event.title.is_empty() && event.title.chars().count() <= 150);
            assert!(!boilerplate.is_match(&event.title), "{event:?}");
            let lower = event.title.to_lowercase();
            assert!(allow.iter().all(|c| !lower.contains(&c.to_lowercase())), "{event:?}");
            assert_eq!(event.date, today());
        }
    }

    #[tokio::test]
    async fn test_failed_source_is_skipped() {
        let three = r#"
            <div class="schedule-item"><span class="time">12:00</span><span class="event">One</span><span class="channel">Sky Sports</span></div>
            <div class="schedule-item"><span class="time">13:00</span><span class="event">Two</span><span class="channel">Sky Sports</span></div>
            <div class="schedule-item"><span class="time">14:00</span><span class="event">Three</span><span class="channel">TNT Sports</span></div>
        "#;
        let sources = vec![row_source("up"), row_source("down")];
        let observer = RecordingObserver::default();
        let outcome = run(CannedFetcher::new(&[("up", three)]), &sources, &observer).await;

        let titles: Vec<&str> = outcome.batch.events().iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two", "Three"]);
        assert_eq!(outcome.failed().count(), 1);
        assert!(matches!(
            &outcome.reports[1].outcome,
            SourceOutcome::Failed { error } if error.contains("503")
        ));
        assert_eq!(
            observer.lines(),
            vec!["start up", "probe up 0 3", "done up 3", "start down", "failed down"]
        );
    }

    #[tokio::test]
    async fn test_partial_failure_equals_concatenation_of_survivors() {
        let all = vec![row_source("rows"), row_source("gone"), row_source("lines")];
        let survivors = vec![row_source("rows"), row_source("lines")];
        let pages = [("rows", ROWS), ("lines", LINES)];

        let with_failure = run(CannedFetcher::new(&pages), &all, &RecordingObserver::default()).await;
        let without = run(CannedFetcher::new(&pages), &survivors, &RecordingObserver::default()).await;
        assert_eq!(with_failure.batch, without.batch);
    }

    #[tokio::test]
    async fn test_no_match_is_distinct_from_failure() {
        let sources = vec![row_source("quiet")];
        let observer = RecordingObserver::default();
        let outcome = run(
            CannedFetcher::new(&[("quiet", "<p>No televised sport today</p>")]),
            &sources,
            &observer,
        )
        .await;
        assert!(outcome.batch.is_empty());
        assert_eq!(outcome.reports[0].outcome, SourceOutcome::NoMatch);
        assert_eq!(outcome.failed().count(), 0);
        assert_eq!(observer.lines(), vec!["start quiet", "no_match quiet"]);
    }

    #[tokio::test]
    async fn test_identical_input_gives_identical_output() {
        let sources = vec![row_source("rows"), row_source("lines")];
        let pages = [("rows", ROWS), ("lines", LINES)];
        let first = run(CannedFetcher::new(&pages), &sources, &RecordingObserver::default()).await;
        let second = run(CannedFetcher::new(&pages), &sources, &RecordingObserver::default()).await;
        assert_eq!(
            serde_json::to_string(&first.batch).unwrap(),
            serde_json::to_string(&second.batch).unwrap()
        );
    }

    #[tokio::test]
    async fn test_invalid_selector_fails_only_that_source() {
        let mut broken = row_source("broken");
        broken.probes[0].selector = "div[[".to_string();
        let sources = vec![broken, row_source("lines")];
        let outcome = run(
            CannedFetcher::new(&[("broken", ROWS), ("lines", LINES)]),
            &sources,
            &RecordingObserver::default(),
        )
        .await;
        assert_eq!(outcome.batch.len(), 1);
        assert!(matches!(outcome.reports[0].outcome, SourceOutcome::Failed { .. }));
    }
}
