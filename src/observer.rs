//! Diagnostics sink for the extraction pipeline.
//!
//! The pipeline never prints. It reports what happened to an injected
//! [`PipelineObserver`]; [`TracingObserver`] is the production sink.

use std::path::PathBuf;
use std::sync::Mutex;

use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{FieldError, SourceError};
use crate::models::{Event, SourceSpec};
use crate::utils::truncate_for_log;

/// Receives pipeline progress. Every method defaults to a no-op.
pub trait PipelineObserver {
    fn source_started(&self, _source: &SourceSpec) {}

    /// Probe `probe` matched `fragments` elements and was adopted for the page.
    fn probe_adopted(&self, _source: &SourceSpec, _probe: usize, _fragments: usize) {}

    /// The page was fetched but none of the source's probes matched.
    fn no_match(&self, _source: &SourceSpec, _page: &str) {}

    /// Fragment number `index` failed validation and was dropped.
    fn fragment_dropped(&self, _source: &SourceSpec, _index: usize, _reason: &FieldError) {}

    fn source_failed(&self, _source: &SourceSpec, _error: &SourceError) {}

    fn source_completed(&self, _source: &SourceSpec, _events: &[Event], _page: &str) {}
}

/// Forwards pipeline progress to `tracing`, and optionally saves the raw page
/// of any source that produced no events so selectors can be fixed offline.
///
/// Pages are written by background tasks; call [`TracingObserver::flush`]
/// before exiting.
#[derive(Debug, Default)]
pub struct TracingObserver {
    debug_dir: Option<PathBuf>,
    dumps: Mutex<Vec<JoinHandle<()>>>,
}

impl TracingObserver {
    pub fn new(debug_dir: Option<PathBuf>) -> Self {
        Self {
            debug_dir,
            dumps: Mutex::new(Vec::new()),
        }
    }

    fn dump_page(&self, source: &SourceSpec, page: &str) {
        let Some(dir) = self.debug_dir.clone() else {
            return;
        };
        let path = dir.join(format!("{}_debug.html", source.id));
        let id = source.id.clone();
        let page = page.to_string();

        let handle = tokio::spawn(async move {
            let written = match fs::create_dir_all(&dir).await {
                Ok(()) => fs::write(&path, page).await,
                Err(e) => Err(e),
            };
            match written {
                Ok(()) => info!(source = %id, path = %path.display(), "Saved debug page"),
                Err(e) => warn!(source = %id, path = %path.display(), error = %e, "Could not save debug page"),
            }
        });
        if let Ok(mut dumps) = self.dumps.lock() {
            dumps.push(handle);
        }
    }

    /// Wait for every debug page queued so far to be written.
    pub async fn flush(&self) {
        let pending = match self.dumps.lock() {
            Ok(mut dumps) => std::mem::take(&mut *dumps),
            Err(_) => return,
        };
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "Debug page writer stopped early");
            }
        }
    }
}

impl PipelineObserver for TracingObserver {
    fn source_started(&self, source: &SourceSpec) {
        info!(source = %source.id, url = %source.url, "Processing source");
    }

    fn probe_adopted(&self, source: &SourceSpec, probe: usize, fragments: usize) {
        info!(
            source = %source.id,
            probe,
            selector = %source.probes[probe].selector,
            fragments,
            "Probe matched"
        );
    }

    fn no_match(&self, source: &SourceSpec, page: &str) {
        warn!(
            source = %source.id,
            probes = source.probes.len(),
            bytes = page.len(),
            "No probe matched; page is empty today or its layout changed"
        );
        self.dump_page(source, page);
    }

    fn fragment_dropped(&self, source: &SourceSpec, index: usize, reason: &FieldError) {
        debug!(
            source = %source.id,
            fragment = index,
            reason = %truncate_for_log(&reason.to_string(), 200),
            "Dropped fragment"
        );
    }

    fn source_failed(&self, source: &SourceSpec, error: &SourceError) {
        error!(source = %source.id, error = %error, "Source failed; continuing with the rest");
    }

    fn source_completed(&self, source: &SourceSpec, events: &[Event], page: &str) {
        info!(source = %source.id, events = events.len(), "Source completed");
        if events.is_empty() {
            self.dump_page(source, page);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceSpec {
        SourceSpec {
            id: "dumped".to_string(),
            url: "https://example.com".to_string(),
            probes: vec![],
            date_format: Default::default(),
            has_time: true,
        }
    }

    #[tokio::test]
    async fn test_no_match_writes_debug_page() {
        let dir = std::env::temp_dir().join(format!("uk_tv_sport_observer_{}", std::process::id()));
        let observer = TracingObserver::new(Some(dir.clone()));
        observer.no_match(&source(), "<html>nothing today</html>");
        observer.flush().await;

        let saved = std::fs::read_to_string(dir.join("dumped_debug.html")).unwrap();
        assert_eq!(saved, "<html>nothing today</html>");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_without_debug_dir_nothing_is_written() {
        let observer = TracingObserver::default();
        observer.source_completed(&source(), &[], "<html></html>");
        assert!(observer.debug_dir.is_none());
        assert!(observer.dumps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_completed_source_is_dumped_and_flushed() {
        let dir = std::env::temp_dir().join(format!("uk_tv_sport_observer_empty_{}", std::process::id()));
        let observer = TracingObserver::new(Some(dir.clone()));
        observer.source_completed(&source(), &[], "<ul></ul>");
        observer.flush().await;

        assert!(observer.dumps.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_to_string(dir.join("dumped_debug.html")).unwrap(), "<ul></ul>");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
