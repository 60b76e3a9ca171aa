//! JSON output for the event list and the run report.
//!
//! The event file is an array of objects with exactly the keys `date`,
//! `sport`, `title`, `time` and `channel`, in that order. It is written even
//! when no events were found, so consumers can tell "nothing on today" from
//! "the job did not run".

use std::error::Error;
use std::path::Path;

use serde::Serialize;
use tokio::fs;
use tracing::{error, info, instrument};

use crate::models::{EventBatch, RunReport};

/// Write `batch` to `path` as pretty-printed JSON.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_events(batch: &EventBatch, path: &Path) -> Result<(), Box<dyn Error>> {
    write_pretty(batch, path).await?;
    info!(events = batch.len(), "Wrote events JSON");
    Ok(())
}

/// Write the per-source run report to `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_report(report: &RunReport<'_>, path: &Path) -> Result<(), Box<dyn Error>> {
    write_pretty(report, path).await?;
    info!(sources = report.sources.len(), "Wrote run report");
    Ok(())
}

async fn write_pretty<T: Serialize>(value: &T, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }
    fs::write(path, json).await?;
    Ok(())
}
