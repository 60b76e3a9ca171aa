//! # UK TV Sport
//!
//! Collects "what sport is on UK television today" from several independent
//! schedule websites and writes one normalized JSON list of events.
//!
//! ## Usage
//!
//! ```sh
//! uk_tv_sport -o ./tv_sport_today.json
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture, run once per source in
//! configured order:
//! 1. **Fetching**: Download the source's page (bounded by a timeout)
//! 2. **Extracting**: Find event fragments with the first matching probe
//! 3. **Normalizing**: Canonical time, title and channel; drop bad fragments
//! 4. **Filtering**: Keep allow-listed channels on the target date
//! 5. **Classifying**: Fill in the sport where the source gives none
//!
//! A source that fails is reported and skipped. The output file is always
//! written, possibly empty.

use std::error::Error;
use std::time::Duration;

use clap::Parser;
use itertools::Itertools;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregator;
mod classify;
mod cli;
mod clock;
mod config;
mod error;
mod filter;
mod models;
mod normalize;
mod observer;
mod outputs;
mod pipeline;
mod scrapers;
mod utils;

use aggregator::Aggregator;
use cli::Cli;
use clock::{Clock, FixedClock, SystemClock};
use config::Config;
use models::RunReport;
use observer::TracingObserver;
use outputs::json;
use pipeline::Pipeline;
use scrapers::connector::{HttpFetcher, RetryFetch};
use utils::ensure_writable_parent;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("uk_tv_sport starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Configuration (the only fatal stage) ----
    let mut config = Config::load(args.config.as_deref()).await.inspect_err(|e| {
        error!(error = %e, "Configuration rejected");
    })?;
    config.retain_sources(&args.only)?;
    if let Some(secs) = args.timeout_secs.filter(|s| *s > 0) {
        config.timeout_secs = secs;
    }
    let pipeline = Pipeline::from_config(&config)?;
    info!(
        sources = config.sources.len(),
        channels = %pipeline.channels().names().join(", "),
        "Configuration ready"
    );

    // Fail before scraping if the output cannot be written
    if let Err(e) = ensure_writable_parent(&args.output).await {
        error!(path = %args.output.display(), error = %e, "Output location is not writable");
        return Err(e);
    }

    // ---- Collect ----
    let clock: Box<dyn Clock> = match args.date {
        Some(date) => Box::new(FixedClock(date)),
        None => Box::new(SystemClock),
    };
    let fetcher = HttpFetcher::new(&config.user_agent, Duration::from_secs(config.timeout_secs))?;
    let fetcher = RetryFetch::new(fetcher, args.retries, Duration::from_secs(1));
    let observer = TracingObserver::new(args.debug_dir.clone());

    let outcome = Aggregator::new(fetcher, &pipeline, clock.as_ref(), &observer)
        .run(&config.sources)
        .await;
    observer.flush().await;

    for report in outcome.failed() {
        warn!(source = %report.source, "Source contributed nothing because it failed");
    }
    if outcome.batch.is_empty() {
        warn!("No events found for the target date");
    } else {
        let per_channel = outcome
            .batch
            .events()
            .iter()
            .counts_by(|e| e.channel.as_str())
            .into_iter()
            .sorted()
            .map(|(channel, n)| format!("{channel}={n}"))
            .join(" ");
        info!(%per_channel, "Events per channel");
    }

    // ---- Output ----
    json::write_events(&outcome.batch, &args.output).await?;

    if let Some(report_path) = &args.report {
        let report = RunReport {
            date: outcome.date,
            total_events: outcome.batch.len(),
            sources: &outcome.reports,
        };
        if let Err(e) = json::write_report(&report, report_path).await {
            error!(path = %report_path.display(), error = %e, "Failed to write run report");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        date = %outcome.date,
        events = outcome.batch.len(),
        failed_sources = outcome.failed().count(),
        path = %args.output.display(),
        "Execution complete"
    );

    Ok(())
}
