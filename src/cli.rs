//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Paths can also be provided via environment variables.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

/// Collect today's televised UK sport into one JSON file.
///
/// # Examples
///
/// ```sh
/// # Built-in sources, write ./tv_sport_today.json
/// uk_tv_sport
///
/// # Custom sources and a report of what each source did
/// uk_tv_sport --config sources.yaml -o out/today.json --report out/report.json
///
/// # Re-run one source against a specific day, saving pages that yield nothing
/// uk_tv_sport --only wheresthematch --date 2025-11-14 --debug-dir debug/
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML configuration file (defaults to the built-in sources)
    #[arg(short, long, env = "UK_TV_SPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Where to write the events JSON
    #[arg(short, long, default_value = "tv_sport_today.json")]
    pub output: PathBuf,

    /// Optional path for a per-source run report
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Treat this day (YYYY-MM-DD) as today
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Per-fetch timeout in seconds (overrides the configuration)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Retries per source for transient fetch failures
    #[arg(long, default_value_t = 0)]
    pub retries: usize,

    /// Save the raw page of any source that yields no events here
    #[arg(long, env = "UK_TV_SPORT_DEBUG_DIR")]
    pub debug_dir: Option<PathBuf>,

    /// Only process these source ids (repeatable)
    #[arg(long = "only", value_name = "SOURCE_ID")]
    pub only: Vec<String>,
}
