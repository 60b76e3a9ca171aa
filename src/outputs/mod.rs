//! Output generation.
//!
//! # Submodules
//!
//! - [`json`]: Writes the event list (and optionally a run report) as JSON
//!
//! # Output Structure
//!
//! ```text
//! tv_sport_today.json   # [{"date", "sport", "title", "time", "channel"}, ...]
//! report.json           # optional, per-source outcome of the run
//! ```

pub mod json;
