//! Fetching and reading schedule pages.
//!
//! Every source goes through the same two steps:
//!
//! 1. **Fetching** ([`connector`]): download the page for a [`SourceSpec`](crate::models::SourceSpec)
//! 2. **Extracting** ([`extractor`]): run the source's probe list over the page
//!    and pull raw field text out of each matched fragment
//!
//! Nothing in here knows about individual websites. Site knowledge (URL,
//! selectors, date format) lives in configuration, so a layout change on a
//! site is fixed by adding a probe rather than by writing a new scraper.

pub mod connector;
pub mod extractor;
