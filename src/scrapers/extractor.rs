//! Record extraction from fetched schedule pages.
//!
//! A source lists one or more [`Probe`]s, each describing a markup layout the
//! site has been seen to use. Probes are tried in order and the first one
//! whose selector matches at least one element is adopted for the whole page;
//! fragments from different probes are never mixed.
//!
//! Each matched element becomes a [`RawFragment`], read either through
//! per-field sub-selectors or, for probes without `fields`, as one combined
//! text blob.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use crate::error::SourceError;
use crate::models::{ExtractionMode, FieldSelectors, Probe, RawFields};
use crate::utils::normalize_ws;

/// Result of running a probe list against one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Index of the adopted probe in the source's probe list.
    pub probe: usize,
    /// Raw fields of every matched fragment, in document order.
    pub fragments: Vec<RawFields>,
}

/// One candidate event's subtree, valid while the parsed page is alive.
#[derive(Debug, Clone, Copy)]
pub struct RawFragment<'a> {
    element: ElementRef<'a>,
}

impl<'a> RawFragment<'a> {
    /// Whitespace-normalized text of the whole fragment.
    pub fn text(&self) -> String {
        element_text(self.element)
    }

    /// Text of the first descendant matching `selector`, if non-empty.
    fn field(&self, selector: Option<&Selector>) -> Option<String> {
        let selector = selector?;
        self.element
            .select(selector)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty())
    }
}

/// Sub-selectors compiled once per adopted probe.
struct CompiledFields {
    date: Option<Selector>,
    time: Option<Selector>,
    title: Option<Selector>,
    channel: Option<Selector>,
    sport: Option<Selector>,
}

impl CompiledFields {
    fn compile(fields: &FieldSelectors) -> Result<Self, SourceError> {
        let one = |sel: &Option<String>| sel.as_deref().map(parse_selector).transpose();
        Ok(Self {
            date: one(&fields.date)?,
            time: one(&fields.time)?,
            title: one(&fields.title)?,
            channel: one(&fields.channel)?,
            sport: one(&fields.sport)?,
        })
    }

    fn read(&self, fragment: &RawFragment<'_>) -> RawFields {
        RawFields {
            date: fragment.field(self.date.as_ref()),
            time: fragment.field(self.time.as_ref()),
            title: fragment.field(self.title.as_ref()),
            channel: fragment.field(self.channel.as_ref()),
            sport: fragment.field(self.sport.as_ref()),
            blob: None,
        }
    }
}

pub fn parse_selector(selector: &str) -> Result<Selector, SourceError> {
    Selector::parse(selector).map_err(|e| SourceError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    normalize_ws(&element.text().collect::<Vec<_>>().join(" "))
}

/// Find the candidate fragments of a parsed page.
///
/// Returns the index of the first probe with one or more matches and its
/// fragments, or `None` when no probe matches anything.
pub fn locate_fragments<'a>(
    document: &'a Html,
    probes: &[Probe],
) -> Result<Option<(usize, Vec<RawFragment<'a>>)>, SourceError> {
    for (index, probe) in probes.iter().enumerate() {
        let selector = parse_selector(&probe.selector)?;
        let fragments: Vec<RawFragment<'a>> = document
            .select(&selector)
            .map(|element| RawFragment { element })
            .collect();
        if fragments.is_empty() {
            debug!(probe = index, selector = %probe.selector, "Probe matched nothing");
            continue;
        }
        return Ok(Some((index, fragments)));
    }
    Ok(None)
}

/// Parse `html` and extract raw fields for every fragment of the adopted probe.
///
/// `Ok(None)` means the page parsed but no probe matched (an empty listing or
/// a layout change; only the logs can tell which).
#[instrument(level = "debug", skip_all, fields(bytes = html.len(), probes = probes.len()))]
pub fn extract(html: &str, probes: &[Probe]) -> Result<Option<Extraction>, SourceError> {
    let document = Html::parse_document(html);
    let Some((index, fragments)) = locate_fragments(&document, probes)? else {
        return Ok(None);
    };

    let raw = match probes[index].mode() {
        ExtractionMode::Fields(fields) => {
            let compiled = CompiledFields::compile(fields)?;
            fragments.iter().map(|f| compiled.read(f)).collect()
        }
        ExtractionMode::Blob => fragments
            .iter()
            .map(|f| RawFields {
                blob: Some(f.text()).filter(|t| !t.is_empty()),
                ..Default::default()
            })
            .collect(),
    };

    debug!(probe = index, fragments = fragments.len(), "Probe adopted");
    Ok(Some(Extraction {
        probe: index,
        fragments: raw,
    }))
}
