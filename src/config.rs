//! Run configuration: sources, channel allow-list and text rules.
//!
//! Configuration is YAML. A default is compiled in from
//! `config/sources.yaml`; `--config` replaces it wholesale. Everything is
//! validated up front, before any network traffic.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, instrument};
use url::Url;

use crate::clock::is_valid_pattern;
use crate::error::ConfigError;
use crate::models::{DateFormat, ExtractionMode, SourceSpec};
use crate::normalize::DEFAULT_MAX_TITLE_LEN;
use crate::scrapers::extractor::parse_selector;

/// The configuration shipped with the binary.
pub const BUILTIN_CONFIG: &str = include_str!("../config/sources.yaml");

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Ordered allow-list of canonical channel names.
    pub channels: Vec<String>,
    /// Words removed from titles, matched whole-word and case-insensitively.
    #[serde(default = "default_boilerplate")]
    pub boilerplate: Vec<String>,
    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,
    /// Per-fetch timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Sources, processed in this order.
    pub sources: Vec<SourceSpec>,
}

fn default_boilerplate() -> Vec<String> {
    ["watch", "live", "today", "tonight", "stream", "streaming", "online", "free"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_title_len() -> usize {
    DEFAULT_MAX_TITLE_LEN
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Config {
    /// Parse and validate YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(BUILTIN_CONFIG)
    }

    /// Load from `path`, or the built-in configuration when `path` is `None`.
    #[instrument(level = "info", skip_all)]
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("Using built-in configuration");
            return Self::builtin();
        };
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let config = Self::from_yaml(&text)?;
        info!(
            path = %path.display(),
            sources = config.sources.len(),
            channels = config.channels.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Keep only the sources named in `ids`, in configured order. An empty
    /// list keeps everything.
    pub fn retain_sources(&mut self, ids: &[String]) -> Result<(), ConfigError> {
        if ids.is_empty() {
            return Ok(());
        }
        if let Some(unknown) = ids.iter().find(|id| !self.sources.iter().any(|s| &s.id == *id)) {
            return Err(ConfigError::Invalid(format!("unknown source id {unknown:?}")));
        }
        self.sources.retain(|s| ids.contains(&s.id));
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.channels.iter().all(|c| c.trim().is_empty()) {
            return invalid("channel allow-list is empty".to_string());
        }
        if self.channels.iter().any(|c| c.trim().is_empty()) {
            return invalid("channel allow-list contains a blank entry".to_string());
        }
        if self.sources.is_empty() {
            return invalid("no sources configured".to_string());
        }
        if self.max_title_len == 0 {
            return invalid("max_title_len must be positive".to_string());
        }
        if self.timeout_secs == 0 {
            return invalid("timeout_secs must be positive".to_string());
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return invalid(format!("source with url {} has no id", source.url));
            }
            if !seen.insert(source.id.as_str()) {
                return invalid(format!("duplicate source id {:?}", source.id));
            }
            self.validate_source(source)?;
        }
        Ok(())
    }

    fn validate_source(&self, source: &SourceSpec) -> Result<(), ConfigError> {
        let invalid = |msg: String| ConfigError::Invalid(format!("source {:?}: {msg}", source.id));

        Url::parse(&source.url).map_err(|e| invalid(format!("bad url {:?}: {e}", source.url)))?;

        if let DateFormat::Pattern(pattern) = &source.date_format {
            if !is_valid_pattern(pattern) {
                return Err(invalid(format!("bad date_format {pattern:?}")));
            }
        }
        if source.probes.is_empty() {
            return Err(invalid("no probes".to_string()));
        }

        for (index, probe) in source.probes.iter().enumerate() {
            parse_selector(&probe.selector).map_err(|e| invalid(format!("probe {index}: {e}")))?;

            if let ExtractionMode::Fields(fields) = probe.mode() {
                for (name, selector) in fields.iter() {
                    parse_selector(selector)
                        .map_err(|e| invalid(format!("probe {index} field {name}: {e}")))?;
                }
                let mut required = vec![("title", &fields.title), ("channel", &fields.channel)];
                if source.has_time {
                    required.push(("time", &fields.time));
                }
                if let Some((name, _)) = required.iter().find(|(_, sel)| sel.is_none()) {
                    return Err(invalid(format!("probe {index} has no `{name}` selector")));
                }
            }
        }
        Ok(())
    }
}
