//! Run configuration.
//!
//! Passed on the command line as a JSON document. Unknown keys are rejected
//! up front, before any table is processed, so a typo in an option name
//! cannot silently fall back to a default.

use serde::Deserialize;

use crate::error::PipelineError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Draw the 1st..9th and 91st..99th percentiles around the deciles.
    /// When set, charts are built from percentile lines computed straight
    /// off the filtered measure table.
    pub show_outer_percentiles: bool,
    pub charts: ChartsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            show_outer_percentiles: false,
            charts: ChartsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartsConfig {
    /// Whether charts are rendered at all. Filtering still runs when this is
    /// off, so the dropped-row counts stay observable.
    pub output: bool,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self { output: true }
    }
}

impl Config {
    /// Parses a JSON configuration document. Absent keys take their
    /// defaults; unknown keys and mistyped values are errors.
    pub fn from_json(json: &str) -> Result<Config, PipelineError> {
        serde_json::from_str(json).map_err(PipelineError::Config)
    }
}
