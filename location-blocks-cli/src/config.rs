//! Replay configuration loading and parsing

use anyhow::{Context, Result};
use location_blocks::{FilterPolicy, LOCATION_AGE_FILTER_NONE, UPDATE_ACCURACY_FILTER_NONE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Replay configuration (loaded from a TOML file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Filter thresholds; an omitted value disables that filter
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FiltersConfig {
    pub accuracy_m: Option<f64>,
    pub max_age_s: Option<f64>,
}

impl FiltersConfig {
    pub fn to_policy(&self) -> FilterPolicy {
        FilterPolicy::new()
            .with_accuracy_filter(self.accuracy_m.unwrap_or(UPDATE_ACCURACY_FILTER_NONE))
            .with_age_filter(self.max_age_s.unwrap_or(LOCATION_AGE_FILTER_NONE))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReplayConfig {
    /// Ask to stop tracking after this many delivered fixes
    pub stop_after: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .filters
        .to_policy()
        .validate()
        .with_context(|| format!("Invalid filters in config file: {:?}", path))?;

    Ok(config)
}
