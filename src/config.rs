//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section and field has a default, so a missing key never fails
//! startup; a missing file does.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::ranking::HighlightRule;
use crate::types::Racecourse;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: GeneralConfig,
    pub display: DisplayConfig,
    pub betting: BettingConfig,
    pub data: DataConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeneralConfig {
    pub name: String,
    pub currency: String,
    /// Race opened at startup, on today's date.
    pub startup_course: Racecourse,
    pub startup_race: u8,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: "KEIBA".to_string(),
            currency: "JPY".to_string(),
            startup_course: Racecourse::Tokyo,
            startup_race: 11,
        }
    }
}

/// Runner table flags and combination list truncation.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub highlight_enabled: bool,
    /// Composite ranks flagged as `highlighted`.
    pub highlight_top: usize,
    pub emphasize_enabled: bool,
    /// Composite ranks flagged as `emphasized`.
    pub emphasize_top: usize,
    /// Maximum combination lines returned for display. Allocation always
    /// covers the full set.
    pub combination_cap: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            highlight_enabled: true,
            highlight_top: 3,
            emphasize_enabled: true,
            emphasize_top: 6,
            combination_cap: 50,
        }
    }
}

impl DisplayConfig {
    pub fn highlight_rule(&self) -> HighlightRule {
        HighlightRule {
            highlight_top: self.highlight_enabled.then_some(self.highlight_top),
            emphasize_top: self.emphasize_enabled.then_some(self.emphasize_top),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BettingConfig {
    /// Runners taken from the top of the composite ranking when the
    /// explicit selection is too small for the bet type.
    pub fallback_pool_size: usize,
    /// Smallest accepted budget, in whole currency units.
    pub min_budget: u64,
    pub default_budget: u64,
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            fallback_pool_size: 6,
            min_budget: 100,
            default_budget: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RosterKind {
    #[default]
    Sample,
    File,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    pub source: RosterKind,
    /// Roster file, or directory of per-race files, for `source = "file"`.
    pub roster_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: RosterKind::Sample,
            roster_path: PathBuf::from("rosters"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }
}
