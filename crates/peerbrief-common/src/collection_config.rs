//! Collection configuration.
//!
//! A run is described by one `CollectionConfig`, built from a named preset,
//! loaded from a YAML/JSON/TOML file, or both (file first, CLI overrides on top).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PeerBriefError;

/// Complete collection run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Manuscripts to request from each enabled source
    #[serde(default = "default_num_manuscripts")]
    pub num_manuscripts: usize,

    #[serde(default)]
    pub sources: SourceToggles,

    /// Fixed pause between consecutive item fetches, in seconds
    #[serde(default = "default_rate_limit")]
    pub rate_limit_delay_secs: f64,

    #[serde(default)]
    pub filters: CollectionFilters,

    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub validation: ValidationSettings,

    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default)]
    pub verbose: bool,
}

fn default_num_manuscripts() -> usize { 50 }
fn default_rate_limit() -> f64 { 2.0 }

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            num_manuscripts: default_num_manuscripts(),
            sources: SourceToggles::default(),
            rate_limit_delay_secs: default_rate_limit(),
            filters: CollectionFilters::default(),
            output: OutputSettings::default(),
            validation: ValidationSettings::default(),
            http: HttpSettings::default(),
            verbose: false,
        }
    }
}

// ── Presets ───────────────────────────────────────────────────────────────────

/// Named starting points for a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    #[default]
    Default,
    QuickTest,
    Comprehensive,
    ElifeOnly,
    F1000Only,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Default,
        Preset::QuickTest,
        Preset::Comprehensive,
        Preset::ElifeOnly,
        Preset::F1000Only,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::QuickTest => "quick_test",
            Preset::Comprehensive => "comprehensive",
            Preset::ElifeOnly => "elife_only",
            Preset::F1000Only => "f1000_only",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = PeerBriefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                PeerBriefError::Config(format!(
                    "unknown preset '{}' (expected one of: {})",
                    s,
                    Preset::ALL.map(|p| p.as_str()).join(", ")
                ))
            })
    }
}

// ── Sources ───────────────────────────────────────────────────────────────────

/// Which platforms to collect from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceToggles {
    #[serde(default = "default_true")]
    pub elife: bool,

    #[serde(default = "default_true")]
    pub f1000: bool,
}

fn default_true() -> bool { true }

impl Default for SourceToggles {
    fn default() -> Self {
        Self { elife: true, f1000: true }
    }
}

// ── Filters ───────────────────────────────────────────────────────────────────

/// Optional narrowing of discovery. Recorded on every run's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionFilters {
    #[serde(default)]
    pub subject_areas: Vec<String>,

    /// ISO date (YYYY-MM-DD)
    #[serde(default)]
    pub start_date: Option<String>,
}

// ── Output ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// One JSON file per manuscript under `manuscripts/`
    #[serde(default = "default_true")]
    pub save_individual_files: bool,

    /// `all_manuscripts.json`
    #[serde(default = "default_true")]
    pub save_combined_file: bool,

    /// `summary_statistics.json`
    #[serde(default = "default_true")]
    pub save_summary_stats: bool,
}

fn default_output_dir() -> String { "./collected_data".to_string() }

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            save_individual_files: true,
            save_combined_file: true,
            save_summary_stats: true,
        }
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSettings {
    #[serde(default = "default_min_reviews")]
    pub min_reviews_per_manuscript: usize,

    #[serde(default = "default_true")]
    pub skip_manuscripts_without_reviews: bool,
}

fn default_min_reviews() -> usize { 1 }

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            min_reviews_per_manuscript: default_min_reviews(),
            skip_manuscripts_without_reviews: true,
        }
    }
}

// ── HTTP ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Attempts per page, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

// ── Helper Methods ─────────────────────────────────────────────────────────────

impl CollectionConfig {
    /// Build the configuration for a named preset.
    pub fn preset(preset: Preset) -> Self {
        let base = Self::default();
        match preset {
            Preset::Default => base,
            Preset::QuickTest => Self {
                num_manuscripts: 5,
                rate_limit_delay_secs: 1.0,
                ..base
            },
            Preset::Comprehensive => Self {
                num_manuscripts: 100,
                ..base
            },
            Preset::ElifeOnly => Self {
                sources: SourceToggles { elife: true, f1000: false },
                ..base
            },
            Preset::F1000Only => Self {
                sources: SourceToggles { elife: false, f1000: true },
                ..base
            },
        }
    }

    /// Load from YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load from JSON file
    pub fn from_json(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load from TOML file
    pub fn from_toml(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load a config file, picking the format from its extension.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "yaml" | "yml" => Self::from_yaml(path),
            "json" => Self::from_json(path),
            "toml" => Self::from_toml(path),
            other => Err(PeerBriefError::Config(format!(
                "unsupported config format '{}' for {}",
                other,
                path.display()
            ))
            .into()),
        }
    }

    /// Source tags of the enabled platforms, in collection order.
    pub fn enabled_sources(&self) -> Vec<&'static str> {
        let mut sources = Vec::new();
        if self.sources.elife { sources.push("elife"); }
        if self.sources.f1000 { sources.push("f1000research"); }
        sources
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_delay_secs.max(0.0))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    /// Reject configurations that cannot produce a run.
    pub fn validate(&self) -> Result<(), PeerBriefError> {
        if self.enabled_sources().is_empty() {
            return Err(PeerBriefError::Config("no sources enabled".to_string()));
        }
        if !self.rate_limit_delay_secs.is_finite() || self.rate_limit_delay_secs < 0.0 {
            return Err(PeerBriefError::Config(format!(
                "rate_limit_delay_secs must be a non-negative number, got {}",
                self.rate_limit_delay_secs
            )));
        }
        if self.http.max_retries == 0 {
            return Err(PeerBriefError::Config("http.max_retries must be at least 1".to_string()));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
