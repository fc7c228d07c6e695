//! Command-line configuration for the `peerbrief` binary.
//! `collect` starts from a preset or a config file and applies flag overrides
//! on top; `prepare` resolves which run directory to read.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, ValueEnum};
use peerbrief_common::{CollectionConfig, Preset, SourceToggles};
use peerbrief_ingestion::output::latest_run;

pub const DEFAULT_COLLECTION_DIR: &str = "./collected_data";
pub const DEFAULT_PREPARED_DIR: &str = "./pipeline/input";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PresetArg {
    #[value(name = "default")]
    Default,
    #[value(name = "quick_test")]
    QuickTest,
    #[value(name = "comprehensive")]
    Comprehensive,
    #[value(name = "elife_only")]
    ElifeOnly,
    #[value(name = "f1000_only")]
    F1000Only,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Default => Preset::Default,
            PresetArg::QuickTest => Preset::QuickTest,
            PresetArg::Comprehensive => Preset::Comprehensive,
            PresetArg::ElifeOnly => Preset::ElifeOnly,
            PresetArg::F1000Only => Preset::F1000Only,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Elife,
    F1000,
}

// ── collect ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct CollectArgs {
    /// Named preset; ignored when --config-file is given
    #[arg(long = "config", value_enum, default_value = "default")]
    pub preset: PresetArg,

    /// YAML, JSON or TOML configuration file
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Manuscripts to request from each source
    #[arg(long)]
    pub num_manuscripts: Option<usize>,

    /// Only collect from these sources
    #[arg(long, value_enum, num_args = 1..)]
    pub sources: Option<Vec<SourceArg>>,

    #[arg(long)]
    pub output_dir: Option<String>,

    /// Seconds to wait between requests
    #[arg(long = "rate-limit")]
    pub rate_limit: Option<f64>,
}

impl CollectArgs {
    /// Base configuration with every given flag applied, validated.
    pub fn to_config(&self, verbose: bool) -> anyhow::Result<CollectionConfig> {
        let mut config = match &self.config_file {
            Some(path) => CollectionConfig::from_path(path)
                .with_context(|| format!("loading config file {}", path.display()))?,
            None => CollectionConfig::preset(self.preset.into()),
        };

        if let Some(n) = self.num_manuscripts {
            config.num_manuscripts = n;
        }
        if let Some(sources) = &self.sources {
            config.sources = SourceToggles {
                elife: sources.contains(&SourceArg::Elife),
                f1000: sources.contains(&SourceArg::F1000),
            };
        }
        if let Some(dir) = &self.output_dir {
            config.output.output_dir = dir.clone();
        }
        if let Some(delay) = self.rate_limit {
            config.rate_limit_delay_secs = delay;
        }
        config.verbose |= verbose;

        config.validate()?;
        Ok(config)
    }
}

// ── prepare ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Args)]
pub struct PrepareArgs {
    /// Directory holding the run_* directories
    #[arg(long, default_value = DEFAULT_COLLECTION_DIR)]
    pub collection_dir: PathBuf,

    /// Run name (under --collection-dir) or path; newest run when omitted
    #[arg(long)]
    pub run: Option<String>,

    #[arg(long, default_value = DEFAULT_PREPARED_DIR)]
    pub output_dir: PathBuf,
}

impl PrepareArgs {
    pub fn run_dir(&self) -> anyhow::Result<PathBuf> {
        resolve_run_dir(&self.collection_dir, self.run.as_deref())
    }
}

/// `run` may name a directory under `collection_dir` or be a path itself.
pub fn resolve_run_dir(collection_dir: &Path, run: Option<&str>) -> anyhow::Result<PathBuf> {
    let Some(run) = run else {
        return latest_run(collection_dir)?
            .with_context(|| format!("no collection runs found in {}", collection_dir.display()));
    };

    let named = collection_dir.join(run);
    if named.is_dir() {
        return Ok(named);
    }
    let path = PathBuf::from(run);
    anyhow::ensure!(path.is_dir(), "collection run {} not found", run);
    Ok(path)
}

mod tests;
