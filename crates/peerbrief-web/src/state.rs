//! Shared application state for the web server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;

use crate::runner::PipelineStatus;

pub const DEFAULT_COLLECTION_DIR: &str = "./collected_data";
pub const DEFAULT_PIPELINE_DIR: &str = "./pipeline";
pub const DEFAULT_PIPELINE_CONFIG: &str = "config/pipeline_simple.yaml";
pub const DEFAULT_SYNTH_CMD: &str = "docetl run";
pub const DEFAULT_PORT: u16 = 5000;

/// Briefs written by the synthesis command, relative to the pipeline dir.
pub const BRIEFS_FILE: &str = "output/editorial_briefs.json";
/// Where prepared inputs go, relative to the pipeline dir.
pub const INPUT_DIR: &str = "input";

// ── Paths & command ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Parent of the `run_*` directories
    pub collection_dir: PathBuf,
    /// Working directory of the synthesis command
    pub pipeline_dir: PathBuf,
    /// Passed as the last argument to the synthesis command
    pub pipeline_config: String,
    /// Program followed by its leading arguments
    pub synth_cmd: Vec<String>,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            collection_dir: PathBuf::from(DEFAULT_COLLECTION_DIR),
            pipeline_dir: PathBuf::from(DEFAULT_PIPELINE_DIR),
            pipeline_config: DEFAULT_PIPELINE_CONFIG.to_string(),
            synth_cmd: split_command(DEFAULT_SYNTH_CMD),
            port: DEFAULT_PORT,
        }
    }
}

impl WebConfig {
    /// Read `PEERBRIEF_*` and `PORT`; unset or blank variables keep defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(dir) = get("PEERBRIEF_COLLECTION_DIR") {
            config.collection_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("PEERBRIEF_PIPELINE_DIR") {
            config.pipeline_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("PEERBRIEF_PIPELINE_CONFIG") {
            config.pipeline_config = path;
        }
        if let Some(cmd) = get("PEERBRIEF_SYNTH_CMD") {
            config.synth_cmd = split_command(&cmd);
        }
        if let Some(port) = get("PORT") {
            config.port = port
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a port number, got {:?}", port))?;
        }
        Ok(config)
    }

    pub fn briefs_path(&self) -> PathBuf {
        self.pipeline_dir.join(BRIEFS_FILE)
    }

    pub fn input_dir(&self) -> PathBuf {
        self.pipeline_dir.join(INPUT_DIR)
    }

    /// Resolve a run id from the UI to its directory. Only plain `run_*`
    /// names directly under the collection dir are accepted.
    pub fn run_dir(&self, run_id: &str) -> Option<PathBuf> {
        let valid = run_id.starts_with(peerbrief_ingestion::output::RUN_PREFIX)
            && Path::new(run_id).components().count() == 1
            && !run_id.contains(['/', '\\']);
        valid.then(|| self.collection_dir.join(run_id))
    }

    pub fn synth_command_line(&self) -> String {
        let mut parts = self.synth_cmd.clone();
        parts.push(self.pipeline_config.clone());
        parts.join(" ")
    }
}

fn split_command(cmd: &str) -> Vec<String> {
    cmd.split_whitespace().map(str::to_string).collect()
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Shared state injected into every Axum handler.
///
/// The pipeline status lives in a watch channel: the runner task replaces
/// the whole snapshot, readers clone the current one.
pub struct AppState {
    pub config: WebConfig,
    status_tx: watch::Sender<PipelineStatus>,
}

impl AppState {
    pub fn new(config: WebConfig) -> Self {
        let (status_tx, _) = watch::channel(PipelineStatus::idle());
        Self { config, status_tx }
    }

    pub fn status(&self) -> PipelineStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineStatus> {
        self.status_tx.subscribe()
    }

    /// Swap in `starting` unless a run is in progress. Returns whether the
    /// caller now owns the run.
    pub fn try_begin(&self, starting: PipelineStatus) -> bool {
        self.status_tx.send_if_modified(|current| {
            if current.running {
                false
            } else {
                *current = starting;
                true
            }
        })
    }

    pub fn publish(&self, status: PipelineStatus) {
        self.status_tx.send_replace(status);
    }
}

pub type SharedState = Arc<AppState>;
