//! Synthesis pipeline execution.
//!
//! One background task drives a run through its stages and publishes a fresh
//! `PipelineStatus` snapshot at each step:
//!   1. prepare    : flatten the selected collection run into pipeline input
//!   2. extract    : announced before the external command starts
//!   3. synthesize : run the external synthesis command
//!   4. validate   : read back and count the generated briefs
//!   5. complete   : or `error`, keeping the progress reached so far

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Context;
use peerbrief_ingestion::output::latest_run;
use peerbrief_ingestion::prepare::prepare_run;
use serde::Serialize;
use tokio::process::Command;
use tracing::{error, info, instrument, warn};

use crate::briefs::read_briefs;
use crate::state::{SharedState, WebConfig};

/// Characters of command stderr kept in an error message.
const STDERR_TAIL_CHARS: usize = 500;

// ── Status snapshot ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Prepare,
    Extract,
    Synthesize,
    Validate,
    Complete,
    Error,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Prepare => "prepare",
            PipelineStage::Extract => "extract",
            PipelineStage::Synthesize => "synthesize",
            PipelineStage::Validate => "validate",
            PipelineStage::Complete => "complete",
            PipelineStage::Error => "error",
        }
    }

    /// Percent complete when the stage is entered.
    pub fn progress(&self) -> u8 {
        match self {
            PipelineStage::Idle | PipelineStage::Error => 0,
            PipelineStage::Prepare => 10,
            PipelineStage::Extract => 30,
            PipelineStage::Synthesize => 60,
            PipelineStage::Validate => 90,
            PipelineStage::Complete => 100,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            PipelineStage::Prepare => "Preparing input data...",
            PipelineStage::Extract => "Extracting issues from reviews...",
            PipelineStage::Synthesize => "Synthesizing editorial briefs...",
            PipelineStage::Validate => "Validating results...",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineResults {
    pub briefs_generated: usize,
    pub validated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStatus {
    pub running: bool,
    pub stage: PipelineStage,
    pub progress: u8,
    pub message: String,
    pub results: Option<PipelineResults>,
    pub error: Option<String>,
}

impl PipelineStatus {
    pub fn idle() -> Self {
        Self {
            running: false,
            stage: PipelineStage::Idle,
            progress: 0,
            message: String::new(),
            results: None,
            error: None,
        }
    }

    pub fn starting() -> Self {
        Self::at(PipelineStage::Prepare)
    }

    pub fn at(stage: PipelineStage) -> Self {
        Self {
            running: true,
            stage,
            progress: stage.progress(),
            message: stage.message().to_string(),
            results: None,
            error: None,
        }
    }

    pub fn complete(results: PipelineResults) -> Self {
        Self {
            running: false,
            stage: PipelineStage::Complete,
            progress: 100,
            message: format!("Complete! Generated {} editorial briefs", results.briefs_generated),
            results: Some(results),
            error: None,
        }
    }

    pub fn failed(reached: u8, error: String) -> Self {
        Self {
            running: false,
            stage: PipelineStage::Error,
            progress: reached,
            message: format!("Error: {}", error),
            results: None,
            error: Some(error),
        }
    }
}

// ── Runner ────────────────────────────────────────────────────────────────────

/// Drive one run to completion. The caller must already hold the run via
/// [`AppState::try_begin`](crate::state::AppState::try_begin).
#[instrument(skip(state))]
pub async fn run_pipeline(state: SharedState, run_id: Option<String>) {
    info!("🚀 Starting synthesis pipeline");
    let final_status = match execute(&state, run_id.as_deref()).await {
        Ok(results) => {
            info!(
                briefs = results.briefs_generated,
                validated = results.validated,
                "✅ Synthesis pipeline complete"
            );
            PipelineStatus::complete(results)
        }
        Err(e) => {
            error!("Synthesis pipeline failed: {:#}", e);
            PipelineStatus::failed(state.status().progress, format!("{:#}", e))
        }
    };
    state.publish(final_status);
}

async fn execute(state: &SharedState, run_id: Option<&str>) -> anyhow::Result<PipelineResults> {
    let config = &state.config;

    state.publish(PipelineStatus::at(PipelineStage::Prepare));
    let prepare_config = config.clone();
    let run_id = run_id.map(str::to_string);
    let prepared = tokio::task::spawn_blocking(move || {
        let run_dir = resolve_run(&prepare_config, run_id.as_deref())?;
        info!("Preparing input from {}", run_dir.display());
        prepare_run(&run_dir, &prepare_config.input_dir())
    })
    .await
    .context("input preparation task panicked")??;
    info!(reviews = prepared.reviews, "Prepared pipeline input");

    state.publish(PipelineStatus::at(PipelineStage::Extract));
    state.publish(PipelineStatus::at(PipelineStage::Synthesize));
    run_synthesis(config).await?;

    state.publish(PipelineStatus::at(PipelineStage::Validate));
    let briefs_path = config.briefs_path();
    let briefs = read_briefs(briefs_path.clone()).await?
        .with_context(|| format!("synthesis produced no {}", briefs_path.display()))?;

    Ok(PipelineResults {
        briefs_generated: briefs.len(),
        validated: briefs.iter().filter(|b| b.is_validated()).count(),
    })
}

/// The named run, or the newest one when none is given.
fn resolve_run(config: &WebConfig, run_id: Option<&str>) -> anyhow::Result<PathBuf> {
    match run_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => {
            let dir = config
                .run_dir(id)
                .with_context(|| format!("invalid run id {:?}", id))?;
            anyhow::ensure!(dir.is_dir(), "collection run {} not found", id);
            Ok(dir)
        }
        None => latest_run(&config.collection_dir)?
            .with_context(|| format!("no collection runs found in {}", config.collection_dir.display())),
    }
}

async fn run_synthesis(config: &WebConfig) -> anyhow::Result<()> {
    let (program, args) = config
        .synth_cmd
        .split_first()
        .context("synthesis command is empty")?;
    info!("Running: {} (in {})", config.synth_command_line(), config.pipeline_dir.display());

    let output = Command::new(program)
        .args(args)
        .arg(&config.pipeline_config)
        .current_dir(&config.pipeline_dir)
        .stdin(Stdio::null())
        .output()
        .await
        .with_context(|| format!("launching {:?}", program))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = {
            let chars: Vec<char> = stderr.trim().chars().collect();
            chars[chars.len().saturating_sub(STDERR_TAIL_CHARS)..].iter().collect()
        };
        warn!("Synthesis command exited with {}", output.status);
        anyhow::bail!("synthesis command exited with {}: {}", output.status, tail);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_progress() {
        let stages = [
            PipelineStage::Prepare,
            PipelineStage::Extract,
            PipelineStage::Synthesize,
            PipelineStage::Validate,
            PipelineStage::Complete,
        ];
        let progress: Vec<u8> = stages.iter().map(PipelineStage::progress).collect();
        assert_eq!(progress, vec![10, 30, 60, 90, 100]);
    }

    #[test]
    fn test_status_json_shape() {
        let json = serde_json::to_value(PipelineStatus::at(PipelineStage::Synthesize)).unwrap();
        assert_eq!(json["running"], true);
        assert_eq!(json["stage"], "synthesize");
        assert_eq!(json["progress"], 60);
        assert_eq!(json["message"], "Synthesizing editorial briefs...");
        assert!(json["results"].is_null());

        let failed = PipelineStatus::failed(60, "boom".to_string());
        assert!(!failed.running);
        assert_eq!(failed.progress, 60);
        assert_eq!(failed.message, "Error: boom");
    }

    #[test]
    fn test_resolve_run() {
        let tmp = tempfile::tempdir().unwrap();
        let config = WebConfig {
            collection_dir: tmp.path().to_path_buf(),
            ..WebConfig::default()
        };
        assert!(resolve_run(&config, None).is_err());

        std::fs::create_dir(tmp.path().join("run_20240101_000000")).unwrap();
        std::fs::create_dir(tmp.path().join("run_20240301_000000")).unwrap();
        assert_eq!(resolve_run(&config, None).unwrap(), tmp.path().join("run_20240301_000000"));
        assert_eq!(
            resolve_run(&config, Some("run_20240101_000000")).unwrap(),
            tmp.path().join("run_20240101_000000")
        );
        assert!(resolve_run(&config, Some("run_missing")).is_err());
        assert!(resolve_run(&config, Some("../etc")).is_err());
    }
}
