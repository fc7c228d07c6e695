//! Collection orchestrator.
//!
//! Runs every enabled collector one after another, merges their output,
//! applies the review-count filter, computes summary statistics and writes
//! the run directory. A collector that fails as a whole is logged and
//! contributes nothing; the run still completes with the other sources.

use std::path::PathBuf;
use std::sync::Arc;

use peerbrief_common::{CollectionConfig, SandboxClient};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::models::{CollectionMetadata, Manuscript};
use crate::output::write_run;
use crate::sources::{ElifeCollector, F1000Collector, ReviewCollector};
use crate::stats::SummaryStatistics;

// ── Run state ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    Succeeded,
    /// At least one source errored, at least one did not
    PartiallySucceeded,
    /// Every source errored
    Failed,
}

impl RunState {
    fn from_counts(sources: usize, failed: usize) -> Self {
        match failed {
            0 => RunState::Succeeded,
            n if n >= sources => RunState::Failed,
            _ => RunState::PartiallySucceeded,
        }
    }
}

// ── Progress events ───────────────────────────────────────────────────────────

/// Progress event emitted during a run (cloneable for broadcast).
#[derive(Debug, Clone, Serialize)]
pub struct CollectionProgress {
    pub run_id: Uuid,
    pub stage: String,
    pub message: String,
    pub manuscripts_collected: usize,
    pub error: Option<String>,
}

impl CollectionProgress {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            stage: String::new(),
            message: String::new(),
            manuscripts_collected: 0,
            error: None,
        }
    }
}

// ── Result ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub run_id: Uuid,
    pub manuscripts: Vec<Manuscript>,
    pub metadata: Vec<CollectionMetadata>,
    pub summary: SummaryStatistics,
    pub run_dir: PathBuf,
    pub status: RunState,
    /// Whole-source failures, `"<source>: <error>"`
    pub source_errors: Vec<String>,
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct CollectionRun {
    config: CollectionConfig,
    collectors: Vec<Arc<dyn ReviewCollector>>,
    progress_tx: Option<broadcast::Sender<CollectionProgress>>,
    state: RunState,
}

impl CollectionRun {
    /// Build the collectors enabled in `config`, sharing one HTTP client.
    pub fn from_config(config: CollectionConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let client = SandboxClient::with_settings(config.request_timeout(), config.http.max_retries)?;
        let delay = config.rate_limit_delay();

        let mut collectors: Vec<Arc<dyn ReviewCollector>> = Vec::new();
        if config.sources.elife {
            collectors.push(Arc::new(ElifeCollector::new(client.clone(), delay)));
        }
        if config.sources.f1000 {
            collectors.push(Arc::new(F1000Collector::new(client, delay)));
        }
        Ok(Self::with_collectors(config, collectors))
    }

    pub fn with_collectors(config: CollectionConfig, collectors: Vec<Arc<dyn ReviewCollector>>) -> Self {
        Self {
            config,
            collectors,
            progress_tx: None,
            state: RunState::NotStarted,
        }
    }

    pub fn with_progress(mut self, tx: broadcast::Sender<CollectionProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    /// Run every collector, then filter, summarise and persist.
    ///
    /// `Err` only when the run directory cannot be written.
    #[instrument(skip(self), fields(sources = self.collectors.len()))]
    pub async fn run(&mut self) -> anyhow::Result<CollectionOutcome> {
        let run_id = Uuid::new_v4();
        self.state = RunState::Running;
        info!(run_id = %run_id, "🚀 Starting peer review data collection");

        let progress_tx = self.progress_tx.clone();
        let emit = |stage: &str, msg: &str, collected: usize, err: Option<String>| {
            if let Some(ref tx) = progress_tx {
                let mut prog = CollectionProgress::new(run_id);
                prog.stage = stage.to_string();
                prog.message = msg.to_string();
                prog.manuscripts_collected = collected;
                prog.error = err;
                let _ = tx.send(prog);
            }
        };

        let count = self.config.num_manuscripts;
        let filters = self.config.filters.clone();
        let mut manuscripts = Vec::new();
        let mut metadata = Vec::new();
        let mut source_errors = Vec::new();

        for collector in &self.collectors {
            let source = collector.source();
            emit("collect", &format!("Collecting from {}", source.display_name()), manuscripts.len(), None);
            info!("📚 Collecting from {}...", source.display_name());

            match collector.collect(count, &filters).await {
                Ok(batch) => {
                    info!(
                        "Collected {} manuscripts from {}",
                        batch.manuscripts.len(),
                        source.display_name()
                    );
                    manuscripts.extend(batch.manuscripts);
                    metadata.push(batch.metadata);
                }
                Err(e) => {
                    let msg = format!("{}: {:#}", source, e);
                    error!("Error collecting from {}: {:#}", source.display_name(), e);
                    emit("collect", "Source failed", manuscripts.len(), Some(msg.clone()));
                    source_errors.push(msg);
                }
            }
        }

        let validation = &self.config.validation;
        if validation.skip_manuscripts_without_reviews {
            let before = manuscripts.len();
            manuscripts = filter_by_review_count(manuscripts, validation.min_reviews_per_manuscript);
            info!(
                "Filtered to {} manuscripts with reviews (removed {})",
                manuscripts.len(),
                before - manuscripts.len()
            );
        }

        emit("summarize", "Computing summary statistics", manuscripts.len(), None);
        let summary = SummaryStatistics::compute(&manuscripts, &metadata);

        emit("save", "Writing run directory", manuscripts.len(), None);
        let run_dir = match write_run(&self.config, &manuscripts, &metadata, &summary) {
            Ok(dir) => dir,
            Err(e) => {
                self.state = RunState::Failed;
                emit("error", "Failed to write run directory", manuscripts.len(), Some(format!("{:#}", e)));
                return Err(e);
            }
        };
        summary.log_summary();

        self.state = RunState::from_counts(self.collectors.len(), source_errors.len());
        match self.state {
            RunState::Failed => warn!("All sources failed; run directory contains no manuscripts"),
            RunState::PartiallySucceeded => warn!("{} source(s) failed: {:?}", source_errors.len(), source_errors),
            _ => {}
        }
        emit(
            "complete",
            &format!("Collection complete: {} manuscripts", manuscripts.len()),
            manuscripts.len(),
            None,
        );
        info!("✅ Collection complete! Data saved to: {}", run_dir.display());

        Ok(CollectionOutcome {
            run_id,
            manuscripts,
            metadata,
            summary,
            run_dir,
            status: self.state,
            source_errors,
        })
    }
}

/// Keep manuscripts with at least `min_reviews` reviews.
pub fn filter_by_review_count(manuscripts: Vec<Manuscript>, min_reviews: usize) -> Vec<Manuscript> {
    manuscripts
        .into_iter()
        .filter(|m| m.num_reviews() >= min_reviews)
        .collect()
}
