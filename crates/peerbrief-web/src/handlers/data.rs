//! Step 1: choose a collection run.

use std::path::PathBuf;

use axum::{extract::State, response::Html};
use peerbrief_ingestion::output::{list_runs, RunInfo, RUN_PREFIX};
use serde::Serialize;
use tracing::warn;

use crate::handlers::{escape, layout};
use crate::state::SharedState;

/// A selectable collection run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOption {
    pub id: String,
    pub date: String,
    pub manuscripts: usize,
    pub reviews: usize,
    pub path: String,
}

impl RunOption {
    /// Runs without a readable summary are not offered.
    fn from_run(run: &RunInfo) -> Option<Self> {
        let summary = run.summary.as_ref()?;
        Some(Self {
            id: run.name.clone(),
            date: run.name.strip_prefix(RUN_PREFIX).unwrap_or(run.name.as_str()).to_string(),
            manuscripts: summary.total_manuscripts,
            reviews: summary.total_reviews,
            path: run.path.display().to_string(),
        })
    }
}

/// Run listing on the blocking pool. Listing errors are logged and yield
/// no runs.
pub(crate) async fn list_runs_in(collection_dir: PathBuf) -> Vec<RunInfo> {
    match tokio::task::spawn_blocking(move || list_runs(&collection_dir)).await {
        Ok(Ok(runs)) => runs,
        Ok(Err(e)) => {
            warn!("Listing collection runs failed: {:#}", e);
            Vec::new()
        }
        Err(e) => {
            warn!("Run listing task failed: {}", e);
            Vec::new()
        }
    }
}

pub async fn available_runs(state: &SharedState) -> Vec<RunOption> {
    list_runs_in(state.config.collection_dir.clone())
        .await
        .iter()
        .filter_map(RunOption::from_run)
        .collect()
}

pub async fn data_selection_page(State(state): State<SharedState>) -> Html<String> {
    let runs = available_runs(&state).await;

    let rows: String = if runs.is_empty() {
        format!(
            r#"<tr><td colspan="5" class="text-muted">No collection runs found in {}. Run <code>peerbrief collect</code> first.</td></tr>"#,
            escape(&state.config.collection_dir.display().to_string())
        )
    } else {
        runs.iter()
            .map(|r| {
                format!(
                    r#"<tr>
                <td><code>{id}</code></td>
                <td>{date}</td>
                <td>{manuscripts}</td>
                <td>{reviews}</td>
                <td><a href="/pipeline-config?run_id={id}" class="btn">Use this run</a></td>
            </tr>"#,
                    id = escape(&r.id),
                    date = escape(&r.date),
                    manuscripts = r.manuscripts,
                    reviews = r.reviews,
                )
            })
            .collect()
    };

    Html(layout("Select Data", &format!(r#"
    <h1 class="page-title">Step 1: Select Review Data</h1>
    <div class="card">
        <table class="table">
            <thead><tr><th>Run</th><th>Date</th><th>Manuscripts</th><th>Reviews</th><th></th></tr></thead>
            <tbody>{rows}</tbody>
        </table>
    </div>"#)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::state::{AppState, WebConfig};
    use peerbrief_ingestion::output::{write_json, SUMMARY_FILE};
    use peerbrief_ingestion::stats::SummaryStatistics;

    #[tokio::test]
    async fn test_available_runs_newest_first_with_summary_only() {
        let tmp = tempfile::tempdir().unwrap();
        let summary = SummaryStatistics::compute(&[], &[]);
        for name in ["run_20240101_000000", "run_20240101_000000_10", "run_20240101_000000_9"] {
            let dir = tmp.path().join(name);
            std::fs::create_dir_all(&dir).unwrap();
            write_json(&dir.join(SUMMARY_FILE), &summary).unwrap();
        }
        std::fs::create_dir_all(tmp.path().join("run_20250101_000000")).unwrap();

        let state = Arc::new(AppState::new(WebConfig {
            collection_dir: tmp.path().to_path_buf(),
            ..WebConfig::default()
        }));
        let ids: Vec<String> = available_runs(&state).await.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["run_20240101_000000_10", "run_20240101_000000_9", "run_20240101_000000"]);
    }

    #[tokio::test]
    async fn test_missing_collection_dir_lists_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_runs_in(tmp.path().join("absent")).await.is_empty());
    }
}
