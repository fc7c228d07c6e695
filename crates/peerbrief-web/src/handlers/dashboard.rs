//! Dashboard handler: landing page walking through the four steps.

use axum::{extract::State, response::Html};

use crate::handlers::data::list_runs_in;
use crate::handlers::{escape, layout};
use crate::runner::PipelineStage;
use crate::state::SharedState;

/// Navigation HTML template shared across all pages
pub const NAV_HTML: &str = include_str!("../../templates/nav.html");

pub async fn dashboard(State(state): State<SharedState>) -> Html<String> {
    let runs = list_runs_in(state.config.collection_dir.clone()).await.len();
    let briefs_ready = tokio::fs::try_exists(state.config.briefs_path())
        .await
        .unwrap_or(false);
    let status = state.status();

    let status_line = match status.stage {
        PipelineStage::Idle => "No pipeline run since the server started.".to_string(),
        _ => format!("Last pipeline status: {} ({}%)", escape(&status.message), status.progress),
    };

    Html(layout("Overview", &format!(r#"
    <div class="page-header">
        <h1 class="page-title">Peer Review Synthesis</h1>
        <p class="text-muted">Turn openly published peer reviews into editorial briefs.</p>
    </div>

    <div class="stats-grid">
        <div class="stat-card">
            <div class="stat-value">{runs}</div>
            <div class="stat-label">Collection Runs</div>
        </div>
        <div class="stat-card">
            <div class="stat-value">{briefs}</div>
            <div class="stat-label">Briefs Available</div>
        </div>
    </div>

    <div class="card">
        <p>{status_line}</p>
        <ol>
            <li><a href="/data-selection">Select a collection run</a></li>
            <li><a href="/pipeline-config">Review the pipeline configuration</a></li>
            <li><a href="/processing">Watch the pipeline run</a></li>
            <li><a href="/results">Read the editorial briefs</a></li>
        </ol>
    </div>"#,
        briefs = if briefs_ready { "Yes" } else { "No" },
    )))
}
