//! Steps 2 and 3: configure, start and watch the synthesis pipeline.

use axum::{
    extract::{Query, State},
    response::Html,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::handlers::data::available_runs;
use crate::handlers::{escape, layout};
use crate::runner::{run_pipeline, PipelineStatus};
use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct RunPipelineRequest {
    /// Collection run to prepare; the newest run when absent
    #[serde(default)]
    pub run_id: Option<String>,
}

// ── API ───────────────────────────────────────────────────────────────────────

/// POST /api/run-pipeline
pub async fn api_run_pipeline(
    State(state): State<SharedState>,
    Json(req): Json<RunPipelineRequest>,
) -> ApiResult<Json<Value>> {
    if !state.try_begin(PipelineStatus::starting()) {
        return Err(ApiError::Conflict("Pipeline already running".to_string()));
    }

    info!(run_id = ?req.run_id, "Pipeline run requested");
    tokio::spawn(run_pipeline(state.clone(), req.run_id.clone()));

    Ok(Json(json!({ "status": "started", "run_id": req.run_id })))
}

/// GET /api/pipeline-status
pub async fn api_pipeline_status(State(state): State<SharedState>) -> Json<PipelineStatus> {
    Json(state.status())
}

// ── Pages ─────────────────────────────────────────────────────────────────────

const START_SCRIPT: &str = r#"
<script>
async function startPipeline() {
    const runId = document.getElementById('run-id').value || null;
    const res = await fetch('/api/run-pipeline', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ run_id: runId }),
    });
    if (res.ok) {
        window.location = '/processing';
    } else {
        const body = await res.json();
        document.getElementById('start-error').textContent = body.error;
    }
}
</script>"#;

const STATUS_SCRIPT: &str = r#"
<script>
const source = new EventSource('/api/events');
source.addEventListener('status', (e) => {
    const s = JSON.parse(e.data);
    document.getElementById('bar').style.width = s.progress + '%';
    document.getElementById('stage').textContent = s.stage;
    document.getElementById('message').textContent = s.message;
    if (s.stage === 'complete') {
        document.getElementById('done').style.display = 'block';
    }
});
</script>"#;

pub async fn pipeline_config_page(
    State(state): State<SharedState>,
    Query(query): Query<RunPipelineRequest>,
) -> Html<String> {
    let selected = query.run_id.unwrap_or_default();
    let options: String = available_runs(&state)
        .await
        .iter()
        .map(|r| {
            format!(
                r#"<option value="{id}"{sel}>{id} ({m} manuscripts, {rv} reviews)</option>"#,
                id = escape(&r.id),
                sel = if r.id == selected { " selected" } else { "" },
                m = r.manuscripts,
                rv = r.reviews,
            )
        })
        .collect();

    let config = &state.config;
    Html(layout("Configure", &format!(r#"
    <h1 class="page-title">Step 2: Configure Pipeline</h1>
    <div class="card">
        <table class="table">
            <tr><th>Synthesis command</th><td><code>{cmd}</code></td></tr>
            <tr><th>Working directory</th><td><code>{dir}</code></td></tr>
            <tr><th>Prepared input</th><td><code>{input}</code></td></tr>
            <tr><th>Briefs output</th><td><code>{briefs}</code></td></tr>
        </table>
    </div>
    <div class="card">
        <label for="run-id">Collection run</label>
        <select id="run-id">
            <option value="">Latest run</option>
            {options}
        </select>
        <button class="btn btn-primary" onclick="startPipeline()">Run Pipeline</button>
        <p id="start-error" class="badge-danger"></p>
    </div>
    {script}"#,
        cmd = escape(&config.synth_command_line()),
        dir = escape(&config.pipeline_dir.display().to_string()),
        input = escape(&config.input_dir().display().to_string()),
        briefs = escape(&config.briefs_path().display().to_string()),
        script = START_SCRIPT,
    )))
}

pub async fn processing_page(State(state): State<SharedState>) -> Html<String> {
    let status = state.status();
    Html(layout("Processing", &format!(r#"
    <h1 class="page-title">Step 3: Processing</h1>
    <div class="card">
        <div class="progress-track"><div id="bar" class="progress-bar" style="width:{progress}%"></div></div>
        <p>Stage: <strong id="stage">{stage}</strong></p>
        <p id="message" class="text-muted">{message}</p>
        <div id="done" style="display:{done}"><a href="/results" class="btn btn-primary">View Results</a></div>
    </div>
    {script}"#,
        progress = status.progress,
        stage = status.stage.as_str(),
        message = escape(&status.message),
        done = if status.results.is_some() { "block" } else { "none" },
        script = STATUS_SCRIPT,
    )))
}
