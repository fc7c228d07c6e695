//! Step 4: editorial briefs, single-brief lookup and exports.

use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde_json::Value;
use tracing::warn;

use crate::briefs::{read_briefs, read_briefs_raw, BriefField, BriefStats, BriefsSummary, EditorialBrief};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{escape, layout};
use crate::report::summary_report;
use crate::state::SharedState;

// ── API ───────────────────────────────────────────────────────────────────────

/// GET /api/brief/{id}
pub async fn api_brief(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let briefs = read_briefs(state.config.briefs_path()).await?.unwrap_or_default();
    briefs
        .into_iter()
        .find(|b| b.id() == Some(id.as_str()))
        .map(|b| Json(b.raw))
        .ok_or_else(|| ApiError::NotFound("Brief not found".to_string()))
}

/// GET /api/export/{format}: `json` or `summary`
pub async fn api_export(
    State(state): State<SharedState>,
    Path(format): Path<String>,
) -> ApiResult<Response> {
    let path = state.config.briefs_path();
    match format.as_str() {
        "json" => {
            let body = read_briefs_raw(path)
                .await?
                .ok_or_else(|| ApiError::NotFound("No results available".to_string()))?;
            Ok((
                [
                    (header::CONTENT_TYPE, "application/json"),
                    (header::CONTENT_DISPOSITION, "attachment; filename=\"editorial_briefs.json\""),
                ],
                body,
            )
                .into_response())
        }
        "summary" => {
            let briefs = read_briefs(path).await?
                .ok_or_else(|| ApiError::NotFound("No results available".to_string()))?;
            Ok((
                [
                    (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                    (header::CONTENT_DISPOSITION, "attachment; filename=\"synthesis_summary.txt\""),
                ],
                summary_report(&briefs, Local::now()),
            )
                .into_response())
        }
        _ => Err(ApiError::BadRequest("Invalid format".to_string())),
    }
}

// ── Page ──────────────────────────────────────────────────────────────────────

pub async fn results_page(State(state): State<SharedState>) -> Html<String> {
    let (briefs, banner) = match read_briefs(state.config.briefs_path()).await {
        Ok(Some(briefs)) => (briefs, String::new()),
        Ok(None) => (
            Vec::new(),
            r#"<div class="alert">No results yet. <a href="/pipeline-config">Run the pipeline</a> first.</div>"#.to_string(),
        ),
        Err(e) => {
            warn!("Could not read briefs: {:#}", e);
            (
                Vec::new(),
                format!(r#"<div class="alert badge-danger">Could not read briefs: {}</div>"#, escape(&format!("{:#}", e))),
            )
        }
    };

    Html(layout("Results", &render_results(&briefs, &banner)))
}

fn render_results(briefs: &[EditorialBrief], banner: &str) -> String {
    let stats = BriefStats::compute(briefs);
    let summary = BriefsSummary::compute(briefs);

    let gaps = [
        (stats.missing_confidence, "missing a confidence score"),
        (stats.invalid_confidence, "with an unreadable confidence score"),
        (stats.missing_validation, "without a validation result"),
        (stats.missing_review_counts, "without a review count"),
        (summary.gaps.major_issues, "without a major issues list"),
        (summary.gaps.minor_issues, "without a minor issues list"),
        (summary.gaps.action_checklist, "without an action checklist"),
        (summary.gaps.consensus_confidence, "without a consensus confidence"),
    ];
    let gap_notes: Vec<String> = gaps
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, what)| format!("{} brief(s) {}", n, what))
        .collect();
    let gap_html = if gap_notes.is_empty() {
        String::new()
    } else {
        format!(r#"<p class="text-muted">Data gaps: {}.</p>"#, gap_notes.join("; "))
    };

    let rows: String = if briefs.is_empty() {
        r#"<tr><td colspan="7" class="text-muted">No briefs.</td></tr>"#.to_string()
    } else {
        briefs
            .iter()
            .zip(&summary.per_brief)
            .map(|(b, a)| {
                let validation = match b.validation_passed {
                    BriefField::Present(true) => r#"<span class="badge-success">✓ Passed</span>"#,
                    BriefField::Present(false) => r#"<span class="badge-danger">✗ Failed</span>"#,
                    _ => r#"<span class="text-muted">—</span>"#,
                };
                let confidence = match &b.confidence_score {
                    BriefField::Present(v) => format!("{:.0}", v),
                    BriefField::Missing => "—".to_string(),
                    BriefField::Invalid(_) => "invalid".to_string(),
                };
                let reviews = b
                    .num_reviews_synthesized
                    .present()
                    .map_or_else(|| "—".to_string(), u64::to_string);
                format!(
                    r#"<tr>
                <td><a href="/api/brief/{id}"><code>{id}</code></a></td>
                <td>{title}</td>
                <td>{reviews}</td>
                <td>{major}</td>
                <td>{coverage}</td>
                <td>{confidence}</td>
                <td>{validation}</td>
            </tr>"#,
                    id = escape(a.manuscript_id.as_deref().unwrap_or("unknown")),
                    title = escape(a.title.as_deref().unwrap_or("")),
                    major = a.num_major_issues.map_or_else(|| "—".to_string(), |n| n.to_string()),
                    coverage = a.evidence_coverage.map_or_else(|| "—".to_string(), |c| format!("{:.0}%", c)),
                )
            })
            .collect()
    };

    format!(r#"
    <h1 class="page-title">Step 4: Editorial Briefs</h1>
    {banner}
    <div class="stats-grid">
        <div class="stat-card"><div class="stat-value">{total}</div><div class="stat-label">Briefs</div></div>
        <div class="stat-card"><div class="stat-value">{validated}</div><div class="stat-label">Validated</div></div>
        <div class="stat-card"><div class="stat-value">{avg_conf}</div><div class="stat-label">Avg Confidence</div></div>
        <div class="stat-card"><div class="stat-value">{reviews}</div><div class="stat-label">Reviews Synthesized</div></div>
    </div>
    {gap_html}
    <div class="card">
        <p>Evidence coverage: {coverage} ({cov_verdict}). Validation pass rate: {pass_rate}.</p>
        <a href="/api/export/json" class="btn">Export JSON</a>
        <a href="/api/export/summary" class="btn">Export Summary</a>
    </div>
    <div class="card">
        <table class="table">
            <thead><tr><th>Manuscript</th><th>Title</th><th>Reviews</th><th>Major Issues</th><th>Evidence</th><th>Confidence</th><th>Validation</th></tr></thead>
            <tbody>{rows}</tbody>
        </table>
    </div>"#,
        total = stats.total_briefs,
        validated = stats.validated,
        avg_conf = stats.avg_confidence.map_or_else(|| "—".to_string(), |c| format!("{:.1}", c)),
        reviews = stats.total_reviews,
        coverage = summary
            .avg_evidence_coverage
            .map_or_else(|| "not measurable".to_string(), |c| format!("{:.1}% average", c)),
        cov_verdict = if summary.meets_evidence_target() { "meets target" } else { "below target" },
        pass_rate = summary.validation_pass_rate.map_or_else(|| "n/a".to_string(), |r| format!("{:.1}%", r)),
    )
}
