//! Editorial briefs produced by the synthesis pipeline.
//!
//! The pipeline is external, so its output is read field by field: every
//! field records whether it was present, absent, or of the wrong shape, and
//! statistics report the gaps instead of counting them as zero.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use serde_json::{Map, Value};

/// Major-issue evidence coverage considered good enough.
pub const TARGET_EVIDENCE_COVERAGE: f64 = 95.0;

// ── Field parsing ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum BriefField<T> {
    Present(T),
    Missing,
    Invalid(String),
}

impl<T> BriefField<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            BriefField::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, BriefField::Missing)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, BriefField::Invalid(_))
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn text_field(obj: &Map<String, Value>, key: &str) -> BriefField<String> {
    match field(obj, key) {
        None => BriefField::Missing,
        Some(Value::String(s)) => BriefField::Present(s.clone()),
        Some(other) => BriefField::Invalid(format!("{key}: expected string, got {}", kind(other))),
    }
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn number_field(obj: &Map<String, Value>, key: &str) -> BriefField<f64> {
    match field(obj, key) {
        None => BriefField::Missing,
        Some(Value::Number(n)) => n
            .as_f64()
            .map(BriefField::Present)
            .unwrap_or_else(|| BriefField::Invalid(format!("{key}: unrepresentable number"))),
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => BriefField::Present(v),
            _ => BriefField::Invalid(format!("{key}: {s:?} is not a number")),
        },
        Some(other) => BriefField::Invalid(format!("{key}: expected number, got {}", kind(other))),
    }
}

fn count_field(obj: &Map<String, Value>, key: &str) -> BriefField<u64> {
    match field(obj, key) {
        None => BriefField::Missing,
        Some(Value::Number(n)) => n
            .as_u64()
            .map(BriefField::Present)
            .unwrap_or_else(|| BriefField::Invalid(format!("{key}: {n} is not a count"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(BriefField::Present)
            .unwrap_or_else(|_| BriefField::Invalid(format!("{key}: {s:?} is not a count"))),
        Some(other) => BriefField::Invalid(format!("{key}: expected count, got {}", kind(other))),
    }
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> BriefField<bool> {
    match field(obj, key) {
        None => BriefField::Missing,
        Some(Value::Bool(b)) => BriefField::Present(*b),
        Some(other) => BriefField::Invalid(format!("{key}: expected boolean, got {}", kind(other))),
    }
}

fn list_field(obj: &Map<String, Value>, key: &str) -> BriefField<Vec<Value>> {
    match field(obj, key) {
        None => BriefField::Missing,
        Some(Value::Array(items)) => BriefField::Present(items.clone()),
        Some(other) => BriefField::Invalid(format!("{key}: expected array, got {}", kind(other))),
    }
}

// ── Brief ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditorialBrief {
    pub manuscript_id: BriefField<String>,
    pub manuscript_title: BriefField<String>,
    pub num_reviews_synthesized: BriefField<u64>,
    pub confidence_score: BriefField<f64>,
    pub validation_passed: BriefField<bool>,
    pub consensus_confidence: BriefField<String>,
    pub major_issues: BriefField<Vec<Value>>,
    pub minor_issues: BriefField<Vec<Value>>,
    pub disagreements: BriefField<Vec<Value>>,
    pub action_checklist: BriefField<Vec<Value>>,
    pub open_questions: BriefField<Vec<Value>>,
    pub warnings: BriefField<Vec<Value>>,
    /// The brief exactly as the pipeline wrote it
    pub raw: Value,
}

impl EditorialBrief {
    pub fn parse(raw: Value) -> anyhow::Result<Self> {
        let Value::Object(obj) = &raw else {
            anyhow::bail!("expected a JSON object, got {}", kind(&raw));
        };

        let consensus_confidence = match field(obj, "consensus_snapshot") {
            None => BriefField::Missing,
            Some(Value::Object(snapshot)) => text_field(snapshot, "confidence"),
            Some(other) => BriefField::Invalid(format!("consensus_snapshot: expected object, got {}", kind(other))),
        };

        Ok(Self {
            manuscript_id: text_field(obj, "manuscript_id"),
            manuscript_title: text_field(obj, "manuscript_title"),
            num_reviews_synthesized: count_field(obj, "num_reviews_synthesized"),
            confidence_score: number_field(obj, "confidence_score"),
            validation_passed: bool_field(obj, "validation_passed"),
            consensus_confidence,
            major_issues: list_field(obj, "major_issues"),
            minor_issues: list_field(obj, "minor_issues"),
            disagreements: list_field(obj, "disagreements"),
            action_checklist: list_field(obj, "action_checklist"),
            open_questions: list_field(obj, "open_questions"),
            warnings: list_field(obj, "warnings"),
            raw,
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.manuscript_id.present().map(String::as_str)
    }

    pub fn is_validated(&self) -> bool {
        self.validation_passed.present() == Some(&true)
    }
}

/// Parse a briefs file holding either a list of briefs or a single brief.
pub fn parse_briefs(body: &str) -> anyhow::Result<Vec<EditorialBrief>> {
    let value: Value = serde_json::from_str(body).context("briefs file is not valid JSON")?;
    let items = match value {
        Value::Array(items) => items,
        single => vec![single],
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, v)| EditorialBrief::parse(v).with_context(|| format!("brief #{}", i + 1)))
        .collect()
}

/// `Ok(None)` when the pipeline has not produced a briefs file yet.
pub fn load_briefs(path: &Path) -> anyhow::Result<Option<Vec<EditorialBrief>>> {
    if !path.exists() {
        return Ok(None);
    }
    let body = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_briefs(&body)
        .with_context(|| format!("parsing {}", path.display()))
        .map(Some)
}

/// [`load_briefs`] on the blocking pool, for use from async handlers.
pub async fn read_briefs(path: PathBuf) -> anyhow::Result<Option<Vec<EditorialBrief>>> {
    tokio::task::spawn_blocking(move || load_briefs(&path))
        .await
        .context("briefs loading task panicked")?
}

/// Raw briefs file bytes, `Ok(None)` when absent.
pub async fn read_briefs_raw(path: PathBuf) -> anyhow::Result<Option<Vec<u8>>> {
    tokio::task::spawn_blocking(move || {
        if !path.is_file() {
            return Ok(None);
        }
        fs::read(&path)
            .with_context(|| format!("reading {}", path.display()))
            .map(Some)
    })
    .await
    .context("briefs loading task panicked")?
}

// ── Statistics ────────────────────────────────────────────────────────────────

/// Headline numbers for the results page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BriefStats {
    pub total_briefs: usize,
    pub validated: usize,
    /// Mean over briefs that carry a usable confidence score
    pub avg_confidence: Option<f64>,
    pub total_reviews: u64,
    pub missing_confidence: usize,
    pub invalid_confidence: usize,
    pub missing_validation: usize,
    pub missing_review_counts: usize,
}

impl BriefStats {
    pub fn compute(briefs: &[EditorialBrief]) -> Self {
        let scores: Vec<f64> = briefs.iter().filter_map(|b| b.confidence_score.present().copied()).collect();
        Self {
            total_briefs: briefs.len(),
            validated: briefs.iter().filter(|b| b.is_validated()).count(),
            avg_confidence: mean(&scores),
            total_reviews: briefs
                .iter()
                .filter_map(|b| b.num_reviews_synthesized.present())
                .sum(),
            missing_confidence: briefs.iter().filter(|b| b.confidence_score.is_missing()).count(),
            invalid_confidence: briefs.iter().filter(|b| b.confidence_score.is_invalid()).count(),
            missing_validation: briefs.iter().filter(|b| !matches!(b.validation_passed, BriefField::Present(_))).count(),
            missing_review_counts: briefs
                .iter()
                .filter(|b| !matches!(b.num_reviews_synthesized, BriefField::Present(_)))
                .count(),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

fn list_len(field: &BriefField<Vec<Value>>) -> Option<usize> {
    field.present().map(Vec::len)
}

// ── Quality analysis ──────────────────────────────────────────────────────────

/// Per-brief quality figures. A `None` count means the list was missing or
/// malformed in the brief, not that it was empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BriefAnalysis {
    pub manuscript_id: Option<String>,
    pub title: Option<String>,
    pub num_major_issues: Option<usize>,
    pub num_minor_issues: Option<usize>,
    pub num_disagreements: Option<usize>,
    pub num_action_items: Option<usize>,
    pub num_open_questions: Option<usize>,
    pub consensus_confidence: Option<String>,
    /// Percent of major issues backed by at least one evidence excerpt;
    /// `None` unless `major_issues` is present
    pub evidence_coverage: Option<f64>,
    pub validation_passed: Option<bool>,
    pub validation_confidence: Option<f64>,
    pub validation_warnings: Option<usize>,
}

fn evidence_coverage(major: &[Value]) -> f64 {
    if major.is_empty() {
        return 100.0;
    }
    let with_evidence = major
        .iter()
        .filter(|issue| {
            issue
                .get("evidence_excerpts")
                .and_then(Value::as_array)
                .is_some_and(|e| !e.is_empty())
        })
        .count();
    100.0 * with_evidence as f64 / major.len() as f64
}

impl From<&EditorialBrief> for BriefAnalysis {
    fn from(b: &EditorialBrief) -> Self {
        Self {
            manuscript_id: b.id().map(str::to_string),
            title: b
                .manuscript_title
                .present()
                .map(|t| t.chars().take(80).collect()),
            num_major_issues: list_len(&b.major_issues),
            num_minor_issues: list_len(&b.minor_issues),
            num_disagreements: list_len(&b.disagreements),
            num_action_items: list_len(&b.action_checklist),
            num_open_questions: list_len(&b.open_questions),
            consensus_confidence: b.consensus_confidence.present().cloned(),
            evidence_coverage: b.major_issues.present().map(|m| evidence_coverage(m)),
            validation_passed: b.validation_passed.present().copied(),
            validation_confidence: b.confidence_score.present().copied(),
            validation_warnings: list_len(&b.warnings),
        }
    }
}

/// Briefs lacking a usable value for each analysed list (missing or malformed).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisGaps {
    pub major_issues: usize,
    pub minor_issues: usize,
    pub disagreements: usize,
    pub action_checklist: usize,
    pub open_questions: usize,
    pub consensus_confidence: usize,
}

impl AnalysisGaps {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BriefsSummary {
    pub total_briefs: usize,
    /// Totals and averages cover only briefs where the list is present
    pub total_major_issues: usize,
    pub total_minor_issues: usize,
    pub total_disagreements: usize,
    pub total_action_items: usize,
    pub avg_major_issues_per_brief: Option<f64>,
    pub avg_minor_issues_per_brief: Option<f64>,
    pub avg_action_items_per_brief: Option<f64>,
    /// Over briefs with a `major_issues` list; `None` if none have one
    pub avg_evidence_coverage: Option<f64>,
    pub min_evidence_coverage: Option<f64>,
    pub max_evidence_coverage: Option<f64>,
    /// Over briefs that report a validation result; `None` if none do
    pub validation_pass_rate: Option<f64>,
    pub avg_validation_confidence: Option<f64>,
    /// Keyed by consensus confidence; briefs without one are counted in `gaps`
    pub confidence_distribution: BTreeMap<String, usize>,
    pub gaps: AnalysisGaps,
    pub per_brief: Vec<BriefAnalysis>,
}

fn present_counts(per_brief: &[BriefAnalysis], get: impl Fn(&BriefAnalysis) -> Option<usize>) -> (usize, usize, Option<f64>) {
    let counts: Vec<usize> = per_brief.iter().filter_map(get).collect();
    let total: usize = counts.iter().sum();
    let avg = (!counts.is_empty()).then(|| total as f64 / counts.len() as f64);
    (total, per_brief.len() - counts.len(), avg)
}

impl BriefsSummary {
    pub fn compute(briefs: &[EditorialBrief]) -> Self {
        let per_brief: Vec<BriefAnalysis> = briefs.iter().map(BriefAnalysis::from).collect();

        let (total_major_issues, missing_major, avg_major) = present_counts(&per_brief, |a| a.num_major_issues);
        let (total_minor_issues, missing_minor, avg_minor) = present_counts(&per_brief, |a| a.num_minor_issues);
        let (total_disagreements, missing_disagreements, _) = present_counts(&per_brief, |a| a.num_disagreements);
        let (total_action_items, missing_actions, avg_actions) = present_counts(&per_brief, |a| a.num_action_items);
        let (_, missing_questions, _) = present_counts(&per_brief, |a| a.num_open_questions);

        let coverage: Vec<f64> = per_brief.iter().filter_map(|a| a.evidence_coverage).collect();
        let validations: Vec<bool> = per_brief.iter().filter_map(|a| a.validation_passed).collect();
        let confidences: Vec<f64> = per_brief.iter().filter_map(|a| a.validation_confidence).collect();

        let mut confidence_distribution = BTreeMap::new();
        for level in per_brief.iter().filter_map(|a| a.consensus_confidence.as_ref()) {
            *confidence_distribution.entry(level.clone()).or_insert(0) += 1;
        }

        let gaps = AnalysisGaps {
            major_issues: missing_major,
            minor_issues: missing_minor,
            disagreements: missing_disagreements,
            action_checklist: missing_actions,
            open_questions: missing_questions,
            consensus_confidence: per_brief.iter().filter(|a| a.consensus_confidence.is_none()).count(),
        };

        Self {
            total_briefs: per_brief.len(),
            total_major_issues,
            total_minor_issues,
            total_disagreements,
            total_action_items,
            avg_major_issues_per_brief: avg_major,
            avg_minor_issues_per_brief: avg_minor,
            avg_action_items_per_brief: avg_actions,
            avg_evidence_coverage: mean(&coverage),
            min_evidence_coverage: coverage.iter().copied().reduce(f64::min),
            max_evidence_coverage: coverage.iter().copied().reduce(f64::max),
            validation_pass_rate: (!validations.is_empty())
                .then(|| 100.0 * validations.iter().filter(|v| **v).count() as f64 / validations.len() as f64),
            avg_validation_confidence: mean(&confidences),
            confidence_distribution,
            gaps,
            per_brief,
        }
    }

    /// False when no brief carries a major-issues list to measure.
    pub fn meets_evidence_target(&self) -> bool {
        self.avg_evidence_coverage
            .is_some_and(|c| c >= TARGET_EVIDENCE_COVERAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<EditorialBrief> {
        parse_briefs(
            &json!([
                {
                    "manuscript_id": "97433",
                    "manuscript_title": "Alpha",
                    "num_reviews_synthesized": 3,
                    "confidence_score": 80,
                    "validation_passed": true,
                    "consensus_snapshot": {"confidence": "high"},
                    "major_issues": [
                        {"issue": "sample size", "evidence_excerpts": ["n=4"]},
                        {"issue": "controls", "evidence_excerpts": []}
                    ],
                    "minor_issues": ["typo"],
                    "action_checklist": ["add controls", "fix typo"]
                },
                {
                    "manuscript_id": "1-1655",
                    "num_reviews_synthesized": "2",
                    "confidence_score": "90",
                    "validation_passed": false,
                    "consensus_snapshot": {"confidence": "high"}
                },
                {
                    "manuscript_id": "x",
                    "confidence_score": "n/a"
                }
            ])
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_fields_record_their_state() {
        let briefs = sample();
        assert_eq!(briefs[0].confidence_score, BriefField::Present(80.0));
        assert_eq!(briefs[1].num_reviews_synthesized, BriefField::Present(2));
        assert_eq!(briefs[1].manuscript_title, BriefField::Missing);
        assert!(briefs[2].confidence_score.is_invalid());
        assert!(briefs[2].validation_passed.is_missing());
        assert_eq!(briefs[0].consensus_confidence.present().map(String::as_str), Some("high"));
    }

    #[test]
    fn test_stats_skip_missing_values() {
        let stats = BriefStats::compute(&sample());
        assert_eq!(stats.total_briefs, 3);
        assert_eq!(stats.validated, 1);
        assert_eq!(stats.avg_confidence, Some(85.0));
        assert_eq!(stats.total_reviews, 5);
        assert_eq!(stats.missing_confidence, 0);
        assert_eq!(stats.invalid_confidence, 1);
        assert_eq!(stats.missing_validation, 1);
        assert_eq!(stats.missing_review_counts, 1);

        let empty = BriefStats::compute(&[]);
        assert_eq!(empty.avg_confidence, None);
    }

    #[test]
    fn test_summary_matches_briefs() {
        let summary = BriefsSummary::compute(&sample());
        assert_eq!(summary.total_major_issues, 2);
        assert_eq!(summary.total_action_items, 2);
        assert_eq!(summary.per_brief[0].evidence_coverage, Some(50.0));
        assert_eq!(summary.per_brief[1].evidence_coverage, None);
        assert_eq!(summary.avg_evidence_coverage, Some(50.0));
        assert_eq!(summary.min_evidence_coverage, Some(50.0));
        assert_eq!(summary.avg_action_items_per_brief, Some(2.0));
        assert_eq!(summary.validation_pass_rate, Some(50.0));
        assert_eq!(summary.confidence_distribution["high"], 2);
        assert_eq!(summary.gaps.consensus_confidence, 1);
        assert_eq!(summary.gaps.major_issues, 2);
        assert!(!summary.meets_evidence_target());
    }

    #[test]
    fn test_absent_issue_lists_are_gaps_not_zeros() {
        let briefs = parse_briefs(
            r#"[{"manuscript_id": "a"}, {"manuscript_id": "b", "major_issues": "oops", "minor_issues": []}]"#,
        )
        .unwrap();
        let summary = BriefsSummary::compute(&briefs);

        assert_eq!(summary.per_brief[0].num_major_issues, None);
        assert_eq!(summary.per_brief[0].evidence_coverage, None);
        assert_eq!(summary.per_brief[1].evidence_coverage, None);
        assert_eq!(summary.per_brief[1].num_minor_issues, Some(0));
        assert_eq!(summary.avg_evidence_coverage, None);
        assert_eq!(summary.avg_major_issues_per_brief, None);
        assert!(!summary.meets_evidence_target());
        assert_eq!(summary.gaps.major_issues, 2);
        assert_eq!(summary.gaps.minor_issues, 1);
        assert_eq!(summary.gaps.open_questions, 2);

        // One brief with a fully evidenced list is measured on its own.
        let mut briefs = briefs;
        briefs.extend(
            parse_briefs(r#"{"manuscript_id": "c", "major_issues": [{"evidence_excerpts": ["x"]}]}"#).unwrap(),
        );
        let summary = BriefsSummary::compute(&briefs);
        assert_eq!(summary.avg_evidence_coverage, Some(100.0));
        assert!(summary.meets_evidence_target());
        assert_eq!(summary.gaps.major_issues, 2);
    }

    #[test]
    fn test_single_object_and_bad_entries() {
        let one = parse_briefs(r#"{"manuscript_id": "a"}"#).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].id(), Some("a"));

        let err = parse_briefs(r#"[{"manuscript_id": "a"}, 7]"#).unwrap_err();
        assert!(format!("{:#}", err).contains("brief #2"));
        assert!(parse_briefs("not json").is_err());
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_briefs(&tmp.path().join("none.json")).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_briefs_from_async_context() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("editorial_briefs.json");
        assert!(read_briefs(path.clone()).await.unwrap().is_none());
        assert!(read_briefs_raw(path.clone()).await.unwrap().is_none());

        std::fs::write(&path, r#"[{"manuscript_id": "a"}]"#).unwrap();
        let briefs = read_briefs(path.clone()).await.unwrap().unwrap();
        assert_eq!(briefs[0].id(), Some("a"));
        assert_eq!(read_briefs_raw(path).await.unwrap().unwrap(), br#"[{"manuscript_id": "a"}]"#);

        std::fs::write(tmp.path().join("bad.json"), "{").unwrap();
        assert!(read_briefs(tmp.path().join("bad.json")).await.is_err());
    }
}
