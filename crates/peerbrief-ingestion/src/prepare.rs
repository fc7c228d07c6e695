//! Synthesis-pipeline input preparation.
//!
//! Flattens a run's manuscripts into one record per review (carrying the
//! manuscript context each review needs on its own) and writes
//! `reviews.json` plus a `manuscripts.json` context file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{Manuscript, ReviewSource};
use crate::output::{load_manuscripts, write_json};

pub const REVIEWS_FILE: &str = "reviews.json";
pub const MANUSCRIPTS_FILE: &str = "manuscripts.json";

/// One review with its manuscript context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub manuscript_id: String,
    pub manuscript_title: String,
    pub manuscript_abstract: Option<String>,
    pub manuscript_doi: Option<String>,

    pub review_id: String,
    pub reviewer_id: String,
    pub reviewer_name: Option<String>,
    pub reviewer_affiliation: Option<String>,
    pub is_anonymous: bool,

    pub review_text: String,
    pub word_count: usize,
    pub recommendation: Option<String>,
    pub version: u32,
}

/// Manuscript-level reference data for the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManuscriptContext {
    pub manuscript_id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub doi: Option<String>,
    pub authors: Vec<String>,
    pub num_reviews: usize,
    pub source: ReviewSource,
    pub source_url: String,
}

impl From<&Manuscript> for ManuscriptContext {
    fn from(m: &Manuscript) -> Self {
        Self {
            manuscript_id: m.manuscript_id.clone(),
            title: m.title.clone(),
            abstract_text: m.abstract_text.clone(),
            doi: m.doi.clone(),
            authors: m.authors.clone(),
            num_reviews: m.num_reviews(),
            source: m.source,
            source_url: m.source_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrepareSummary {
    pub run_dir: PathBuf,
    pub manuscripts: usize,
    pub reviews: usize,
    pub avg_reviews_per_manuscript: f64,
    pub min_word_count: Option<usize>,
    pub max_word_count: Option<usize>,
    pub reviews_path: PathBuf,
    pub manuscripts_path: PathBuf,
}

pub fn flatten_reviews(manuscripts: &[Manuscript]) -> Vec<ReviewRecord> {
    manuscripts
        .iter()
        .flat_map(|m| {
            m.reviews.iter().map(move |r| ReviewRecord {
                manuscript_id: m.manuscript_id.clone(),
                manuscript_title: m.title.clone(),
                manuscript_abstract: m.abstract_text.clone(),
                manuscript_doi: m.doi.clone(),
                review_id: r.review_id.clone(),
                reviewer_id: r.reviewer.reviewer_id().to_string(),
                reviewer_name: r.reviewer.name().map(str::to_string),
                reviewer_affiliation: r.reviewer.affiliation().map(str::to_string),
                is_anonymous: r.reviewer.is_anonymous(),
                review_text: r.review_text.clone(),
                word_count: r.word_count(),
                recommendation: r.recommendation.clone(),
                version: r.version_reviewed,
            })
        })
        .collect()
}

/// Read `all_manuscripts.json` from `run_dir` and write the pipeline input
/// files into `output_dir`.
pub fn prepare_run(run_dir: &Path, output_dir: &Path) -> anyhow::Result<PrepareSummary> {
    let manuscripts = load_manuscripts(run_dir)
        .with_context(|| format!("loading manuscripts from {}", run_dir.display()))?;
    info!("Loaded {} manuscripts from {}", manuscripts.len(), run_dir.display());

    let records = flatten_reviews(&manuscripts);
    let contexts: Vec<ManuscriptContext> = manuscripts.iter().map(ManuscriptContext::from).collect();

    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let reviews_path = output_dir.join(REVIEWS_FILE);
    let manuscripts_path = output_dir.join(MANUSCRIPTS_FILE);
    write_json(&reviews_path, &records)?;
    write_json(&manuscripts_path, &contexts)?;

    let summary = PrepareSummary {
        run_dir: run_dir.to_path_buf(),
        manuscripts: manuscripts.len(),
        reviews: records.len(),
        avg_reviews_per_manuscript: if manuscripts.is_empty() {
            0.0
        } else {
            records.len() as f64 / manuscripts.len() as f64
        },
        min_word_count: records.iter().map(|r| r.word_count).min(),
        max_word_count: records.iter().map(|r| r.word_count).max(),
        reviews_path,
        manuscripts_path,
    };

    info!(
        manuscripts = summary.manuscripts,
        reviews = summary.reviews,
        "✅ Input preparation complete: {:.1} reviews per manuscript",
        summary.avg_reviews_per_manuscript
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ManuscriptDraft, ReviewDraft, Reviewer};
    use crate::output::{write_json, ALL_MANUSCRIPTS_FILE};

    fn sample() -> Vec<Manuscript> {
        let mut a = ManuscriptDraft::new("97433", ReviewSource::Elife, "https://elifesciences.org/x", "Alpha");
        a.doi = Some("10.7554/eLife.97433".to_string());
        a.reviews = vec![
            ReviewDraft::new("97433_review_1", Reviewer::anonymous("97433_reviewer_1"), "one two three").finish(),
            ReviewDraft::new("97433_review_2", Reviewer::named("97433_reviewer_2", "Jane Roe"), "one two three four five")
                .with_recommendation("approved")
                .finish(),
        ];
        let b = ManuscriptDraft::new("1-1655", ReviewSource::F1000Research, "https://f1000research.com/x", "Beta");
        vec![a.build(), b.build()]
    }

    #[test]
    fn test_flatten_carries_context() {
        let records = flatten_reviews(&sample());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].manuscript_title, "Alpha");
        assert_eq!(records[0].manuscript_doi.as_deref(), Some("10.7554/eLife.97433"));
        assert!(records[0].is_anonymous);
        assert_eq!(records[1].reviewer_name.as_deref(), Some("Jane Roe"));
        assert_eq!(records[1].recommendation.as_deref(), Some("approved"));
        assert_eq!(records[1].word_count, 5);
    }

    #[test]
    fn test_prepare_run_writes_inputs() {
        let run = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_json(&run.path().join(ALL_MANUSCRIPTS_FILE), &sample()).unwrap();

        let summary = prepare_run(run.path(), &out.path().join("input")).unwrap();
        assert_eq!(summary.manuscripts, 2);
        assert_eq!(summary.reviews, 2);
        assert_eq!(summary.avg_reviews_per_manuscript, 1.0);
        assert_eq!(summary.min_word_count, Some(3));
        assert_eq!(summary.max_word_count, Some(5));

        let contexts: Vec<ManuscriptContext> =
            crate::output::read_json(&summary.manuscripts_path).unwrap();
        assert_eq!(contexts[1].num_reviews, 0);
        assert_eq!(contexts[1].source, ReviewSource::F1000Research);
    }

    #[test]
    fn test_prepare_run_missing_input_is_error() {
        let run = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        assert!(prepare_run(run.path(), out.path()).is_err());
    }
}
