//! Record schema for collected peer-review data.
//!
//! Every platform collector produces the same shapes. Derived fields
//! (`word_count`, `num_reviews`, `is_anonymous`) are computed when a draft is
//! finalized and again whenever a record is decoded, so they can never drift
//! from the data they summarize.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reviews shorter than this (after trimming) are flagged by `validate()`.
pub const MIN_REVIEW_CHARS: usize = 50;

// ── Enumerations ──────────────────────────────────────────────────────────────

/// Platform a manuscript was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReviewSource {
    #[serde(rename = "elife")]
    Elife,
    #[serde(rename = "f1000research")]
    F1000Research,
    #[serde(rename = "biorxiv")]
    Biorxiv,
    #[serde(rename = "other")]
    Other,
}

impl ReviewSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewSource::Elife         => "elife",
            ReviewSource::F1000Research => "f1000research",
            ReviewSource::Biorxiv       => "biorxiv",
            ReviewSource::Other         => "other",
        }
    }

    /// Human-readable platform name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ReviewSource::Elife         => "eLife",
            ReviewSource::F1000Research => "F1000Research",
            ReviewSource::Biorxiv       => "bioRxiv",
            ReviewSource::Other         => "Other",
        }
    }
}

impl fmt::Display for ReviewSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editorial decision. eLife publishes assessments instead of decisions,
/// hence `NoDecision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Accept,
    Reject,
    Revise,
    #[default]
    Pending,
    NoDecision,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewDecision::Accept     => "accept",
            ReviewDecision::Reject     => "reject",
            ReviewDecision::Revise     => "revise",
            ReviewDecision::Pending    => "pending",
            ReviewDecision::NoDecision => "no_decision",
        }
    }
}

// ── Reviewer ──────────────────────────────────────────────────────────────────

/// A reviewer. Anonymous exactly when no (non-blank) name is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawReviewer")]
pub struct Reviewer {
    reviewer_id: String,
    name: Option<String>,
    affiliation: Option<String>,
    is_anonymous: bool,
}

#[derive(Deserialize)]
struct RawReviewer {
    reviewer_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    affiliation: Option<String>,
}

impl From<RawReviewer> for Reviewer {
    fn from(raw: RawReviewer) -> Self {
        Reviewer::new(raw.reviewer_id, raw.name, raw.affiliation)
    }
}

impl Reviewer {
    pub fn new(
        reviewer_id: impl Into<String>,
        name: Option<String>,
        affiliation: Option<String>,
    ) -> Self {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let affiliation = affiliation
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        Self {
            reviewer_id: reviewer_id.into(),
            is_anonymous: name.is_none(),
            name,
            affiliation,
        }
    }

    pub fn anonymous(reviewer_id: impl Into<String>) -> Self {
        Self::new(reviewer_id, None, None)
    }

    pub fn named(reviewer_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(reviewer_id, Some(name.into()), None)
    }

    pub fn reviewer_id(&self) -> &str {
        &self.reviewer_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn affiliation(&self) -> Option<&str> {
        self.affiliation.as_deref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.is_anonymous
    }
}

// ── Review ────────────────────────────────────────────────────────────────────

fn default_version() -> u32 { 1 }

/// Everything a collector knows about a review before it is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub review_id: String,
    pub reviewer: Reviewer,
    pub review_text: String,
    /// Open vocabulary, e.g. "approved", "major revisions"
    #[serde(default)]
    pub recommendation: Option<String>,
    #[serde(default)]
    pub date_submitted: Option<String>,
    #[serde(default = "default_version")]
    pub version_reviewed: u32,

    // Structured extractions, rarely populated
    #[serde(default)]
    pub strengths: Option<Vec<String>>,
    #[serde(default)]
    pub weaknesses: Option<Vec<String>>,
    #[serde(default)]
    pub major_issues: Option<Vec<String>>,
    #[serde(default)]
    pub minor_issues: Option<Vec<String>>,
    #[serde(default)]
    pub confidence_score: Option<String>,
}

impl ReviewDraft {
    pub fn new(review_id: impl Into<String>, reviewer: Reviewer, review_text: impl Into<String>) -> Self {
        Self {
            review_id: review_id.into(),
            reviewer,
            review_text: review_text.into(),
            recommendation: None,
            date_submitted: None,
            version_reviewed: 1,
            strengths: None,
            weaknesses: None,
            major_issues: None,
            minor_issues: None,
            confidence_score: None,
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    /// Freeze the draft, computing its word count.
    pub fn finish(self) -> Review {
        Review::from(self)
    }
}

/// A finalized review. Read access to the draft fields goes through `Deref`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ReviewDraft")]
pub struct Review {
    #[serde(flatten)]
    draft: ReviewDraft,
    word_count: usize,
}

impl From<ReviewDraft> for Review {
    fn from(draft: ReviewDraft) -> Self {
        let word_count = draft.review_text.split_whitespace().count();
        Self { draft, word_count }
    }
}

impl Deref for Review {
    type Target = ReviewDraft;

    fn deref(&self) -> &ReviewDraft {
        &self.draft
    }
}

impl Review {
    pub fn word_count(&self) -> usize {
        self.word_count
    }
}

// ── Author responses / editorial assessments ─────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorResponse {
    pub response_id: String,
    pub response_text: String,
    #[serde(default)]
    pub date_submitted: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
}

/// Editorial summary (eLife assessment). Tags come from an open vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorialAssessment {
    pub assessment_id: String,
    pub assessment_text: String,
    /// e.g. "landmark", "important", "useful"
    #[serde(default)]
    pub significance: Option<String>,
    /// e.g. "exceptional", "solid", "inadequate"
    #[serde(default)]
    pub strength_of_evidence: Option<String>,
    #[serde(default)]
    pub date_submitted: Option<String>,
}

// ── Manuscript ────────────────────────────────────────────────────────────────

fn default_rounds() -> u32 { 1 }

/// Mutable builder for a `Manuscript`. Collectors fill this in and call
/// `build()` once every field they could extract is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManuscriptDraft {
    pub manuscript_id: String,
    pub source: ReviewSource,
    pub source_url: String,
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub subject_areas: Vec<String>,

    #[serde(default)]
    pub preprint_date: Option<String>,
    #[serde(default)]
    pub submission_date: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,

    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub preprint_doi: Option<String>,

    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub author_responses: Vec<AuthorResponse>,
    #[serde(default)]
    pub editorial_assessments: Vec<EditorialAssessment>,

    #[serde(default)]
    pub decision: ReviewDecision,
    #[serde(default)]
    pub decision_date: Option<String>,
    #[serde(default = "default_rounds")]
    pub review_rounds: u32,

    #[serde(default = "Utc::now")]
    pub collection_date: DateTime<Utc>,
    /// Free-form provenance data from the collector
    #[serde(default)]
    pub raw_data: serde_json::Map<String, serde_json::Value>,
}

impl ManuscriptDraft {
    pub fn new(
        manuscript_id: impl Into<String>,
        source: ReviewSource,
        source_url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            manuscript_id: manuscript_id.into(),
            source,
            source_url: source_url.into(),
            title: title.into(),
            abstract_text: None,
            authors: Vec::new(),
            keywords: Vec::new(),
            subject_areas: Vec::new(),
            preprint_date: None,
            submission_date: None,
            publication_date: None,
            doi: None,
            preprint_doi: None,
            reviews: Vec::new(),
            author_responses: Vec::new(),
            editorial_assessments: Vec::new(),
            decision: ReviewDecision::default(),
            decision_date: None,
            review_rounds: 1,
            collection_date: Utc::now(),
            raw_data: serde_json::Map::new(),
        }
    }

    /// Freeze the draft into an immutable manuscript.
    pub fn build(self) -> Manuscript {
        Manuscript::from(self)
    }
}

/// One article plus all of its review material. Immutable once built;
/// fields are readable through `Deref<Target = ManuscriptDraft>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ManuscriptDraft")]
pub struct Manuscript {
    #[serde(flatten)]
    draft: ManuscriptDraft,
    num_reviews: usize,
}

impl From<ManuscriptDraft> for Manuscript {
    fn from(draft: ManuscriptDraft) -> Self {
        let num_reviews = draft.reviews.len();
        Self { draft, num_reviews }
    }
}

impl Deref for Manuscript {
    type Target = ManuscriptDraft;

    fn deref(&self) -> &ManuscriptDraft {
        &self.draft
    }
}

/// Per-manuscript review aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub total_reviews: usize,
    pub anonymous_reviews: usize,
    pub named_reviews: usize,
    pub total_words: usize,
    pub avg_words_per_review: f64,
    pub has_author_response: bool,
    pub has_editorial_assessment: bool,
}

impl Manuscript {
    pub fn num_reviews(&self) -> usize {
        self.num_reviews
    }

    /// `<source>_<manuscript_id>`, used for per-manuscript file names.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.source.as_str(), self.manuscript_id)
    }

    /// True when reviewers gave more than one distinct recommendation.
    pub fn has_disagreement(&self) -> bool {
        let labels: BTreeSet<&str> = self
            .reviews
            .iter()
            .filter_map(|r| r.recommendation.as_deref())
            .filter(|r| !r.is_empty())
            .collect();
        labels.len() > 1
    }

    /// Human-readable data-quality issues. Empty means the record looks complete.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.manuscript_id.trim().is_empty() {
            issues.push("Missing manuscript_id".to_string());
        }
        if self.title.trim().is_empty() {
            issues.push("Missing title".to_string());
        }
        if self.source_url.trim().is_empty() {
            issues.push("Missing source_url".to_string());
        }
        if self.reviews.is_empty() {
            issues.push("No reviews found".to_string());
        }

        for (i, review) in self.reviews.iter().enumerate() {
            if review.review_text.trim().chars().count() < MIN_REVIEW_CHARS {
                issues.push(format!(
                    "Review {} has insufficient text (< {} chars)",
                    i + 1,
                    MIN_REVIEW_CHARS
                ));
            }
        }

        issues
    }

    pub fn review_summary(&self) -> ReviewSummary {
        let total_reviews = self.reviews.len();
        let anonymous_reviews = self
            .reviews
            .iter()
            .filter(|r| r.reviewer.is_anonymous())
            .count();
        let total_words: usize = self.reviews.iter().map(|r| r.word_count()).sum();

        ReviewSummary {
            total_reviews,
            anonymous_reviews,
            named_reviews: total_reviews - anonymous_reviews,
            total_words,
            avg_words_per_review: if total_reviews > 0 {
                total_words as f64 / total_reviews as f64
            } else {
                0.0
            },
            has_author_response: !self.author_responses.is_empty(),
            has_editorial_assessment: !self.editorial_assessments.is_empty(),
        }
    }
}

// ── Collection metadata ───────────────────────────────────────────────────────

/// One failed item in a collection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionError {
    pub article_id: String,
    pub error: String,
}

/// The request that started a collection pass, recorded for provenance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRequest {
    pub num_manuscripts: usize,
    #[serde(default)]
    pub subject_areas: Vec<String>,
    #[serde(default)]
    pub start_date: Option<String>,
}

/// Bookkeeping for one (run, source) collection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub collection_id: String,
    pub source: ReviewSource,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub num_manuscripts_attempted: usize,
    #[serde(default)]
    pub num_manuscripts_successful: usize,
    #[serde(default)]
    pub num_manuscripts_failed: usize,
    #[serde(default)]
    pub errors: Vec<CollectionError>,
    #[serde(default)]
    pub config: CollectionRequest,
}

impl CollectionMetadata {
    pub fn start(source: ReviewSource, request: CollectionRequest) -> Self {
        let start_time = Utc::now();
        Self {
            collection_id: format!("{}_{}", source.as_str(), start_time.format("%Y%m%d_%H%M%S")),
            source,
            start_time,
            end_time: None,
            num_manuscripts_attempted: 0,
            num_manuscripts_successful: 0,
            num_manuscripts_failed: 0,
            errors: Vec::new(),
            config: request,
        }
    }

    pub fn record_attempt(&mut self) {
        self.num_manuscripts_attempted += 1;
    }

    pub fn record_success(&mut self) {
        self.num_manuscripts_successful += 1;
    }

    pub fn record_failure(&mut self, article_id: impl Into<String>, error: impl Into<String>) {
        self.num_manuscripts_failed += 1;
        self.errors.push(CollectionError {
            article_id: article_id.into(),
            error: error.into(),
        });
    }

    /// Stamp the end time. Later calls keep the first stamp.
    pub fn finish(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
