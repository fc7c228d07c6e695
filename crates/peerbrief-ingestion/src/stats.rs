//! Summary statistics over a finished collection.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{CollectionMetadata, Manuscript, ReviewSource};

/// Validation issue sets kept verbatim in the summary.
pub const MAX_REPORTED_ISSUES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceBreakdown {
    pub count: usize,
    pub with_reviews: usize,
    pub total_reviews: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub manuscript_id: String,
    pub source: ReviewSource,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDigest {
    pub source: ReviewSource,
    pub attempted: usize,
    pub successful: usize,
    pub failed: usize,
    pub error_count: usize,
}

impl From<&CollectionMetadata> for MetadataDigest {
    fn from(m: &CollectionMetadata) -> Self {
        Self {
            source: m.source,
            attempted: m.num_manuscripts_attempted,
            successful: m.num_manuscripts_successful,
            failed: m.num_manuscripts_failed,
            error_count: m.errors.len(),
        }
    }
}

/// Contents of `summary_statistics.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub collection_timestamp: DateTime<Utc>,
    pub total_manuscripts: usize,
    pub total_reviews: usize,
    pub total_review_words: usize,
    pub avg_reviews_per_manuscript: f64,
    pub avg_words_per_review: f64,
    pub by_source: BTreeMap<ReviewSource, SourceBreakdown>,
    pub manuscripts_with_multiple_reviews: usize,
    pub manuscripts_with_potential_disagreement: usize,
    pub manuscripts_with_validation_issues: usize,
    /// First `MAX_REPORTED_ISSUES` issue sets
    pub validation_issues: Vec<ValidationReport>,
    pub collection_metadata: Vec<MetadataDigest>,
}

impl SummaryStatistics {
    pub fn compute(manuscripts: &[Manuscript], metadata: &[CollectionMetadata]) -> Self {
        let total_reviews: usize = manuscripts.iter().map(|m| m.reviews.len()).sum();
        let total_review_words: usize = manuscripts
            .iter()
            .flat_map(|m| m.reviews.iter())
            .map(|r| r.word_count())
            .sum();

        let mut by_source: BTreeMap<ReviewSource, SourceBreakdown> = BTreeMap::new();
        for m in manuscripts {
            let entry = by_source.entry(m.source).or_default();
            entry.count += 1;
            if !m.reviews.is_empty() {
                entry.with_reviews += 1;
                entry.total_reviews += m.reviews.len();
            }
        }

        let reports: Vec<ValidationReport> = manuscripts
            .iter()
            .filter_map(|m| {
                let issues = m.validate();
                (!issues.is_empty()).then(|| ValidationReport {
                    manuscript_id: m.manuscript_id.clone(),
                    source: m.source,
                    issues,
                })
            })
            .collect();

        Self {
            collection_timestamp: Utc::now(),
            total_manuscripts: manuscripts.len(),
            total_reviews,
            total_review_words,
            avg_reviews_per_manuscript: ratio(total_reviews, manuscripts.len()),
            avg_words_per_review: ratio(total_review_words, total_reviews),
            by_source,
            manuscripts_with_multiple_reviews: manuscripts.iter().filter(|m| m.reviews.len() >= 2).count(),
            manuscripts_with_potential_disagreement: manuscripts.iter().filter(|m| m.has_disagreement()).count(),
            manuscripts_with_validation_issues: reports.len(),
            validation_issues: reports.into_iter().take(MAX_REPORTED_ISSUES).collect(),
            collection_metadata: metadata.iter().map(MetadataDigest::from).collect(),
        }
    }

    pub fn log_summary(&self) {
        info!("═══ COLLECTION SUMMARY ═══");
        info!("Total manuscripts collected: {}", self.total_manuscripts);
        info!("Total reviews: {}", self.total_reviews);
        info!("Average reviews per manuscript: {:.1}", self.avg_reviews_per_manuscript);
        info!("Manuscripts with 2+ reviews: {}", self.manuscripts_with_multiple_reviews);
        info!(
            "Manuscripts with potential disagreements: {}",
            self.manuscripts_with_potential_disagreement
        );
        for (source, stats) in &self.by_source {
            info!("  {}: {} manuscripts, {} reviews", source, stats.count, stats.total_reviews);
        }
        if self.manuscripts_with_validation_issues > 0 {
            warn!(
                "{} manuscripts have validation issues",
                self.manuscripts_with_validation_issues
            );
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionRequest, ManuscriptDraft, ReviewDraft, Reviewer};

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    fn manuscript(id: &str, source: ReviewSource, review_words: &[usize]) -> Manuscript {
        let mut draft = ManuscriptDraft::new(id, source, format!("https://example.org/{id}"), format!("Title {id}"));
        draft.reviews = review_words
            .iter()
            .enumerate()
            .map(|(i, n)| ReviewDraft::new(format!("{id}_review_{i}"), Reviewer::anonymous("r"), words(*n)).finish())
            .collect();
        draft.build()
    }

    #[test]
    fn test_two_manuscripts_averages() {
        let m1 = manuscript("m1", ReviewSource::Elife, &[100, 100]);
        let m2 = manuscript("m2", ReviewSource::Elife, &[]);
        let stats = SummaryStatistics::compute(&[m1, m2], &[]);

        assert_eq!(stats.total_manuscripts, 2);
        assert_eq!(stats.total_reviews, 2);
        assert_eq!(stats.avg_reviews_per_manuscript, 1.0);
        assert_eq!(stats.total_review_words, 200);
        assert_eq!(stats.avg_words_per_review, 100.0);
        assert_eq!(stats.manuscripts_with_multiple_reviews, 1);
        assert_eq!(stats.manuscripts_with_validation_issues, 1);
        assert_eq!(stats.validation_issues[0].manuscript_id, "m2");

        let elife = &stats.by_source[&ReviewSource::Elife];
        assert_eq!(elife.count, 2);
        assert_eq!(elife.with_reviews, 1);
        assert_eq!(elife.total_reviews, 2);
    }

    #[test]
    fn test_empty_collection() {
        let stats = SummaryStatistics::compute(&[], &[]);
        assert_eq!(stats.avg_reviews_per_manuscript, 0.0);
        assert_eq!(stats.avg_words_per_review, 0.0);
        assert!(stats.by_source.is_empty());
    }

    #[test]
    fn test_issue_list_is_capped() {
        let manuscripts: Vec<Manuscript> = (0..12)
            .map(|i| manuscript(&format!("m{i}"), ReviewSource::F1000Research, &[]))
            .collect();
        let stats = SummaryStatistics::compute(&manuscripts, &[]);
        assert_eq!(stats.manuscripts_with_validation_issues, 12);
        assert_eq!(stats.validation_issues.len(), MAX_REPORTED_ISSUES);
    }

    #[test]
    fn test_metadata_digest_and_json_keys() {
        let mut meta = CollectionMetadata::start(ReviewSource::F1000Research, CollectionRequest::default());
        meta.record_attempt();
        meta.record_failure("1-1655", "timeout");
        let stats = SummaryStatistics::compute(&[manuscript("x", ReviewSource::F1000Research, &[60])], &[meta]);

        assert_eq!(stats.collection_metadata[0].failed, 1);
        assert_eq!(stats.collection_metadata[0].error_count, 1);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["by_source"]["f1000research"]["count"], 1);
        let back: SummaryStatistics = serde_json::from_value(json).unwrap();
        assert_eq!(back, stats);
    }
}
