//! Detailed report over a finished collection run.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::models::{CollectionMetadata, Manuscript, ReviewSource};
use crate::output::{load_manuscripts, load_metadata, load_summary};
use crate::stats::SummaryStatistics;

/// Reviews at or above this many words count as substantial.
pub const SUBSTANTIAL_REVIEW_WORDS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordCountDistribution {
    pub min: usize,
    pub max: usize,
    pub median: usize,
    pub average: f64,
}

impl WordCountDistribution {
    /// `None` for an empty sample.
    pub fn from_counts(counts: &[usize]) -> Option<Self> {
        if counts.is_empty() {
            return None;
        }
        let mut sorted = counts.to_vec();
        sorted.sort_unstable();
        Some(Self {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median: sorted[sorted.len() / 2],
            average: sorted.iter().sum::<usize>() as f64 / sorted.len() as f64,
        })
    }
}

/// Review length buckets: <100, 100–499 and 500+ words.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LengthCategories {
    pub short: usize,
    pub medium: usize,
    pub long: usize,
}

impl LengthCategories {
    pub fn from_counts(counts: &[usize]) -> Self {
        let mut cats = Self::default();
        for &w in counts {
            match w {
                0..=99 => cats.short += 1,
                100..=499 => cats.medium += 1,
                _ => cats.long += 1,
            }
        }
        cats
    }
}

/// How usable the run is for synthesis experiments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// At least 70% of manuscripts have 2+ reviews
    Excellent,
    /// At least 50%
    Good,
    Marginal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManuscriptDigest {
    pub manuscript_id: String,
    pub title: String,
    pub doi: Option<String>,
    pub reviews: usize,
    pub authors: usize,
    pub recommendations: BTreeMap<String, usize>,
    pub word_counts: Option<WordCountDistribution>,
    pub named_reviewers: usize,
}

impl From<&Manuscript> for ManuscriptDigest {
    fn from(m: &Manuscript) -> Self {
        let counts: Vec<usize> = m.reviews.iter().map(|r| r.word_count()).collect();
        Self {
            manuscript_id: m.manuscript_id.clone(),
            title: m.title.clone(),
            doi: m.doi.clone(),
            reviews: m.reviews.len(),
            authors: m.authors.len(),
            recommendations: count_recommendations(std::slice::from_ref(m)),
            word_counts: WordCountDistribution::from_counts(&counts),
            named_reviewers: m.reviews.iter().filter(|r| !r.reviewer.is_anonymous()).count(),
        }
    }
}

/// Attempt and failure counts for one source pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceAttempts {
    pub source: ReviewSource,
    pub attempted: usize,
    pub successful: usize,
    pub failed: usize,
    /// `article_id: error` for each failure
    pub errors: Vec<String>,
    pub duration_secs: Option<i64>,
}

impl From<&CollectionMetadata> for SourceAttempts {
    fn from(meta: &CollectionMetadata) -> Self {
        Self {
            source: meta.source,
            attempted: meta.num_manuscripts_attempted,
            successful: meta.num_manuscripts_successful,
            failed: meta.num_manuscripts_failed,
            errors: meta.errors.iter().map(|e| format!("{}: {}", e.article_id, e.error)).collect(),
            duration_secs: meta.end_time.map(|end| (end - meta.start_time).num_seconds()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionReport {
    pub summary: SummaryStatistics,
    pub sources: Vec<SourceAttempts>,
    pub manuscripts: Vec<ManuscriptDigest>,
    pub total_reviews: usize,
    pub word_counts: Option<WordCountDistribution>,
    pub length_categories: LengthCategories,
    pub anonymous_reviews: usize,
    pub named_reviews: usize,
    /// Most common first
    pub recommendations: Vec<(String, usize)>,
    pub multi_review_manuscripts: usize,
    pub substantial_reviews: usize,
    pub readiness: Readiness,
}

impl CollectionReport {
    /// Load the summary, manuscripts and collection metadata of a run.
    pub fn from_run(run_dir: &Path) -> anyhow::Result<Self> {
        let summary = load_summary(run_dir)?;
        let manuscripts = load_manuscripts(run_dir)?;
        let metadata = load_metadata(run_dir)?;
        Ok(Self::build(summary, &manuscripts, &metadata))
    }

    pub fn build(summary: SummaryStatistics, manuscripts: &[Manuscript], metadata: &[CollectionMetadata]) -> Self {
        let counts: Vec<usize> = manuscripts
            .iter()
            .flat_map(|m| m.reviews.iter())
            .map(|r| r.word_count())
            .collect();
        let anonymous_reviews = manuscripts
            .iter()
            .flat_map(|m| m.reviews.iter())
            .filter(|r| r.reviewer.is_anonymous())
            .count();

        let mut recommendations: Vec<(String, usize)> =
            count_recommendations(manuscripts).into_iter().collect();
        recommendations.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let multi_review_manuscripts = manuscripts.iter().filter(|m| m.reviews.len() >= 2).count();
        let readiness = if multi_review_manuscripts as f64 >= manuscripts.len() as f64 * 0.7 {
            Readiness::Excellent
        } else if multi_review_manuscripts as f64 >= manuscripts.len() as f64 * 0.5 {
            Readiness::Good
        } else {
            Readiness::Marginal
        };

        Self {
            summary,
            sources: metadata.iter().map(SourceAttempts::from).collect(),
            manuscripts: manuscripts.iter().map(ManuscriptDigest::from).collect(),
            total_reviews: counts.len(),
            word_counts: WordCountDistribution::from_counts(&counts),
            length_categories: LengthCategories::from_counts(&counts),
            anonymous_reviews,
            named_reviews: counts.len() - anonymous_reviews,
            recommendations,
            multi_review_manuscripts,
            substantial_reviews: counts.iter().filter(|&&w| w >= SUBSTANTIAL_REVIEW_WORDS).count(),
            readiness,
        }
    }

    pub fn log_report(&self) {
        let s = &self.summary;
        info!("═══ PEER REVIEW DATA COLLECTION ANALYSIS ═══");
        info!("📊 Total manuscripts: {}", s.total_manuscripts);
        info!("📊 Total reviews: {} ({} words)", s.total_reviews, s.total_review_words);
        info!("📊 Avg reviews per manuscript: {:.1}", s.avg_reviews_per_manuscript);
        info!("📊 Avg words per review: {:.1}", s.avg_words_per_review);

        for (source, stats) in &s.by_source {
            info!(
                "📚 {}: {} manuscripts, {} reviews",
                source.display_name(),
                stats.count,
                stats.total_reviews
            );
        }

        for pass in &self.sources {
            info!(
                "🌐 {}: attempted={} successful={} failed={}{}",
                pass.source.display_name(),
                pass.attempted,
                pass.successful,
                pass.failed,
                pass.duration_secs.map(|s| format!(" in {}s", s)).unwrap_or_default()
            );
            for err in &pass.errors {
                warn!("   ✗ {}", err);
            }
        }

        for (i, m) in self.manuscripts.iter().enumerate() {
            info!(
                "📄 [{}] {} ({}) reviews={} authors={} named_reviewers={}",
                i + 1,
                m.title.chars().take(70).collect::<String>(),
                m.manuscript_id,
                m.reviews,
                m.authors,
                m.named_reviewers
            );
        }

        if let Some(dist) = &self.word_counts {
            info!(
                "🔍 Review length: min={} max={} median={} avg={:.0}",
                dist.min, dist.max, dist.median, dist.average
            );
        }
        let total = self.total_reviews.max(1) as f64;
        let c = &self.length_categories;
        info!(
            "🔍 Short (<100): {} ({:.1}%), medium (100-499): {} ({:.1}%), long (500+): {} ({:.1}%)",
            c.short,
            100.0 * c.short as f64 / total,
            c.medium,
            100.0 * c.medium as f64 / total,
            c.long,
            100.0 * c.long as f64 / total
        );
        info!("👤 Anonymous: {}, named: {}", self.anonymous_reviews, self.named_reviews);
        for (rec, count) in &self.recommendations {
            info!("✅ {}: {}", rec, count);
        }
        info!(
            "🎯 Multi-review manuscripts: {}/{}, substantial reviews ({}+ words): {}/{}, readiness: {:?}",
            self.multi_review_manuscripts,
            self.manuscripts.len(),
            SUBSTANTIAL_REVIEW_WORDS,
            self.substantial_reviews,
            self.total_reviews,
            self.readiness
        );
    }
}

fn count_recommendations(manuscripts: &[Manuscript]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for rec in manuscripts
        .iter()
        .flat_map(|m| m.reviews.iter())
        .filter_map(|r| r.recommendation.as_deref())
        .filter(|r| !r.is_empty())
    {
        *counts.entry(rec.to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionRequest, ManuscriptDraft, ReviewDraft, Reviewer};

    fn manuscript(id: &str, reviews: &[(usize, Option<&str>, bool)]) -> Manuscript {
        let mut draft = ManuscriptDraft::new(id, ReviewSource::F1000Research, "u", id);
        draft.reviews = reviews
            .iter()
            .enumerate()
            .map(|(i, (words, rec, named))| {
                let reviewer = if *named {
                    Reviewer::named(format!("r{i}"), "Named Person")
                } else {
                    Reviewer::anonymous(format!("r{i}"))
                };
                let mut d = ReviewDraft::new(format!("{id}_{i}"), reviewer, vec!["w"; *words].join(" "));
                d.recommendation = rec.map(str::to_string);
                d.finish()
            })
            .collect();
        draft.build()
    }

    #[test]
    fn test_distribution_and_categories() {
        let dist = WordCountDistribution::from_counts(&[500, 50, 150]).unwrap();
        assert_eq!((dist.min, dist.max, dist.median), (50, 500, 150));
        assert!((dist.average - 233.333).abs() < 0.01);
        assert!(WordCountDistribution::from_counts(&[]).is_none());

        let cats = LengthCategories::from_counts(&[99, 100, 499, 500]);
        assert_eq!(cats, LengthCategories { short: 1, medium: 2, long: 1 });
    }

    #[test]
    fn test_report_counts() {
        let manuscripts = vec![
            manuscript("a", &[(250, Some("approved"), true), (80, Some("not_approved"), false)]),
            manuscript("b", &[(600, Some("approved"), true)]),
        ];
        let summary = SummaryStatistics::compute(&manuscripts, &[]);
        let report = CollectionReport::build(summary, &manuscripts, &[]);

        assert_eq!(report.total_reviews, 3);
        assert_eq!(report.named_reviews, 2);
        assert_eq!(report.anonymous_reviews, 1);
        assert_eq!(report.recommendations[0], ("approved".to_string(), 2));
        assert_eq!(report.substantial_reviews, 2);
        assert_eq!(report.multi_review_manuscripts, 1);
        assert_eq!(report.readiness, Readiness::Good);
        assert_eq!(report.manuscripts[0].recommendations.len(), 2);
    }

    #[test]
    fn test_from_run_reads_files() {
        let tmp = tempfile::tempdir().unwrap();
        let manuscripts = vec![manuscript("a", &[(120, None, false)])];
        let summary = SummaryStatistics::compute(&manuscripts, &[]);
        crate::output::write_json(&tmp.path().join(crate::output::SUMMARY_FILE), &summary).unwrap();
        crate::output::write_json(&tmp.path().join(crate::output::ALL_MANUSCRIPTS_FILE), &manuscripts).unwrap();

        let mut meta = CollectionMetadata::start(ReviewSource::F1000Research, CollectionRequest::default());
        for _ in 0..3 {
            meta.record_attempt();
        }
        meta.record_success();
        meta.record_success();
        meta.record_failure("1-2345", "HTTP 503");
        meta.finish();
        crate::output::write_json(&tmp.path().join(crate::output::METADATA_FILE), &vec![meta]).unwrap();

        let report = CollectionReport::from_run(tmp.path()).unwrap();
        assert_eq!(report.total_reviews, 1);
        assert_eq!(report.length_categories.medium, 1);
        assert_eq!(report.readiness, Readiness::Marginal);

        assert_eq!(report.sources.len(), 1);
        let pass = &report.sources[0];
        assert_eq!(pass.source, ReviewSource::F1000Research);
        assert_eq!((pass.attempted, pass.successful, pass.failed), (3, 2, 1));
        assert_eq!(pass.errors, vec!["1-2345: HTTP 503".to_string()]);
        assert!(pass.duration_secs.is_some());
    }

    #[test]
    fn test_from_run_requires_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let summary = SummaryStatistics::compute(&[], &[]);
        crate::output::write_json(&tmp.path().join(crate::output::SUMMARY_FILE), &summary).unwrap();
        crate::output::write_json(&tmp.path().join(crate::output::ALL_MANUSCRIPTS_FILE), &Vec::<Manuscript>::new()).unwrap();
        assert!(CollectionReport::from_run(tmp.path()).is_err());
    }
}
