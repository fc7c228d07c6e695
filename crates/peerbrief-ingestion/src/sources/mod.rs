//! Peer-review platform collectors.

pub mod elife;
pub mod f1000;

use std::time::Duration;

use async_trait::async_trait;
use peerbrief_common::CollectionFilters;
use tracing::{info, warn};

use crate::models::{CollectionMetadata, CollectionRequest, Manuscript, ReviewSource};

pub use elife::ElifeCollector;
pub use f1000::F1000Collector;

/// Fewer discovered candidates than this triggers the known-good fallback list.
pub const MIN_DISCOVERED: usize = 5;

/// A candidate article found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRef {
    pub id: String,
    /// Page URL when discovery found one; collectors derive it otherwise.
    pub url: Option<String>,
}

impl ArticleRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), url: None }
    }

    pub fn with_url(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self { id: id.into(), url: Some(url.into()) }
    }
}

/// Output of one collector pass.
#[derive(Debug, Clone)]
pub struct CollectionBatch {
    pub manuscripts: Vec<Manuscript>,
    pub metadata: CollectionMetadata,
}

/// Common interface for all review platform collectors.
#[async_trait]
pub trait ReviewCollector: Send + Sync {
    fn source(&self) -> ReviewSource;

    /// Pause between consecutive item fetches.
    fn rate_limit(&self) -> Duration;

    /// Find candidate articles, most recent first.
    async fn discover(
        &self,
        count: usize,
        filters: &CollectionFilters,
    ) -> anyhow::Result<Vec<ArticleRef>>;

    /// Fetch and parse one article with all of its review material.
    async fn collect_single(&self, article: &ArticleRef) -> anyhow::Result<Manuscript>;

    /// Collect up to `count` manuscripts, one at a time.
    ///
    /// Item failures are recorded in the returned metadata and never abort the
    /// pass; `Err` means the source as a whole could not be collected.
    async fn collect(
        &self,
        count: usize,
        filters: &CollectionFilters,
    ) -> anyhow::Result<CollectionBatch> {
        let source = self.source();
        let mut metadata = CollectionMetadata::start(
            source,
            CollectionRequest {
                num_manuscripts: count,
                subject_areas: filters.subject_areas.clone(),
                start_date: filters.start_date.clone(),
            },
        );

        let articles = self.discover(count, filters).await?;
        info!(source = %source, candidates = articles.len(), "Found article IDs to process");

        let delay = self.rate_limit();
        let targets: Vec<&ArticleRef> = articles.iter().take(count).collect();
        let mut manuscripts = Vec::with_capacity(targets.len());

        for (i, article) in targets.iter().enumerate() {
            info!("Processing article {}/{}: {}", i + 1, targets.len(), article.id);
            metadata.record_attempt();

            match self.collect_single(article).await {
                Ok(manuscript) => {
                    let issues = manuscript.validate();
                    if !issues.is_empty() {
                        warn!("Validation issues for {}: {:?}", article.id, issues);
                    }
                    info!(
                        "Successfully collected {} with {} reviews",
                        article.id,
                        manuscript.num_reviews()
                    );
                    metadata.record_success();
                    manuscripts.push(manuscript);
                }
                Err(e) => {
                    warn!("Error processing {}: {:#}", article.id, e);
                    metadata.record_failure(&article.id, format!("{:#}", e));
                }
            }

            if i + 1 < targets.len() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        metadata.finish();
        Ok(CollectionBatch { manuscripts, metadata })
    }
}

/// Append ids not already present, preserving discovery order.
pub(crate) fn extend_unique(ids: &mut Vec<String>, found: impl IntoIterator<Item = String>) {
    for id in found {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ManuscriptDraft;

    /// Fails every article whose id starts with "bad".
    struct FlakyCollector;

    #[async_trait]
    impl ReviewCollector for FlakyCollector {
        fn source(&self) -> ReviewSource {
            ReviewSource::Other
        }

        fn rate_limit(&self) -> Duration {
            Duration::ZERO
        }

        async fn discover(&self, _count: usize, _filters: &CollectionFilters) -> anyhow::Result<Vec<ArticleRef>> {
            Ok(vec![ArticleRef::new("a1"), ArticleRef::new("bad2"), ArticleRef::new("a3"), ArticleRef::new("a4")])
        }

        async fn collect_single(&self, article: &ArticleRef) -> anyhow::Result<Manuscript> {
            if article.id.starts_with("bad") {
                anyhow::bail!("HTTP 500 for {}", article.id);
            }
            Ok(ManuscriptDraft::new(&article.id, ReviewSource::Other, "http://localhost/x", "T").build())
        }
    }

    #[tokio::test]
    async fn test_item_failures_are_recorded_not_raised() {
        let batch = FlakyCollector.collect(3, &CollectionFilters::default()).await.unwrap();
        assert_eq!(batch.manuscripts.len(), 2);
        assert_eq!(batch.metadata.num_manuscripts_attempted, 3);
        assert_eq!(batch.metadata.num_manuscripts_successful, 2);
        assert_eq!(batch.metadata.num_manuscripts_failed, 1);
        assert_eq!(batch.metadata.errors[0].article_id, "bad2");
        assert!(batch.metadata.errors[0].error.contains("HTTP 500"));
        assert!(batch.metadata.is_finished());
        assert_eq!(batch.metadata.config.num_manuscripts, 3);
    }

    #[test]
    fn test_extend_unique_keeps_order() {
        let mut ids = vec!["1".to_string()];
        extend_unique(&mut ids, ["2", "1", "3", "2"].map(String::from));
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}
