//! eLife collector.
//!
//! eLife publishes every review of a reviewed preprint openly, together with
//! an editorial assessment and the authors' response. Discovery scrapes the
//! reviewed-preprints listing (then the articles listing when that is thin)
//! and each article page is parsed with ordered extraction strategies.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use peerbrief_common::{CollectionFilters, SandboxClient};
use regex::Regex;
use scraper::Html;
use tracing::{debug, info, instrument, warn};

use crate::extract::{
    element_block_text, element_text, first_list, first_match, innermost_sections, parse_selector,
    Extractor, ListExtractor,
};
use crate::models::{
    AuthorResponse, EditorialAssessment, Manuscript, ManuscriptDraft, Review, ReviewDecision,
    ReviewDraft, ReviewSource, Reviewer,
};
use crate::sources::{extend_unique, ArticleRef, ReviewCollector, MIN_DISCOVERED};

pub const BASE_URL: &str = "https://elifesciences.org";

/// Known reviewed preprints used when discovery finds too little.
const FALLBACK_IDS: [&str; 5] = ["97433", "95132", "93215", "89376", "86956"];

const MAX_AUTHORS: usize = 10;

/// Sections of this many characters or fewer are navigation, not reviews.
const MIN_SECTION_CHARS: usize = 100;

// ── Extraction strategies ─────────────────────────────────────────────────────

const TITLE: &[Extractor] = &[
    Extractor::Text("h1[class*='title']"),
    Extractor::Text("h1[class*='heading']"),
    Extractor::Attr("meta[property='og:title']", "content"),
];

const ABSTRACT: &[Extractor] = &[
    Extractor::Text("div[class*='abstract']"),
    Extractor::Attr("meta[name='description']", "content"),
];

const AUTHORS: &[ListExtractor] = &[
    ListExtractor::Texts("span[class*='author'], a[class*='author']"),
    ListExtractor::Attrs("meta[name='citation_author']", "content"),
];

const DOI: &[Extractor] = &[
    Extractor::Attr("meta[name='citation_doi']", "content"),
    Extractor::Pattern(r"10\.\d{4,}/[\w.\-]+"),
];

const PUBLICATION_DATE: &[Extractor] = &[
    Extractor::Attr("meta[name='citation_publication_date']", "content"),
    Extractor::Attr("time", "datetime"),
    Extractor::Text("time"),
];

const REVIEW_SECTIONS: &[&str] = &[
    "div[class*='review'], section[class*='review']",
    "div[data-test*='review'], article[data-test*='review']",
];

const ASSESSMENT_SECTION: &str = "div[class*='assessment'], section[class*='assessment']";

const RESPONSE_SECTIONS: &str = "div[class*='author-response'], section[class*='author-response'], \
     div[class*='author_response'], section[class*='author_response'], \
     div[class*='authorresponse'], section[class*='authorresponse']";

fn reviewed_preprint_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/reviewed-preprints/(\d+)").expect("valid regex"))
}

fn article_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/articles/(\d+)").expect("valid regex"))
}

fn reviewer_heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Reviewer|Review \d+").expect("valid regex"))
}

fn anonymous_heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(Reviewer|Review)\s*#?\d+\b").expect("valid regex"))
}

// ── Collector ─────────────────────────────────────────────────────────────────

pub struct ElifeCollector {
    client: SandboxClient,
    base_url: String,
    rate_limit: Duration,
}

impl ElifeCollector {
    pub fn new(client: SandboxClient, rate_limit: Duration) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
            rate_limit,
        }
    }

    /// Point the collector at a mirror (tests use a loopback server).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn listing_ids(&self, path: &str, link: &Regex) -> anyhow::Result<Vec<String>> {
        let url = format!("{}{}", self.base_url, path);
        let page = self.client.fetch_page(&url).await?.error_for_status()?;
        Ok(parse_listing(&page.body, link))
    }
}

#[async_trait]
impl ReviewCollector for ElifeCollector {
    fn source(&self) -> ReviewSource {
        ReviewSource::Elife
    }

    fn rate_limit(&self) -> Duration {
        self.rate_limit
    }

    #[instrument(skip(self, _filters))]
    async fn discover(
        &self,
        count: usize,
        _filters: &CollectionFilters,
    ) -> anyhow::Result<Vec<ArticleRef>> {
        let mut ids = Vec::new();

        match self.listing_ids("/reviewed-preprints", reviewed_preprint_link()).await {
            Ok(found) => extend_unique(&mut ids, found),
            Err(e) => warn!("Error discovering reviewed preprints: {:#}", e),
        }

        if ids.len() < count {
            info!("Trying alternate discovery method via articles page");
            match self.listing_ids("/articles", article_link()).await {
                Ok(found) => extend_unique(&mut ids, found),
                Err(e) => warn!("Error discovering articles: {:#}", e),
            }
        }

        if ids.len() < MIN_DISCOVERED {
            warn!("Few articles discovered ({}), using fallback article IDs", ids.len());
            extend_unique(&mut ids, FALLBACK_IDS.map(String::from));
        }

        Ok(ids.into_iter().map(ArticleRef::new).collect())
    }

    #[instrument(skip(self), fields(id = %article.id))]
    async fn collect_single(&self, article: &ArticleRef) -> anyhow::Result<Manuscript> {
        let preprint_url = article
            .url
            .clone()
            .unwrap_or_else(|| format!("{}/reviewed-preprints/{}", self.base_url, article.id));
        let mut page = self.client.fetch_page(&preprint_url).await?;

        if page.is_not_found() {
            let fallback = format!("{}/articles/{}", self.base_url, article.id);
            debug!("No reviewed preprint for {}, trying {}", article.id, fallback);
            page = self.client.fetch_page(&fallback).await?;
        }

        let page = page.error_for_status()?;
        Ok(parse_article(&page.body, &article.id, &page.url))
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Article ids linked from a listing page, in page order without duplicates.
pub fn parse_listing(html: &str, link: &Regex) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Some(anchors) = parse_selector("a[href]") else {
        return Vec::new();
    };

    let mut ids = Vec::new();
    let found = doc
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| link.captures(href))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()));
    extend_unique(&mut ids, found);
    ids
}

/// Build a manuscript from an eLife article page.
pub fn parse_article(html: &str, article_id: &str, url: &str) -> Manuscript {
    let doc = Html::parse_document(html);

    let title = first_match(&doc, TITLE).unwrap_or_else(|| format!("Article {}", article_id));
    let mut draft = ManuscriptDraft::new(article_id, ReviewSource::Elife, url, title);
    draft.abstract_text = first_match(&doc, ABSTRACT);
    draft.authors = first_list(&doc, AUTHORS, 3, MAX_AUTHORS);
    draft.doi = first_match(&doc, DOI);
    draft.publication_date = first_match(&doc, PUBLICATION_DATE);
    draft.reviews = extract_reviews(&doc, article_id);
    draft.editorial_assessments = extract_assessment(&doc, article_id).into_iter().collect();
    draft.author_responses = extract_author_responses(&doc, article_id);
    draft.decision = ReviewDecision::NoDecision;
    draft
        .raw_data
        .insert("html_collected".to_string(), serde_json::Value::Bool(true));

    draft.build()
}

fn extract_reviews(doc: &Html, article_id: &str) -> Vec<Review> {
    let sections = REVIEW_SECTIONS
        .iter()
        .map(|css| innermost_sections(doc, css, &[]))
        .find(|found| !found.is_empty())
        .unwrap_or_default();

    let heading = parse_selector("h3, h4, strong");
    let mut reviews = Vec::new();

    for (i, section) in sections.into_iter().enumerate() {
        let n = i + 1;
        let review_text = element_block_text(section);
        if review_text.chars().count() <= MIN_SECTION_CHARS {
            continue;
        }

        let name = heading
            .as_ref()
            .and_then(|h| {
                section
                    .select(h)
                    .map(element_text)
                    .find(|t| reviewer_heading().is_match(t))
            })
            .filter(|t| !anonymous_heading().is_match(t));

        let reviewer = Reviewer::new(format!("{}_reviewer_{}", article_id, n), name, None);
        reviews.push(ReviewDraft::new(format!("{}_review_{}", article_id, n), reviewer, review_text).finish());
    }

    reviews
}

fn extract_assessment(doc: &Html, article_id: &str) -> Option<EditorialAssessment> {
    let selector = parse_selector(ASSESSMENT_SECTION)?;
    let section = doc.select(&selector).next()?;
    let assessment_text = element_block_text(section);
    if assessment_text.is_empty() {
        return None;
    }

    let (significance, strength_of_evidence) = assessment_tags(&assessment_text);
    Some(EditorialAssessment {
        assessment_id: format!("{}_assessment", article_id),
        assessment_text,
        significance: significance.map(str::to_string),
        strength_of_evidence: strength_of_evidence.map(str::to_string),
        date_submitted: None,
    })
}

/// eLife's controlled vocabulary for significance and strength of evidence.
pub fn assessment_tags(text: &str) -> (Option<&'static str>, Option<&'static str>) {
    let lower = text.to_lowercase();

    let significance = ["landmark", "important", "useful"]
        .into_iter()
        .find(|k| lower.contains(k));

    let strength = if lower.contains("exceptional") {
        Some("exceptional")
    } else if lower.contains("solid") || lower.contains("strong") {
        Some("solid")
    } else if lower.contains("inadequate") {
        Some("inadequate")
    } else {
        None
    };

    (significance, strength)
}

fn extract_author_responses(doc: &Html, article_id: &str) -> Vec<AuthorResponse> {
    innermost_sections(doc, RESPONSE_SECTIONS, &[])
        .into_iter()
        .enumerate()
        .filter_map(|(i, section)| {
            let response_text = element_block_text(section);
            (response_text.chars().count() > MIN_SECTION_CHARS).then(|| AuthorResponse {
                response_id: format!("{}_response_{}", article_id, i + 1),
                response_text,
                date_submitted: None,
                version: 1,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(words: usize) -> String {
        vec!["evidence"; words].join(" ")
    }

    fn article_page() -> String {
        format!(
            r#"<html><head>
                <meta name="citation_doi" content="10.7554/eLife.97433">
                <meta name="citation_publication_date" content="2024/05/02">
              </head><body>
                <h1 class="content-header__title">Cortical circuits for flexible choice</h1>
                <div class="abstract">We study choice.</div>
                <span class="author-name">Ada Lovelace</span>
                <span class="author-name">Alan Turing</span>
                <section class="elife-assessment">This important study provides solid evidence.</section>
                <div class="peer-reviews">
                  <div class="review-content"><h3>Reviewer #1 (Public review)</h3><p>{r1}</p></div>
                  <div class="review-content"><h3>Reviewer 2</h3><p>{r2}</p></div>
                  <div class="review-content"><p>Too short.</p></div>
                </div>
                <div class="author-response">{resp}</div>
              </body></html>"#,
            r1 = filler(30),
            r2 = filler(25),
            resp = filler(20),
        )
    }

    #[test]
    fn test_parse_article_fields() {
        let m = parse_article(&article_page(), "97433", "https://elifesciences.org/reviewed-preprints/97433");
        assert_eq!(m.title, "Cortical circuits for flexible choice");
        assert_eq!(m.abstract_text.as_deref(), Some("We study choice."));
        assert_eq!(m.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(m.doi.as_deref(), Some("10.7554/eLife.97433"));
        assert_eq!(m.publication_date.as_deref(), Some("2024/05/02"));
        assert_eq!(m.decision, ReviewDecision::NoDecision);
        assert_eq!(m.raw_data["html_collected"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_parse_article_reviews() {
        let m = parse_article(&article_page(), "97433", "u");
        // the short third section is dropped; nested containers are not reviews
        assert_eq!(m.num_reviews(), 2);
        assert_eq!(m.reviews[0].review_id, "97433_review_1");

        // numbered headings, with or without '#' and a trailing note, are anonymous
        assert!(m.reviews[0].reviewer.is_anonymous());
        assert_eq!(m.reviews[0].reviewer.name(), None);
        assert!(m.reviews[1].reviewer.is_anonymous());
        assert!(m.reviews[1].word_count() >= 25);
    }

    #[test]
    fn test_parse_article_assessment_and_response() {
        let m = parse_article(&article_page(), "97433", "u");
        assert_eq!(m.editorial_assessments.len(), 1);
        assert_eq!(m.editorial_assessments[0].significance.as_deref(), Some("important"));
        assert_eq!(m.editorial_assessments[0].strength_of_evidence.as_deref(), Some("solid"));
        assert_eq!(m.author_responses.len(), 1);
        assert_eq!(m.author_responses[0].response_id, "97433_response_1");
    }

    #[test]
    fn test_missing_title_falls_back_to_id() {
        let m = parse_article("<html><body></body></html>", "12345", "u");
        assert_eq!(m.title, "Article 12345");
        assert!(m.reviews.is_empty());
        assert!(m.abstract_text.is_none());
    }

    #[test]
    fn test_anonymous_headings() {
        for heading in ["Reviewer 2", "Reviewer #1 (Public review)", "Reviewer #3 (Recommendations for the authors)", "Review 1"] {
            assert!(anonymous_heading().is_match(heading), "{}", heading);
        }
        for heading in ["Reviewer: Jane Roe", "Reviewers", "Reviewer 12b"] {
            assert!(!anonymous_heading().is_match(heading), "{}", heading);
        }
    }

    #[test]
    fn test_assessment_tags() {
        assert_eq!(assessment_tags("A landmark, exceptional study"), (Some("landmark"), Some("exceptional")));
        assert_eq!(assessment_tags("Useful but inadequate"), (Some("useful"), Some("inadequate")));
        assert_eq!(assessment_tags("Nothing notable"), (None, None));
    }

    #[test]
    fn test_parse_listing_dedups() {
        let html = r#"<a href="/reviewed-preprints/101">a</a>
            <a href="https://elifesciences.org/reviewed-preprints/102">b</a>
            <a href="/reviewed-preprints/101#reviews">c</a>
            <a href="/about">d</a>"#;
        assert_eq!(parse_listing(html, reviewed_preprint_link()), vec!["101", "102"]);
    }

    #[tokio::test]
    #[ignore = "Hits live elifesciences.org"]
    async fn test_elife_collect_live() {
        let collector = ElifeCollector::new(SandboxClient::new().unwrap(), Duration::from_secs(2));
        let batch = collector.collect(1, &CollectionFilters::default()).await.unwrap();
        assert_eq!(batch.metadata.num_manuscripts_attempted, 1);
    }
}
