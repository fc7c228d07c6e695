//! F1000Research collector.
//!
//! F1000Research publishes signed referee reports with an approval status
//! (approved / approved with reservations / not approved) next to every
//! article version.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use peerbrief_common::{CollectionFilters, SandboxClient};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, instrument, warn};

use crate::extract::{
    document_text, element_block_text, element_text, first_list, first_match, innermost_sections,
    parse_selector, Extractor, ListExtractor,
};
use crate::models::{
    Manuscript, ManuscriptDraft, Review, ReviewDecision, ReviewDraft, ReviewSource, Reviewer,
};
use crate::sources::{ArticleRef, ReviewCollector, MIN_DISCOVERED};

pub const BASE_URL: &str = "https://f1000research.com";

/// Known articles used when discovery finds too little.
const FALLBACK_IDS: [&str; 5] = ["1-1655", "2-150", "3-200", "4-100", "5-50"];

const MAX_PAGE_AUTHORS: usize = 10;

/// Report sections of this many characters or fewer are skipped.
const MIN_SECTION_CHARS: usize = 100;

// ── Extraction strategies ─────────────────────────────────────────────────────

const TITLE: &[Extractor] = &[
    Extractor::Text("h1[class*='title']"),
    Extractor::Text("h1[class*='article']"),
    Extractor::Attr("meta[property='og:title']", "content"),
    Extractor::Attr("meta[name='citation_title']", "content"),
];

const ABSTRACT: &[Extractor] = &[
    Extractor::Text("div[class*='abstract'], section[class*='abstract']"),
    Extractor::Attr("meta[name='description']", "content"),
];

const META_AUTHORS: &[ListExtractor] = &[ListExtractor::Attrs("meta[name='citation_author']", "content")];

const PAGE_AUTHORS: &[ListExtractor] = &[ListExtractor::Texts("span[class*='author'], a[class*='author']")];

const KEYWORDS: ListExtractor = ListExtractor::SplitAttr("meta[name='citation_keywords']", "content", ',');

const DOI: &[Extractor] = &[
    Extractor::Attr("meta[name='citation_doi']", "content"),
    Extractor::Pattern(r"10\.\d{4,}/f1000research[\w.\-]*"),
];

const PUBLICATION_DATE: &[Extractor] = &[
    Extractor::Attr("meta[name='citation_publication_date']", "content"),
    Extractor::Attr("time", "datetime"),
    Extractor::Text("time"),
];

const REPORT_SECTIONS: &str = "div[class*='referee'], article[class*='referee'], \
     div[class*='review'], article[class*='review'], \
     div[class*='report'], article[class*='report']";

/// Classes inside a report that must not be mistaken for the report itself.
const REPORT_PART_CLASSES: &[&str] = &["body", "name", "affiliation", "status"];

const REVIEWER_NAME: &str = "h3[class*='referee'], h4[class*='referee'], strong[class*='referee'], \
     span[class*='referee'], h3[class*='reviewer'], h4[class*='reviewer'], \
     strong[class*='reviewer'], span[class*='reviewer']";

const REVIEWER_AFFILIATION: &str = "span[class*='affiliation'], div[class*='affiliation']";

const REPORT_BODY: &str = "div[class*='report-body'], p[class*='report-body'], \
     div[class*='review-body'], p[class*='review-body'], \
     div[class*='referee-report'], p[class*='referee-report']";

fn article_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/articles/(\d+-\d+)").expect("valid regex"))
}

fn name_noise() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)referee|reviewer|report by").expect("valid regex"))
}

fn approval_status() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(not approved|approved with reservations|approved)\b").expect("valid regex")
    })
}

// ── Collector ─────────────────────────────────────────────────────────────────

pub struct F1000Collector {
    client: SandboxClient,
    base_url: String,
    rate_limit: Duration,
}

impl F1000Collector {
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

    fn article_url(&self, id: &str) -> String {
        format!("{}/articles/{}", self.base_url, id)
    }
}

#[async_trait]
impl ReviewCollector for F1000Collector {
    fn source(&self) -> ReviewSource {
        ReviewSource::F1000Research
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
        let listing_url = format!("{}/articles/browse/latest", self.base_url);

        // Extra candidates in case some fail
        let mut articles = match self.client.fetch_page(&listing_url).await.and_then(|p| p.error_for_status()) {
            Ok(page) => parse_listing(&page.body, &self.base_url, count.saturating_mul(2)),
            Err(e) => {
                warn!("Error discovering articles: {}", e);
                Vec::new()
            }
        };
        info!("Discovered {} candidate articles", articles.len());

        if articles.len() < MIN_DISCOVERED {
            warn!("Few articles discovered ({}), using fallback article IDs", articles.len());
            for id in FALLBACK_IDS {
                if !articles.iter().any(|a| a.id == id) {
                    articles.push(ArticleRef::with_url(id, self.article_url(id)));
                }
            }
        }

        Ok(articles)
    }

    #[instrument(skip(self), fields(id = %article.id))]
    async fn collect_single(&self, article: &ArticleRef) -> anyhow::Result<Manuscript> {
        let url = article.url.clone().unwrap_or_else(|| self.article_url(&article.id));
        let page = self.client.fetch_page(&url).await?.error_for_status()?;
        Ok(parse_article(&page.body, &article.id, &page.url))
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Article links on a listing page, de-duplicated by id, at most `limit`.
pub fn parse_listing(html: &str, base_url: &str, limit: usize) -> Vec<ArticleRef> {
    let doc = Html::parse_document(html);
    let Some(anchors) = parse_selector("a[href]") else {
        return Vec::new();
    };

    let mut articles: Vec<ArticleRef> = Vec::new();
    for href in doc.select(&anchors).filter_map(|a| a.value().attr("href")) {
        if articles.len() >= limit {
            break;
        }
        let Some(id) = article_link().captures(href).and_then(|c| c.get(1)) else {
            continue;
        };
        let id = id.as_str();
        if articles.iter().any(|a| a.id == id) {
            continue;
        }
        let url = if href.starts_with('/') {
            format!("{}{}", base_url, href)
        } else {
            href.to_string()
        };
        articles.push(ArticleRef::with_url(id, url));
    }
    articles
}

/// Build a manuscript from an F1000Research article page.
pub fn parse_article(html: &str, article_id: &str, url: &str) -> Manuscript {
    let doc = Html::parse_document(html);

    let title = first_match(&doc, TITLE).unwrap_or_else(|| format!("Article {}", article_id));
    let mut draft = ManuscriptDraft::new(article_id, ReviewSource::F1000Research, url, title);
    draft.abstract_text = first_match(&doc, ABSTRACT);

    // Citation meta lists every author; the page fallback only the first few
    draft.authors = first_list(&doc, META_AUTHORS, 1, usize::MAX);
    if draft.authors.is_empty() {
        draft.authors = first_list(&doc, PAGE_AUTHORS, 3, MAX_PAGE_AUTHORS);
    }

    draft.doi = first_match(&doc, DOI);
    draft.keywords = KEYWORDS.apply(&doc);
    draft.publication_date = first_match(&doc, PUBLICATION_DATE);
    draft.reviews = extract_reviews(&doc, article_id);
    draft.decision = decision_from_text(&document_text(&doc));
    draft
        .raw_data
        .insert("html_collected".to_string(), serde_json::Value::Bool(true));

    draft.build()
}

fn extract_reviews(doc: &Html, article_id: &str) -> Vec<Review> {
    let name_sel = parse_selector(REVIEWER_NAME);
    let affiliation_sel = parse_selector(REVIEWER_AFFILIATION);
    let body_sel = parse_selector(REPORT_BODY);

    let mut reviews = Vec::new();
    for (i, section) in innermost_sections(doc, REPORT_SECTIONS, REPORT_PART_CLASSES)
        .into_iter()
        .enumerate()
    {
        let n = i + 1;

        let name = first_text(section, name_sel.as_ref()).and_then(|raw| clean_reviewer_name(&raw));
        let affiliation = first_text(section, affiliation_sel.as_ref());

        let review_text = body_sel
            .as_ref()
            .and_then(|s| section.select(s).next())
            .map(element_block_text)
            .unwrap_or_else(|| element_block_text(section));

        if review_text.chars().count() <= MIN_SECTION_CHARS {
            continue;
        }

        let recommendation = recommendation_from_text(&element_block_text(section));
        let reviewer = Reviewer::new(format!("{}_reviewer_{}", article_id, n), name, affiliation);
        let mut draft = ReviewDraft::new(format!("{}_review_{}", article_id, n), reviewer, review_text);
        draft.recommendation = recommendation.map(str::to_string);
        reviews.push(draft.finish());
    }

    reviews
}

fn first_text(section: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    let selector = selector?;
    section.select(selector).map(element_text).find(|t| !t.is_empty())
}

/// Strip "Referee"/"Reviewer"/"Report by" labels; too-short leftovers mean no name.
pub fn clean_reviewer_name(raw: &str) -> Option<String> {
    let cleaned = name_noise().replace_all(raw, "");
    let cleaned = cleaned.trim().trim_matches(|c: char| c == ':' || c == ',').trim();
    (cleaned.chars().count() >= 3).then(|| cleaned.to_string())
}

/// Referee recommendation tag from the first approval status in `text`.
pub fn recommendation_from_text(text: &str) -> Option<&'static str> {
    let status = approval_status().find(text)?.as_str().to_lowercase();
    Some(match status.as_str() {
        "not approved" => "not_approved",
        "approved with reservations" => "approved_with_reservations",
        _ => "approved",
    })
}

/// Article-level decision from the page's approval wording.
pub fn decision_from_text(text: &str) -> ReviewDecision {
    let lower = text.to_lowercase();
    if lower.contains("not approved") {
        ReviewDecision::Reject
    } else if lower.contains("approved") {
        ReviewDecision::Accept
    } else {
        ReviewDecision::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(words: usize) -> String {
        vec!["methodology"; words].join(" ")
    }

    fn article_page() -> String {
        format!(
            r#"<html><head>
                <meta name="citation_title" content="Open data in ecology">
                <meta name="citation_author" content="Ada Lovelace">
                <meta name="citation_author" content="Alan Turing">
                <meta name="citation_doi" content="10.12688/f1000research.1655.1">
                <meta name="citation_keywords" content="ecology, open data">
                <meta name="description" content="A study of open data.">
              </head><body>
                <div class="referee-reports">
                  <div class="referee-report-container">
                    <span class="referee-name">Referee Grace Hopper</span>
                    <span class="referee-affiliation">Harvard University</span>
                    <span class="referee-status">Approved</span>
                    <div class="report-body">{r1}</div>
                  </div>
                  <div class="referee-report-container">
                    <span class="referee-name">Reviewer</span>
                    <span class="referee-status">Approved with Reservations</span>
                    <div class="report-body">{r2}</div>
                  </div>
                </div>
              </body></html>"#,
            r1 = report(20),
            r2 = report(15),
        )
    }

    #[test]
    fn test_parse_article_metadata() {
        let m = parse_article(&article_page(), "1-1655", "https://f1000research.com/articles/1-1655");
        assert_eq!(m.title, "Open data in ecology");
        assert_eq!(m.authors, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(m.doi.as_deref(), Some("10.12688/f1000research.1655.1"));
        assert_eq!(m.keywords, vec!["ecology", "open data"]);
        assert_eq!(m.abstract_text.as_deref(), Some("A study of open data."));
        assert_eq!(m.decision, ReviewDecision::Accept);
    }

    #[test]
    fn test_parse_article_reports() {
        let m = parse_article(&article_page(), "1-1655", "u");
        assert_eq!(m.num_reviews(), 2);

        let first = &m.reviews[0];
        assert_eq!(first.reviewer.name(), Some("Grace Hopper"));
        assert_eq!(first.reviewer.affiliation(), Some("Harvard University"));
        assert_eq!(first.recommendation.as_deref(), Some("approved"));
        assert_eq!(first.word_count(), 20);

        let second = &m.reviews[1];
        assert!(second.reviewer.is_anonymous());
        assert_eq!(second.recommendation.as_deref(), Some("approved_with_reservations"));
        assert!(m.has_disagreement());
    }

    #[test]
    fn test_recommendation_and_decision() {
        assert_eq!(recommendation_from_text("Status: Not Approved"), Some("not_approved"));
        assert_eq!(recommendation_from_text("APPROVED"), Some("approved"));
        assert_eq!(recommendation_from_text("no status here"), None);

        assert_eq!(decision_from_text("Approved"), ReviewDecision::Accept);
        assert_eq!(decision_from_text("Approved ... Not Approved"), ReviewDecision::Reject);
        assert_eq!(decision_from_text("Awaiting peer review"), ReviewDecision::Pending);
    }

    #[test]
    fn test_clean_reviewer_name() {
        assert_eq!(clean_reviewer_name("Report by: Jane Roe").as_deref(), Some("Jane Roe"));
        assert_eq!(clean_reviewer_name("Referee 1"), None);
        assert_eq!(clean_reviewer_name("Reviewer"), None);
    }

    #[test]
    fn test_parse_listing_limit_and_urls() {
        let html = r#"
            <a href="/articles/12-345/v1">a</a>
            <a href="/articles/12-345/v2">dup</a>
            <a href="https://f1000research.com/articles/13-7">b</a>
            <a href="/articles/14-1">c</a>"#;
        let found = parse_listing(html, "https://f1000research.com", 2);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], ArticleRef::with_url("12-345", "https://f1000research.com/articles/12-345/v1"));
        assert_eq!(found[1].id, "13-7");
    }

    #[tokio::test]
    #[ignore = "Hits live f1000research.com"]
    async fn test_f1000_collect_live() {
        let collector = F1000Collector::new(SandboxClient::new().unwrap(), Duration::from_secs(2));
        let batch = collector.collect(1, &CollectionFilters::default()).await.unwrap();
        assert_eq!(batch.metadata.num_manuscripts_attempted, 1);
    }
}
