//! Ordered extraction strategies over parsed HTML.
//!
//! Each field a collector scrapes is described by a slice of strategies.
//! They are tried in order and the first non-empty result wins; when every
//! strategy comes up empty the field stays absent.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// One way of pulling a single value out of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// Whitespace-normalized text of the first element matching a CSS selector.
    Text(&'static str),
    /// Attribute of the first element matching a CSS selector.
    Attr(&'static str, &'static str),
    /// Regex over the page text; capture group 1 if present, else the whole match.
    Pattern(&'static str),
}

impl Extractor {
    pub fn apply(&self, doc: &Html) -> Option<String> {
        match *self {
            Extractor::Text(css) => {
                let selector = parse_selector(css)?;
                doc.select(&selector)
                    .map(element_text)
                    .find(|t| !t.is_empty())
            }
            Extractor::Attr(css, attr) => {
                let selector = parse_selector(css)?;
                doc.select(&selector)
                    .filter_map(|el| el.value().attr(attr))
                    .map(normalize_ws)
                    .find(|t| !t.is_empty())
            }
            Extractor::Pattern(pattern) => {
                let re = match Regex::new(pattern) {
                    Ok(re) => re,
                    Err(e) => {
                        debug!("Invalid extraction pattern {}: {}", pattern, e);
                        return None;
                    }
                };
                let text = document_text(doc);
                let caps = re.captures(&text)?;
                caps.get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|t| !t.is_empty())
            }
        }
    }
}

/// One way of pulling a list of values out of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListExtractor {
    /// Text of every element matching a CSS selector.
    Texts(&'static str),
    /// An attribute of every element matching a CSS selector.
    Attrs(&'static str, &'static str),
    /// A single attribute value split on a delimiter (e.g. comma-separated keywords).
    SplitAttr(&'static str, &'static str, char),
}

impl ListExtractor {
    pub fn apply(&self, doc: &Html) -> Vec<String> {
        let values: Vec<String> = match *self {
            ListExtractor::Texts(css) => match parse_selector(css) {
                Some(selector) => doc.select(&selector).map(element_text).collect(),
                None => Vec::new(),
            },
            ListExtractor::Attrs(css, attr) => match parse_selector(css) {
                Some(selector) => doc
                    .select(&selector)
                    .filter_map(|el| el.value().attr(attr))
                    .map(normalize_ws)
                    .collect(),
                None => Vec::new(),
            },
            ListExtractor::SplitAttr(css, attr, delimiter) => {
                Extractor::Attr(css, attr)
                    .apply(doc)
                    .map(|v| v.split(delimiter).map(|s| s.trim().to_string()).collect())
                    .unwrap_or_default()
            }
        };
        values.into_iter().filter(|v| !v.is_empty()).collect()
    }
}

/// Apply strategies in order; first non-empty value wins.
pub fn first_match(doc: &Html, strategies: &[Extractor]) -> Option<String> {
    strategies.iter().find_map(|s| s.apply(doc))
}

/// Apply list strategies in order; the first one yielding any value wins.
/// Values shorter than `min_len` characters are dropped and at most `limit`
/// are kept.
pub fn first_list(doc: &Html, strategies: &[ListExtractor], min_len: usize, limit: usize) -> Vec<String> {
    for strategy in strategies {
        let values: Vec<String> = strategy
            .apply(doc)
            .into_iter()
            .filter(|v| v.chars().count() >= min_len)
            .take(limit)
            .collect();
        if !values.is_empty() {
            return values;
        }
    }
    Vec::new()
}

/// Elements matching `css`, keeping only the innermost of nested matches.
/// Elements whose class contains one of `skip_classes` are never candidates,
/// so e.g. a `referee-name` span cannot displace the report around it.
pub fn innermost_sections<'a>(doc: &'a Html, css: &str, skip_classes: &[&str]) -> Vec<ElementRef<'a>> {
    let Some(selector) = parse_selector(css) else {
        return Vec::new();
    };
    let matched: Vec<ElementRef<'a>> = doc
        .select(&selector)
        .filter(|el| {
            let class = el.value().attr("class").unwrap_or_default();
            !skip_classes.iter().any(|skip| class.contains(skip))
        })
        .collect();

    matched
        .iter()
        .filter(|el| {
            !matched
                .iter()
                .any(|other| other.id() != el.id() && other.ancestors().any(|a| a.id() == el.id()))
        })
        .copied()
        .collect()
}

/// Parse a CSS selector, logging instead of panicking on bad input.
pub fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!("Invalid selector {}: {:?}", css, e);
            None
        }
    }
}

/// Element text with runs of whitespace collapsed to one space.
pub fn element_text(el: ElementRef<'_>) -> String {
    normalize_ws(&el.text().collect::<Vec<_>>().join(" "))
}

/// Element text keeping one line per text node, for multi-paragraph bodies.
pub fn element_block_text(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whole-document text, one line per text node.
pub fn document_text(doc: &Html) -> String {
    element_block_text(doc.root_element())
}

pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
