use crate::fetch::FetchedPage;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use search_core::tokenizer::distinct_terms;
use std::collections::BTreeSet;
use thiserror::Error;
use url::Url;

lazy_static! {
    static ref SEL_TITLE: Selector = Selector::parse("title").expect("valid selector");
    static ref SEL_BODY: Selector = Selector::parse("body").expect("valid selector");
    static ref SEL_LINKS: Selector = Selector::parse("a[href]").expect("valid selector");
    static ref SEL_BASE: Selector = Selector::parse("base[href]").expect("valid selector");
}

/// Content we refuse to index. The page is skipped entirely; malformed
/// markup is not an error since the HTML parser recovers from it and we
/// index whatever it produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unsupported content type {0}")]
    UnsupportedContent(String),
    #[error("body of {0} bytes exceeds the size limit")]
    TooLarge(usize),
}

#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub title: String,
    pub text: String,
    /// Normalized http(s) targets.
    pub links: BTreeSet<Url>,
}

impl ParsedPage {
    /// Distinct index terms of title and visible text.
    pub fn terms(&self) -> BTreeSet<String> {
        let mut terms = distinct_terms(&self.title);
        terms.extend(distinct_terms(&self.text));
        terms
    }
}

pub fn parse(page: &FetchedPage, max_bytes: usize) -> Result<ParsedPage, ParseError> {
    if let Some(ct) = &page.content_type {
        let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if mime != "text/html" && mime != "application/xhtml+xml" {
            return Err(ParseError::UnsupportedContent(mime));
        }
    }
    if page.body.len() > max_bytes {
        return Err(ParseError::TooLarge(page.body.len()));
    }

    let html = String::from_utf8_lossy(&page.body);
    let doc = Html::parse_document(&html);
    let title = doc
        .select(&SEL_TITLE)
        .next()
        .map(|n| collapse_whitespace(&n.text().collect::<String>()))
        .unwrap_or_default();

    let base = doc
        .select(&SEL_BASE)
        .next()
        .and_then(|b| b.value().attr("href"))
        .and_then(|h| page.url.join(h.trim()).ok())
        .unwrap_or_else(|| page.url.clone());
    let mut links = BTreeSet::new();
    for a in doc.select(&SEL_LINKS) {
        if let Some(target) = a.value().attr("href").and_then(|h| resolve_link(&base, h)) {
            links.insert(target);
        }
    }

    Ok(ParsedPage { title, text: visible_text(&doc), links })
}

/// Resolves `href` against `base`, keeping only http(s) targets.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| normalize(&url))
}

/// Identity of a URL for dedup and the document index: the fragment is dropped.
pub fn normalize(url: &Url) -> Url {
    let mut u = url.clone();
    u.set_fragment(None);
    u
}

fn visible_text(doc: &Html) -> String {
    let root = doc.select(&SEL_BODY).next().unwrap_or_else(|| doc.root_element());
    let mut text = String::new();
    for node in root.descendants() {
        let Some(t) = node.value().as_text() else { continue };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style" | "noscript")))
            .unwrap_or(false);
        if !hidden {
            text.push_str(t);
            text.push(' ');
        }
    }
    collapse_whitespace(&text)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
