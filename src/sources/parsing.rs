//! Small helpers for pulling required pieces out of HTML.
//!
//! Every helper turns a missing element or attribute into
//! [`SourceError::Parsing`] naming what was missing and on which page.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::SourceError;

pub fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Selector(format!("{}: {:?}", css, e)))
}

/// All descendants of `parent` matching `css`, in document order.
pub fn select_all<'a>(parent: ElementRef<'a>, css: &str) -> Result<Vec<ElementRef<'a>>, SourceError> {
    let selector = selector(css)?;
    Ok(parent.select(&selector).collect())
}

/// First descendant of `parent` matching `css`, if any.
pub fn find<'a>(parent: ElementRef<'a>, css: &str) -> Result<Option<ElementRef<'a>>, SourceError> {
    let selector = selector(css)?;
    Ok(parent.select(&selector).next())
}

pub fn find_required<'a>(
    parent: ElementRef<'a>,
    css: &str,
    detail: &str,
    page_url: &Url,
) -> Result<ElementRef<'a>, SourceError> {
    find(parent, css)?.ok_or_else(|| SourceError::parsing(detail, page_url))
}

/// Non-empty attribute value.
pub fn require_attr<'a>(
    element: ElementRef<'a>,
    attr: &str,
    detail: &str,
    page_url: &Url,
) -> Result<&'a str, SourceError> {
    element
        .value()
        .attr(attr)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| SourceError::parsing(detail, page_url))
}

/// Trimmed, non-empty text content.
pub fn require_text(element: ElementRef<'_>, detail: &str, page_url: &Url) -> Result<String, SourceError> {
    let text = text_of(element);
    let text = text.trim();
    if text.is_empty() {
        return Err(SourceError::parsing(detail, page_url));
    }
    Ok(text.to_string())
}

/// Concatenated text of an element and its descendants.
pub fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Resolve a link found on `page_url` against the site root.
pub fn resolve_link(domain: &Url, link: &str, page_url: &Url) -> Result<Url, SourceError> {
    super::normalize_url(domain, link)
        .map_err(|e| SourceError::parsing(format!("invalid link {:?}: {}", link, e), page_url))
}

/// Parse an HTML fragment, such as chapter content delivered inside JSON,
/// and return the text of every `<p>`.
pub fn fragment_paragraphs(html: &str) -> Result<Vec<String>, SourceError> {
    let fragment = Html::parse_fragment(html);
    let selector = selector("p")?;
    Ok(fragment.select(&selector).map(text_of).collect())
}
