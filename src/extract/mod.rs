//! Listing page extraction
//!
//! Extraction is a pluggable collaborator: given a fetched page's raw
//! HTML, an extractor produces the generic record shape the rest of the
//! pipeline consumes — a list of observed items plus the next-page
//! pointer. The shipped [`SelectorExtractor`] is driven entirely by CSS
//! selectors from the source configuration, so supporting a new listing
//! site is a config change, not a code change.

use crate::config::SelectorConfig;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Errors produced while extracting records from a listing page
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid CSS selector '{0}'")]
    InvalidSelector(String),

    #[error("no items matched selector '{0}' on this page")]
    NoItems(String),

    #[error("item {index} has no identity link matching '{selector}'")]
    MissingIdentityLink { index: usize, selector: String },

    #[error("page URL is not parseable: {0}")]
    BadBaseUrl(String),
}

/// One item as observed on a listing page
///
/// `identity_url` is a raw candidate; canonicalization happens during
/// reconciliation. Optional fields the listing did not show are `None`,
/// never fabricated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedItem {
    pub identity_url: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

/// The extracted content of one listing page
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Items in document order
    pub items: Vec<ObservedItem>,
    /// Absolute URL of the next listing page, if the chain continues
    pub next_page_url: Option<String>,
}

/// A site-specific extractor producing the generic record shape
pub trait Extractor {
    fn extract(&self, body: &str, page_url: &str) -> Result<Extraction, ExtractError>;
}

/// CSS-selector-driven extractor
///
/// Selectors come from the `[source.selectors]` config table. Hrefs are
/// resolved against the page URL so relative links work.
pub struct SelectorExtractor {
    item: Selector,
    identity: Selector,
    description: Option<Selector>,
    language: Option<Selector>,
    updated: Option<Selector>,
    tags: Option<Selector>,
    next_page: Option<Selector>,
    item_raw: String,
    identity_raw: String,
}

impl SelectorExtractor {
    pub fn from_config(config: &SelectorConfig) -> Result<Self, ExtractError> {
        Ok(Self {
            item: parse_selector(&config.item)?,
            identity: parse_selector(&config.identity)?,
            description: config.description.as_deref().map(parse_selector).transpose()?,
            language: config.language.as_deref().map(parse_selector).transpose()?,
            updated: config.updated.as_deref().map(parse_selector).transpose()?,
            tags: config.tags.as_deref().map(parse_selector).transpose()?,
            next_page: config.next_page.as_deref().map(parse_selector).transpose()?,
            item_raw: config.item.clone(),
            identity_raw: config.identity.clone(),
        })
    }
}

impl Extractor for SelectorExtractor {
    fn extract(&self, body: &str, page_url: &str) -> Result<Extraction, ExtractError> {
        let base = Url::parse(page_url).map_err(|_| ExtractError::BadBaseUrl(page_url.to_string()))?;
        let document = Html::parse_document(body);

        let mut items = Vec::new();
        for (index, element) in document.select(&self.item).enumerate() {
            items.push(self.extract_item(index, element, &base)?);
        }

        // A listing page with nothing extractable is a fatal condition
        // upstream; an empty item list here would silently fingerprint as
        // "empty page" forever.
        if items.is_empty() {
            return Err(ExtractError::NoItems(self.item_raw.clone()));
        }

        let next_page_url = self
            .next_page
            .as_ref()
            .and_then(|sel| document.select(sel).next())
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| base.join(href).ok())
            .map(|url| url.to_string());

        Ok(Extraction {
            items,
            next_page_url,
        })
    }
}

impl SelectorExtractor {
    fn extract_item(
        &self,
        index: usize,
        element: ElementRef,
        base: &Url,
    ) -> Result<ObservedItem, ExtractError> {
        let identity_url = element
            .select(&self.identity)
            .next()
            .and_then(|el| el.value().attr("href"))
            .map(|href| resolve_href(href, base))
            .ok_or_else(|| ExtractError::MissingIdentityLink {
                index,
                selector: self.identity_raw.clone(),
            })?;

        let description = first_text(element, self.description.as_ref());
        let language = first_text(element, self.language.as_ref());

        let last_activity_at = self
            .updated
            .as_ref()
            .and_then(|sel| element.select(sel).next())
            .and_then(|el| {
                el.value()
                    .attr("datetime")
                    .map(str::to_string)
                    .or_else(|| non_empty_text(el))
            })
            .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
            .map(|t| t.with_timezone(&Utc));

        let tags = self
            .tags
            .as_ref()
            .map(|sel| {
                element
                    .select(sel)
                    .filter_map(non_empty_text)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(ObservedItem {
            identity_url,
            description,
            language,
            last_activity_at,
            tags,
        })
    }
}

fn parse_selector(raw: &str) -> Result<Selector, ExtractError> {
    Selector::parse(raw).map_err(|_| ExtractError::InvalidSelector(raw.to_string()))
}

fn resolve_href(href: &str, base: &Url) -> String {
    match base.join(href) {
        Ok(url) => url.to_string(),
        // Leave unresolvable hrefs as-is; canonicalization rejects them
        Err(_) => href.to_string(),
    }
}

fn first_text(element: ElementRef, selector: Option<&Selector>) -> Option<String> {
    selector
        .and_then(|sel| element.select(sel).next())
        .and_then(non_empty_text)
}

fn non_empty_text(element: ElementRef) -> Option<String> {
    let text = element.text().collect::<String>().trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
