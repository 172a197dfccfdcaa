//! HTML parser for listing and abstract pages
//!
//! This module handles two extraction tiers:
//! - Rich extraction of `(id, abstract)` pairs straight from a listing page
//! - Abstract extraction from a single paper's detail page, used when a
//!   listing page only yields identifiers

use crate::url::{extract_paper_id, SiteUrls};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Listing abstracts shorter than this are discarded
pub const MIN_LISTING_ABSTRACT_CHARS: usize = 30;

/// Detail page abstracts shorter than this are discarded
pub const MIN_DETAIL_ABSTRACT_CHARS: usize = 50;

/// A block only counts as an abstract candidate above this length
const LABELLED_BLOCK_MIN_CHARS: usize = 50;

static LINK: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static LIST_IDENTIFIER_DL: Lazy<Selector> = Lazy::new(|| selector("dl.list-identifier"));
static ANY_DL: Lazy<Selector> = Lazy::new(|| selector("dl"));
static MATHJAX_P: Lazy<Selector> = Lazy::new(|| selector("p.mathjax"));
static DD: Lazy<Selector> = Lazy::new(|| selector("dd"));
static ABSTRACT_BLOCKQUOTE: Lazy<Selector> = Lazy::new(|| selector("blockquote.abstract"));
static TEXT_BLOCK: Lazy<Selector> = Lazy::new(|| selector("p, div"));

/// Text between an "abstract" label and the next section marker
static LABELLED_ABSTRACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)abstract:?\s*(.+?)(?:Subject Classification|Categories:|MSC Class:|arXiv:|$)")
        .expect("labelled abstract pattern is valid")
});

/// Everything up to and including an "Abstract:" label
static LEADING_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^.*?\babstract\s*:\s*").expect("label pattern is valid"));

/// A bare leading "Abstract" word
static BARE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*abstract\b\s*").expect("bare label pattern is valid"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// One record candidate extracted from a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub id: String,
    pub body_text: String,
    pub source_url: String,
}

/// Everything extracted from one listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Every identifier linked from the page, in document order
    pub ids: Vec<String>,

    /// Items whose abstract could be read from the listing itself
    pub entries: Vec<ListingEntry>,
}

impl ListingPage {
    /// No identifiers at all: the page counts as empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers were found but no abstract could be read
    pub fn needs_detail_fetch(&self) -> bool {
        !self.ids.is_empty() && self.entries.is_empty()
    }
}

/// Parses a listing page
///
/// # Example
///
/// ```
/// use arxiv_harvest::crawler::parse_listing;
/// use arxiv_harvest::url::SiteUrls;
///
/// let html = r#"<dl>
///   <dt><a href="/abs/2401.00001">arXiv:2401.00001</a></dt>
///   <dd><p class="mathjax">We study a problem that is long enough to be kept as an abstract.</p></dd>
/// </dl>"#;
/// let urls = SiteUrls::new("https://arxiv.org").unwrap();
/// let page = parse_listing(html, &urls);
/// assert_eq!(page.ids, vec!["2401.00001"]);
/// assert_eq!(page.entries.len(), 1);
/// ```
pub fn parse_listing(html: &str, urls: &SiteUrls) -> ListingPage {
    let document = Html::parse_document(html);
    ListingPage {
        ids: listing_ids(&document),
        entries: listing_entries(&document, urls),
    }
}

/// Identifiers linked from a listing page, deduplicated, in order
fn listing_ids(document: &Html) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for link in document.select(&LINK) {
        if let Some(id) = link.value().attr("href").and_then(extract_paper_id) {
            if !ids.iter().any(|known| known == id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}

/// One listed item: the `dt`/`dd` pair, or a whole `dl`
struct ItemBlock<'a> {
    parts: Vec<ElementRef<'a>>,
}

impl<'a> ItemBlock<'a> {
    fn paper_id(&self) -> Option<String> {
        self.parts
            .iter()
            .flat_map(|part| part.select(&LINK))
            .filter_map(|link| link.value().attr("href"))
            .find_map(extract_paper_id)
            .map(str::to_string)
    }

    fn text(&self) -> String {
        self.parts
            .iter()
            .map(|part| element_text(*part))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn dd_elements(&self) -> Vec<ElementRef<'a>> {
        let mut found = Vec::new();
        for part in &self.parts {
            if part.value().name() == "dd" {
                found.push(*part);
            }
            found.extend(part.select(&DD).filter(|dd| dd.id() != part.id()));
        }
        found
    }

    /// Abstract candidates in priority order; first hit wins
    fn raw_abstract(&self) -> Option<String> {
        let mathjax = self
            .parts
            .iter()
            .flat_map(|part| part.select(&MATHJAX_P))
            .map(element_text)
            .find(|text| !text.is_empty());
        if mathjax.is_some() {
            return mathjax;
        }

        let labelled = self.dd_elements().into_iter().map(element_text).find(|text| {
            text.to_lowercase().contains("abstract") && text.chars().count() > LABELLED_BLOCK_MIN_CHARS
        });
        if labelled.is_some() {
            return labelled;
        }

        LABELLED_ABSTRACT
            .captures(&self.text())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|text| !text.is_empty())
    }
}

fn item_blocks(document: &Html) -> Vec<ItemBlock<'_>> {
    let mut lists: Vec<ElementRef> = document.select(&LIST_IDENTIFIER_DL).collect();
    if lists.is_empty() {
        lists = document.select(&ANY_DL).collect();
    }

    let mut blocks = Vec::new();
    for dl in lists {
        let children: Vec<ElementRef> = dl.children().filter_map(ElementRef::wrap).collect();

        if !children.iter().any(|c| c.value().name() == "dt") {
            blocks.push(ItemBlock { parts: vec![dl] });
            continue;
        }

        for (index, child) in children.iter().enumerate() {
            if child.value().name() != "dt" {
                continue;
            }
            let mut parts = vec![*child];
            if let Some(next) = children.get(index + 1) {
                if next.value().name() == "dd" {
                    parts.push(*next);
                }
            }
            blocks.push(ItemBlock { parts });
        }
    }

    blocks
}

fn listing_entries(document: &Html, urls: &SiteUrls) -> Vec<ListingEntry> {
    let mut entries = Vec::new();

    for block in item_blocks(document) {
        let Some(id) = block.paper_id() else {
            continue;
        };

        let Some(raw) = block.raw_abstract() else {
            continue;
        };
        if raw.chars().count() < MIN_LISTING_ABSTRACT_CHARS {
            continue;
        }

        let body_text = clean_abstract(&raw);
        if body_text.chars().count() < MIN_LISTING_ABSTRACT_CHARS {
            continue;
        }

        let source_url = match urls.abstract_page(&id) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::debug!("Skipping {}: {}", id, e);
                continue;
            }
        };

        entries.push(ListingEntry {
            id,
            body_text,
            source_url,
        });
    }

    entries
}

/// Extracts the abstract from a paper's detail page
///
/// Returns `None` when nothing of at least [`MIN_DETAIL_ABSTRACT_CHARS`]
/// characters could be found.
pub fn parse_abstract_page(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let raw = match document.select(&ABSTRACT_BLOCKQUOTE).next() {
        Some(blockquote) => element_text(blockquote),
        None => document
            .select(&TEXT_BLOCK)
            .map(|el| el.text().collect::<String>())
            .find(|text| {
                text.to_lowercase().contains("abstract")
                    && text.chars().count() > LABELLED_BLOCK_MIN_CHARS
            })?,
    };

    let text = clean_abstract(&raw);
    if text.chars().count() < MIN_DETAIL_ABSTRACT_CHARS {
        return None;
    }
    Some(text)
}

/// Strips the leading "Abstract" label and collapses whitespace
pub fn clean_abstract(raw: &str) -> String {
    let stripped = if LEADING_LABEL.is_match(raw) {
        LEADING_LABEL.replace(raw, "")
    } else {
        BARE_LABEL.replace(raw, "")
    };
    collapse_whitespace(&stripped)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text nodes of an element, trimmed and joined by single spaces
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
