//! Shared fixtures: page builders, responders and store helpers

use arxiv_harvest::config::Config;
use arxiv_harvest::storage::{read_rows, CsvStore, Record, RecordStore};
use arxiv_harvest::url::extract_paper_id;
use std::path::Path;
use std::time::Duration;
use wiremock::{Request, Respond, ResponseTemplate};

pub const LICENSE: &str = "arXiv.org perpetual, non-exclusive license";

/// Identifier of the `n`th synthetic paper
pub fn paper_id(n: u64) -> String {
    format!("2401.{:05}", n)
}

pub fn abstract_for(id: &str) -> String {
    format!(
        "Paper {} studies a recurring problem in enough detail to be kept as a record.",
        id
    )
}

/// Listing page whose items carry their abstracts
pub fn listing_html(ids: &[String]) -> String {
    let mut items = String::new();
    for id in ids {
        items.push_str(&format!(
            r#"<dt><a href="/abs/{id}" title="Abstract">arXiv:{id}</a></dt>
<dd><div class="list-title">Title: Paper {id}</div><p class="mathjax">{text}</p></dd>
"#,
            id = id,
            text = abstract_for(id)
        ));
    }
    format!(
        "<html><body><h1>Recent submissions</h1><dl id=\"articles\">{}</dl></body></html>",
        items
    )
}

/// Listing page with links only, forcing the detail page fallback
pub fn id_only_listing_html(ids: &[String]) -> String {
    let mut items = String::new();
    for id in ids {
        items.push_str(&format!(
            r#"<dt><a href="/abs/{id}">arXiv:{id}</a></dt>
<dd><div class="list-title">Title: Paper {id}</div></dd>
"#,
            id = id
        ));
    }
    format!("<html><body><dl>{}</dl></body></html>", items)
}

pub fn abstract_page_html(id: &str) -> String {
    format!(
        r#"<html><body><h1 class="title">Paper {id}</h1>
<blockquote class="abstract mathjax"><span class="descriptor">Abstract:</span> {text}</blockquote>
</body></html>"#,
        id = id,
        text = abstract_for(id)
    )
}

pub fn challenge_html() -> String {
    format!(
        "<html><head><title>Just a moment...</title></head><body>{}<div id=\"cf-challenge\"></div></body></html>",
        "Please wait while we check your connection. ".repeat(5)
    )
}

/// Serves `per_page` consecutive papers starting at the `skip` offset
pub struct ListingResponder {
    pub per_page: u64,
    /// Delay applied to every page except the first
    pub later_page_delay: Option<Duration>,
}

impl ListingResponder {
    pub fn new(per_page: u64) -> Self {
        Self {
            per_page,
            later_page_delay: None,
        }
    }
}

pub fn skip_of(request: &Request) -> u64 {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == "skip")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0)
}

impl Respond for ListingResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let skip = skip_of(request);
        let ids: Vec<String> = (skip..skip + self.per_page).map(paper_id).collect();
        let template = ResponseTemplate::new(200)
            .set_body_string(listing_html(&ids))
            .insert_header("content-type", "text/html");

        match self.later_page_delay {
            Some(delay) if skip > 0 => template.set_delay(delay),
            _ => template,
        }
    }
}

/// Serves an abstract page for whatever id is requested
pub struct AbstractResponder;

impl Respond for AbstractResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        match extract_paper_id(request.url.path()) {
            Some(id) => ResponseTemplate::new(200).set_body_string(abstract_page_html(id)),
            None => ResponseTemplate::new(404),
        }
    }
}

/// A config pointed at the mock server, with sleeping disabled
pub fn test_config(base_url: &str, output: &Path, target: u64) -> Config {
    let mut config = Config::default();
    config.crawler.base_url = base_url.to_string();
    config.crawler.target = target;
    config.crawler.categories = vec!["cs.AI".to_string()];
    config.crawler.delay_scale = 0.0;
    config.fetch.timeout_secs = 5;
    config.output.path = output.display().to_string();
    config.output.license = LICENSE.to_string();
    config
}

/// Writes a store that already holds the given ids
pub fn write_store(path: &Path, ids: &[String]) {
    let records: Vec<Record> = ids
        .iter()
        .map(|id| {
            Record::new(
                id.as_str(),
                abstract_for(id),
                format!("https://arxiv.org/abs/{}", id),
                LICENSE,
            )
        })
        .collect();
    CsvStore::new(path).append(&records).unwrap();
}

/// Every id in the store, in row order
pub fn stored_ids(path: &Path) -> Vec<String> {
    read_rows(path)
        .unwrap()
        .iter()
        .filter_map(|row| extract_paper_id(&row.source_url).map(str::to_string))
        .collect()
}

pub fn has_duplicates(ids: &[String]) -> bool {
    let unique: std::collections::HashSet<&String> = ids.iter().collect();
    unique.len() != ids.len()
}
