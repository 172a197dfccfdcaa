//! URL construction and paper identifier extraction
//!
//! Every record's identity comes from its source URL, so the pattern used here
//! is shared by the listing parser, the output store loader and the stats
//! report.

use crate::{UrlError, UrlResult};
use ::url::Url;
use once_cell::sync::Lazy;
use regex::Regex;

/// Matches `/abs/<id>` and captures the numeric arXiv identifier
pub static PAPER_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/abs/(\d+\.\d+)").expect("paper id pattern is valid"));

/// Extracts the paper identifier from a URL or href
///
/// # Example
///
/// ```
/// use arxiv_harvest::url::extract_paper_id;
///
/// assert_eq!(extract_paper_id("https://arxiv.org/abs/2401.01234"), Some("2401.01234"));
/// assert_eq!(extract_paper_id("https://arxiv.org/list/cs.AI/recent"), None);
/// ```
pub fn extract_paper_id(text: &str) -> Option<&str> {
    PAPER_ID_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// URL builder rooted at the harvested site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteUrls {
    base: Url,
}

impl SiteUrls {
    /// Parses the site root. A trailing slash is added so relative joins keep
    /// any path prefix.
    pub fn new(base: &str) -> UrlResult<Self> {
        let mut base = Url::parse(base).map_err(|e| UrlError::Parse(format!("{}: {}", base, e)))?;

        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(UrlError::InvalidScheme(base.scheme().to_string()));
        }

        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self { base })
    }

    /// The normalized site root
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Builds the listing URL for one category page
    ///
    /// Offset zero omits the `skip` parameter entirely.
    pub fn listing(&self, category: &str, offset: u64) -> UrlResult<Url> {
        validate_category(category)?;

        let mut url = self
            .base
            .join(&format!("list/{}/recent", category))
            .map_err(|e| UrlError::Parse(e.to_string()))?;

        if offset > 0 {
            url.query_pairs_mut()
                .append_pair("skip", &offset.to_string());
        }

        Ok(url)
    }

    /// Builds the detail page URL for one paper
    pub fn abstract_page(&self, paper_id: &str) -> UrlResult<Url> {
        self.base
            .join(&format!("abs/{}", paper_id))
            .map_err(|e| UrlError::Parse(e.to_string()))
    }

    /// Referer sent with a request for `url`
    pub fn referer_for(&self, url: &Url) -> String {
        if is_listing_url(url) {
            match self.base.join("list/") {
                Ok(list_root) => list_root.to_string(),
                Err(_) => self.base.to_string(),
            }
        } else {
            self.base.to_string()
        }
    }
}

/// Returns true for listing (index) pages
pub fn is_listing_url(url: &Url) -> bool {
    url.path().contains("/list/")
}

/// Checks that a category name is safe to splice into a path
pub fn validate_category(category: &str) -> UrlResult<()> {
    let valid = !category.is_empty()
        && category
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(UrlError::InvalidCategory(category.to_string()))
    }
}
