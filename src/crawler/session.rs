//! Network identity owned by the fetch loop
//!
//! A [`Session`] is one HTTP client, its cookie jar and the outward-facing
//! [`Identity`] used to build request headers. Identity rotation replaces the
//! client, jar and identity wholesale; nothing from the previous identity is
//! merged into the new one.

use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Browser user agents drawn from on every rotation
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 OPR/106.0.0.0",
    "Mozilla/5.0 (X11; CrOS x86_64 15359.58.0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.5615.134 Safari/537.36",
];

/// Accept-Language values drawn from on every rotation
pub const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9",
    "en-US,en;q=0.9,tr;q=0.8",
    "en-US,en;q=0.9,de;q=0.8",
];

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

/// The fingerprint a session presents to the site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_agent: &'static str,
    pub accept_language: &'static str,
}

impl Identity {
    pub fn random() -> Self {
        Self {
            user_agent: USER_AGENTS[fastrand::usize(..USER_AGENTS.len())],
            accept_language: ACCEPT_LANGUAGES[fastrand::usize(..ACCEPT_LANGUAGES.len())],
        }
    }

    /// Draws an identity whose user agent differs from `current`'s
    pub fn random_excluding(current: &Identity) -> Self {
        let current_index = USER_AGENTS
            .iter()
            .position(|ua| *ua == current.user_agent);

        let user_agent = match current_index {
            Some(index) if USER_AGENTS.len() > 1 => {
                let mut pick = fastrand::usize(..USER_AGENTS.len() - 1);
                if pick >= index {
                    pick += 1;
                }
                USER_AGENTS[pick]
            }
            _ => USER_AGENTS[fastrand::usize(..USER_AGENTS.len())],
        };

        Self {
            user_agent,
            accept_language: ACCEPT_LANGUAGES[fastrand::usize(..ACCEPT_LANGUAGES.len())],
        }
    }

    /// Browser-like headers for one request
    pub fn request_headers(&self, referer: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(self.accept_language));
        headers.insert(HeaderName::from_static("dnt"), HeaderValue::from_static("1"));
        headers.insert(
            HeaderName::from_static("upgrade-insecure-requests"),
            HeaderValue::from_static("1"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-dest"),
            HeaderValue::from_static("document"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-mode"),
            HeaderValue::from_static("navigate"),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-site"),
            HeaderValue::from_static(if referer.is_some() { "same-origin" } else { "none" }),
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-user"),
            HeaderValue::from_static("?1"),
        );
        headers.insert(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("max-age=0"),
        );

        if let Some(value) = referer.and_then(|r| HeaderValue::from_str(r).ok()) {
            headers.insert(REFERER, value);
        }

        headers
    }
}

/// HTTP client, cookie jar and identity for the single scan loop
#[derive(Debug)]
pub struct Session {
    client: Client,
    identity: Identity,
    timeout: Duration,
    generation: u64,
    identity_rotations: u64,
}

impl Session {
    /// Builds a session with a fresh random identity and an empty cookie jar
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let identity = Identity::random();
        Ok(Self {
            client: build_client(&identity, timeout)?,
            identity,
            timeout,
            generation: 0,
            identity_rotations: 0,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Incremented every time the whole session is rebuilt
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Identity rotations since the last rebuild
    pub fn identity_rotations(&self) -> u64 {
        self.identity_rotations
    }

    /// Replaces identity, headers and cookies with new ones
    pub fn rotate_identity(&mut self) -> Result<(), reqwest::Error> {
        let identity = Identity::random_excluding(&self.identity);
        self.client = build_client(&identity, self.timeout)?;
        self.identity = identity;
        self.identity_rotations += 1;
        tracing::debug!("Rotated identity to {}", identity.user_agent);
        Ok(())
    }

    /// Discards the whole session, connection pool included, for a new one
    pub fn rebuild(&mut self) -> Result<(), reqwest::Error> {
        let mut fresh = Session::new(self.timeout)?;
        if fresh.identity == self.identity {
            fresh.identity = Identity::random_excluding(&self.identity);
            fresh.client = build_client(&fresh.identity, self.timeout)?;
        }
        fresh.generation = self.generation + 1;
        *self = fresh;
        tracing::debug!("Rebuilt session (generation {})", self.generation);
        Ok(())
    }
}

/// Builds a client bound to one identity with its own empty cookie jar
fn build_client(identity: &Identity, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(identity.user_agent)
        .cookie_provider(Arc::new(Jar::default()))
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}
