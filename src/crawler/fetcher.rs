//! HTTP fetcher implementation
//!
//! This module performs one logical page retrieval as a bounded loop of
//! attempts. Each failed attempt is classified, followed by a backoff window
//! that depends on the class and the attempt index, and the session identity
//! is replaced before anything is sent again.
//!
//! # Retry Logic
//!
//! | Condition | Backoff before retry (s) | Cooldown when exhausted (s) | Session |
//! |-----------|--------------------------|-----------------------------|---------|
//! | Timeout | 10+5a .. 20+5a | 10..20 | new identity |
//! | Connection error | 10+5a .. 20+5a | 30..60 | new identity |
//! | Other HTTP / request error | 10+5a .. 20+5a | 10..20 | new identity |
//! | Challenge page | 15+10a .. 25+10a | 60..120 | new identity |
//! | HTTP 400 | 30+15a .. 60+15a | 30..60 | rebuilt |
//!
//! `a` is the zero-based attempt index.

use crate::config::Config;
use crate::crawler::delay::{pause, DelayBounds};
use crate::crawler::session::Session;
use crate::url::SiteUrls;
use crate::HarvestError;
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Minimum body size that can be a challenge page
const CHALLENGE_MIN_BYTES: usize = 100;

/// Case-insensitive markers of an anti-automation interstitial
const CHALLENGE_MARKERS: &[&str] = &[
    "recaptcha",
    "i'm not a robot",
    "verify you're human",
    "cloudflare",
    "challenge-platform",
    "cf-challenge",
    "checking your browser",
];

/// Returns true when a response body is a bot-challenge page
pub fn looks_like_challenge(body: &str) -> bool {
    if body.len() < CHALLENGE_MIN_BYTES {
        return false;
    }
    let lower = body.to_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request exceeded the per-call timeout
    Timeout,
    /// The connection could not be established
    Connect,
    /// The site served a challenge page instead of content
    Challenge,
    /// HTTP 400; the network identity itself is likely flagged
    MalformedRequest,
    /// Any other non-success status
    HttpStatus(u16),
    /// Any other request or body error
    Request,
}

/// What happens to the session after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    RotateIdentity,
    Rebuild,
}

impl FailureKind {
    /// Backoff window before attempt `attempt + 1`
    pub fn backoff_window(&self, attempt: u32) -> DelayBounds {
        let a = u64::from(attempt);
        match self {
            Self::Challenge => DelayBounds::secs(15 + a * 10, 25 + a * 10),
            Self::MalformedRequest => DelayBounds::secs(30 + a * 15, 60 + a * 15),
            Self::Timeout | Self::Connect | Self::HttpStatus(_) | Self::Request => {
                DelayBounds::secs(10 + a * 5, 20 + a * 5)
            }
        }
    }

    /// Wait imposed after the last attempt failed with this kind
    pub fn cooldown(&self) -> DelayBounds {
        match self {
            Self::Challenge => DelayBounds::secs(60, 120),
            Self::Connect | Self::MalformedRequest => DelayBounds::secs(30, 60),
            Self::Timeout | Self::HttpStatus(_) | Self::Request => DelayBounds::secs(10, 20),
        }
    }

    pub fn session_action(&self) -> SessionAction {
        match self {
            Self::MalformedRequest => SessionAction::Rebuild,
            _ => SessionAction::RotateIdentity,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Connect => f.write_str("connection error"),
            Self::Challenge => f.write_str("challenge page"),
            Self::MalformedRequest => f.write_str("HTTP 400"),
            Self::HttpStatus(code) => write!(f, "HTTP {}", code),
            Self::Request => f.write_str("request error"),
        }
    }
}

/// A logical fetch that ran out of attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// Classification of the final attempt
    pub kind: FailureKind,
    /// Attempts made
    pub attempts: u32,
    /// HTTP 400 responses seen across all attempts
    pub malformed_responses: u32,
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Page content from a successful, non-challenge response
    Success {
        body: String,
        attempts: u32,
    },

    /// Every attempt failed
    Failed(FetchFailure),
}

/// Issues page retrievals against one site
#[derive(Debug, Clone)]
pub struct Fetcher {
    urls: SiteUrls,
    max_attempts: u32,
    timeout: Duration,
    delay_scale: f64,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self, HarvestError> {
        Ok(Self {
            urls: SiteUrls::new(&config.crawler.base_url)?,
            max_attempts: config.fetch.max_attempts.max(1),
            timeout: config.fetch.timeout(),
            delay_scale: config.crawler.delay_scale,
        })
    }

    pub fn urls(&self) -> &SiteUrls {
        &self.urls
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay_scale(&self) -> f64 {
        self.delay_scale
    }

    /// Builds a fresh session with this fetcher's timeout
    pub fn new_session(&self) -> Result<Session, HarvestError> {
        Ok(Session::new(self.timeout)?)
    }

    /// Fetches a page with up to `max_attempts` attempts
    ///
    /// Never loops past the attempt bound. Every failed attempt rotates or
    /// rebuilds the session before anything else is sent, and an exhausted
    /// fetch sleeps through the final cooldown before returning.
    ///
    /// # Returns
    ///
    /// * `Ok(FetchResult)` - The page, or the classified failure
    /// * `Err(HarvestError)` - A replacement HTTP client could not be built
    pub async fn fetch(&self, session: &mut Session, url: &Url) -> Result<FetchResult, HarvestError> {
        let mut malformed_responses = 0;
        let mut attempt = 0;

        loop {
            let kind = match self.attempt(session, url).await {
                Ok(body) => {
                    return Ok(FetchResult::Success {
                        body,
                        attempts: attempt + 1,
                    })
                }
                Err(kind) => kind,
            };

            if kind == FailureKind::MalformedRequest {
                malformed_responses += 1;
            }

            let attempts = attempt + 1;
            let exhausted = attempts >= self.max_attempts;

            if exhausted {
                tracing::warn!(
                    "Giving up on {} after {} attempts ({})",
                    url,
                    attempts,
                    kind
                );
            } else {
                tracing::warn!(
                    "{} for {} (attempt {}/{}), backing off",
                    kind,
                    url,
                    attempts,
                    self.max_attempts
                );
                pause(kind.backoff_window(attempt), self.delay_scale).await;
            }

            match kind.session_action() {
                SessionAction::RotateIdentity => session.rotate_identity()?,
                SessionAction::Rebuild => session.rebuild()?,
            }

            if exhausted {
                pause(kind.cooldown(), self.delay_scale).await;
                return Ok(FetchResult::Failed(FetchFailure {
                    kind,
                    attempts,
                    malformed_responses,
                }));
            }

            attempt += 1;
        }
    }

    /// One network round trip, classified
    async fn attempt(&self, session: &Session, url: &Url) -> Result<String, FailureKind> {
        let referer = self.urls.referer_for(url);
        let headers = session.identity().request_headers(Some(&referer));

        let response = session
            .client()
            .get(url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(|e| classify_error(&e))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            return Err(FailureKind::MalformedRequest);
        }

        let body = response.text().await.map_err(|e| classify_error(&e))?;

        if looks_like_challenge(&body) {
            return Err(FailureKind::Challenge);
        }

        if !status.is_success() {
            return Err(FailureKind::HttpStatus(status.as_u16()));
        }

        Ok(body)
    }
}

fn classify_error(error: &reqwest::Error) -> FailureKind {
    if error.is_timeout() {
        FailureKind::Timeout
    } else if error.is_connect() {
        FailureKind::Connect
    } else {
        FailureKind::Request
    }
}
