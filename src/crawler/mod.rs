//! Crawler module for listing retrieval and record extraction
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with bounded retries and session rotation
//! - Listing and abstract page parsing
//! - Quota-driven pacing tiers
//! - Per-category scanning and overall orchestration

mod category;
mod delay;
mod fetcher;
mod observer;
mod orchestrator;
mod pacing;
mod parser;
mod session;

pub use category::{
    CategoryScan, ScanContext, ScanEnd, FAILURE_STREAK_LIMIT, LISTING_BATCH_SIZE, MALFORMED_LIMIT,
};
pub use delay::{pause, DelayBounds};
pub use fetcher::{looks_like_challenge, FailureKind, FetchFailure, FetchResult, Fetcher, SessionAction};
pub use observer::{CrawlObserver, NoopObserver, TracingObserver};
pub use orchestrator::{run_crawl, CrawlReport, Orchestrator, RunOutcome};
pub use pacing::{
    tier_for, OffsetIter, OffsetRange, PacingTier, StalePagePolicy, TierKind, MAX_OFFSET,
    STANDARD_STALE_OFFSET,
};
pub use parser::{
    clean_abstract, parse_abstract_page, parse_listing,
    ListingEntry, ListingPage, MIN_DETAIL_ABSTRACT_CHARS, MIN_LISTING_ABSTRACT_CHARS,
};
pub use session::{Identity, Session, ACCEPT_LANGUAGES, USER_AGENTS};

use crate::config::Config;
use crate::HarvestError;

/// Runs a complete harvest
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Load existing record ids from the output store
/// 2. Scan categories until the target is reached or Ctrl-C arrives
/// 3. Flush every buffered record before returning
///
/// # Arguments
///
/// * `config` - The harvester configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - How the run ended
/// * `Err(HarvestError)` - The run failed; buffered records were still saved
pub async fn crawl(config: Config) -> Result<CrawlReport, HarvestError> {
    run_crawl(config).await
}
