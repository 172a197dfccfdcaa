//! Scan of one category's listing pages
//!
//! A [`CategoryScan`] walks the offset ranges of the pacing tier chosen when
//! the scan starts and hands back new records one at a time. Deduplication
//! happens when a record is handed back, through [`CrawlState::claim`], so a
//! record is never produced twice even when ranges overlap.

use crate::crawler::delay::{pause, DelayBounds};
use crate::crawler::fetcher::{FetchFailure, FetchResult, Fetcher};
use crate::crawler::observer::CrawlObserver;
use crate::crawler::pacing::{tier_for, OffsetIter, OffsetRange, PacingTier, StalePagePolicy};
use crate::crawler::parser::{parse_abstract_page, parse_listing, ListingEntry};
use crate::crawler::session::Session;
use crate::state::CrawlState;
use crate::storage::Record;
use crate::HarvestError;
use std::collections::VecDeque;
use std::fmt;

/// Consecutive listing failures before the scan cools down
pub const FAILURE_STREAK_LIMIT: u32 = 3;

/// Fetches failing on malformed-request responses that abandon a category
pub const MALFORMED_LIMIT: u32 = 5;

/// Records taken from listings between two batch pauses
pub const LISTING_BATCH_SIZE: u64 = 5;

const FAILURE_STREAK_COOLDOWN: DelayBounds = DelayBounds::secs(30, 60);
const DETAIL_PAUSE: DelayBounds = DelayBounds::millis(1000, 2000);
const LISTING_BATCH_PAUSE: DelayBounds = DelayBounds::millis(500, 1000);

/// Everything a scan borrows from its caller for one step
pub struct ScanContext<'a> {
    pub fetcher: &'a Fetcher,
    pub session: &'a mut Session,
    pub state: &'a mut CrawlState,
    pub observer: &'a dyn CrawlObserver,
}

/// Why a category scan stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    /// The count requested for this category was collected
    Satisfied,
    /// Every offset range was scanned or abandoned
    Exhausted,
    /// The per-category request ceiling was hit
    RequestCeiling,
    /// Too many malformed-request responses
    Abandoned,
}

impl fmt::Display for ScanEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied => f.write_str("satisfied"),
            Self::Exhausted => f.write_str("ranges exhausted"),
            Self::RequestCeiling => f.write_str("request ceiling reached"),
            Self::Abandoned => f.write_str("abandoned"),
        }
    }
}

/// A candidate waiting to be handed back
#[derive(Debug)]
enum Pending {
    /// Abstract already read from the listing
    Ready(ListingEntry),
    /// Only the identifier is known; the detail page is fetched on demand
    Detail(String),
}

/// Pull-based scan over one category
pub struct CategoryScan {
    category: String,
    tier: PacingTier,
    license: String,
    wanted: u64,
    collected: u64,
    max_requests: u32,
    requests: u32,

    next_range: usize,
    current: Option<(OffsetRange, OffsetIter)>,
    empty_pages: u32,
    failure_streak: u32,
    malformed: u32,
    listing_records: u64,

    pending: VecDeque<Pending>,
    end: Option<ScanEnd>,
}

impl CategoryScan {
    /// Starts a scan wanting `wanted` records; the tier is fixed here
    pub fn new(category: impl Into<String>, wanted: u64, license: impl Into<String>, max_requests: u32) -> Self {
        Self {
            category: category.into(),
            tier: tier_for(wanted),
            license: license.into(),
            wanted,
            collected: 0,
            max_requests,
            requests: 0,
            next_range: 0,
            current: None,
            empty_pages: 0,
            failure_streak: 0,
            malformed: 0,
            listing_records: 0,
            pending: VecDeque::new(),
            end: None,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn tier(&self) -> &PacingTier {
        &self.tier
    }

    /// Records handed back so far
    pub fn collected(&self) -> u64 {
        self.collected
    }

    /// Logical fetches issued so far
    pub fn requests(&self) -> u32 {
        self.requests
    }

    /// Set once the scan has stopped
    pub fn end(&self) -> Option<ScanEnd> {
        self.end
    }

    /// Produces the next new record, or `None` once the scan has stopped
    ///
    /// # Errors
    ///
    /// Only fails when a replacement HTTP client cannot be built. Fetch
    /// failures are absorbed by the scan.
    pub async fn next(&mut self, ctx: &mut ScanContext<'_>) -> Result<Option<Record>, HarvestError> {
        loop {
            if self.end.is_some() {
                return Ok(None);
            }

            if self.collected >= self.wanted || ctx.state.is_complete() {
                self.end = Some(ScanEnd::Satisfied);
                return Ok(None);
            }

            if let Some(pending) = self.pending.pop_front() {
                if let Some(record) = self.resolve(pending, ctx).await? {
                    self.collected += 1;
                    return Ok(Some(record));
                }
                continue;
            }

            let Some(offset) = self.next_offset() else {
                self.end = Some(ScanEnd::Exhausted);
                continue;
            };

            if self.requests >= self.max_requests {
                tracing::info!(
                    "{}: request ceiling of {} reached",
                    self.category,
                    self.max_requests
                );
                self.end = Some(ScanEnd::RequestCeiling);
                continue;
            }

            self.scan_page(offset, ctx).await?;
        }
    }

    /// Next offset of the current range, moving to the next range as needed
    fn next_offset(&mut self) -> Option<u64> {
        loop {
            if let Some((_, offsets)) = self.current.as_mut() {
                if let Some(offset) = offsets.next() {
                    return Some(offset);
                }
            }

            let range = *self.tier.offset_ranges.get(self.next_range)?;
            self.next_range += 1;
            self.current = Some((range, range.offsets()));
            self.empty_pages = 0;
        }
    }

    fn abandon_range(&mut self, offset: u64, observer: &dyn CrawlObserver) {
        if let Some((range, _)) = self.current.take() {
            observer.range_abandoned(&self.category, &range, offset);
        }
    }

    async fn scan_page(&mut self, offset: u64, ctx: &mut ScanContext<'_>) -> Result<(), HarvestError> {
        let url = ctx.fetcher.urls().listing(&self.category, offset)?;

        pause(self.tier.delay, ctx.fetcher.delay_scale()).await;
        self.requests += 1;

        let body = match ctx.fetcher.fetch(ctx.session, &url).await? {
            FetchResult::Success { body, .. } => body,
            FetchResult::Failed(failure) => {
                self.listing_failed(offset, &failure, ctx).await?;
                return Ok(());
            }
        };

        self.failure_streak = 0;
        self.malformed = 0;

        let page = parse_listing(&body, ctx.fetcher.urls());
        if page.is_empty() {
            ctx.observer.page_scanned(&self.category, offset, 0);
            self.count_empty_page(offset, ctx.observer);
            return Ok(());
        }

        let before = self.pending.len();
        if page.needs_detail_fetch() {
            for id in page.ids {
                if !ctx.state.contains(&id) {
                    self.pending.push_back(Pending::Detail(id));
                }
            }
        } else {
            for entry in page.entries {
                if !ctx.state.contains(&entry.id) {
                    self.pending.push_back(Pending::Ready(entry));
                }
            }
        }
        let new_items = self.pending.len() - before;
        ctx.observer.page_scanned(&self.category, offset, new_items);

        if new_items > 0 {
            self.empty_pages = 0;
            return Ok(());
        }

        match self.tier.stale_pages {
            StalePagePolicy::CountTowardTolerance => self.count_empty_page(offset, ctx.observer),
            StalePagePolicy::AbandonPast(limit) if offset > limit => {
                self.abandon_range(offset, ctx.observer)
            }
            StalePagePolicy::AbandonPast(_) => {}
        }

        Ok(())
    }

    fn count_empty_page(&mut self, offset: u64, observer: &dyn CrawlObserver) {
        self.empty_pages += 1;
        if self.empty_pages >= self.tier.empty_page_tolerance {
            self.abandon_range(offset, observer);
        }
    }

    async fn listing_failed(
        &mut self,
        offset: u64,
        failure: &FetchFailure,
        ctx: &mut ScanContext<'_>,
    ) -> Result<(), HarvestError> {
        tracing::debug!(
            "{} offset {}: listing failed after {} attempts ({})",
            self.category,
            offset,
            failure.attempts,
            failure.kind
        );

        if self.record_malformed(failure, ctx.observer) {
            return Ok(());
        }

        self.failure_streak += 1;
        if self.failure_streak >= FAILURE_STREAK_LIMIT {
            tracing::warn!(
                "{}: {} consecutive failures, cooling down",
                self.category,
                self.failure_streak
            );
            pause(FAILURE_STREAK_COOLDOWN, ctx.fetcher.delay_scale()).await;
            ctx.session.rotate_identity()?;
            self.failure_streak = 0;
        }

        self.count_empty_page(offset, ctx.observer);
        Ok(())
    }

    /// Counts a fetch that saw any 400 response; true when the category is abandoned
    fn record_malformed(&mut self, failure: &FetchFailure, observer: &dyn CrawlObserver) -> bool {
        if failure.malformed_responses == 0 {
            return false;
        }
        self.malformed += 1;
        if self.malformed >= MALFORMED_LIMIT {
            observer.category_abandoned(&self.category, self.malformed);
            self.pending.clear();
            self.end = Some(ScanEnd::Abandoned);
            return true;
        }
        false
    }

    async fn resolve(&mut self, pending: Pending, ctx: &mut ScanContext<'_>) -> Result<Option<Record>, HarvestError> {
        match pending {
            Pending::Ready(entry) => {
                if !ctx.state.claim(&entry.id) {
                    return Ok(None);
                }
                if self.listing_batch_done() {
                    pause(LISTING_BATCH_PAUSE, ctx.fetcher.delay_scale()).await;
                }
                Ok(Some(Record::new(
                    entry.id,
                    entry.body_text,
                    entry.source_url,
                    self.license.clone(),
                )))
            }
            Pending::Detail(id) => {
                if ctx.state.contains(&id) {
                    return Ok(None);
                }
                if self.requests >= self.max_requests {
                    self.pending.clear();
                    return Ok(None);
                }
                self.fetch_detail(id, ctx).await
            }
        }
    }

    /// Counts a record taken from a listing; true after every full batch
    fn listing_batch_done(&mut self) -> bool {
        self.listing_records += 1;
        self.listing_records % LISTING_BATCH_SIZE == 0
    }

    async fn fetch_detail(&mut self, id: String, ctx: &mut ScanContext<'_>) -> Result<Option<Record>, HarvestError> {
        let url = ctx.fetcher.urls().abstract_page(&id)?;
        self.requests += 1;

        let result = ctx.fetcher.fetch(ctx.session, &url).await?;
        pause(DETAIL_PAUSE, ctx.fetcher.delay_scale()).await;

        let body = match result {
            FetchResult::Success { body, .. } => body,
            FetchResult::Failed(failure) => {
                tracing::debug!("Detail page for {} failed ({})", id, failure.kind);
                self.record_malformed(&failure, ctx.observer);
                return Ok(None);
            }
        };
        self.malformed = 0;

        let Some(text) = parse_abstract_page(&body) else {
            tracing::debug!("No abstract found on detail page for {}", id);
            return Ok(None);
        };

        if !ctx.state.claim(&id) {
            return Ok(None);
        }
        Ok(Some(Record::new(id, text, url.to_string(), self.license.clone())))
    }
}
