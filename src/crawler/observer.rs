//! Progress reporting hooks
//!
//! The crawl loop reports what it does through a [`CrawlObserver`]. Observers
//! only watch: nothing they do feeds back into pacing, deduplication or
//! persistence.

use crate::crawler::category::ScanEnd;
use crate::crawler::orchestrator::CrawlReport;
use crate::crawler::pacing::{OffsetRange, PacingTier};
use crate::storage::Record;

/// Receives crawl events. Every method defaults to doing nothing.
pub trait CrawlObserver: Send + Sync {
    fn run_started(&self, _preexisting: u64, _target: u64) {}

    fn category_started(&self, _category: &str, _tier: &PacingTier, _remaining: u64) {}

    /// A listing page was fetched; `new_items` counts candidates not yet seen
    fn page_scanned(&self, _category: &str, _offset: u64, _new_items: usize) {}

    fn range_abandoned(&self, _category: &str, _range: &OffsetRange, _offset: u64) {}

    fn category_finished(&self, _category: &str, _collected: u64, _end: ScanEnd) {}

    fn category_abandoned(&self, _category: &str, _malformed_fetches: u32) {}

    fn record_collected(&self, _record: &Record, _total: u64, _target: u64) {}

    fn session_rotated(&self, _generation: u64) {}

    fn flushed(&self, _written: usize) {}

    fn run_finished(&self, _report: &CrawlReport) {}
}

/// Ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CrawlObserver for NoopObserver {}

/// Logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CrawlObserver for TracingObserver {
    fn run_started(&self, preexisting: u64, target: u64) {
        tracing::info!(
            "Starting harvest: {} existing records, target {}",
            preexisting,
            target
        );
    }

    fn category_started(&self, category: &str, tier: &PacingTier, remaining: u64) {
        tracing::info!(
            "Scanning {} ({} remaining, {} tier, step {}, {} ranges)",
            category,
            remaining,
            tier.kind,
            tier.step_size,
            tier.offset_ranges.len()
        );
    }

    fn page_scanned(&self, category: &str, offset: u64, new_items: usize) {
        tracing::debug!(
            "{} offset {}: {} new candidates",
            category,
            offset,
            new_items
        );
    }

    fn range_abandoned(&self, category: &str, range: &OffsetRange, offset: u64) {
        tracing::debug!(
            "{}: abandoning range {} at offset {}",
            category,
            range,
            offset
        );
    }

    fn category_finished(&self, category: &str, collected: u64, end: ScanEnd) {
        tracing::info!("{}: collected {} records ({})", category, collected, end);
    }

    fn category_abandoned(&self, category: &str, malformed_fetches: u32) {
        tracing::warn!(
            "{}: abandoned after {} fetches failed on malformed requests",
            category,
            malformed_fetches
        );
    }

    fn record_collected(&self, record: &Record, total: u64, target: u64) {
        tracing::debug!("Collected {} ({}/{})", record.id(), total, target);
        if total % 10 == 0 {
            tracing::info!("Progress: {}/{} records", total, target);
        }
    }

    fn session_rotated(&self, generation: u64) {
        tracing::info!("Session rebuilt (generation {})", generation);
    }

    fn flushed(&self, written: usize) {
        tracing::info!("Saved {} records", written);
    }

    fn run_finished(&self, report: &CrawlReport) {
        tracing::info!(
            "Harvest {}: {} new records, {} total, {} categories visited",
            report.outcome,
            report.new_records,
            report.total(),
            report.categories_visited
        );
    }
}
