//! Crawl orchestration
//!
//! The orchestrator owns every piece of mutable crawl state: the session, the
//! dedup set and the buffered output store. It walks categories in their
//! configured order, feeds new records into the buffer and guarantees a final
//! flush on every exit path, including interruption and scan errors.

use crate::config::{validate, Config};
use crate::crawler::category::{CategoryScan, ScanContext, ScanEnd};
use crate::crawler::delay::{pause, DelayBounds};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::observer::{CrawlObserver, TracingObserver};
use crate::crawler::session::Session;
use crate::state::CrawlState;
use crate::storage::{BufferedStore, CsvStore, Record, RecordStore};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;

/// Pause after a periodic session rebuild
const ROTATION_PAUSE: DelayBounds = DelayBounds::secs(5, 10);

/// How a crawl run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The store holds `target` unique records
    TargetReached,
    /// Every category was scanned without reaching the target
    Exhausted,
    /// The shutdown signal fired first
    Interrupted,
    /// The scan loop hit an unrecoverable error
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetReached => f.write_str("target reached"),
            Self::Exhausted => f.write_str("categories exhausted"),
            Self::Interrupted => f.write_str("interrupted"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Summary of one crawl run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub preexisting: u64,
    pub new_records: u64,
    pub target: u64,
    pub categories_visited: usize,
    pub categories_abandoned: usize,
    /// Periodic session rebuilds
    pub session_rotations: u64,
    pub flushes: u64,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlReport {
    /// Unique records in the store after the run
    pub fn total(&self) -> u64 {
        self.preexisting + self.new_records
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Drives a crawl run from the first category to the final flush
pub struct Orchestrator<S: RecordStore> {
    config: Config,
    fetcher: Fetcher,
    session: Session,
    state: CrawlState,
    store: BufferedStore<S>,
    observer: Box<dyn CrawlObserver>,

    categories_visited: usize,
    categories_abandoned: usize,
    session_rotations: u64,
    flushes: u64,
}

impl Orchestrator<CsvStore> {
    /// Builds an orchestrator writing to the configured CSV store
    pub fn from_config(config: Config) -> Result<Self, HarvestError> {
        let store = CsvStore::new(&config.output.path);
        Self::new(config, store)
    }
}

impl<S: RecordStore> Orchestrator<S> {
    /// Creates an orchestrator, seeding the dedup set from `store`
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to run
    /// * `Err(HarvestError)` - Invalid configuration or HTTP client failure
    pub fn new(config: Config, store: S) -> Result<Self, HarvestError> {
        validate(&config)?;

        let existing = store.load_existing_ids();
        tracing::info!("Loaded {} existing record ids", existing.len());

        let fetcher = Fetcher::new(&config)?;
        let session = fetcher.new_session()?;
        let state = CrawlState::new(existing, config.crawler.target);
        let store = BufferedStore::new(
            store,
            config.output.batch_size,
            config.output.save_interval(),
        );

        Ok(Self {
            config,
            fetcher,
            session,
            state,
            store,
            observer: Box::new(TracingObserver),
            categories_visited: 0,
            categories_abandoned: 0,
            session_rotations: 0,
            flushes: 0,
        })
    }

    /// Replaces the default tracing observer
    pub fn with_observer(mut self, observer: impl CrawlObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn store(&self) -> &S {
        self.store.store()
    }

    /// Runs until the target is reached or every category is scanned
    pub async fn run(&mut self) -> Result<CrawlReport, HarvestError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs until done or until `shutdown` completes
    ///
    /// Buffered records are flushed on every exit path. When the scan loop
    /// fails, the flush happens first and the scan error is returned.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<CrawlReport, HarvestError>
    where
        F: Future,
    {
        let started_at = Utc::now();
        self.observer
            .run_started(self.state.preexisting(), self.state.target());

        let scanned = tokio::select! {
            result = self.scan_all() => Some(result),
            _ = shutdown => None,
        };

        let (outcome, scan_error) = match scanned {
            Some(Ok(outcome)) => (outcome, None),
            Some(Err(e)) => {
                tracing::error!("Harvest failed: {}", e);
                (RunOutcome::Failed, Some(e))
            }
            None => {
                tracing::warn!(
                    "Interrupted; saving {} buffered records",
                    self.store.buffered()
                );
                (RunOutcome::Interrupted, None)
            }
        };

        let flushed = self.flush();

        let report = CrawlReport {
            preexisting: self.state.preexisting(),
            new_records: self.state.collected(),
            target: self.state.target(),
            categories_visited: self.categories_visited,
            categories_abandoned: self.categories_abandoned,
            session_rotations: self.session_rotations,
            flushes: self.flushes,
            outcome,
            started_at,
            finished_at: Utc::now(),
        };
        self.observer.run_finished(&report);

        if let Some(e) = scan_error {
            if let Err(flush_error) = flushed {
                tracing::error!("Final save failed: {}", flush_error);
            }
            return Err(e);
        }
        flushed?;

        Ok(report)
    }

    fn flush(&mut self) -> Result<(), HarvestError> {
        let written = self.store.flush()?;
        if written > 0 {
            self.flushes += 1;
            self.observer.flushed(written);
        }
        Ok(())
    }

    async fn scan_all(&mut self) -> Result<RunOutcome, HarvestError> {
        if self.state.is_complete() {
            tracing::info!(
                "Store already holds {} of {} records",
                self.state.total(),
                self.state.target()
            );
            return Ok(RunOutcome::TargetReached);
        }

        let categories = self.config.crawler.categories.clone();
        for category in &categories {
            if self.state.is_complete() {
                break;
            }

            let remaining = self.state.remaining();
            let mut scan = CategoryScan::new(
                category.as_str(),
                remaining,
                self.config.output.license.as_str(),
                self.config.crawler.max_requests_per_category,
            );
            self.categories_visited += 1;
            self.observer.category_started(category, scan.tier(), remaining);

            loop {
                let next = {
                    let mut ctx = ScanContext {
                        fetcher: &self.fetcher,
                        session: &mut self.session,
                        state: &mut self.state,
                        observer: self.observer.as_ref(),
                    };
                    scan.next(&mut ctx).await?
                };

                let Some(record) = next else {
                    break;
                };
                self.collect(record).await?;

                if self.state.is_complete() {
                    break;
                }
            }

            let end = scan.end().unwrap_or(ScanEnd::Satisfied);
            if end == ScanEnd::Abandoned {
                self.categories_abandoned += 1;
            }
            self.observer
                .category_finished(category, scan.collected(), end);
        }

        if self.state.is_complete() {
            Ok(RunOutcome::TargetReached)
        } else {
            tracing::warn!(
                "All categories scanned; {} of {} records",
                self.state.total(),
                self.state.target()
            );
            Ok(RunOutcome::Exhausted)
        }
    }

    /// Buffers a claimed record and applies the periodic session rebuild
    async fn collect(&mut self, record: Record) -> Result<(), HarvestError> {
        let total = self.state.total();
        self.observer
            .record_collected(&record, total, self.state.target());

        let written = self.store.push(record)?;
        if written > 0 {
            self.flushes += 1;
            self.observer.flushed(written);
        }

        let every = self.config.crawler.rotate_session_every;
        if every > 0 && total % every == 0 && !self.state.is_complete() {
            self.session.rebuild()?;
            self.session_rotations += 1;
            self.observer.session_rotated(self.session.generation());
            pause(ROTATION_PAUSE, self.fetcher.delay_scale()).await;
        }

        Ok(())
    }
}

/// Loads the configured store and runs a crawl until done or Ctrl-C
pub async fn run_crawl(config: Config) -> Result<CrawlReport, HarvestError> {
    let mut orchestrator = Orchestrator::from_config(config)?;
    orchestrator
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}
