//! End-to-end harvest runs against a mock listing site

use crate::common::{
    has_duplicates, id_only_listing_html, paper_id, skip_of, stored_ids, test_config, write_store,
    AbstractResponder, ListingResponder,
};
use arxiv_harvest::crawler::{
    CategoryScan, CrawlObserver, Fetcher, NoopObserver, Orchestrator, RunOutcome, ScanContext,
    ScanEnd,
};
use arxiv_harvest::storage::{Record, RecordStore, StorageError, StorageResult};
use arxiv_harvest::{CrawlState, HarvestError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

async fn listing_server(per_page: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list/cs.AI/recent"))
        .respond_with(ListingResponder::new(per_page))
        .mount(&server)
        .await;
    server
}

/// Fires once the running total reaches a given count
struct NotifyAt {
    total: u64,
    notify: Arc<Notify>,
}

impl CrawlObserver for NotifyAt {
    fn record_collected(&self, _record: &Record, total: u64, _target: u64) {
        if total == self.total {
            self.notify.notify_one();
        }
    }
}

/// Answers the first listing page with a fixed status, later pages normally
struct FirstPageStatus {
    status: u16,
    pages: ListingResponder,
}

impl Respond for FirstPageStatus {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        if skip_of(request) == 0 {
            ResponseTemplate::new(self.status)
        } else {
            self.pages.respond(request)
        }
    }
}

/// Rejects its first append, then keeps every row
#[derive(Default)]
struct FlakyStore {
    failed_once: bool,
    rows: Vec<Record>,
}

impl RecordStore for FlakyStore {
    fn load_existing_ids(&self) -> HashSet<String> {
        HashSet::new()
    }

    fn append(&mut self, records: &[Record]) -> StorageResult<usize> {
        if !self.failed_once {
            self.failed_once = true;
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.rows.extend_from_slice(records);
        Ok(records.len())
    }
}

#[tokio::test]
async fn test_halts_exactly_at_target() {
    let server = listing_server(25).await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("human_abstracts.csv");

    // 10 ids overlap the first listing page, 2960 come from elsewhere.
    let mut existing: Vec<String> = (0..10).map(paper_id).collect();
    existing.extend((0..2960).map(|n| format!("2301.{:05}", n)));
    write_store(&output, &existing);

    let config = test_config(&server.uri(), &output, 3000);
    let mut orchestrator = Orchestrator::from_config(config)
        .unwrap()
        .with_observer(NoopObserver);
    assert_eq!(orchestrator.state().preexisting(), 2970);

    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::TargetReached);
    assert_eq!(report.new_records, 30);
    assert_eq!(report.total(), 3000);

    let ids = stored_ids(&output);
    assert_eq!(ids.len(), 3000);
    assert!(!has_duplicates(&ids));

    let appended: Vec<String> = ids[2970..].to_vec();
    let expected: Vec<String> = (10..40).map(paper_id).collect();
    assert_eq!(appended, expected);

    // Offsets 0 and 25 were enough; nothing past the target was requested.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_resumed_runs_never_duplicate() {
    let server = listing_server(25).await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");

    let first = Orchestrator::from_config(test_config(&server.uri(), &output, 60))
        .unwrap()
        .with_observer(NoopObserver)
        .run()
        .await
        .unwrap();
    assert_eq!(first.outcome, RunOutcome::TargetReached);
    assert_eq!(stored_ids(&output).len(), 60);

    let mut second = Orchestrator::from_config(test_config(&server.uri(), &output, 120))
        .unwrap()
        .with_observer(NoopObserver);
    assert_eq!(second.state().preexisting(), 60);
    let report = second.run().await.unwrap();

    assert_eq!(report.outcome, RunOutcome::TargetReached);
    assert_eq!(report.new_records, 60);

    let ids = stored_ids(&output);
    assert_eq!(ids.len(), 120);
    assert!(!has_duplicates(&ids));
}

#[tokio::test]
async fn test_interrupt_flushes_partial_batch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list/cs.AI/recent"))
        .respond_with(ListingResponder {
            per_page: 24,
            later_page_delay: Some(Duration::from_secs(60)),
        })
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let mut config = test_config(&server.uri(), &output, 1000);
    config.fetch.timeout_secs = 120;
    config.output.batch_size = 25;

    let notify = Arc::new(Notify::new());
    let mut orchestrator = Orchestrator::from_config(config)
        .unwrap()
        .with_observer(NotifyAt {
            total: 24,
            notify: notify.clone(),
        });

    let report = orchestrator
        .run_until(async move { notify.notified().await })
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert_eq!(report.new_records, 24);

    let content = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 25);
    assert_eq!(lines[0], "abstract_text,source_url,license_info,label");

    let ids = stored_ids(&output);
    assert_eq!(ids.len(), 24);
    assert!(!has_duplicates(&ids));
}

#[tokio::test]
async fn test_detail_pages_fetched_only_for_unseen_ids() {
    let server = MockServer::start().await;
    let listed: Vec<String> = (0..4).map(paper_id).collect();
    Mock::given(method("GET"))
        .and(path("/list/cs.AI/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(id_only_listing_html(&listed)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/abs/"))
        .respond_with(AbstractResponder)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    write_store(&output, &[paper_id(0)]);

    let report = Orchestrator::from_config(test_config(&server.uri(), &output, 3))
        .unwrap()
        .with_observer(NoopObserver)
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::TargetReached);
    assert_eq!(stored_ids(&output), vec![paper_id(0), paper_id(1), paper_id(2)]);

    let detail_paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .filter(|p| p.starts_with("/abs/"))
        .collect();
    assert_eq!(
        detail_paths,
        vec![format!("/abs/{}", paper_id(1)), format!("/abs/{}", paper_id(2))]
    );
}

#[tokio::test]
async fn test_bad_requests_abandon_category() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list/cs.AI/recent"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list/cs.LG/recent"))
        .respond_with(ListingResponder::new(25))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let mut config = test_config(&server.uri(), &output, 500);
    config.crawler.categories = vec!["cs.AI".to_string(), "cs.LG".to_string()];

    let report = Orchestrator::from_config(config)
        .unwrap()
        .with_observer(NoopObserver)
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::TargetReached);
    assert_eq!(report.categories_visited, 2);
    assert_eq!(report.categories_abandoned, 1);

    // Five logical fetches of five attempts each before cs.AI is given up.
    let requests = server.received_requests().await.unwrap();
    let abandoned = requests
        .iter()
        .filter(|r| r.url.path() == "/list/cs.AI/recent")
        .count();
    assert_eq!(abandoned, 25);
    assert_eq!(stored_ids(&output).len(), 500);
}

#[tokio::test]
async fn test_one_rejected_page_does_not_abandon_category() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list/cs.AI/recent"))
        .respond_with(FirstPageStatus {
            status: 400,
            pages: ListingResponder::new(25),
        })
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");

    let report = Orchestrator::from_config(test_config(&server.uri(), &output, 500))
        .unwrap()
        .with_observer(NoopObserver)
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::TargetReached);
    assert_eq!(report.categories_abandoned, 0);
    assert_eq!(report.new_records, 500);

    // Offset 0 used all five attempts; offsets 50 through 1000 then filled the target.
    assert_eq!(server.received_requests().await.unwrap().len(), 25);
    let ids = stored_ids(&output);
    assert_eq!(ids.len(), 500);
    assert!(!has_duplicates(&ids));
}

#[tokio::test]
async fn test_failure_streak_cools_down_and_rotates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), &dir.path().join("out.csv"), 500);
    config.fetch.max_attempts = 1;
    let fetcher = Fetcher::new(&config).unwrap();
    let mut session = fetcher.new_session().unwrap();
    let mut state = CrawlState::new(HashSet::new(), 500);

    let mut scan = CategoryScan::new("cs.AI", 500, "license", 1000);
    let mut ctx = ScanContext {
        fetcher: &fetcher,
        session: &mut session,
        state: &mut state,
        observer: &NoopObserver,
    };
    while scan.next(&mut ctx).await.unwrap().is_some() {}

    // Ten failed pages use up the standard tier's tolerance for its one range.
    assert_eq!(scan.end(), Some(ScanEnd::Exhausted));
    assert_eq!(scan.requests(), 10);
    assert_eq!(server.received_requests().await.unwrap().len(), 10);

    // One rotation per failed attempt plus one per streak of three.
    assert_eq!(session.identity_rotations(), 13);
}

#[tokio::test]
async fn test_scan_error_still_saves_buffered_records() {
    let server = listing_server(25).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), &dir.path().join("out.csv"), 100);
    config.output.batch_size = 5;

    let mut orchestrator = Orchestrator::new(config, FlakyStore::default())
        .unwrap()
        .with_observer(NoopObserver);

    // The fifth record triggers a flush that fails and stops the scan.
    let result = orchestrator.run().await;
    assert!(matches!(result, Err(HarvestError::Storage(_))));

    // The final flush still wrote the batch the failed one held.
    let rows = &orchestrator.store().rows;
    assert_eq!(rows.len(), 5);
    let ids: Vec<String> = rows.iter().map(|r| r.id().to_string()).collect();
    assert_eq!(ids, (0..5).map(paper_id).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_empty_site_is_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>No papers</body></html>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");

    let report = Orchestrator::from_config(test_config(&server.uri(), &output, 10))
        .unwrap()
        .with_observer(NoopObserver)
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Exhausted);
    assert_eq!(report.new_records, 0);
    assert!(!output.exists());

    // The final tier tolerates a single empty page.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_request_ceiling_bounds_a_category() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>No papers</body></html>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let mut config = test_config(&server.uri(), &output, 1000);
    config.crawler.max_requests_per_category = 7;

    let report = Orchestrator::from_config(config)
        .unwrap()
        .with_observer(NoopObserver)
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Exhausted);
    assert_eq!(server.received_requests().await.unwrap().len(), 7);
}

#[tokio::test]
async fn test_session_rebuilt_periodically() {
    let server = listing_server(25).await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let mut config = test_config(&server.uri(), &output, 30);
    config.crawler.rotate_session_every = 10;

    let report = Orchestrator::from_config(config)
        .unwrap()
        .with_observer(NoopObserver)
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::TargetReached);
    // Rebuilds at 10 and 20; reaching 30 ends the run instead.
    assert_eq!(report.session_rotations, 2);

    let ids: HashSet<String> = stored_ids(&output).into_iter().collect();
    assert_eq!(ids.len(), 30);
}
