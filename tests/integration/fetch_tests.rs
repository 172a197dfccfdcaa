//! Fetcher behaviour against a live mock server

use crate::common::{challenge_html, listing_html, paper_id, test_config};
use arxiv_harvest::crawler::{FailureKind, FetchResult, Fetcher};
use std::net::TcpListener;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher_for(server: &MockServer) -> Fetcher {
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), &dir.path().join("out.csv"), 10);
    Fetcher::new(&config).unwrap()
}

fn listing_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/list/cs.AI/recent", server.uri())).unwrap()
}

fn carries_cookie(request: &wiremock::Request) -> bool {
    request
        .headers
        .keys()
        .any(|name| name.as_str().eq_ignore_ascii_case("cookie"))
}

#[tokio::test]
async fn test_repeated_challenges_fail_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list/cs.AI/recent"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(challenge_html())
                .insert_header("set-cookie", "cf_clearance=abc123; Path=/"),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let mut session = fetcher.new_session().unwrap();

    let result = fetcher.fetch(&mut session, &listing_url(&server)).await.unwrap();

    match result {
        FetchResult::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::Challenge);
            assert_eq!(failure.attempts, 5);
            assert_eq!(failure.malformed_responses, 0);
        }
        FetchResult::Success { .. } => panic!("challenge page was accepted"),
    }

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5);

    // Every retry ran on a fresh cookie jar.
    assert!(requests.iter().all(|r| !carries_cookie(r)));
    assert_eq!(session.identity_rotations(), 5);
}

#[tokio::test]
async fn test_recovers_after_challenges() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list/cs.AI/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(challenge_html()))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list/cs.AI/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&[paper_id(1)])))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let mut session = fetcher.new_session().unwrap();

    let result = fetcher.fetch(&mut session, &listing_url(&server)).await.unwrap();

    match result {
        FetchResult::Success { body, attempts } => {
            assert_eq!(attempts, 3);
            assert!(body.contains(&paper_id(1)));
        }
        FetchResult::Failed(failure) => panic!("fetch failed: {:?}", failure),
    }
    assert_eq!(session.identity_rotations(), 2);
}

#[tokio::test]
async fn test_bad_request_rebuilds_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list/cs.AI/recent"))
        .respond_with(ResponseTemplate::new(400))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list/cs.AI/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(&[paper_id(1)])))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let mut session = fetcher.new_session().unwrap();
    assert_eq!(session.generation(), 0);

    let result = fetcher.fetch(&mut session, &listing_url(&server)).await.unwrap();

    assert!(matches!(result, FetchResult::Success { attempts: 2, .. }));
    assert_eq!(session.generation(), 1);
}

#[tokio::test]
async fn test_bad_requests_are_counted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let mut session = fetcher.new_session().unwrap();

    let result = fetcher.fetch(&mut session, &listing_url(&server)).await.unwrap();

    match result {
        FetchResult::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::MalformedRequest);
            assert_eq!(failure.malformed_responses, 5);
        }
        FetchResult::Success { .. } => panic!("400 was accepted"),
    }
    assert_eq!(session.generation(), 5);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let mut session = fetcher.new_session().unwrap();

    let result = fetcher.fetch(&mut session, &listing_url(&server)).await.unwrap();
    assert!(matches!(result, FetchResult::Success { attempts: 2, .. }));
}

#[tokio::test]
async fn test_requests_carry_browser_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server);
    let mut session = fetcher.new_session().unwrap();
    fetcher.fetch(&mut session, &listing_url(&server)).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let names: Vec<String> = requests[0]
        .headers
        .keys()
        .map(|name| name.as_str().to_ascii_lowercase())
        .collect();

    for expected in ["user-agent", "accept-language", "referer", "sec-fetch-mode", "dnt"] {
        assert!(names.iter().any(|n| n == expected), "missing {}", expected);
    }
}

#[tokio::test]
async fn test_slow_response_is_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>late</html>")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), &dir.path().join("out.csv"), 10);
    config.fetch.timeout_secs = 1;
    config.fetch.max_attempts = 1;
    let fetcher = Fetcher::new(&config).unwrap();
    let mut session = fetcher.new_session().unwrap();

    let result = fetcher.fetch(&mut session, &listing_url(&server)).await.unwrap();

    match result {
        FetchResult::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::Timeout);
            assert_eq!(failure.attempts, 1);
        }
        FetchResult::Success { .. } => panic!("late response beat the timeout"),
    }
    assert_eq!(session.identity_rotations(), 1);
}

#[tokio::test]
async fn test_refused_connection_is_a_connect_error() {
    // Bind then release a port so nothing is listening on it.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let base_url = format!("http://127.0.0.1:{}", port);

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&base_url, &dir.path().join("out.csv"), 10);
    config.fetch.max_attempts = 2;
    let fetcher = Fetcher::new(&config).unwrap();
    let mut session = fetcher.new_session().unwrap();

    let url = Url::parse(&format!("{}/list/cs.AI/recent", base_url)).unwrap();
    let result = fetcher.fetch(&mut session, &url).await.unwrap();

    match result {
        FetchResult::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::Connect);
            assert_eq!(failure.attempts, 2);
            assert_eq!(failure.malformed_responses, 0);
        }
        FetchResult::Success { .. } => panic!("nothing should be listening"),
    }
    assert_eq!(session.identity_rotations(), 2);
}
