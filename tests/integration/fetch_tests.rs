//! Direct HTTP pacing against a live mock host

use crate::common::{generic_advisory, html, test_config};
use patchwise::fetch::{build_http_client, DirectHttpFetcher, FetchStatus, Fetcher};
use patchwise::retry::RetryPolicy;
use patchwise::session::DomainSession;
use patchwise::url::AdvisoryUrl;
use patchwise::VendorRegistry;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INTERVAL_MS: u64 = 300;

async fn paced_fetch(server: &MockServer, session: &mut DomainSession) -> (FetchStatus, Duration) {
    let mut config = test_config(&server.uri());
    config.fetch.min_request_interval_ms = INTERVAL_MS;
    let client = build_http_client(&config.fetch).unwrap();
    let fetcher = DirectHttpFetcher::new(client, &config.fetch, RetryPolicy::from(&config.retry));

    let url = AdvisoryUrl::parse(&format!("{}/advisory/paced", server.uri())).unwrap();
    let registry = VendorRegistry::builtin();

    let started = Instant::now();
    let result = fetcher.fetch(&url, registry.resolve(&url), session).await;
    (result.status, started.elapsed())
}

#[tokio::test]
async fn test_pacing_waits_configured_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/advisory/paced"))
        .respond_with(html(generic_advisory("1.0")))
        .mount(&server)
        .await;

    let mut session = DomainSession::new("127.0.0.1");
    session.record_success(Instant::now());

    let (status, elapsed) = paced_fetch(&server, &mut session).await;

    assert_eq!(status, FetchStatus::Success);
    assert!(elapsed >= Duration::from_millis(INTERVAL_MS - 20), "waited {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(2 * INTERVAL_MS - 50), "waited {:?}", elapsed);
}

#[tokio::test]
async fn test_rate_limited_host_waits_double_interval() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/advisory/paced"))
        .respond_with(html(generic_advisory("1.0")))
        .mount(&server)
        .await;

    let mut session = DomainSession::new("127.0.0.1");
    session.record_success(Instant::now());
    session.mark_rate_limited();

    let (status, elapsed) = paced_fetch(&server, &mut session).await;

    assert_eq!(status, FetchStatus::Success);
    assert!(elapsed >= Duration::from_millis(2 * INTERVAL_MS - 20), "waited {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(3 * INTERVAL_MS), "waited {:?}", elapsed);
}

#[tokio::test]
async fn test_429_within_fetch_doubles_interval_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/advisory/paced"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/advisory/paced"))
        .respond_with(html(generic_advisory("1.0")))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = DomainSession::new("127.0.0.1");
    session.record_success(Instant::now());

    let (status, elapsed) = paced_fetch(&server, &mut session).await;

    assert_eq!(status, FetchStatus::Success);
    assert!(session.rate_limited);
    // First attempt waits one interval, the retry tops up to two
    assert!(elapsed >= Duration::from_millis(2 * INTERVAL_MS - 20), "waited {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(3 * INTERVAL_MS), "waited {:?}", elapsed);
}
