//! Whole-batch runs: deduplication, row mapping and progress

use crate::common::{coordinator_as, generic_advisory, html, test_config};
use patchwise::batch::{map_rows, parse_rows, InputRow, RowStatus};
use patchwise::pipeline::UrlStatus;
use patchwise::vendor::VendorKind;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_shared_urls_are_fetched_once() {
    let servers = [
        MockServer::start().await,
        MockServer::start().await,
        MockServer::start().await,
    ];

    // Ten unique advisories spread over three hosts
    let mut urls = Vec::new();
    for i in 0..10 {
        let server = &servers[i % 3];
        let route = format!("/advisory/{}", i);
        Mock::given(method("GET"))
            .and(path(route.as_str()))
            .respond_with(html(generic_advisory(&format!("{}.0", i + 1))))
            .expect(1)
            .mount(server)
            .await;
        urls.push(format!("{}{}", server.uri(), route));
    }

    // Fifty rows, each citing two of the ten advisories
    let rows: Vec<InputRow> = (0..50)
        .map(|i| {
            InputRow::new(
                format!("CVE-2024-{:04}", i),
                &format!("{} | {}", urls[i % 10], urls[(i + 3) % 10]),
            )
        })
        .collect();
    let raw_urls: Vec<String> = rows.iter().flat_map(|r| r.ref_urls.clone()).collect();
    assert_eq!(raw_urls.len(), 100);

    let config = test_config(&servers[0].uri());
    let coordinator = coordinator_as(&config, VendorKind::Generic);
    let report = coordinator.process_batch(&raw_urls).await;

    assert_eq!(report.len(), 10);
    assert_eq!(report.pipeline_runs, 10);
    assert_eq!(report.hosts, 3);
    assert!(!report.interrupted);
    assert_eq!(report.count(UrlStatus::Done), 10);

    let results = map_rows(&rows, &report);
    assert_eq!(results.len(), 50);
    for result in &results {
        assert_eq!(result.status, RowStatus::Success, "row {}", result.row_id);
        assert_eq!(result.url_count, 2);
        assert_eq!(result.record.download_links.len(), 2);
    }
}

#[tokio::test]
async fn test_row_statuses_mix_blocked_failed_and_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/good"))
        .respond_with(html(generic_advisory("3.2")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(html("<html><body><p>Nothing to see here.</p></body></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let base = server.uri();
    let content = format!(
        "# id,refs\n\
         CVE-2024-0001,{base}/good|{base}/blocked\n\
         CVE-2024-0002,{base}/blocked\n\
         CVE-2024-0003,{base}/empty\n\
         CVE-2024-0004,not a url\n"
    );
    let rows = parse_rows(&content);
    assert_eq!(rows.len(), 4);

    let raw_urls: Vec<String> = rows.iter().flat_map(|r| r.ref_urls.clone()).collect();
    let config = test_config(&base);
    let coordinator = coordinator_as(&config, VendorKind::Generic);
    let report = coordinator.process_batch(&raw_urls).await;

    assert_eq!(report.pipeline_runs, 3);
    assert_eq!(report.manual_review().len(), 1);
    assert_eq!(report.count(UrlStatus::Failed), 1);

    let results = map_rows(&rows, &report);
    let status_of = |id: &str| {
        results
            .iter()
            .find(|r| r.row_id == id)
            .map(|r| r.status)
            .expect("row should be mapped")
    };
    assert_eq!(status_of("CVE-2024-0001"), RowStatus::Success);
    assert_eq!(status_of("CVE-2024-0002"), RowStatus::Blocked);
    assert_eq!(status_of("CVE-2024-0003"), RowStatus::Empty);
    assert_eq!(status_of("CVE-2024-0004"), RowStatus::Failed);
}

#[tokio::test]
async fn test_spawned_batch_reports_progress() {
    let server = MockServer::start().await;
    for i in 0..4 {
        Mock::given(method("GET"))
            .and(path(format!("/advisory/{}", i).as_str()))
            .respond_with(html(generic_advisory("2.0")))
            .mount(&server)
            .await;
    }

    let config = test_config(&server.uri());
    let coordinator = Arc::new(coordinator_as(&config, VendorKind::Generic));
    let urls: Vec<String> = (0..4)
        .map(|i| format!("{}/advisory/{}", server.uri(), i))
        .collect();

    let mut handle = coordinator.spawn(urls);
    let mut seen = Vec::new();
    while let Some(progress) = handle.next_progress().await {
        assert_eq!(progress.total, 4);
        seen.push(progress.completed);
    }
    let report = handle.wait().await.expect("batch task should not fail");

    assert_eq!(seen, vec![1, 2, 3, 4]);
    assert_eq!(report.count(UrlStatus::Done), 4);
}
