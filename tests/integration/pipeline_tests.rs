//! Single-URL pipeline runs against mock vendor servers

use crate::common::{generic_advisory, html, pipeline_as, test_config};
use patchwise::fetch::{FetchStatus, FetchStrategy};
use patchwise::pipeline::{FailureKind, UrlStatus};
use patchwise::record::Confidence;
use patchwise::session::DomainSession;
use patchwise::url::AdvisoryUrl;
use patchwise::vendor::VendorKind;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn advisory_url(server: &MockServer, path: &str) -> AdvisoryUrl {
    AdvisoryUrl::parse(&format!("{}{}", server.uri(), path)).expect("Failed to parse mock URL")
}

#[tokio::test]
async fn test_github_repository_via_api() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widget"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "full_name": "acme/widget",
            "description": "A widget parsing library"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/widget/releases/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tag_name": "v2.4.1",
            "body": "Fixes CVE-2024-0001 in the header parser.",
            "tarball_url": "https://api.github.com/repos/acme/widget/tarball/v2.4.1",
            "zipball_url": "https://api.github.com/repos/acme/widget/zipball/v2.4.1",
            "assets": [
                {"browser_download_url": "https://github.com/acme/widget/releases/download/v2.4.1/widget-linux.tar.gz"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let pipeline = pipeline_as(&config, VendorKind::GitHub);
    let url = advisory_url(&server, "/acme/widget");
    let mut session = DomainSession::new(url.session_key());

    let outcome = pipeline.run(&url, &mut session).await;

    assert_eq!(outcome.status, UrlStatus::Done, "{}", outcome.diagnostic);
    assert_eq!(outcome.vendor.as_deref(), Some("GitHub"));
    assert_eq!(outcome.strategies_tried(), vec![FetchStrategy::VendorApi]);
    assert!(outcome.failure.is_none());

    let record = outcome.record.expect("Done outcome should carry a record");
    assert_eq!(record.confidence(), Confidence::High);
    assert_eq!(record.fix_version.as_deref(), Some("v2.4.1"));
    assert_eq!(
        record.remediation_text.as_deref(),
        Some("acme/widget: A widget parsing library")
    );
    assert!(record
        .download_links
        .contains("https://github.com/acme/widget/releases/download/v2.4.1/widget-linux.tar.gz"));
    assert!(record.synthesized_links.is_empty());
}

#[tokio::test]
async fn test_microsoft_skeleton_page_falls_back_to_direct_http() {
    let server = MockServer::start().await;

    // No CVRF mock: the update lookup gets wiremock's default 404
    Mock::given(method("GET"))
        .and(path("/update-guide/vulnerability/CVE-2024-21302"))
        .respond_with(html(
            r#"<html><head><title>Security Update Guide</title></head><body>
            <div id="root"></div>
            <p>Install security update KB5034441 to address this vulnerability.</p>
            </body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let pipeline = pipeline_as(&config, VendorKind::Microsoft);
    let url = advisory_url(&server, "/update-guide/vulnerability/CVE-2024-21302");
    let mut session = DomainSession::new(url.session_key());

    let outcome = pipeline.run(&url, &mut session).await;

    assert_eq!(outcome.status, UrlStatus::Done, "{}", outcome.diagnostic);
    assert_eq!(
        outcome.strategies_tried(),
        vec![
            FetchStrategy::VendorApi,
            FetchStrategy::Browser,
            FetchStrategy::DirectHttp
        ]
    );
    assert_eq!(outcome.attempts[0].status, FetchStatus::Failed);
    assert_eq!(outcome.attempts[1].status, FetchStatus::CapabilityUnavailable);
    assert_eq!(outcome.attempts[2].status, FetchStatus::Success);

    let record = outcome.record.expect("Done outcome should carry a record");
    assert!(record.patch_ids.contains("KB5034441"));
    // Skeleton pages never earn High, even with an identifier
    assert_eq!(record.confidence(), Confidence::Medium);

    let catalog = "https://www.catalog.update.microsoft.com/Search.aspx?q=KB5034441";
    assert!(record.download_links.contains(catalog));
    assert!(record.synthesized_links.contains(catalog));

    let quality = outcome.quality.expect("Done outcome should be scored");
    assert!(quality.issues.iter().any(|i| i.starts_with("skeleton page")));
}

#[tokio::test]
async fn test_forbidden_is_blocked_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/errata/RHSA-2024:0310"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Access Denied"))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let pipeline = pipeline_as(&config, VendorKind::RedHat);
    let url = advisory_url(&server, "/errata/RHSA-2024:0310");
    let mut session = DomainSession::new(url.session_key());

    let outcome = pipeline.run(&url, &mut session).await;

    assert_eq!(outcome.status, UrlStatus::Blocked);
    assert!(outcome.is_blocked());
    assert_eq!(outcome.failure, Some(FailureKind::AntiBotBlocked));
    assert!(outcome.diagnostic.contains("HTTP 403"));
    assert!(outcome.diagnostic.contains("manual review"));
    assert!(outcome.record.is_none());
    assert_eq!(outcome.attempts.len(), 1);
    assert_eq!(outcome.attempts[0].attempts, 1);
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/advisory/1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/advisory/1"))
        .respond_with(html(generic_advisory("1.4")))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let pipeline = pipeline_as(&config, VendorKind::Generic);
    let url = advisory_url(&server, "/advisory/1");
    let mut session = DomainSession::new(url.session_key());

    let outcome = pipeline.run(&url, &mut session).await;

    assert_eq!(outcome.status, UrlStatus::Done, "{}", outcome.diagnostic);
    assert_eq!(outcome.attempts.len(), 1);
    assert_eq!(outcome.attempts[0].attempts, 2);

    let record = outcome.record.expect("Done outcome should carry a record");
    assert_eq!(record.fix_version.as_deref(), Some("1.4.1"));
    assert!(record
        .download_links
        .contains("https://downloads.example.org/widget-1.4.1.tar.gz"));
}

#[tokio::test]
async fn test_persistent_server_error_fails_after_retry_budget() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/advisory/2"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let pipeline = pipeline_as(&config, VendorKind::Generic);
    let url = advisory_url(&server, "/advisory/2");
    let mut session = DomainSession::new(url.session_key());

    let outcome = pipeline.run(&url, &mut session).await;

    assert_eq!(outcome.status, UrlStatus::Failed);
    assert_eq!(outcome.failure, Some(FailureKind::TransientNetwork));
    assert_eq!(outcome.attempts[0].attempts, 3);
    assert!(outcome.diagnostic.starts_with("direct-http:"));
}
