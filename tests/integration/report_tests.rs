//! Configuration loading and the report outputs of a finished batch

use crate::common::{coordinator_as, generic_advisory, html, test_config};
use patchwise::batch::{map_rows, InputRow, RowStatus};
use patchwise::config::{hash_content, load_config_with_hash};
use patchwise::output::{generate_markdown_summary, BatchStatistics, BatchSummary};
use patchwise::pipeline::UrlStatus;
use patchwise::storage::{ReportStore, RunStatus, SqliteReportStore};
use patchwise::vendor::VendorKind;
use patchwise::ConfigError;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_load_config_with_hash() {
    let content = r#"
[fetch]
request-timeout-secs = 20
pre-request-delay-min-ms = 0
pre-request-delay-max-ms = 0

[batch]
max-workers = 8
batch-timeout-secs = 600

[vendor-api]
github-token = "ghp_example"

[output]
database-path = "./reports/patchwise.db"
link-delimiter = "; "
"#;
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();

    let (config, hash) = load_config_with_hash(file.path()).unwrap();

    assert_eq!(config.fetch.request_timeout_secs, 20);
    assert_eq!(config.batch.max_workers, 8);
    assert_eq!(config.batch.batch_timeout_secs, 600);
    assert_eq!(config.vendor_api.github_token.as_deref(), Some("ghp_example"));
    assert_eq!(config.output.link_delimiter, "; ");
    // Unset sections keep their defaults
    assert_eq!(config.retry.max_attempts, 3);
    assert!(!config.browser.enabled);

    assert_eq!(hash, hash_content(content));
    assert_eq!(hash.len(), 64);
}

#[test]
fn test_load_config_rejects_invalid_values() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[batch]\nmax-workers = 0\n").unwrap();

    let result = load_config_with_hash(file.path());
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[tokio::test]
async fn test_batch_report_is_stored_and_summarized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/advisory/ok"))
        .respond_with(html(generic_advisory("5.1")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/advisory/denied"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let ok = format!("{}/advisory/ok", server.uri());
    let denied = format!("{}/advisory/denied", server.uri());
    let rows = vec![
        InputRow::new("CVE-2024-1000", &ok),
        InputRow::new("CVE-2024-1001", &denied),
    ];
    let raw_urls: Vec<String> = rows.iter().flat_map(|r| r.ref_urls.clone()).collect();

    let config = test_config(&server.uri());
    let report = coordinator_as(&config, VendorKind::Generic)
        .process_batch(&raw_urls)
        .await;
    let results = map_rows(&rows, &report);

    let dir = TempDir::new().unwrap();
    let mut store = SqliteReportStore::new(&dir.path().join("report.db")).unwrap();
    let run_id = store.create_run("abc123").unwrap();
    assert_eq!(store.save_outcomes(run_id, &report).unwrap(), 2);
    assert_eq!(store.save_row_results(run_id, &results, " | ").unwrap(), 2);
    store.finish_run(run_id, RunStatus::Completed).unwrap();

    let run = store.get_run(run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "abc123");
    assert!(run.finished_at.is_some());

    let stored = store
        .get_outcome(run_id, report.outcome_for(&ok).unwrap().url.as_str())
        .unwrap()
        .expect("outcome should be stored");
    assert_eq!(stored.status, UrlStatus::Done);
    assert_eq!(stored.fix_version.as_deref(), Some("5.1.1"));
    assert_eq!(stored.strategy.as_deref(), Some("direct-http"));

    let counts = store.count_outcomes_by_status(run_id).unwrap();
    assert_eq!(counts.get(&UrlStatus::Done), Some(&1));
    assert_eq!(counts.get(&UrlStatus::Blocked), Some(&1));

    let review = store.get_manual_review(run_id).unwrap();
    assert_eq!(review, vec![report.outcome_for(&denied).unwrap().url.clone()]);

    let stored_rows = store.get_row_results(run_id).unwrap();
    assert_eq!(stored_rows.len(), 2);
    assert_eq!(stored_rows[0].status, RowStatus::Success);
    assert_eq!(stored_rows[1].status, RowStatus::Blocked);

    let stats = BatchStatistics::collect(&report, &results);
    let summary_path = dir.path().join("summary.md");
    let summary = BatchSummary {
        run_id: Some(run_id),
        config_hash: Some("abc123"),
        report: &report,
        stats: &stats,
    };
    generate_markdown_summary(&summary, &summary_path).unwrap();

    let markdown = std::fs::read_to_string(&summary_path).unwrap();
    assert!(markdown.contains("## Needs Manual Review"));
    assert!(markdown.contains("/advisory/denied"));
}
