use patchwise::config::{Config, RetryConfig};
use patchwise::vendor::VendorKind;
use patchwise::{AdvisoryPipeline, BatchCoordinator, VendorRegistry};
use wiremock::ResponseTemplate;

/// A configuration with pacing disabled and short retry delays
pub fn test_config(server_uri: &str) -> Config {
    let mut config = Config::default();
    config.fetch.pre_request_delay_min_ms = 0;
    config.fetch.pre_request_delay_max_ms = 0;
    config.fetch.min_request_interval_ms = 0;
    config.fetch.request_timeout_secs = 5;
    config.retry = RetryConfig {
        max_attempts: 3,
        base_delay_ms: 10,
        max_delay_ms: 50,
        jitter_ms: 0,
    };
    config.batch.max_workers = 2;
    config.batch.batch_timeout_secs = 60;
    config.vendor_api.github_base_url = server_uri.to_string();
    config.vendor_api.msrc_base_url = server_uri.to_string();
    config
}

/// Pipeline that treats the local mock host as `kind`
pub fn pipeline_as(config: &Config, kind: VendorKind) -> AdvisoryPipeline {
    let registry = VendorRegistry::builtin().with_host_alias("127.0.0.1", kind);
    AdvisoryPipeline::with_registry(config, registry, None).expect("Failed to build pipeline")
}

pub fn coordinator_as(config: &Config, kind: VendorKind) -> BatchCoordinator {
    BatchCoordinator::new(pipeline_as(config, kind), &config.batch)
}

pub fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.into())
        .insert_header("content-type", "text/html; charset=utf-8")
}

/// A small generic advisory page with a fix version and a tarball link
pub fn generic_advisory(version: &str) -> String {
    format!(
        r#"<html><head><title>Widget advisory</title></head><body>
        <h1>Security advisory</h1>
        <p>Affected versions: 1.0 through {version}</p>
        <p>This issue is fixed in {version}.1. Upgrade to the latest release as soon as possible.</p>
        <a href="https://downloads.example.org/widget-{version}.1.tar.gz">widget-{version}.1.tar.gz</a>
        </body></html>"#
    )
}
