//! Advisory pipeline - per-URL state machine
//!
//! This module drives a single advisory URL from vendor resolution to a
//! terminal state:
//! - Resolving the vendor profile for the URL's host
//! - Trying each fetch strategy in the profile's priority order
//! - Extracting, link-scanning and scoring the first successful fetch
//! - Recording every state transition and attempt on the outcome
//!
//! The pipeline never returns an error; whatever happens to the URL is
//! captured on its [`UrlOutcome`].

mod outcome;
mod state;

pub use outcome::{AttemptSummary, UrlOutcome};
pub use state::{FailureKind, PipelineState, UrlStatus};

use crate::config::Config;
use crate::fetch::{
    build_http_client, BrowserFetcher, ContentKind, DirectHttpFetcher, FetchAttemptResult,
    FetchStatus, FetchStrategy, FetchedContent, Fetchers, PageRenderer, VendorApiFetcher,
};
use crate::quality::{FetchContext, QualityScorer};
use crate::retry::RetryPolicy;
use crate::session::DomainSession;
use crate::url::AdvisoryUrl;
use crate::vendor::{self, VendorProfile, VendorRegistry};
use crate::PatchwiseError;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything needed to process one URL: registry, fetchers and scorer
///
/// One pipeline is built per batch run and shared by reference with every
/// worker; it holds no per-URL or per-host state of its own.
#[derive(Debug, Clone)]
pub struct AdvisoryPipeline {
    registry: VendorRegistry,
    fetchers: Fetchers,
    scorer: QualityScorer,
}

impl AdvisoryPipeline {
    pub fn new(registry: VendorRegistry, fetchers: Fetchers, scorer: QualityScorer) -> Self {
        Self {
            registry,
            fetchers,
            scorer,
        }
    }

    /// Builds the standard pipeline from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Loaded configuration
    /// * `renderer` - Headless browser capability, if one is available
    ///
    /// # Returns
    ///
    /// * `Ok(AdvisoryPipeline)` - Pipeline with all three fetch strategies registered
    /// * `Err(PatchwiseError)` - The HTTP client could not be built
    pub fn from_config(
        config: &Config,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Result<Self, PatchwiseError> {
        Self::with_registry(config, VendorRegistry::builtin(), renderer)
    }

    /// Like [`from_config`](Self::from_config) but with a caller-supplied registry
    pub fn with_registry(
        config: &Config,
        registry: VendorRegistry,
        renderer: Option<Arc<dyn PageRenderer>>,
    ) -> Result<Self, PatchwiseError> {
        let client = build_http_client(&config.fetch)?;
        let policy = RetryPolicy::from(&config.retry);

        let browser = BrowserFetcher::new(
            renderer,
            Duration::from_millis(config.browser.settle_ms),
            Duration::from_millis(config.fetch.min_request_interval_ms),
            policy,
        );
        let fetchers = Fetchers::new()
            .with(Arc::new(VendorApiFetcher::new(
                client.clone(),
                &config.vendor_api,
                policy,
            )))
            .with(Arc::new(browser))
            .with(Arc::new(DirectHttpFetcher::new(client, &config.fetch, policy)));

        Ok(Self::new(registry, fetchers, QualityScorer::new(&config.quality)))
    }

    pub fn registry(&self) -> &VendorRegistry {
        &self.registry
    }

    /// Runs one URL to a terminal state
    ///
    /// The caller must hold the URL's host session for the whole call so that
    /// attempts against one host never interleave.
    pub async fn run(&self, url: &AdvisoryUrl, session: &mut DomainSession) -> UrlOutcome {
        let started = Instant::now();
        let mut transitions = vec![PipelineState::Start];
        let mut attempts = Vec::new();

        let profile = self.registry.resolve(url);
        transitions.push(PipelineState::VendorResolved);
        tracing::debug!("{} resolved to vendor {}", url, profile.name);

        for &strategy in profile.fetch_priority {
            transitions.push(PipelineState::Fetching(strategy));

            let result = match self.fetchers.get(strategy) {
                Some(fetcher) => fetcher.fetch(url, profile, session).await,
                None => FetchAttemptResult::unavailable(strategy, "no fetcher registered"),
            };
            attempts.push(AttemptSummary::from(&result));

            match result.status {
                FetchStatus::Success => {
                    if let Some(content) = result.content {
                        transitions.push(PipelineState::FetchSucceeded);
                        return self.finish(
                            url,
                            profile,
                            strategy,
                            content,
                            transitions,
                            attempts,
                            started,
                        );
                    }
                    transitions.push(PipelineState::FetchFailed);
                }
                FetchStatus::Blocked => {
                    transitions.push(PipelineState::Blocked);
                    tracing::warn!(
                        "{} blocked via {} (HTTP {}); flagged for manual review",
                        url,
                        strategy,
                        result.status_code.unwrap_or(403)
                    );
                    let diagnostic = format!(
                        "HTTP {} from {} via {}; blocked by anti-automation defenses, needs manual review",
                        result.status_code.unwrap_or(403),
                        url.host(),
                        strategy
                    );
                    return Self::terminal(
                        url,
                        profile,
                        UrlStatus::Blocked,
                        FailureKind::AntiBotBlocked,
                        diagnostic,
                        transitions,
                        attempts,
                        started,
                    );
                }
                FetchStatus::Failed => {
                    transitions.push(PipelineState::FetchFailed);
                    tracing::debug!(
                        "{} via {} failed: {}",
                        url,
                        strategy,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
                FetchStatus::CapabilityUnavailable => {
                    transitions.push(PipelineState::CapabilityUnavailable);
                }
            }
        }

        transitions.push(PipelineState::Failed);
        let failure = if attempts
            .iter()
            .all(|a| a.status == FetchStatus::CapabilityUnavailable)
        {
            FailureKind::CapabilityUnavailable
        } else {
            FailureKind::TransientNetwork
        };
        let diagnostic = describe_attempts(&attempts);
        tracing::warn!("{} failed: {}", url, diagnostic);
        Self::terminal(
            url,
            profile,
            UrlStatus::Failed,
            failure,
            diagnostic,
            transitions,
            attempts,
            started,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        url: &AdvisoryUrl,
        profile: &VendorProfile,
        strategy: FetchStrategy,
        content: FetchedContent,
        mut transitions: Vec<PipelineState>,
        attempts: Vec<AttemptSummary>,
        started: Instant,
    ) -> UrlOutcome {
        let mut record = vendor::extract(&content, url, profile);
        if content.kind == ContentKind::Html {
            record.merge(vendor::scan_links(&content, url, profile));
        }
        transitions.push(PipelineState::Extracted);

        let context = FetchContext {
            strategy,
            skeleton: self.scorer.is_skeleton(profile, &content),
        };
        let quality = self.scorer.assess(&mut record, context, content.body.len());
        transitions.push(PipelineState::Scored);

        if !quality.is_acceptable {
            tracing::warn!(
                "Low-quality extraction for {} ({}/100): {}",
                url,
                quality.score,
                quality.issues.join(", ")
            );
        }

        let failure = record.is_empty().then_some(FailureKind::ExtractionEmpty);
        let diagnostic = if record.is_empty() {
            format!("fetched via {} but no recognizable fields were found", strategy)
        } else {
            format!(
                "extracted via {} ({} confidence, quality {}/100)",
                strategy,
                record.confidence(),
                quality.score
            )
        };
        transitions.push(PipelineState::Done);
        tracing::debug!("{}: {}", url, diagnostic);

        UrlOutcome {
            url: url.as_str().to_string(),
            host: Some(url.host().to_string()),
            vendor: Some(profile.name.to_string()),
            status: UrlStatus::Done,
            record: Some(record),
            quality: Some(quality),
            attempts,
            transitions,
            failure,
            diagnostic,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn terminal(
        url: &AdvisoryUrl,
        profile: &VendorProfile,
        status: UrlStatus,
        failure: FailureKind,
        diagnostic: String,
        transitions: Vec<PipelineState>,
        attempts: Vec<AttemptSummary>,
        started: Instant,
    ) -> UrlOutcome {
        UrlOutcome {
            url: url.as_str().to_string(),
            host: Some(url.host().to_string()),
            vendor: Some(profile.name.to_string()),
            status,
            record: None,
            quality: None,
            attempts,
            transitions,
            failure: Some(failure),
            diagnostic,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// One clause per strategy, e.g. `vendor-api: no CVE id in URL; direct-http: HTTP 503 (after 3 attempts)`
fn describe_attempts(attempts: &[AttemptSummary]) -> String {
    if attempts.is_empty() {
        return "no fetch strategy configured for this vendor".to_string();
    }
    attempts
        .iter()
        .map(|a| {
            format!(
                "{}: {}",
                a.strategy,
                a.error.as_deref().unwrap_or(a.status.as_str())
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Fetcher;
    use crate::record::Confidence;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fetcher that always answers with the same status
    struct ScriptedFetcher {
        strategy: FetchStrategy,
        status: FetchStatus,
        body: &'static str,
        calls: AtomicU32,
    }

    impl ScriptedFetcher {
        fn new(strategy: FetchStrategy, status: FetchStatus, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                strategy,
                status,
                body,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        fn strategy(&self) -> FetchStrategy {
            self.strategy
        }

        async fn fetch(
            &self,
            url: &AdvisoryUrl,
            _profile: &VendorProfile,
            _session: &mut DomainSession,
        ) -> FetchAttemptResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.status {
                FetchStatus::Success => FetchAttemptResult::success(
                    self.strategy,
                    Some(200),
                    FetchedContent::html(self.body.to_string(), url.as_str()),
                    1,
                    Duration::ZERO,
                ),
                FetchStatus::Blocked => FetchAttemptResult::from_error(
                    self.strategy,
                    crate::retry::AttemptError::from_status(403),
                    1,
                    Duration::ZERO,
                ),
                FetchStatus::Failed => FetchAttemptResult::from_error(
                    self.strategy,
                    crate::retry::AttemptError::from_status(503),
                    3,
                    Duration::ZERO,
                ),
                FetchStatus::CapabilityUnavailable => {
                    FetchAttemptResult::unavailable(self.strategy, "not available here")
                }
            }
        }
    }

    const ADVISORY_HTML: &str = r#"<html><body>
        <h1>Security update for widget</h1>
        <p>Affected versions: 2.0 through 2.4.0</p>
        <p>Fixed in version 2.4.1</p>
        <h2>Solution</h2>
        <p>Upgrade to widget 2.4.1, available from the download page.</p>
        <a href="https://downloads.example.org/widget-2.4.1.tar.gz">widget-2.4.1.tar.gz</a>
    </body></html>"#;

    fn pipeline(fetchers: &[Arc<ScriptedFetcher>]) -> AdvisoryPipeline {
        let mut set = Fetchers::new();
        for f in fetchers {
            set = set.with(f.clone());
        }
        AdvisoryPipeline::new(VendorRegistry::builtin(), set, QualityScorer::default())
    }

    fn msrc_url() -> AdvisoryUrl {
        AdvisoryUrl::parse("https://msrc.microsoft.com/update-guide/vulnerability/CVE-2024-21302")
            .unwrap()
    }

    #[tokio::test]
    async fn test_unavailable_and_failed_fall_through() {
        let api = ScriptedFetcher::new(
            FetchStrategy::VendorApi,
            FetchStatus::CapabilityUnavailable,
            "",
        );
        let browser = ScriptedFetcher::new(FetchStrategy::Browser, FetchStatus::Failed, "");
        let http =
            ScriptedFetcher::new(FetchStrategy::DirectHttp, FetchStatus::Success, ADVISORY_HTML);
        let p = pipeline(&[api.clone(), browser.clone(), http.clone()]);

        let url = msrc_url();
        let mut session = DomainSession::new(url.host());
        let outcome = p.run(&url, &mut session).await;

        assert_eq!(outcome.status, UrlStatus::Done);
        assert_eq!((api.calls(), browser.calls(), http.calls()), (1, 1, 1));
        assert_eq!(
            outcome.strategies_tried(),
            vec![FetchStrategy::VendorApi, FetchStrategy::Browser, FetchStrategy::DirectHttp]
        );
        assert_eq!(outcome.transitions.last(), Some(&PipelineState::Done));
        assert!(outcome.transitions.contains(&PipelineState::CapabilityUnavailable));
        assert!(outcome.transitions.contains(&PipelineState::FetchFailed));
        assert_eq!(
            outcome.record.as_ref().and_then(|r| r.source_strategy),
            Some(FetchStrategy::DirectHttp)
        );
    }

    #[tokio::test]
    async fn test_blocked_stops_immediately() {
        let api = ScriptedFetcher::new(FetchStrategy::VendorApi, FetchStatus::Blocked, "");
        let browser =
            ScriptedFetcher::new(FetchStrategy::Browser, FetchStatus::Success, ADVISORY_HTML);
        let http =
            ScriptedFetcher::new(FetchStrategy::DirectHttp, FetchStatus::Success, ADVISORY_HTML);
        let p = pipeline(&[api.clone(), browser.clone(), http.clone()]);

        let url = msrc_url();
        let mut session = DomainSession::new(url.host());
        let outcome = p.run(&url, &mut session).await;

        assert_eq!(outcome.status, UrlStatus::Blocked);
        assert_eq!(outcome.failure, Some(FailureKind::AntiBotBlocked));
        assert_eq!((browser.calls(), http.calls()), (0, 0));
        assert!(outcome.diagnostic.contains("manual review"));
        assert_eq!(outcome.transitions.last(), Some(&PipelineState::Blocked));
    }

    #[tokio::test]
    async fn test_all_strategies_failing_ends_failed() {
        let http = ScriptedFetcher::new(FetchStrategy::DirectHttp, FetchStatus::Failed, "");
        let p = pipeline(&[http.clone()]);

        let url = AdvisoryUrl::parse("https://access.redhat.com/errata/RHSA-2024:0310").unwrap();
        let mut session = DomainSession::new(url.host());
        let outcome = p.run(&url, &mut session).await;

        assert_eq!(outcome.status, UrlStatus::Failed);
        assert_eq!(outcome.failure, Some(FailureKind::TransientNetwork));
        assert_eq!(outcome.diagnostic, "direct-http: HTTP 503 (after 3 attempts)");
        assert!(outcome.record.is_none());
    }

    #[tokio::test]
    async fn test_missing_fetchers_count_as_unavailable() {
        let p = pipeline(&[]);
        let url = msrc_url();
        let mut session = DomainSession::new(url.host());
        let outcome = p.run(&url, &mut session).await;

        assert_eq!(outcome.status, UrlStatus::Failed);
        assert_eq!(outcome.failure, Some(FailureKind::CapabilityUnavailable));
        assert_eq!(outcome.attempts.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_extraction_is_done_not_failed() {
        let http = ScriptedFetcher::new(
            FetchStrategy::DirectHttp,
            FetchStatus::Success,
            "<html><body><p>Nothing to see here.</p></body></html>",
        );
        let p = pipeline(&[http]);

        let url = AdvisoryUrl::parse("https://example.org/advisories/2024-01").unwrap();
        let mut session = DomainSession::new(url.host());
        let outcome = p.run(&url, &mut session).await;

        assert_eq!(outcome.status, UrlStatus::Done);
        assert_eq!(outcome.failure, Some(FailureKind::ExtractionEmpty));
        assert!(!outcome.has_data());
        let record = outcome.record.unwrap();
        assert_eq!(record.confidence(), Confidence::Low);
        assert!(!outcome.quality.unwrap().is_acceptable);
    }

    #[tokio::test]
    async fn test_generic_page_extracts_and_scores() {
        let http =
            ScriptedFetcher::new(FetchStrategy::DirectHttp, FetchStatus::Success, ADVISORY_HTML);
        let p = pipeline(&[http]);

        let url = AdvisoryUrl::parse("https://example.org/advisories/2024-01").unwrap();
        let mut session = DomainSession::new(url.host());
        let outcome = p.run(&url, &mut session).await;

        assert!(outcome.has_data());
        assert_eq!(outcome.vendor.as_deref(), Some("Generic"));
        let record = outcome.record.as_ref().unwrap();
        assert!(record
            .download_links
            .contains("https://downloads.example.org/widget-2.4.1.tar.gz"));
        assert_eq!(
            outcome.transition_path(),
            "start > vendor-resolved > fetching(direct-http) > fetch-succeeded > extracted > scored > done"
        );
    }
}
