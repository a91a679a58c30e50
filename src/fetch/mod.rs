//! Fetch strategies for advisory pages
//!
//! This module contains the three interchangeable ways of getting an advisory:
//! - Vendor API: official structured endpoints (GitHub, MSRC)
//! - Headless-browser render: for client-rendered vendor pages
//! - Direct HTTP: a single browser-like GET with per-host cookies and pacing
//!
//! All three implement [`Fetcher`] and report a [`FetchAttemptResult`]; none of
//! them return errors. The pipeline's state machine is driven by
//! [`FetchStatus`].

mod browser;
#[cfg(feature = "browser")]
mod chromium;
mod http;
mod vendor_api;

pub use browser::{BrowserFetcher, PageRenderer, RenderError, RenderedPage};
#[cfg(feature = "browser")]
pub use chromium::ChromiumRenderer;
pub use http::{browser_headers, build_http_client, DirectHttpFetcher};
pub use vendor_api::VendorApiFetcher;

use crate::retry::{AttemptError, ErrorClass, RetryOutcome};
use crate::session::DomainSession;
use crate::url::AdvisoryUrl;
use crate::vendor::VendorProfile;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The ways an advisory can be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FetchStrategy {
    VendorApi,
    Browser,
    DirectHttp,
}

impl FetchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VendorApi => "vendor-api",
            Self::Browser => "browser",
            Self::DirectHttp => "direct-http",
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which structured payload a vendor API returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiSource {
    /// `{"repository": <repo>, "release": <latest release or null>}`
    GithubRepository,
    /// A single GitHub security advisory (GHSA)
    GithubAdvisory,
    /// An MSRC CVRF document
    MsrcCvrf,
}

/// What kind of content a fetch produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Json(ApiSource),
}

/// Content returned by a successful fetch
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub body: String,
    pub kind: ContentKind,
    /// URL after redirects (or the API document URL)
    pub final_url: String,
}

impl FetchedContent {
    pub fn html(body: String, final_url: impl Into<String>) -> Self {
        Self {
            body,
            kind: ContentKind::Html,
            final_url: final_url.into(),
        }
    }

    pub fn json(body: String, source: ApiSource, final_url: impl Into<String>) -> Self {
        Self {
            body,
            kind: ContentKind::Json(source),
            final_url: final_url.into(),
        }
    }
}

/// How a fetch attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FetchStatus {
    Success,
    Failed,
    Blocked,
    CapabilityUnavailable,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
            Self::CapabilityUnavailable => "capability-unavailable",
        }
    }
}

/// Result of one strategy's fetch (including its internal retries)
#[derive(Debug, Clone)]
pub struct FetchAttemptResult {
    pub strategy: FetchStrategy,
    pub status: FetchStatus,
    pub status_code: Option<u16>,
    pub content: Option<FetchedContent>,
    pub size_bytes: usize,
    pub error: Option<String>,
    /// Attempts made by the retry executor (0 when nothing was sent)
    pub attempts: u32,
    pub duration_ms: u64,
}

impl FetchAttemptResult {
    pub fn success(
        strategy: FetchStrategy,
        status_code: Option<u16>,
        content: FetchedContent,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            strategy,
            status: FetchStatus::Success,
            status_code,
            size_bytes: content.body.len(),
            content: Some(content),
            error: None,
            attempts,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// A result that never reached the network because an optional
    /// capability is missing
    pub fn unavailable(strategy: FetchStrategy, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            status: FetchStatus::CapabilityUnavailable,
            status_code: None,
            content: None,
            size_bytes: 0,
            error: Some(reason.into()),
            attempts: 0,
            duration_ms: 0,
        }
    }

    /// Maps a failed attempt error onto Failed / Blocked / CapabilityUnavailable
    pub fn from_error(
        strategy: FetchStrategy,
        error: AttemptError,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        let status = match error.class {
            ErrorClass::Blocked => FetchStatus::Blocked,
            ErrorClass::Unavailable => FetchStatus::CapabilityUnavailable,
            ErrorClass::Retryable | ErrorClass::Fatal => FetchStatus::Failed,
        };
        Self {
            strategy,
            status,
            status_code: error.status_code,
            content: None,
            size_bytes: 0,
            error: Some(if attempts > 1 {
                format!("{} (after {} attempts)", error.message, attempts)
            } else {
                error.message
            }),
            attempts,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// Builds a result from the retry executor's outcome
    pub fn from_retry(
        strategy: FetchStrategy,
        outcome: RetryOutcome<(Option<u16>, FetchedContent)>,
    ) -> Self {
        match outcome.result {
            Ok((status_code, content)) => Self::success(
                strategy,
                status_code,
                content,
                outcome.attempts,
                outcome.elapsed,
            ),
            Err(error) => Self::from_error(strategy, error, outcome.attempts, outcome.elapsed),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }
}

/// The contract every fetch strategy implements
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn strategy(&self) -> FetchStrategy;

    /// Fetches `url`
    ///
    /// The caller holds the host's session for the duration of the call; a
    /// fetcher that talks to the advisory host reads cookies from it and
    /// records successful requests on it.
    async fn fetch(
        &self,
        url: &AdvisoryUrl,
        profile: &VendorProfile,
        session: &mut DomainSession,
    ) -> FetchAttemptResult;
}

/// Lookup table from strategy to fetcher implementation
#[derive(Clone, Default)]
pub struct Fetchers {
    by_strategy: HashMap<FetchStrategy, Arc<dyn Fetcher>>,
}

impl Fetchers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fetcher under its own strategy, replacing any previous one
    pub fn with(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.by_strategy.insert(fetcher.strategy(), fetcher);
        self
    }

    pub fn get(&self, strategy: FetchStrategy) -> Option<&Arc<dyn Fetcher>> {
        self.by_strategy.get(&strategy)
    }
}

impl fmt::Debug for Fetchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut strategies: Vec<_> = self.by_strategy.keys().map(|s| s.as_str()).collect();
        strategies.sort_unstable();
        f.debug_struct("Fetchers")
            .field("strategies", &strategies)
            .finish()
    }
}
