//! Headless-browser render strategy
//!
//! The browser itself is an injected capability ([`PageRenderer`]). Without a
//! renderer, or when the renderer reports it cannot run, the strategy answers
//! `CapabilityUnavailable` so the pipeline moves on without spending retries.

use super::{FetchAttemptResult, FetchStrategy, FetchedContent, Fetcher};
use crate::retry::{self, classify_status, AttemptError, ErrorClass, RetryPolicy};
use crate::session::DomainSession;
use crate::url::AdvisoryUrl;
use crate::vendor::VendorProfile;
use async_trait::async_trait;
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

static UNAVAILABLE_WARNING: Once = Once::new();

/// Fully rendered page returned by a [`PageRenderer`]
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub content: String,
    /// Main document status when the renderer can observe it
    pub status_code: Option<u16>,
}

#[derive(Debug, Error)]
pub enum RenderError {
    /// The browser runtime is missing or failed to start
    #[error("browser unavailable: {0}")]
    Unavailable(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("render timed out after {0:?}")]
    Timeout(Duration),
}

/// A JavaScript-capable page renderer
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Loads `url`, waits `settle` for client-side rendering, and returns the DOM
    async fn render(&self, url: &Url, settle: Duration) -> Result<RenderedPage, RenderError>;
}

/// Render strategy backed by an optional [`PageRenderer`]
#[derive(Clone)]
pub struct BrowserFetcher {
    renderer: Option<Arc<dyn PageRenderer>>,
    settle: Duration,
    min_interval: Duration,
    policy: RetryPolicy,
}

impl BrowserFetcher {
    pub fn new(
        renderer: Option<Arc<dyn PageRenderer>>,
        settle: Duration,
        min_interval: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            renderer,
            settle,
            min_interval,
            policy,
        }
    }

    /// A fetcher with no renderer; every fetch is `CapabilityUnavailable`
    pub fn unavailable() -> Self {
        Self::new(None, Duration::ZERO, Duration::ZERO, RetryPolicy::default())
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }
}

impl std::fmt::Debug for BrowserFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserFetcher")
            .field("has_renderer", &self.has_renderer())
            .field("settle", &self.settle)
            .finish()
    }
}

fn warn_unavailable_once(reason: &str) {
    UNAVAILABLE_WARNING.call_once(|| {
        tracing::warn!(
            "Headless browser unavailable ({}); client-rendered pages fall back to direct HTTP",
            reason
        );
    });
}

fn render_error_to_attempt(error: RenderError) -> AttemptError {
    let class = match error {
        RenderError::Unavailable(_) => ErrorClass::Unavailable,
        RenderError::Navigation(_) | RenderError::Timeout(_) => ErrorClass::Retryable,
    };
    AttemptError::new(class, error.to_string())
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Browser
    }

    async fn fetch(
        &self,
        url: &AdvisoryUrl,
        _profile: &VendorProfile,
        session: &mut DomainSession,
    ) -> FetchAttemptResult {
        let Some(renderer) = self.renderer.as_ref() else {
            warn_unavailable_once("no renderer configured");
            return FetchAttemptResult::unavailable(FetchStrategy::Browser, "no headless browser");
        };

        session.pace(self.min_interval).await;

        let settle = self.settle;
        let outcome = retry::execute(&self.policy, |_| async move {
            let page = renderer
                .render(url.url(), settle)
                .await
                .map_err(render_error_to_attempt)?;
            if let Some(status) = page.status_code {
                if classify_status(status).is_some() {
                    return Err(AttemptError::from_status(status));
                }
            }
            Ok((
                page.status_code,
                FetchedContent::html(page.content, url.as_str()),
            ))
        })
        .await;

        match &outcome.result {
            Ok(_) => session.record_success(Instant::now()),
            Err(error) if error.class == ErrorClass::Unavailable => {
                warn_unavailable_once(&error.message)
            }
            Err(_) => {}
        }

        FetchAttemptResult::from_retry(FetchStrategy::Browser, outcome)
    }
}
