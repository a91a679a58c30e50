//! Direct HTTP fetcher
//!
//! Sends one browser-like GET per attempt. Cookies come from and go back to
//! the host's [`DomainSession`]; pacing follows the session's last successful
//! request, and the first attempt for each URL is preceded by a small random
//! delay so request timing does not look scripted.

use super::{FetchAttemptResult, FetchStrategy, FetchedContent, Fetcher};
use crate::config::FetchConfig;
use crate::retry::{self, classify_status, AttemptError, RetryPolicy};
use crate::session::DomainSession;
use crate::url::AdvisoryUrl;
use crate::vendor::VendorProfile;
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER, SET_COOKIE};
use reqwest::{redirect::Policy, Client};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE_EN: &str = "en-US,en;q=0.9";

/// Builds the HTTP client shared by the direct and vendor-API fetchers
///
/// # Example
///
/// ```no_run
/// use patchwise::config::FetchConfig;
/// use patchwise::fetch::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Header set sent with every direct request
///
/// The User-Agent is set on the client; Referer is the URL's own origin.
pub fn browser_headers(url: &AdvisoryUrl) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_EN));
    if let Ok(referer) = HeaderValue::from_str(&format!("{}/", url.origin())) {
        headers.insert(REFERER, referer);
    }
    headers
}

/// Plain GET against the advisory host
#[derive(Debug, Clone)]
pub struct DirectHttpFetcher {
    client: Client,
    policy: RetryPolicy,
    min_interval: Duration,
    pre_delay_min_ms: u64,
    pre_delay_max_ms: u64,
}

impl DirectHttpFetcher {
    pub fn new(client: Client, config: &FetchConfig, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            min_interval: Duration::from_millis(config.min_request_interval_ms),
            pre_delay_min_ms: config.pre_request_delay_min_ms,
            pre_delay_max_ms: config.pre_request_delay_max_ms,
        }
    }

    fn pre_request_delay(&self) -> Duration {
        if self.pre_delay_max_ms == 0 {
            return Duration::ZERO;
        }
        let min = self.pre_delay_min_ms.min(self.pre_delay_max_ms);
        Duration::from_millis(rand::rng().random_range(min..=self.pre_delay_max_ms))
    }

    async fn attempt(
        &self,
        url: &AdvisoryUrl,
        session: &DomainSession,
        rate_limited: &AtomicBool,
    ) -> Result<(Option<u16>, FetchedContent), AttemptError> {
        // A 429 earlier in this fetch doubles the base until the session is marked
        let base = if rate_limited.load(Ordering::Relaxed) && !session.rate_limited {
            self.min_interval * 2
        } else {
            self.min_interval
        };
        if let Some(wait) = session.time_until_next_request(base, Instant::now()) {
            tracing::trace!("Pacing {}: waiting {:?}", session.host, wait);
            tokio::time::sleep(wait).await;
        }

        let mut request = self
            .client
            .get(url.url().clone())
            .headers(browser_headers(url));
        if let Some(cookie) = session.cookie_header(url.url()) {
            request = request.header(COOKIE, cookie);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AttemptError::from_reqwest(&e))?;

        let status = response.status().as_u16();
        if status == 429 {
            rate_limited.store(true, Ordering::Relaxed);
        }
        if classify_status(status).is_some() {
            return Err(AttemptError::from_status(status));
        }

        let final_url = response.url().clone();
        let set_cookies: Vec<HeaderValue> =
            response.headers().get_all(SET_COOKIE).iter().cloned().collect();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::from_reqwest(&e))?;

        session.store_cookies(&set_cookies, &final_url);
        Ok((Some(status), FetchedContent::html(body, final_url.as_str())))
    }
}

#[async_trait]
impl Fetcher for DirectHttpFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::DirectHttp
    }

    async fn fetch(
        &self,
        url: &AdvisoryUrl,
        _profile: &VendorProfile,
        session: &mut DomainSession,
    ) -> FetchAttemptResult {
        let rate_limited = AtomicBool::new(false);
        let pre_delay = self.pre_request_delay();
        let shared: &DomainSession = session;

        let outcome = retry::execute(&self.policy, |attempt| {
            let rate_limited = &rate_limited;
            async move {
                if attempt == 1 && !pre_delay.is_zero() {
                    tokio::time::sleep(pre_delay).await;
                }
                self.attempt(url, shared, rate_limited).await
            }
        })
        .await;

        if rate_limited.load(Ordering::Relaxed) {
            tracing::warn!("{} answered 429; slowing down for the rest of the batch", session.host);
            session.mark_rate_limited();
        }
        if outcome.result.is_ok() {
            session.record_success(Instant::now());
        }

        let result = FetchAttemptResult::from_retry(FetchStrategy::DirectHttp, outcome);
        tracing::debug!(
            "GET {} -> {} ({} attempts, {} bytes)",
            url,
            result.status.as_str(),
            result.attempts,
            result.size_bytes
        );
        result
    }
}
