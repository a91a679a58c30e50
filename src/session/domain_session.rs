use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Tracks the state of one host during a batch run
///
/// This structure keeps the cookies a host has handed out and the timing
/// information needed to pace requests against it. One session exists per
/// host for the lifetime of a batch; only successful fetch attempts mutate it.
#[derive(Debug, Clone)]
pub struct DomainSession {
    /// Session key (host, plus port when non-default)
    pub host: String,

    /// Cookies received from this host
    cookie_jar: Arc<Jar>,

    /// Timestamp of the last successful request to this host
    pub last_request_time: Option<Instant>,

    /// Number of successful requests made to this host in the current batch
    pub request_count: u32,

    /// Whether this host answered HTTP 429 during the batch
    pub rate_limited: bool,
}

impl DomainSession {
    /// Creates a fresh session with an empty cookie jar
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            cookie_jar: Arc::new(Jar::default()),
            last_request_time: None,
            request_count: 0,
            rate_limited: false,
        }
    }

    /// Returns the `Cookie` header value to send to `url`, if any cookies are stored
    pub fn cookie_header(&self, url: &Url) -> Option<HeaderValue> {
        self.cookie_jar.cookies(url)
    }

    /// Stores cookies from `Set-Cookie` response headers
    pub fn store_cookies(&self, set_cookie_headers: &[HeaderValue], url: &Url) {
        if set_cookie_headers.is_empty() {
            return;
        }
        let mut iter = set_cookie_headers.iter();
        self.cookie_jar.set_cookies(&mut iter, url);
    }

    /// Pacing interval for this host
    ///
    /// A host that rate limited us gets double the configured interval for
    /// the rest of the batch.
    pub fn effective_interval(&self, base: Duration) -> Duration {
        if self.rate_limited {
            base * 2
        } else {
            base
        }
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, base: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let min_delay = self.effective_interval(base);
        let elapsed = now.saturating_duration_since(last);
        if elapsed < min_delay {
            Some(min_delay - elapsed)
        } else {
            None
        }
    }

    /// Records that a request to this host succeeded
    pub fn record_success(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Marks this host as rate limited
    pub fn mark_rate_limited(&mut self) {
        self.rate_limited = true;
    }

    /// Waits until the host's pacing interval has elapsed
    pub async fn pace(&self, base: Duration) {
        if let Some(wait) = self.time_until_next_request(base, Instant::now()) {
            tracing::trace!("Pacing {}: waiting {:?}", self.host, wait);
            tokio::time::sleep(wait).await;
        }
    }
}
