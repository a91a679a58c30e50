//! URL handling for advisory references
//!
//! This module provides the `AdvisoryUrl` type plus host extraction,
//! vendor host-pattern matching, and normalization used for deduplication.

mod domain;
mod matcher;
mod normalize;

use crate::UrlResult;
use std::fmt;
use url::Url;

// Re-export main functions
pub use domain::{extract_host, origin_of, session_key};
pub use matcher::matches_host_pattern;
pub use normalize::normalize_url;

/// A reference URL read from an input row
///
/// Immutable once parsed. `host` drives vendor resolution; `session_key`
/// (host plus any explicit port) drives session sharing and per-host
/// serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdvisoryUrl {
    url: Url,
    host: String,
    session_key: String,
}

impl AdvisoryUrl {
    /// Parses and normalizes a raw reference URL
    ///
    /// # Examples
    ///
    /// ```
    /// use patchwise::url::AdvisoryUrl;
    ///
    /// let url = AdvisoryUrl::parse("https://github.com/acme/widget/security").unwrap();
    /// assert_eq!(url.host(), "github.com");
    /// ```
    pub fn parse(raw: &str) -> UrlResult<Self> {
        let url = normalize_url(raw)?;
        Self::from_url(url)
    }

    /// Wraps an already-normalized URL
    pub fn from_url(url: Url) -> UrlResult<Self> {
        let host = extract_host(&url).ok_or(crate::UrlError::MissingDomain)?;
        let session_key = session_key(&url).ok_or(crate::UrlError::MissingDomain)?;
        Ok(Self {
            url,
            host,
            session_key,
        })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// The URL's own origin, used as a plausible Referer
    pub fn origin(&self) -> String {
        origin_of(&self.url)
    }

    /// Non-empty path segments, e.g. `["acme", "widget", "releases"]`
    pub fn path_segments(&self) -> Vec<&str> {
        self.url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for AdvisoryUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Splits a pipe-delimited `RefUrls` cell into individual URL strings
///
/// Entries are trimmed and empty entries dropped; no parsing happens here so
/// malformed entries still reach the batch and get a per-URL failure.
pub fn split_ref_urls(cell: &str) -> Vec<String> {
    cell.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
