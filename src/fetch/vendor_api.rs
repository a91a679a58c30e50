//! Vendor API strategy
//!
//! Calls a vendor's structured data endpoints instead of scraping HTML:
//!
//! - GitHub: repository metadata plus the latest release, or a global
//!   security advisory when the URL names a GHSA id.
//! - MSRC: CVE → security update id → CVRF document.
//!
//! The API hosts are not the advisory host, so the advisory's session is left
//! untouched.

use super::{ApiSource, FetchAttemptResult, FetchStrategy, FetchedContent, Fetcher};
use crate::config::VendorApiConfig;
use crate::retry::{self, classify_status, AttemptError, ErrorClass, RetryPolicy};
use crate::session::DomainSession;
use crate::url::AdvisoryUrl;
use crate::vendor::{find_cve_id, VendorApi, VendorProfile};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use std::sync::LazyLock;

static GHSA_ID: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)^GHSA(-[23456789cfghjmpqrvwx]{4}){3}$")
        .expect("hardcoded regex pattern is valid")
});

/// First path segments that are GitHub site sections, not repository owners
const GITHUB_RESERVED: &[&str] = &[
    "advisories",
    "orgs",
    "settings",
    "marketplace",
    "topics",
    "collections",
    "features",
    "security",
    "sponsors",
    "login",
];

/// What an advisory URL asks the vendor API for
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ApiRequest {
    GithubAdvisory(String),
    GithubRepository { owner: String, repo: String },
    MsrcCve(String),
}

impl ApiRequest {
    /// Works out the API request for `url`, if the URL carries enough to make one
    pub(crate) fn for_url(api: VendorApi, url: &AdvisoryUrl) -> Option<Self> {
        match api {
            VendorApi::GitHub => {
                let segments = url.path_segments();
                if let Some(id) = segments.iter().find(|s| GHSA_ID.is_match(s)) {
                    return Some(Self::GithubAdvisory(id.to_string()));
                }
                match segments.as_slice() {
                    [owner, repo, ..] if !GITHUB_RESERVED.contains(owner) => {
                        Some(Self::GithubRepository {
                            owner: owner.to_string(),
                            repo: repo.trim_end_matches(".git").to_string(),
                        })
                    }
                    _ => None,
                }
            }
            VendorApi::Msrc => find_cve_id(url.as_str()).map(Self::MsrcCve),
        }
    }
}

/// Official-API strategy for vendors that publish one
#[derive(Debug, Clone)]
pub struct VendorApiFetcher {
    client: Client,
    github_base: String,
    msrc_base: String,
    github_token: Option<String>,
    policy: RetryPolicy,
}

impl VendorApiFetcher {
    pub fn new(client: Client, config: &VendorApiConfig, policy: RetryPolicy) -> Self {
        Self {
            client,
            github_base: config.github_base_url.trim_end_matches('/').to_string(),
            msrc_base: config.msrc_base_url.trim_end_matches('/').to_string(),
            github_token: config.github_token.clone().filter(|t| !t.is_empty()),
            policy,
        }
    }

    fn github_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));
        if let Some(token) = &self.github_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    fn msrc_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// GETs a JSON document; `Ok(None)` when `allow_missing` and the server answers 404
    async fn get_json(
        &self,
        endpoint: &str,
        headers: HeaderMap,
        allow_missing: bool,
    ) -> Result<Option<Value>, AttemptError> {
        let response = self
            .client
            .get(endpoint)
            .headers(headers)
            .send()
            .await
            .map_err(|e| AttemptError::from_reqwest(&e))?;

        let status = response.status().as_u16();
        if status == 404 && allow_missing {
            return Ok(None);
        }
        if classify_status(status).is_some() {
            let mut error = AttemptError::from_status(status);
            error.message = format!("{} from {}", error.message, endpoint);
            return Err(error);
        }

        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::from_reqwest(&e))?;
        serde_json::from_str(&body).map(Some).map_err(|e| {
            AttemptError::new(
                ErrorClass::Fatal,
                format!("malformed JSON from {}: {}", endpoint, e),
            )
        })
    }

    async fn fetch_once(
        &self,
        request: &ApiRequest,
    ) -> Result<(Option<u16>, FetchedContent), AttemptError> {
        match request {
            ApiRequest::GithubAdvisory(id) => {
                let endpoint = format!("{}/advisories/{}", self.github_base, id);
                let advisory = self
                    .get_json(&endpoint, self.github_headers(), false)
                    .await?
                    .unwrap_or(Value::Null);
                Ok((
                    Some(200),
                    FetchedContent::json(advisory.to_string(), ApiSource::GithubAdvisory, endpoint),
                ))
            }
            ApiRequest::GithubRepository { owner, repo } => {
                let endpoint = format!("{}/repos/{}/{}", self.github_base, owner, repo);
                let repository = self
                    .get_json(&endpoint, self.github_headers(), false)
                    .await?
                    .unwrap_or(Value::Null);
                let release = self
                    .get_json(
                        &format!("{}/releases/latest", endpoint),
                        self.github_headers(),
                        true,
                    )
                    .await?
                    .unwrap_or(Value::Null);
                let document = serde_json::json!({
                    "repository": repository,
                    "release": release,
                });
                Ok((
                    Some(200),
                    FetchedContent::json(
                        document.to_string(),
                        ApiSource::GithubRepository,
                        endpoint,
                    ),
                ))
            }
            ApiRequest::MsrcCve(cve) => {
                let lookup = format!("{}/cvrf/v2.0/updates('{}')", self.msrc_base, cve);
                let updates = self
                    .get_json(&lookup, Self::msrc_headers(), false)
                    .await?
                    .unwrap_or(Value::Null);
                let update_id = updates
                    .get("value")
                    .and_then(Value::as_array)
                    .and_then(|v| v.first())
                    .and_then(|u| u.get("ID"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        AttemptError::new(
                            ErrorClass::Fatal,
                            format!("no MSRC security update lists {}", cve),
                        )
                    })?
                    .to_string();

                let endpoint = format!("{}/cvrf/v2.0/cvrf/{}", self.msrc_base, update_id);
                let document = self
                    .get_json(&endpoint, Self::msrc_headers(), false)
                    .await?
                    .unwrap_or(Value::Null);
                Ok((
                    Some(200),
                    FetchedContent::json(document.to_string(), ApiSource::MsrcCvrf, endpoint),
                ))
            }
        }
    }
}

#[async_trait]
impl Fetcher for VendorApiFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::VendorApi
    }

    async fn fetch(
        &self,
        url: &AdvisoryUrl,
        profile: &VendorProfile,
        _session: &mut DomainSession,
    ) -> FetchAttemptResult {
        let Some(api) = profile.api else {
            return FetchAttemptResult::unavailable(
                FetchStrategy::VendorApi,
                format!("{} publishes no supported API", profile.name),
            );
        };
        let Some(request) = ApiRequest::for_url(api, url) else {
            tracing::debug!("{} API cannot serve {}", profile.name, url);
            return FetchAttemptResult::unavailable(
                FetchStrategy::VendorApi,
                format!("URL carries no identifier the {} API can look up", profile.name),
            );
        };

        let outcome = retry::execute(&self.policy, |_| self.fetch_once(&request)).await;
        let result = FetchAttemptResult::from_retry(FetchStrategy::VendorApi, outcome);
        tracing::debug!(
            "{} API for {} -> {} ({} attempts)",
            profile.name,
            url,
            result.status.as_str(),
            result.attempts
        );
        result
    }
}
