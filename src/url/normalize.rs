use crate::UrlError;
use url::Url;

/// Tracking query parameters removed before deduplication
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Normalizes a reference URL so that trivially different spellings of the
/// same advisory collapse to one key
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace and stray quotes; reject empty input
/// 2. Parse the URL; reject if malformed
/// 3. Require an HTTP or HTTPS scheme and a host
/// 4. Lowercase the host (done by the parser)
/// 5. Remove the fragment
/// 6. Remove tracking query parameters, keeping the remaining order intact
///
/// Paths and the remaining query are left untouched: advisory sites often
/// treat them case-sensitively.
///
/// # Examples
///
/// ```
/// use patchwise::url::normalize_url;
///
/// let url = normalize_url(" https://MSRC.microsoft.com/update-guide/vulnerability/CVE-2024-21412#faq ").unwrap();
/// assert_eq!(url.as_str(), "https://msrc.microsoft.com/update-guide/vulnerability/CVE-2024-21412");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let trimmed = url_str.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut url = Url::parse(trimmed).map_err(|e| UrlError::Parse(format!("{}: {}", trimmed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);

    // Rebuild the query only when a tracking parameter is present
    if url.query().is_some() {
        let has_tracking = url
            .query_pairs()
            .any(|(k, _)| TRACKING_PARAMS.contains(&k.as_ref()));

        if has_tracking {
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();

            if kept.is_empty() {
                url.set_query(None);
            } else {
                url.query_pairs_mut().clear().extend_pairs(kept.iter());
            }
        }
    }

    Ok(url)
}
