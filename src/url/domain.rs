use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use patchwise::url::extract_host;
///
/// let url = Url::parse("https://MSRC.Microsoft.com/update-guide").unwrap();
/// assert_eq!(extract_host(&url), Some("msrc.microsoft.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Builds the key used to group URLs into per-host sessions
///
/// Non-default ports are kept so that two services on the same machine
/// get independent cookie jars and pacing.
pub fn session_key(url: &Url) -> Option<String> {
    let host = extract_host(url)?;
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Returns the scheme + host (+ port) origin of a URL, without a trailing slash
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
