/// Checks if a host matches a vendor host pattern
///
/// Three pattern forms are supported:
/// 1. Suffix match: "microsoft.com" matches "microsoft.com" and any subdomain
///    such as "msrc.microsoft.com" (on a label boundary only)
/// 2. Wildcard match: "*.cisco.com" behaves like the suffix form
/// 3. Substring match: a pattern without a dot ("redhat") matches any host
///    containing it
///
/// # Examples
///
/// ```
/// use patchwise::url::matches_host_pattern;
///
/// assert!(matches_host_pattern("microsoft.com", "msrc.microsoft.com"));
/// assert!(!matches_host_pattern("microsoft.com", "notmicrosoft.com"));
/// assert!(matches_host_pattern("*.cisco.com", "tools.cisco.com"));
/// assert!(matches_host_pattern("launchpad", "bugs.launchpad.net"));
/// ```
pub fn matches_host_pattern(pattern: &str, host: &str) -> bool {
    if pattern.is_empty() || host.is_empty() {
        return false;
    }

    let base = pattern.strip_prefix("*.").unwrap_or(pattern);

    if !base.contains('.') {
        return host.contains(base);
    }

    host == base || host.ends_with(&format!(".{}", base))
}
