use serde::Deserialize;

/// Main configuration structure for Patchwise
///
/// Every section is optional; an empty file yields the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub retry: RetryConfig,
    pub batch: BatchConfig,
    pub browser: BrowserConfig,
    #[serde(rename = "vendor-api")]
    pub vendor_api: VendorApiConfig,
    pub quality: QualityConfig,
    pub output: OutputConfig,
}

/// Direct HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Browser-like User-Agent sent on direct requests
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// TCP/TLS connect timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Lower bound of the randomized delay before the first attempt (milliseconds)
    pub pre_request_delay_min_ms: u64,

    /// Upper bound of the randomized delay before the first attempt (milliseconds)
    pub pre_request_delay_max_ms: u64,

    /// Minimum time between requests to the same host (milliseconds)
    pub min_request_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            pre_request_delay_min_ms: 500,
            pre_request_delay_max_ms: 1500,
            min_request_interval_ms: 1000,
        }
    }
}

/// Retry executor policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 8000,
            jitter_ms: 500,
        }
    }
}

/// Batch coordinator limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BatchConfig {
    /// Maximum number of hosts processed concurrently
    pub max_workers: u32,

    /// Wall-clock budget for the whole batch (seconds)
    pub batch_timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            batch_timeout_secs: 1800,
        }
    }
}

/// Headless browser rendering
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserConfig {
    /// Whether to launch a headless browser (requires the `browser` feature)
    pub enabled: bool,

    /// How long to let client-side scripts run before reading the DOM (milliseconds)
    pub settle_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            settle_ms: 8000,
        }
    }
}

/// Official vendor data endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VendorApiConfig {
    pub github_base_url: String,
    pub msrc_base_url: String,

    /// Optional token; raises the GitHub API rate limit
    pub github_token: Option<String>,
}

impl Default for VendorApiConfig {
    fn default() -> Self {
        Self {
            github_base_url: "https://api.github.com".to_string(),
            msrc_base_url: "https://api.msrc.microsoft.com".to_string(),
            github_token: None,
        }
    }
}

/// Quality scorer thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct QualityConfig {
    /// Scores at or above this are acceptable (0-100)
    pub acceptable_threshold: u8,

    /// Scores at or above this may be labelled High confidence (0-100)
    pub high_confidence_threshold: u8,

    /// HTML smaller than this from a client-rendered vendor is a skeleton page
    pub skeleton_page_bytes: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            acceptable_threshold: 40,
            high_confidence_threshold: 70,
            skeleton_page_bytes: 5000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite report database
    pub database_path: String,

    /// Path to the markdown batch summary
    pub summary_path: String,

    /// Separator used when joining a row's download links
    pub link_delimiter: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./patchwise.db".to_string(),
            summary_path: "./patchwise-summary.md".to_string(),
            link_delimiter: " | ".to_string(),
        }
    }
}
