//! Patchwise: vendor advisory scraping and extraction engine
//!
//! Given the reference URLs attached to CVE records, this crate decides how to
//! fetch each advisory page (vendor API, headless render, or direct HTTP),
//! extracts remediation facts (patch identifiers, fix versions, download links),
//! grades the result, and keeps per-host session and pacing state across a batch.

pub mod batch;
pub mod config;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod quality;
pub mod record;
pub mod retry;
pub mod session;
pub mod storage;
pub mod url;
pub mod vendor;

use thiserror::Error;

/// Main error type for Patchwise operations
///
/// Per-URL problems never surface here; they are recorded on the URL's outcome.
/// This type covers failures that abort a whole operation (bad config, unreadable
/// input, report database errors).
#[derive(Debug, Error)]
pub enum PatchwiseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Batch task failed: {0}")]
    Runtime(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Empty URL")]
    Empty,
}

/// Result type alias for Patchwise operations
pub type Result<T> = std::result::Result<T, PatchwiseError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use batch::{BatchCoordinator, BatchReport, InputRow, RowResult, RowStatus};
pub use config::Config;
pub use pipeline::{AdvisoryPipeline, UrlOutcome, UrlStatus};
pub use record::{AdvisoryRecord, Confidence};
pub use url::AdvisoryUrl;
pub use vendor::{VendorProfile, VendorRegistry};
