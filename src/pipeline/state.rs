use crate::fetch::FetchStrategy;
use serde::Serialize;
use std::fmt;

/// Where a URL is in the per-URL state machine
///
/// `Start → VendorResolved → Fetching(strategy) → {FetchSucceeded | FetchFailed |
/// CapabilityUnavailable | Blocked} → Extracted → Scored → Done`. `FetchFailed`
/// and `CapabilityUnavailable` loop back to `Fetching` with the next strategy,
/// or end in `Failed` when none remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineState {
    Start,
    VendorResolved,
    Fetching(FetchStrategy),
    FetchSucceeded,
    FetchFailed,
    CapabilityUnavailable,
    Blocked,
    Extracted,
    Scored,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Blocked)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::VendorResolved => f.write_str("vendor-resolved"),
            Self::Fetching(strategy) => write!(f, "fetching({})", strategy),
            Self::FetchSucceeded => f.write_str("fetch-succeeded"),
            Self::FetchFailed => f.write_str("fetch-failed"),
            Self::CapabilityUnavailable => f.write_str("capability-unavailable"),
            Self::Blocked => f.write_str("blocked"),
            Self::Extracted => f.write_str("extracted"),
            Self::Scored => f.write_str("scored"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Terminal status of one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum UrlStatus {
    Done,
    Failed,
    Blocked,
}

impl UrlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    /// Parses the string form used in the report store
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a URL did not produce a full result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    /// Network trouble that survived the retry budget
    TransientNetwork,
    /// HTTP 403; needs manual review
    AntiBotBlocked,
    /// No strategy for the vendor could run
    CapabilityUnavailable,
    /// Fetched fine but nothing recognizable was found (status stays `Done`)
    ExtractionEmpty,
    /// Malformed URL or input
    FatalInput,
    /// Cancelled by the batch deadline or the caller
    Timeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransientNetwork => "transient-network",
            Self::AntiBotBlocked => "anti-bot-blocked",
            Self::CapabilityUnavailable => "capability-unavailable",
            Self::ExtractionEmpty => "extraction-empty",
            Self::FatalInput => "fatal-input",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
