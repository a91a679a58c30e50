use super::state::{FailureKind, PipelineState, UrlStatus};
use crate::fetch::{FetchAttemptResult, FetchStatus, FetchStrategy};
use crate::quality::QualityScore;
use crate::record::AdvisoryRecord;
use serde::Serialize;

/// One strategy's contribution to a URL's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptSummary {
    pub strategy: FetchStrategy,
    pub status: FetchStatus,
    pub status_code: Option<u16>,
    /// Requests made, including retries
    pub attempts: u32,
    pub size_bytes: usize,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl From<&FetchAttemptResult> for AttemptSummary {
    fn from(result: &FetchAttemptResult) -> Self {
        Self {
            strategy: result.strategy,
            status: result.status,
            status_code: result.status_code,
            attempts: result.attempts,
            size_bytes: result.size_bytes,
            duration_ms: result.duration_ms,
            error: result.error.clone(),
        }
    }
}

/// Everything the caller learns about one URL
#[derive(Debug, Clone, Serialize)]
pub struct UrlOutcome {
    /// Normalized URL (or the raw input when it could not be parsed)
    pub url: String,
    pub host: Option<String>,
    pub vendor: Option<String>,
    pub status: UrlStatus,
    pub record: Option<AdvisoryRecord>,
    pub quality: Option<QualityScore>,
    pub attempts: Vec<AttemptSummary>,
    pub transitions: Vec<PipelineState>,
    /// Taxonomy tag for anything short of a full result; `ExtractionEmpty`
    /// accompanies a `Done` status
    pub failure: Option<FailureKind>,
    /// Human-readable explanation
    pub diagnostic: String,
    pub duration_ms: u64,
}

impl UrlOutcome {
    /// Outcome for input that never became a URL
    pub fn fatal_input(raw: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::terminal(
            raw.into(),
            None,
            UrlStatus::Failed,
            FailureKind::FatalInput,
            format!("malformed URL: {}", error),
        )
    }

    /// Outcome for a URL still pending when the batch was stopped
    pub fn interrupted(url: impl Into<String>, host: Option<String>, reason: &str) -> Self {
        Self::terminal(
            url.into(),
            host,
            UrlStatus::Failed,
            FailureKind::Timeout,
            reason.to_string(),
        )
    }

    fn terminal(
        url: String,
        host: Option<String>,
        status: UrlStatus,
        failure: FailureKind,
        diagnostic: String,
    ) -> Self {
        Self {
            url,
            host,
            vendor: None,
            status,
            record: None,
            quality: None,
            attempts: Vec::new(),
            transitions: vec![PipelineState::Failed],
            failure: Some(failure),
            diagnostic,
            duration_ms: 0,
        }
    }

    /// True when the URL produced a record with at least one extracted field
    pub fn has_data(&self) -> bool {
        self.status == UrlStatus::Done && self.record.as_ref().is_some_and(|r| !r.is_empty())
    }

    pub fn is_blocked(&self) -> bool {
        self.status == UrlStatus::Blocked
    }

    /// Strategies actually invoked, in order
    pub fn strategies_tried(&self) -> Vec<FetchStrategy> {
        self.attempts.iter().map(|a| a.strategy).collect()
    }

    /// State path as `start > vendor-resolved > ...`
    pub fn transition_path(&self) -> String {
        self.transitions
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" > ")
    }
}
