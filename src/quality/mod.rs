//! Heuristic grading of extracted records
//!
//! The score is additive over present, non-trivial fields. It never discards
//! a record: a low score is surfaced as a warning, and the score together with
//! the fetch strategy decides the record's [`Confidence`].

use crate::config::QualityConfig;
use crate::fetch::{ContentKind, FetchStrategy, FetchedContent};
use crate::record::{AdvisoryRecord, Confidence};
use crate::vendor::VendorProfile;
use serde::Serialize;

pub const WEIGHT_PATCH_IDS: u8 = 30;
pub const WEIGHT_FIX_VERSION: u8 = 20;
pub const WEIGHT_AFFECTED_VERSIONS: u8 = 15;
pub const WEIGHT_REMEDIATION: u8 = 10;
pub const WEIGHT_DOWNLOAD_LINKS: u8 = 25;

/// Shorter values than these count as absent
const MIN_FIX_VERSION_CHARS: usize = 2;
const MIN_AFFECTED_CHARS: usize = 3;
const MIN_REMEDIATION_CHARS: usize = 20;

/// Grade of one extracted record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityScore {
    /// 0 to 100
    pub score: u8,
    pub issues: Vec<String>,
    pub is_acceptable: bool,
}

/// How a record was obtained, for confidence assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchContext {
    pub strategy: FetchStrategy,
    /// Body looked like a client-rendered shell
    pub skeleton: bool,
}

#[derive(Debug, Clone)]
pub struct QualityScorer {
    acceptable_threshold: u8,
    high_confidence_threshold: u8,
    skeleton_page_bytes: usize,
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(&QualityConfig::default())
    }
}

fn long_enough(value: Option<&str>, min_chars: usize) -> bool {
    value.is_some_and(|v| v.trim().chars().count() >= min_chars)
}

impl QualityScorer {
    pub fn new(config: &QualityConfig) -> Self {
        Self {
            acceptable_threshold: config.acceptable_threshold,
            high_confidence_threshold: config.high_confidence_threshold,
            skeleton_page_bytes: config.skeleton_page_bytes,
        }
    }

    /// Scores a record
    pub fn score(&self, record: &AdvisoryRecord) -> QualityScore {
        let mut score: u8 = 0;
        let mut issues = Vec::new();

        if record.patch_ids.is_empty() {
            issues.push("no patch identifiers".to_string());
        } else {
            score += WEIGHT_PATCH_IDS;
        }

        if long_enough(record.fix_version.as_deref(), MIN_FIX_VERSION_CHARS) {
            score += WEIGHT_FIX_VERSION;
        } else {
            issues.push("no fix version".to_string());
        }

        if long_enough(record.affected_versions.as_deref(), MIN_AFFECTED_CHARS) {
            score += WEIGHT_AFFECTED_VERSIONS;
        } else {
            issues.push("no affected versions".to_string());
        }

        if long_enough(record.remediation_text.as_deref(), MIN_REMEDIATION_CHARS) {
            score += WEIGHT_REMEDIATION;
        } else {
            issues.push("remediation text missing or too short".to_string());
        }

        if record.download_links.is_empty() {
            issues.push("no download links".to_string());
        } else {
            score += WEIGHT_DOWNLOAD_LINKS;
        }

        QualityScore {
            score,
            issues,
            is_acceptable: score >= self.acceptable_threshold,
        }
    }

    /// True when HTML from a client-rendered vendor is too small to hold the
    /// advisory itself
    pub fn is_skeleton(&self, profile: &VendorProfile, content: &FetchedContent) -> bool {
        content.kind == ContentKind::Html
            && profile.expects_rendering()
            && content.body.len() < self.skeleton_page_bytes
    }

    /// Confidence label for a scored record
    ///
    /// `High` needs actionable data plus either the vendor API or a score at
    /// the high-confidence threshold, and never comes from a skeleton page.
    /// `Medium` needs a patch id, a download link, or a fix version.
    pub fn confidence_for(
        &self,
        record: &AdvisoryRecord,
        quality: &QualityScore,
        context: FetchContext,
    ) -> Confidence {
        let trusted_source = context.strategy == FetchStrategy::VendorApi
            || quality.score >= self.high_confidence_threshold;
        if record.has_actionable_data() && trusted_source && !context.skeleton {
            Confidence::High
        } else if record.has_actionable_data() || record.fix_version.is_some() {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    /// Scores a finished record and stamps its confidence
    pub fn assess(
        &self,
        record: &mut AdvisoryRecord,
        context: FetchContext,
        content_bytes: usize,
    ) -> QualityScore {
        let mut quality = self.score(record);
        if context.skeleton {
            quality.issues.push(format!(
                "skeleton page ({} bytes); content likely client-rendered",
                content_bytes
            ));
        }
        let confidence = self.confidence_for(record, &quality, context);
        record.set_confidence(confidence);
        record.source_strategy = Some(context.strategy);
        quality
    }
}
