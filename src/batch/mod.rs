//! Batch coordination
//!
//! This module handles:
//! - Deduplicating reference URLs across every input row
//! - Running the advisory pipeline once per unique URL, one host at a time
//!   per host and several hosts in parallel
//! - Progress events, cancellation and the batch deadline
//! - Fanning per-URL outcomes back out to input rows

mod coordinator;
mod rows;

pub use coordinator::{BatchCoordinator, BatchHandle};
pub use rows::{collect_urls, map_rows, parse_rows, read_rows, InputRow, RowResult, RowStatus};

use crate::pipeline::{UrlOutcome, UrlStatus};
use crate::url::normalize_url;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Progress event emitted after each URL reaches a terminal state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub url: String,
    pub status: UrlStatus,
}

/// Results of one batch, keyed by normalized URL
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Unique URLs in first-seen order
    pub order: Vec<String>,
    pub outcomes: HashMap<String, UrlOutcome>,
    /// Trimmed raw input spelling -> key in `outcomes`
    #[serde(skip)]
    aliases: HashMap<String, String>,
    /// Number of pipeline runs actually started
    pub pipeline_runs: usize,
    /// Number of distinct host sessions used
    pub hosts: usize,
    /// True when the deadline or a cancellation stopped the batch early
    pub interrupted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    /// Builds a report from finished outcomes, in the given order
    pub fn from_outcomes(outcomes: Vec<UrlOutcome>) -> Self {
        let now = Utc::now();
        let mut report = Self {
            order: Vec::with_capacity(outcomes.len()),
            outcomes: HashMap::with_capacity(outcomes.len()),
            aliases: HashMap::new(),
            pipeline_runs: 0,
            hosts: 0,
            interrupted: false,
            started_at: now,
            finished_at: now,
        };
        for outcome in outcomes {
            if !report.outcomes.contains_key(&outcome.url) {
                report.order.push(outcome.url.clone());
            }
            report.outcomes.insert(outcome.url.clone(), outcome);
        }
        report
    }

    /// Looks up the outcome for a URL as it was spelled in the input
    pub fn outcome_for(&self, raw: &str) -> Option<&UrlOutcome> {
        let trimmed = raw.trim();
        if let Some(key) = self.aliases.get(trimmed) {
            return self.outcomes.get(key);
        }
        if let Some(outcome) = self.outcomes.get(trimmed) {
            return Some(outcome);
        }
        normalize_url(trimmed)
            .ok()
            .and_then(|url| self.outcomes.get(url.as_str()))
    }

    /// Outcomes in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &UrlOutcome> {
        self.order.iter().filter_map(|key| self.outcomes.get(key))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn count(&self, status: UrlStatus) -> usize {
        self.iter().filter(|o| o.status == status).count()
    }

    /// Blocked URLs, which need an operator to look at them
    pub fn manual_review(&self) -> Vec<&UrlOutcome> {
        self.iter().filter(|o| o.is_blocked()).collect()
    }

    /// Done URLs whose extraction scored below the acceptable threshold
    pub fn low_quality(&self) -> Vec<&UrlOutcome> {
        self.iter()
            .filter(|o| o.status == UrlStatus::Done)
            .filter(|o| o.quality.as_ref().is_some_and(|q| !q.is_acceptable))
            .collect()
    }

    /// Mean quality score over URLs that were scored
    pub fn average_quality(&self) -> Option<f64> {
        let scores: Vec<u8> = self
            .iter()
            .filter_map(|o| o.quality.as_ref().map(|q| q.score))
            .collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().map(|&s| s as f64).sum::<f64>() / scores.len() as f64)
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
