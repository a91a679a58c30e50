//! Batch statistics
//!
//! This module folds a batch report and its row results into counts, and
//! prints them to stdout.

use crate::batch::{BatchReport, RowResult, RowStatus};
use crate::fetch::FetchStrategy;
use crate::pipeline::{FailureKind, UrlStatus};
use crate::record::Confidence;
use std::collections::HashMap;

/// Batch statistics summary
#[derive(Debug, Clone, Default)]
pub struct BatchStatistics {
    /// Number of input rows
    pub total_rows: usize,

    /// Number of unique URLs after deduplication
    pub unique_urls: usize,

    /// Number of pipeline runs started
    pub pipeline_runs: usize,

    /// Number of distinct host sessions
    pub hosts: usize,

    pub urls_by_status: HashMap<UrlStatus, usize>,
    pub rows_by_status: HashMap<RowStatus, usize>,
    pub records_by_confidence: HashMap<Confidence, usize>,
    pub failures_by_kind: HashMap<FailureKind, usize>,

    /// Which strategy produced each successful fetch
    pub successes_by_strategy: HashMap<FetchStrategy, usize>,

    /// Mean quality score over scored URLs
    pub average_quality: Option<f64>,

    /// Blocked URLs
    pub manual_review: Vec<String>,

    pub interrupted: bool,
    pub duration_secs: f64,
}

impl BatchStatistics {
    /// Collects statistics from a finished batch
    pub fn collect(report: &BatchReport, rows: &[RowResult]) -> Self {
        let mut stats = Self {
            total_rows: rows.len(),
            unique_urls: report.len(),
            pipeline_runs: report.pipeline_runs,
            hosts: report.hosts,
            average_quality: report.average_quality(),
            manual_review: report.manual_review().iter().map(|o| o.url.clone()).collect(),
            interrupted: report.interrupted,
            duration_secs: report.duration_secs(),
            ..Self::default()
        };

        for outcome in report.iter() {
            *stats.urls_by_status.entry(outcome.status).or_insert(0) += 1;
            if let Some(kind) = outcome.failure {
                *stats.failures_by_kind.entry(kind).or_insert(0) += 1;
            }
            if let Some(record) = &outcome.record {
                *stats.records_by_confidence.entry(record.confidence()).or_insert(0) += 1;
                if let Some(strategy) = record.source_strategy {
                    *stats.successes_by_strategy.entry(strategy).or_insert(0) += 1;
                }
            }
        }
        for row in rows {
            *stats.rows_by_status.entry(row.status).or_insert(0) += 1;
        }

        stats
    }

    pub fn urls_with(&self, status: UrlStatus) -> usize {
        self.urls_by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn rows_with(&self, status: RowStatus) -> usize {
        self.rows_by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn records_with(&self, confidence: Confidence) -> usize {
        self.records_by_confidence.get(&confidence).copied().unwrap_or(0)
    }

    /// Percentage of rows that ended in `Success`
    pub fn row_success_rate(&self) -> f64 {
        if self.total_rows == 0 {
            return 0.0;
        }
        self.rows_with(RowStatus::Success) as f64 / self.total_rows as f64 * 100.0
    }
}

/// Prints statistics to stderr; stdout carries the row output
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &BatchStatistics) {
    eprintln!("=== Batch Statistics ===\n");

    eprintln!("Overview:");
    eprintln!("  Input rows: {}", stats.total_rows);
    eprintln!("  Unique URLs: {}", stats.unique_urls);
    eprintln!("  Pipeline runs: {}", stats.pipeline_runs);
    eprintln!("  Hosts: {}", stats.hosts);
    eprintln!("  Duration: {:.1}s", stats.duration_secs);
    if stats.interrupted {
        eprintln!("  Interrupted: yes (deadline or cancellation)");
    }
    eprintln!();

    eprintln!("URLs by Status:");
    for status in [UrlStatus::Done, UrlStatus::Failed, UrlStatus::Blocked] {
        eprintln!("  {}: {}", status, stats.urls_with(status));
    }
    eprintln!();

    eprintln!("Rows by Status:");
    for status in [RowStatus::Success, RowStatus::Empty, RowStatus::Blocked, RowStatus::Failed] {
        eprintln!("  {}: {}", status, stats.rows_with(status));
    }
    eprintln!();

    eprintln!("Records by Confidence:");
    for confidence in [Confidence::High, Confidence::Medium, Confidence::Low] {
        eprintln!("  {}: {}", confidence, stats.records_with(confidence));
    }
    eprintln!();

    if !stats.successes_by_strategy.is_empty() {
        eprintln!("Successful Fetches by Strategy:");
        let mut counts: Vec<_> = stats.successes_by_strategy.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1));
        for (strategy, count) in counts {
            eprintln!("  {}: {}", strategy, count);
        }
        eprintln!();
    }

    if !stats.failures_by_kind.is_empty() {
        eprintln!("Problems:");
        let mut counts: Vec<_> = stats.failures_by_kind.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1));
        for (kind, count) in counts {
            eprintln!("  {}: {}", kind, count);
        }
        eprintln!();
    }

    if !stats.manual_review.is_empty() {
        eprintln!("Needs Manual Review ({}):", stats.manual_review.len());
        for url in &stats.manual_review {
            eprintln!("  - {}", url);
        }
        eprintln!();
    }

    if let Some(average) = stats.average_quality {
        eprintln!("Average Quality: {:.1}/100", average);
    }
    eprintln!(
        "Row Success Rate: {:.1}% ({} / {} rows)",
        stats.row_success_rate(),
        stats.rows_with(RowStatus::Success),
        stats.total_rows
    );
}
