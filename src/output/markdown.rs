//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a batch,
//! including status breakdowns, the manual-review list, low-quality
//! extractions, and failed URLs.

use super::stats::BatchStatistics;
use crate::batch::{BatchReport, RowStatus};
use crate::pipeline::UrlStatus;
use crate::record::Confidence;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Everything the markdown summary shows
#[derive(Debug, Clone)]
pub struct BatchSummary<'a> {
    /// Report-store run id, if the run was recorded
    pub run_id: Option<i64>,
    pub config_hash: Option<&'a str>,
    pub report: &'a BatchReport,
    pub stats: &'a BatchStatistics,
}

/// Writes the markdown summary to `output_path`
///
/// # Arguments
///
/// * `summary` - The batch summary data
/// * `output_path` - Path where the markdown file should be written
pub fn generate_markdown_summary(
    summary: &BatchSummary<'_>,
    output_path: &Path,
) -> std::io::Result<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Escapes a value for use inside a table cell
fn cell(value: &str) -> String {
    value.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Formats a batch summary as markdown
pub fn format_markdown_summary(summary: &BatchSummary<'_>) -> String {
    let report = summary.report;
    let stats = summary.stats;
    let mut md = String::new();

    md.push_str("# Patchwise Batch Summary\n\n");

    md.push_str("## Run Information\n\n");
    if let Some(run_id) = summary.run_id {
        md.push_str(&format!("- **Run ID**: {}\n", run_id));
    }
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    md.push_str(&format!("- **Duration**: {:.1} seconds\n", stats.duration_secs));
    if report.interrupted {
        md.push_str("- **Interrupted**: yes, unfinished URLs were marked failed\n");
    }
    if let Some(hash) = summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Input Rows**: {}\n", stats.total_rows));
    md.push_str(&format!("- **Unique URLs**: {}\n", stats.unique_urls));
    md.push_str(&format!("- **Pipeline Runs**: {}\n", stats.pipeline_runs));
    md.push_str(&format!("- **Hosts**: {}\n", stats.hosts));
    if let Some(average) = stats.average_quality {
        md.push_str(&format!("- **Average Quality**: {:.1}/100\n", average));
    }
    md.push_str(&format!(
        "- **Row Success Rate**: {:.2}%\n\n",
        stats.row_success_rate()
    ));

    md.push_str("## URL Status Breakdown\n\n");
    md.push_str("| Status | Count |\n");
    md.push_str("|--------|-------|\n");
    for status in [UrlStatus::Done, UrlStatus::Failed, UrlStatus::Blocked] {
        md.push_str(&format!("| {} | {} |\n", status, stats.urls_with(status)));
    }
    md.push('\n');

    md.push_str("## Row Status Breakdown\n\n");
    md.push_str("| Status | Rows |\n");
    md.push_str("|--------|------|\n");
    for status in [RowStatus::Success, RowStatus::Empty, RowStatus::Blocked, RowStatus::Failed] {
        md.push_str(&format!("| {} | {} |\n", status, stats.rows_with(status)));
    }
    md.push('\n');

    md.push_str("## Confidence\n\n");
    md.push_str("| Confidence | Records |\n");
    md.push_str("|------------|---------|\n");
    for confidence in [Confidence::High, Confidence::Medium, Confidence::Low] {
        md.push_str(&format!(
            "| {} | {} |\n",
            confidence,
            stats.records_with(confidence)
        ));
    }
    md.push('\n');

    // Always present so an empty list is an explicit answer
    let blocked = report.manual_review();
    md.push_str("## Needs Manual Review\n\n");
    if blocked.is_empty() {
        md.push_str("None.\n\n");
    } else {
        md.push_str("| URL | Vendor | Diagnostic |\n");
        md.push_str("|-----|--------|------------|\n");
        for outcome in blocked {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                cell(&outcome.url),
                outcome.vendor.as_deref().unwrap_or("-"),
                cell(&outcome.diagnostic)
            ));
        }
        md.push('\n');
    }

    let low_quality = report.low_quality();
    if !low_quality.is_empty() {
        md.push_str("## Low-Quality Extractions\n\n");
        md.push_str("| URL | Score | Issues |\n");
        md.push_str("|-----|-------|--------|\n");
        for outcome in low_quality {
            if let Some(quality) = &outcome.quality {
                md.push_str(&format!(
                    "| {} | {} | {} |\n",
                    cell(&outcome.url),
                    quality.score,
                    cell(&quality.issues.join(", "))
                ));
            }
        }
        md.push('\n');
    }

    let failed: Vec<_> = report
        .iter()
        .filter(|o| o.status == UrlStatus::Failed)
        .collect();
    if !failed.is_empty() {
        md.push_str("## Failed URLs\n\n");
        md.push_str("| URL | Problem | Diagnostic |\n");
        md.push_str("|-----|---------|------------|\n");
        for outcome in failed {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                cell(&outcome.url),
                outcome.failure.map(|k| k.as_str()).unwrap_or("-"),
                cell(&outcome.diagnostic)
            ));
        }
        md.push('\n');
    }

    md
}
