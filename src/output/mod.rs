//! Output module for batch results
//!
//! This module handles:
//! - Rendering each row (status tag, joined links, flattened summary, timestamp)
//! - Writing rendered rows as tab-separated lines
//! - Generating the markdown batch summary
//! - Collecting and printing batch statistics

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary, BatchSummary};
pub use stats::{print_statistics, BatchStatistics};

use crate::batch::RowResult;
use crate::record::AdvisoryRecord;
use crate::vendor::truncate_chars;
use chrono::SecondsFormat;
use std::io::Write;

/// Remediation text beyond this is truncated in row summaries
pub const MAX_SUMMARY_REMEDIATION_CHARS: usize = 300;

/// Flattens a record into `Patches: ...; Fix: ...; Affected: ...; Remediation: ...`
///
/// Absent parts are left out, so an empty record yields an empty string.
pub fn flatten_summary(record: &AdvisoryRecord) -> String {
    let mut parts = Vec::new();
    if !record.patch_ids.is_empty() {
        parts.push(format!("Patches: {}", record.patch_ids.join(", ")));
    }
    if let Some(fix) = &record.fix_version {
        parts.push(format!("Fix: {}", fix));
    }
    if let Some(affected) = &record.affected_versions {
        parts.push(format!("Affected: {}", affected));
    }
    if let Some(remediation) = &record.remediation_text {
        parts.push(format!(
            "Remediation: {}",
            truncate_chars(remediation, MAX_SUMMARY_REMEDIATION_CHARS)
        ));
    }
    parts.join("; ")
}

/// Joins a record's download links with the configured delimiter
pub fn join_links(record: &AdvisoryRecord, delimiter: &str) -> String {
    record.download_links.join(delimiter)
}

/// A row ready for the output layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRow {
    pub id: String,
    pub status: String,
    pub links: String,
    pub summary: String,
    /// RFC 3339, UTC
    pub timestamp: String,
}

impl RenderedRow {
    /// Tab-separated line; tabs and newlines inside fields become spaces
    pub fn to_tsv_line(&self) -> String {
        [&self.id, &self.status, &self.links, &self.summary, &self.timestamp]
            .iter()
            .map(|field| field.replace(['\t', '\n', '\r'], " "))
            .collect::<Vec<_>>()
            .join("\t")
    }
}

pub fn render_row(row: &RowResult, delimiter: &str) -> RenderedRow {
    RenderedRow {
        id: row.row_id.clone(),
        status: row.status.as_str().to_string(),
        links: join_links(&row.record, delimiter),
        summary: flatten_summary(&row.record),
        timestamp: row.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

/// Writes rendered rows as TSV with a header line
pub fn write_rows<W: Write>(rows: &[RenderedRow], writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "id\tstatus\tdownload_links\tsummary\ttimestamp")?;
    for row in rows {
        writeln!(writer, "{}", row.to_tsv_line())?;
    }
    writer.flush()
}
