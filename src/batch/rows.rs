use super::BatchReport;
use crate::pipeline::UrlStatus;
use crate::record::AdvisoryRecord;
use crate::url::split_ref_urls;
use crate::PatchwiseError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// One input row: an identifier plus its reference URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRow {
    pub id: String,
    pub ref_urls: Vec<String>,
}

impl InputRow {
    /// Builds a row from a pipe-delimited `RefUrls` cell
    pub fn new(id: impl Into<String>, ref_urls: &str) -> Self {
        Self {
            id: id.into(),
            ref_urls: split_ref_urls(ref_urls),
        }
    }

    /// Parses one line of the row file
    ///
    /// A line is `[id,]url|url|...`. The part before the first comma is taken
    /// as the id only if it does not look like a URL; otherwise the row is
    /// numbered by its line. Blank lines and `#` comments yield `None`.
    pub fn parse_line(line: &str, line_number: usize) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        match line.split_once(',') {
            Some((id, cell)) if !id.contains("://") && !id.trim().is_empty() => {
                Some(Self::new(id.trim(), cell))
            }
            _ => Some(Self::new(format!("row-{}", line_number), line)),
        }
    }
}

/// Parses a whole row file
pub fn parse_rows(content: &str) -> Vec<InputRow> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| InputRow::parse_line(line, i + 1))
        .collect()
}

/// Reads the row file
///
/// This is the one failure that aborts a batch: without the row list there is
/// nothing to process.
pub fn read_rows(path: &Path) -> Result<Vec<InputRow>, PatchwiseError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PatchwiseError::Input(format!("cannot read row file {}: {}", path.display(), e))
    })?;
    Ok(parse_rows(&content))
}

/// Every reference URL across all rows, in first-seen order (not deduplicated)
pub fn collect_urls(rows: &[InputRow]) -> Vec<String> {
    rows.iter().flat_map(|r| r.ref_urls.iter().cloned()).collect()
}

/// Status tag for one row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RowStatus {
    Success,
    Failed,
    Blocked,
    Empty,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Blocked => "Blocked",
            Self::Empty => "Empty",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Success" => Some(Self::Success),
            "Failed" => Some(Self::Failed),
            "Blocked" => Some(Self::Blocked),
            "Empty" => Some(Self::Empty),
            _ => None,
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row with the results of all its URLs folded together
#[derive(Debug, Clone, Serialize)]
pub struct RowResult {
    pub row_id: String,
    pub status: RowStatus,
    /// Union of the records of every referenced URL that produced data
    pub record: AdvisoryRecord,
    pub url_count: usize,
    /// One line per URL that did not produce data
    pub diagnostics: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Fans a batch report back out to the rows that referenced each URL
pub fn map_rows(rows: &[InputRow], report: &BatchReport) -> Vec<RowResult> {
    let timestamp = Utc::now();
    rows.iter().map(|row| map_row(row, report, timestamp)).collect()
}

fn map_row(row: &InputRow, report: &BatchReport, timestamp: DateTime<Utc>) -> RowResult {
    let mut record = AdvisoryRecord::new("");
    let mut diagnostics = Vec::new();
    let mut any_data = false;
    let mut any_blocked = false;
    let mut all_done = true;

    for raw in &row.ref_urls {
        let Some(outcome) = report.outcome_for(raw) else {
            all_done = false;
            diagnostics.push(format!("{}: not processed", raw));
            continue;
        };

        if outcome.has_data() {
            any_data = true;
            if let Some(found) = &outcome.record {
                record.merge(found.clone());
            }
            continue;
        }

        match outcome.status {
            UrlStatus::Done => {}
            UrlStatus::Blocked => {
                any_blocked = true;
                all_done = false;
            }
            UrlStatus::Failed => all_done = false,
        }
        diagnostics.push(format!("{}: {}", outcome.url, outcome.diagnostic));
    }

    let status = if any_data {
        RowStatus::Success
    } else if any_blocked {
        RowStatus::Blocked
    } else if all_done {
        RowStatus::Empty
    } else {
        RowStatus::Failed
    };

    RowResult {
        row_id: row.id.clone(),
        status,
        record,
        url_count: row.ref_urls.len(),
        diagnostics,
        timestamp,
    }
}
