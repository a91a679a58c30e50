//! Storage module for batch reports
//!
//! This module persists batch results to SQLite:
//! - Run tracking (config hash, timestamps, final status)
//! - One record per unique URL with its extracted fields and diagnostics
//! - One record per input row with its status tag, links and summary

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteReportStore;
pub use traits::{ReportStore, StorageError, StorageResult};

use crate::batch::RowStatus;
use crate::pipeline::UrlStatus;
use crate::PatchwiseError;
use std::path::Path;

/// Opens (or creates) the report database
pub fn open_store(path: &Path) -> Result<SqliteReportStore, PatchwiseError> {
    SqliteReportStore::new(path)
}

/// Represents a batch run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// A URL outcome as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOutcome {
    pub url: String,
    pub host: Option<String>,
    pub vendor: Option<String>,
    pub status: UrlStatus,
    pub failure: Option<String>,
    pub diagnostic: String,
    pub strategy: Option<String>,
    pub confidence: Option<String>,
    pub quality_score: Option<u8>,
    pub patch_ids: Vec<String>,
    pub fix_version: Option<String>,
    pub download_links: Vec<String>,
    pub synthesized_links: Vec<String>,
}

/// A row result as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub row_id: String,
    pub status: RowStatus,
    /// Links joined with the configured delimiter
    pub download_links: String,
    pub summary: String,
    pub url_count: u32,
    pub recorded_at: String,
}

/// Status of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
