//! Storage traits and error types
//!
//! This module defines the trait interface for report stores and
//! associated error types.

use crate::batch::{BatchReport, RowResult};
use crate::pipeline::UrlStatus;
use crate::storage::{RunRecord, RunStatus, StoredOutcome, StoredRow};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for report store implementations
///
/// A run is created before the batch starts and finished after its outcomes
/// and row results have been saved.
pub trait ReportStore {
    // ===== Run Management =====

    /// Creates a new batch run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Sets the final status and the finish timestamp
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Results =====

    /// Saves one row per unique URL; returns the number saved
    fn save_outcomes(&mut self, run_id: i64, report: &BatchReport) -> StorageResult<usize>;

    /// Saves the per-row results; returns the number saved
    fn save_row_results(
        &mut self,
        run_id: i64,
        rows: &[RowResult],
        link_delimiter: &str,
    ) -> StorageResult<usize>;

    fn get_outcome(&self, run_id: i64, url: &str) -> StorageResult<Option<StoredOutcome>>;

    fn get_row_results(&self, run_id: i64) -> StorageResult<Vec<StoredRow>>;

    // ===== Statistics =====

    fn count_outcomes_by_status(&self, run_id: i64) -> StorageResult<HashMap<UrlStatus, u64>>;

    /// Blocked URLs of a run, in insertion order
    fn get_manual_review(&self, run_id: i64) -> StorageResult<Vec<String>>;
}
