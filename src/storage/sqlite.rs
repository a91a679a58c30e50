//! SQLite report store
//!
//! This module provides a SQLite-based implementation of the ReportStore trait.

use crate::batch::{BatchReport, RowResult, RowStatus};
use crate::output::{flatten_summary, join_links};
use crate::pipeline::UrlStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ReportStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus, StoredOutcome, StoredRow};
use crate::PatchwiseError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// SQLite report store
pub struct SqliteReportStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteReportStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteReportStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteReportStore {
    /// Opens or creates the report database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteReportStore)` - Successfully opened/created database
    /// * `Err(PatchwiseError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, PatchwiseError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, PatchwiseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Running),
    })
}

/// Decodes a JSON string array column, treating garbage as empty
fn string_list(raw: String) -> Vec<String> {
    serde_json::from_str(&raw).unwrap_or_default()
}

impl ReportStore for SqliteReportStore {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Results =====

    fn save_outcomes(&mut self, run_id: i64, report: &BatchReport) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let mut saved = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO url_outcomes (
                    run_id, url, host, vendor, status, failure, diagnostic, strategy,
                    confidence, quality_score, quality_issues, patch_ids, fix_version,
                    affected_versions, remediation_text, download_links, synthesized_links,
                    attempts, transitions, duration_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            )?;

            for outcome in report.iter() {
                let record = outcome.record.as_ref();
                let quality = outcome.quality.as_ref();
                let empty: &[String] = &[];

                stmt.execute(params![
                    run_id,
                    outcome.url,
                    outcome.host,
                    outcome.vendor,
                    outcome.status.as_str(),
                    outcome.failure.map(|k| k.as_str()),
                    outcome.diagnostic,
                    record.and_then(|r| r.source_strategy).map(|s| s.as_str()),
                    record.map(|r| r.confidence().as_str()),
                    quality.map(|q| q.score),
                    quality.map(|q| serde_json::to_string(&q.issues)).transpose()?,
                    serde_json::to_string(record.map_or(empty, |r| r.patch_ids.as_slice()))?,
                    record.and_then(|r| r.fix_version.clone()),
                    record.and_then(|r| r.affected_versions.clone()),
                    record.and_then(|r| r.remediation_text.clone()),
                    serde_json::to_string(record.map_or(empty, |r| r.download_links.as_slice()))?,
                    serde_json::to_string(
                        record.map_or(empty, |r| r.synthesized_links.as_slice()),
                    )?,
                    serde_json::to_string(&outcome.attempts)?,
                    outcome.transition_path(),
                    outcome.duration_ms as i64,
                ])?;
                saved += 1;
            }
        }
        tx.commit()?;
        tracing::debug!("Saved {} URL outcomes for run {}", saved, run_id);
        Ok(saved)
    }

    fn save_row_results(
        &mut self,
        run_id: i64,
        rows: &[RowResult],
        link_delimiter: &str,
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO row_results (
                    run_id, row_id, status, download_links, summary, url_count, diagnostics, recorded_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for row in rows {
                stmt.execute(params![
                    run_id,
                    row.row_id,
                    row.status.as_str(),
                    join_links(&row.record, link_delimiter),
                    flatten_summary(&row.record),
                    row.url_count as i64,
                    serde_json::to_string(&row.diagnostics)?,
                    row.timestamp.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    fn get_outcome(&self, run_id: i64, url: &str) -> StorageResult<Option<StoredOutcome>> {
        let outcome = self
            .conn
            .query_row(
                "SELECT url, host, vendor, status, failure, diagnostic, strategy, confidence,
                 quality_score, patch_ids, fix_version, download_links, synthesized_links
                 FROM url_outcomes WHERE run_id = ?1 AND url = ?2",
                params![run_id, url],
                |row| {
                    Ok(StoredOutcome {
                        url: row.get(0)?,
                        host: row.get(1)?,
                        vendor: row.get(2)?,
                        status: UrlStatus::parse(&row.get::<_, String>(3)?)
                            .unwrap_or(UrlStatus::Failed),
                        failure: row.get(4)?,
                        diagnostic: row.get(5)?,
                        strategy: row.get(6)?,
                        confidence: row.get(7)?,
                        quality_score: row.get(8)?,
                        patch_ids: string_list(row.get(9)?),
                        fix_version: row.get(10)?,
                        download_links: string_list(row.get(11)?),
                        synthesized_links: string_list(row.get(12)?),
                    })
                },
            )
            .optional()?;
        Ok(outcome)
    }

    fn get_row_results(&self, run_id: i64) -> StorageResult<Vec<StoredRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT row_id, status, download_links, summary, url_count, recorded_at
             FROM row_results WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok(StoredRow {
                    row_id: row.get(0)?,
                    status: RowStatus::parse(&row.get::<_, String>(1)?)
                        .unwrap_or(RowStatus::Failed),
                    download_links: row.get(2)?,
                    summary: row.get(3)?,
                    url_count: row.get(4)?,
                    recorded_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ===== Statistics =====

    fn count_outcomes_by_status(&self, run_id: i64) -> StorageResult<HashMap<UrlStatus, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM url_outcomes WHERE run_id = ?1 GROUP BY status",
        )?;
        let mut counts = HashMap::new();
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = UrlStatus::parse(&status) {
                counts.insert(status, count as u64);
            }
        }
        Ok(counts)
    }

    fn get_manual_review(&self, run_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT url FROM url_outcomes WHERE run_id = ?1 AND status = ?2 ORDER BY id",
        )?;
        let urls = stmt
            .query_map(params![run_id, UrlStatus::Blocked.as_str()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }
}
