//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the report database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track batch runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per unique URL per run
CREATE TABLE IF NOT EXISTS url_outcomes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    url TEXT NOT NULL,
    host TEXT,
    vendor TEXT,
    status TEXT NOT NULL,
    failure TEXT,
    diagnostic TEXT NOT NULL,
    strategy TEXT,
    confidence TEXT,
    quality_score INTEGER,
    quality_issues TEXT,
    patch_ids TEXT NOT NULL DEFAULT '[]',
    fix_version TEXT,
    affected_versions TEXT,
    remediation_text TEXT,
    download_links TEXT NOT NULL DEFAULT '[]',
    synthesized_links TEXT NOT NULL DEFAULT '[]',
    attempts TEXT NOT NULL DEFAULT '[]',
    transitions TEXT NOT NULL,
    duration_ms INTEGER NOT NULL DEFAULT 0,
    UNIQUE(run_id, url)
);

CREATE INDEX IF NOT EXISTS idx_url_outcomes_run ON url_outcomes(run_id);
CREATE INDEX IF NOT EXISTS idx_url_outcomes_status ON url_outcomes(run_id, status);

-- One row per input row per run
CREATE TABLE IF NOT EXISTS row_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    row_id TEXT NOT NULL,
    status TEXT NOT NULL,
    download_links TEXT NOT NULL,
    summary TEXT NOT NULL,
    url_count INTEGER NOT NULL,
    diagnostics TEXT NOT NULL DEFAULT '[]',
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_row_results_run ON row_results(run_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
