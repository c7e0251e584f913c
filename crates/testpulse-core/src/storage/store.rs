use super::schema::{DDL, SCHEMA_VERSION};
use super::{fmt_ts, parse_ts};
use crate::config::StoreConfig;
use crate::errors::{CoreError, Result};
use crate::model::{
    ExportRow, HistoryEntry, Outcome, Run, RunId, RunOrder, RunScope, RunTotals, TestResult,
};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Failure messages longer than this are cut at a char boundary.
pub const MAX_MESSAGE_CHARS: usize = 500;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

const RUN_COLUMNS: &str = "id, started_at, finished_at, passed, failed, skipped";

/// SQLite-backed run history.
///
/// Cloning shares the connection. Separate processes open their own `Store`
/// on the same file; every write runs in a `BEGIN IMMEDIATE` transaction so
/// they serialize on the database lock, bounded by the busy timeout.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoreStats {
    pub runs: u64,
    pub finalized_runs: u64,
    pub results: u64,
    pub last_run_id: Option<RunId>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub schema_version: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct PruneStats {
    pub runs_deleted: u64,
    pub results_deleted: u64,
}

/// Per-test outcome counts over a trailing window of finalized runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcomeCounts {
    pub test_id: String,
    pub passes: u32,
    pub fails: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeWindow {
    /// Number of finalized runs actually inside the window.
    pub runs: usize,
    /// Sorted by test_id.
    pub tests: Vec<TestOutcomeCounts>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn from_config(cfg: &StoreConfig) -> Result<Self> {
        Self::open_with_timeout(&cfg.path, Duration::from_millis(cfg.busy_timeout_ms))
    }

    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CoreError::storage(format!(
                    "failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let conn = Connection::open(path).map_err(|e| {
            CoreError::storage(format!("failed to open store {}: {}", path.display(), e))
        })?;
        conn.busy_timeout(busy_timeout)?;
        // WAL lets readers run next to a writer; returns the resulting mode.
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
        tracing::debug!(event = "store_open", path = %path.display(), journal_mode = %mode);
        Self::from_connection(conn)
    }

    /// In-memory store, mostly for tests.
    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        init_schema(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::storage("store connection lock poisoned"))
    }

    // --- writes ---

    /// `started_at` is kept at microsecond precision; sub-microsecond digits
    /// are dropped.
    pub fn begin_run(&self, started_at: DateTime<Utc>) -> Result<RunId> {
        let started_at = started_at.trunc_subsecs(6);
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO runs(started_at) VALUES (?1)",
            params![fmt_ts(&started_at)],
        )?;
        let run_id = tx.last_insert_rowid();
        tx.commit()?;
        tracing::info!(event = "run_started", run_id, started_at = %fmt_ts(&started_at));
        Ok(run_id)
    }

    pub fn record_result(
        &self,
        run_id: RunId,
        test_id: &str,
        outcome: Outcome,
        duration: f64,
        message: Option<&str>,
    ) -> Result<()> {
        if test_id.trim().is_empty() {
            return Err(CoreError::validation("test_id must not be empty"));
        }
        if !duration.is_finite() || duration < 0.0 {
            return Err(CoreError::validation(format!(
                "duration for '{}' must be a non-negative number of seconds, got {}",
                test_id, duration
            )));
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match run_finished_at(&tx, run_id)? {
            None => return Err(CoreError::run_not_found(run_id)),
            Some(Some(_)) => {
                return Err(CoreError::state(format!(
                    "run {} is finalized; result for '{}' rejected",
                    run_id, test_id
                )))
            }
            Some(None) => {}
        }

        let duplicate = tx
            .query_row(
                "SELECT 1 FROM results WHERE run_id = ?1 AND test_id = ?2",
                params![run_id, test_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if duplicate {
            return Err(duplicate_result(run_id, test_id));
        }

        let message = message.map(truncate_message);
        tx.execute(
            "INSERT INTO results(run_id, test_id, outcome, duration, message)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, test_id, outcome.as_str(), duration, message],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                duplicate_result(run_id, test_id)
            }
            other => other.into(),
        })?;
        tx.commit()?;

        tracing::debug!(event = "result_recorded", run_id, test_id, outcome = %outcome, duration);
        Ok(())
    }

    /// Compute totals from the stored results and mark the run finalized.
    /// Calling it again recomputes the same totals and keeps the first
    /// `finished_at`.
    pub fn finalize_run(&self, run_id: RunId) -> Result<Run> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if run_finished_at(&tx, run_id)?.is_none() {
            return Err(CoreError::run_not_found(run_id));
        }

        let mut totals = RunTotals::default();
        {
            let mut stmt = tx.prepare(
                "SELECT outcome, COUNT(*) FROM results WHERE run_id = ?1 GROUP BY outcome",
            )?;
            let rows = stmt.query_map(params![run_id], |row| {
                Ok((outcome_at(row, 0)?, row.get::<_, u32>(1)?))
            })?;
            for r in rows {
                let (outcome, n) = r?;
                match outcome {
                    Outcome::Passed => totals.passed = n,
                    Outcome::Failed => totals.failed = n,
                    Outcome::Skipped => totals.skipped = n,
                }
            }
        }

        tx.execute(
            "UPDATE runs
             SET passed = ?1, failed = ?2, skipped = ?3,
                 finished_at = COALESCE(finished_at, ?4)
             WHERE id = ?5",
            params![
                totals.passed,
                totals.failed,
                totals.skipped,
                fmt_ts(&Utc::now()),
                run_id
            ],
        )?;
        let run = load_run(&tx, run_id)?.ok_or_else(|| CoreError::run_not_found(run_id))?;
        tx.commit()?;

        tracing::info!(
            event = "run_finalized",
            run_id,
            passed = totals.passed,
            failed = totals.failed,
            skipped = totals.skipped
        );
        Ok(run)
    }

    /// Delete finalized runs older than the newest `keep_last` finalized
    /// runs, with their results. In-progress runs are never touched.
    pub fn prune(&self, keep_last: usize) -> Result<PruneStats> {
        if keep_last == 0 {
            return Err(CoreError::validation("prune must keep at least one run"));
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stale = "SELECT id FROM runs WHERE finished_at IS NOT NULL
                     ORDER BY started_at DESC, id DESC LIMIT -1 OFFSET ?1";
        let results_deleted = tx.execute(
            &format!("DELETE FROM results WHERE run_id IN ({})", stale),
            params![keep_last as i64],
        )?;
        let runs_deleted = tx.execute(
            &format!("DELETE FROM runs WHERE id IN ({})", stale),
            params![keep_last as i64],
        )?;
        tx.commit()?;

        tracing::info!(event = "store_pruned", keep_last, runs_deleted, results_deleted);
        Ok(PruneStats {
            runs_deleted: runs_deleted as u64,
            results_deleted: results_deleted as u64,
        })
    }

    // --- reads ---

    pub fn get_run(&self, run_id: RunId) -> Result<Run> {
        let conn = self.lock()?;
        load_run(&conn, run_id)?.ok_or_else(|| CoreError::run_not_found(run_id))
    }

    /// Results of a run in insertion order.
    pub fn get_results(&self, run_id: RunId) -> Result<Vec<TestResult>> {
        let conn = self.lock()?;
        if run_finished_at(&conn, run_id)?.is_none() {
            return Err(CoreError::run_not_found(run_id));
        }
        let mut stmt = conn.prepare(
            "SELECT run_id, test_id, outcome, duration, message
             FROM results WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok(TestResult {
                    run_id: row.get(0)?,
                    test_id: row.get(1)?,
                    outcome: outcome_at(row, 2)?,
                    duration: row.get(3)?,
                    message: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// The `limit` most recent runs (by `started_at`, then id), returned in
    /// `order`. Only finalized runs unless `scope` opts into in-progress ones.
    pub fn list_runs(&self, limit: usize, order: RunOrder, scope: RunScope) -> Result<Vec<Run>> {
        if limit == 0 {
            return Err(CoreError::validation("limit must be positive"));
        }
        let include_in_progress = scope == RunScope::IncludeInProgress;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM runs
             WHERE ?2 OR finished_at IS NOT NULL
             ORDER BY started_at DESC, id DESC
             LIMIT ?1",
            RUN_COLUMNS
        ))?;
        let mut runs = stmt
            .query_map(params![limit as i64, include_in_progress], run_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if order == RunOrder::OldestFirst {
            runs.reverse();
        }
        tracing::debug!(event = "runs_listed", limit, count = runs.len());
        Ok(runs)
    }

    /// The test's `limit` most recent appearances in finalized runs, in
    /// ascending run id order.
    pub fn get_history(&self, test_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        if limit == 0 {
            return Err(CoreError::validation("limit must be positive"));
        }
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, outcome, duration FROM (
                 SELECT r.run_id, r.outcome, r.duration
                 FROM results r
                 JOIN runs ON runs.id = r.run_id
                 WHERE r.test_id = ?1 AND runs.finished_at IS NOT NULL
                 ORDER BY runs.started_at DESC, runs.id DESC
                 LIMIT ?2
             )
             ORDER BY run_id ASC",
        )?;
        let entries = stmt
            .query_map(params![test_id, limit as i64], |row| {
                Ok(HistoryEntry {
                    run_id: row.get(0)?,
                    outcome: outcome_at(row, 1)?,
                    duration: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if entries.is_empty() {
            return Err(CoreError::not_found(format!(
                "no history for test '{}'",
                test_id
            )));
        }
        Ok(entries)
    }

    /// Outcome counts per test over the `window` most recent finalized runs.
    /// Both queries share one read transaction so a concurrent finalize
    /// cannot land between them.
    pub fn outcome_window(&self, window: usize) -> Result<OutcomeWindow> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let recent = "SELECT id FROM runs WHERE finished_at IS NOT NULL
                      ORDER BY started_at DESC, id DESC LIMIT ?1";

        let runs: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM ({})", recent),
            params![window as i64],
            |r| r.get(0),
        )?;

        let tests = {
            let mut stmt = tx.prepare(&format!(
                "SELECT test_id,
                        SUM(CASE WHEN outcome = 'passed' THEN 1 ELSE 0 END),
                        SUM(CASE WHEN outcome = 'failed' THEN 1 ELSE 0 END),
                        COUNT(*)
                 FROM results
                 WHERE run_id IN ({})
                 GROUP BY test_id
                 ORDER BY test_id ASC",
                recent
            ))?;
            let rows = stmt.query_map(params![window as i64], |row| {
                Ok(TestOutcomeCounts {
                    test_id: row.get(0)?,
                    passes: row.get(1)?,
                    fails: row.get(2)?,
                    total: row.get(3)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;

        Ok(OutcomeWindow {
            runs: runs as usize,
            tests,
        })
    }

    /// `(test_id, duration)` of the `top_n` longest results of a run,
    /// duration descending then test_id ascending.
    pub fn top_durations(&self, run_id: RunId, top_n: usize) -> Result<Vec<(String, f64)>> {
        let conn = self.lock()?;
        if run_finished_at(&conn, run_id)?.is_none() {
            return Err(CoreError::run_not_found(run_id));
        }
        let mut stmt = conn.prepare(
            "SELECT test_id, duration FROM results
             WHERE run_id = ?1
             ORDER BY duration DESC, test_id ASC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![run_id, top_n as i64], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Flattened rows of the `limit` most recent finalized runs, newest run
    /// first and results in insertion order.
    pub fn export_rows(&self, limit: usize) -> Result<Vec<ExportRow>> {
        if limit == 0 {
            return Err(CoreError::validation("limit must be positive"));
        }
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT w.id, w.started_at, w.finished_at, r.test_id, r.outcome, r.duration, r.message
             FROM (
                 SELECT id, started_at, finished_at FROM runs
                 WHERE finished_at IS NOT NULL
                 ORDER BY started_at DESC, id DESC
                 LIMIT ?1
             ) w
             JOIN results r ON r.run_id = w.id
             ORDER BY w.started_at DESC, w.id DESC, r.id ASC",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(ExportRow {
                    run_id: row.get(0)?,
                    started_at: ts_at(row, 1)?,
                    finished_at: opt_ts_at(row, 2)?,
                    test_id: row.get(3)?,
                    outcome: outcome_at(row, 4)?,
                    duration: row.get(5)?,
                    message: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<u64> {
            let n: i64 = conn.query_row(sql, [], |r| r.get(0))?;
            Ok(n as u64)
        };
        let runs = count("SELECT COUNT(*) FROM runs")?;
        let finalized_runs = count("SELECT COUNT(*) FROM runs WHERE finished_at IS NOT NULL")?;
        let results = count("SELECT COUNT(*) FROM results")?;

        let last: Option<(RunId, DateTime<Utc>)> = conn
            .query_row(
                "SELECT id, started_at FROM runs ORDER BY started_at DESC, id DESC LIMIT 1",
                [],
                |r| Ok((r.get(0)?, ts_at(r, 1)?)),
            )
            .optional()?;
        let schema_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

        Ok(StoreStats {
            runs,
            finalized_runs,
            results,
            last_run_id: last.as_ref().map(|(id, _)| *id),
            last_run_at: last.map(|(_, at)| at),
            schema_version,
        })
    }
}

/// `user_version` 0 is an empty database and gets the current layout.
fn init_schema(conn: &mut Connection) -> Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(CoreError::storage(format!(
            "store schema version {} is newer than supported version {}",
            version, SCHEMA_VERSION
        )));
    }
    if version == SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute_batch(DDL)?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;
    tracing::info!(event = "store_initialized", schema_version = SCHEMA_VERSION);
    Ok(())
}

/// `None` if the run does not exist, `Some(finished_at)` otherwise.
fn run_finished_at(conn: &Connection, run_id: RunId) -> Result<Option<Option<String>>> {
    let row = conn
        .query_row(
            "SELECT finished_at FROM runs WHERE id = ?1",
            params![run_id],
            |r| r.get::<_, Option<String>>(0),
        )
        .optional()?;
    Ok(row)
}

fn load_run(conn: &Connection, run_id: RunId) -> Result<Option<Run>> {
    let run = conn
        .query_row(
            &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
            params![run_id],
            run_from_row,
        )
        .optional()?;
    Ok(run)
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<Run> {
    Ok(Run {
        id: row.get(0)?,
        started_at: ts_at(row, 1)?,
        finished_at: opt_ts_at(row, 2)?,
        totals: RunTotals {
            passed: row.get(3)?,
            failed: row.get(4)?,
            skipped: row.get(5)?,
        },
    })
}

fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    parse_ts(&s).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        parse_ts(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn outcome_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Outcome> {
    let s: String = row.get(idx)?;
    Outcome::parse(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn duplicate_result(run_id: RunId, test_id: &str) -> CoreError {
    CoreError::validation(format!(
        "duplicate result for test '{}' in run {}",
        test_id, run_id
    ))
}

fn truncate_message(msg: &str) -> String {
    match msg.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((idx, _)) => msg[..idx].to_string(),
        None => msg.to_string(),
    }
}
