//! SQLite layout for run history.
//!
//! Tables:
//! - `runs`: one row per test-suite invocation; `finished_at IS NULL` while in progress
//! - `results`: one row per test per run, unique on `(run_id, test_id)`
//!
//! Other tools read these tables directly, so column changes need a
//! migration and a bump of [`SCHEMA_VERSION`].

pub const SCHEMA_VERSION: i64 = 1;

pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  started_at TEXT NOT NULL,
  finished_at TEXT,
  passed INTEGER NOT NULL DEFAULT 0,
  failed INTEGER NOT NULL DEFAULT 0,
  skipped INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS results (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id INTEGER NOT NULL REFERENCES runs(id),
  test_id TEXT NOT NULL,
  outcome TEXT NOT NULL CHECK (outcome IN ('passed', 'failed', 'skipped')),
  duration REAL NOT NULL CHECK (duration >= 0),
  message TEXT,
  UNIQUE (run_id, test_id)
);

CREATE INDEX IF NOT EXISTS idx_runs_recent ON runs(started_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_results_test ON results(test_id, run_id);
"#;
