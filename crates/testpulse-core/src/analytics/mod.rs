//! Derived metrics over stored run history.
//!
//! Everything here is read-only with respect to the [`Store`] and holds no
//! state between calls: each query reads the store again, so a newly
//! finalized run is visible to the very next call. Output is deterministic
//! for a given stored state; every ranking has a total order.

pub mod flaky;
pub mod trend;

pub use flaky::{FlakyReport, FlakySummary};
pub use trend::{PassRateTrend, TrendPoint};

use crate::errors::{CoreError, Result};
use crate::model::RunId;
use crate::storage::Store;
use serde::Serialize;

/// Why a query over history came back empty.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    NoFinalizedRuns,
}

impl EmptyReason {
    pub fn describe(&self) -> &'static str {
        match self {
            EmptyReason::NoFinalizedRuns => "no finalized runs in the store",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlowTest {
    pub test_id: String,
    pub duration: f64,
}

pub struct Analytics<'a> {
    store: &'a Store,
}

impl<'a> Analytics<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Tests that both passed and failed within the `window` most recent
    /// finalized runs and failed at least `min_fails` times.
    pub fn detect_flaky(&self, min_fails: u32, window: usize) -> Result<FlakyReport> {
        if window == 0 {
            return Err(CoreError::validation("window must be positive"));
        }
        let counts = self.store.outcome_window(window)?;
        let tests = flaky::classify(&counts.tests, min_fails);
        tracing::debug!(
            event = "flaky_detected",
            window,
            min_fails,
            runs = counts.runs,
            flaky = tests.len()
        );
        Ok(FlakyReport {
            window,
            min_fails,
            runs_considered: counts.runs,
            empty_reason: (counts.runs == 0).then_some(EmptyReason::NoFinalizedRuns),
            tests,
        })
    }

    /// The `top_n` longest results of a run, duration descending with ties
    /// broken by test_id ascending.
    pub fn slowest(&self, run_id: RunId, top_n: usize) -> Result<Vec<SlowTest>> {
        if top_n == 0 {
            return Err(CoreError::validation("top_n must be positive"));
        }
        let rows = self.store.top_durations(run_id, top_n)?;
        if rows.is_empty() {
            return Err(CoreError::not_found(format!(
                "run {} has no results",
                run_id
            )));
        }
        Ok(rows
            .into_iter()
            .map(|(test_id, duration)| SlowTest { test_id, duration })
            .collect())
    }

    pub fn pass_rate_trend(&self, limit: usize) -> Result<PassRateTrend> {
        trend::pass_rate_trend(self.store, limit)
    }
}
