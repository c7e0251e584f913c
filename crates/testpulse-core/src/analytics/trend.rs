use super::EmptyReason;
use crate::errors::{CoreError, Result};
use crate::model::{RunId, RunOrder, RunScope, RunTotals};
use crate::storage::Store;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendPoint {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    /// `passed / total` in `[0, 1]`; `0.0` for a run without tests.
    pub pass_rate: f64,
    pub totals: RunTotals,
}

/// Pass rate per run, **oldest run first**.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PassRateTrend {
    pub points: Vec<TrendPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_reason: Option<EmptyReason>,
}

impl PassRateTrend {
    pub fn pairs(&self) -> Vec<(RunId, f64)> {
        self.points.iter().map(|p| (p.run_id, p.pass_rate)).collect()
    }
}

/// Covers the `limit` most recent finalized runs; the output length is
/// always `min(limit, finalized runs)` since empty runs are kept at 0.0.
pub fn pass_rate_trend(store: &Store, limit: usize) -> Result<PassRateTrend> {
    if limit == 0 {
        return Err(CoreError::validation("limit must be positive"));
    }
    let runs = store.list_runs(limit, RunOrder::OldestFirst, RunScope::Finalized)?;
    let points: Vec<TrendPoint> = runs
        .into_iter()
        .map(|r| TrendPoint {
            run_id: r.id,
            started_at: r.started_at,
            pass_rate: r.totals.pass_rate(),
            totals: r.totals,
        })
        .collect();
    Ok(PassRateTrend {
        empty_reason: points.is_empty().then_some(EmptyReason::NoFinalizedRuns),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Outcome;
    use chrono::TimeZone;

    #[test]
    fn zero_test_run_counts_as_zero_pass_rate() {
        let store = Store::memory().unwrap();
        let empty = store.begin_run(Utc.timestamp_opt(1, 0).unwrap()).unwrap();
        store.finalize_run(empty).unwrap();
        let full = store.begin_run(Utc.timestamp_opt(2, 0).unwrap()).unwrap();
        store
            .record_result(full, "a", Outcome::Passed, 0.1, None)
            .unwrap();
        store.finalize_run(full).unwrap();

        let trend = pass_rate_trend(&store, 10).unwrap();
        assert_eq!(trend.pairs(), vec![(empty, 0.0), (full, 1.0)]);
        assert!(trend.empty_reason.is_none());
    }

    #[test]
    fn empty_store_reports_reason() {
        let store = Store::memory().unwrap();
        let trend = pass_rate_trend(&store, 5).unwrap();
        assert!(trend.points.is_empty());
        assert_eq!(trend.empty_reason, Some(EmptyReason::NoFinalizedRuns));
    }
}
