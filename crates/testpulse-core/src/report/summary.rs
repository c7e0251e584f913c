use crate::analytics::{Analytics, FlakyReport, PassRateTrend, SlowTest};
use crate::config::AnalyticsConfig;
use crate::errors::Result;
use crate::model::{Run, RunOrder, RunScope};
use crate::storage::Store;
use serde::Serialize;

/// Everything `testpulse report` shows about the latest finalized run.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionReport {
    pub run: Run,
    pub pass_rate: f64,
    pub slowest: Vec<SlowTest>,
    pub flaky: FlakyReport,
    pub trend: PassRateTrend,
}

/// `None` when the store holds no finalized run yet.
pub fn build_report(store: &Store, cfg: &AnalyticsConfig) -> Result<Option<SessionReport>> {
    let Some(run) = store
        .list_runs(1, RunOrder::NewestFirst, RunScope::Finalized)?
        .into_iter()
        .next()
    else {
        return Ok(None);
    };

    let analytics = Analytics::new(store);
    let slowest = if run.totals.total() == 0 {
        Vec::new()
    } else {
        analytics.slowest(run.id, cfg.top_n as usize)?
    };
    let flaky = analytics.detect_flaky(cfg.min_fails, cfg.window as usize)?;
    let trend = analytics.pass_rate_trend(cfg.trend_limit as usize)?;

    Ok(Some(SessionReport {
        pass_rate: run.totals.pass_rate(),
        run,
        slowest,
        flaky,
        trend,
    }))
}
