use chrono::{Duration, TimeZone, Utc};
use testpulse_core::analytics::{Analytics, EmptyReason};
use testpulse_core::errors::ErrorKind;
use testpulse_core::model::Outcome;
use testpulse_core::storage::Store;

fn record_run(store: &Store, minute: i64, results: &[(&str, Outcome, f64)]) -> i64 {
    let base = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
    let run_id = store.begin_run(base + Duration::minutes(minute)).unwrap();
    for (test_id, outcome, duration) in results {
        store
            .record_result(run_id, test_id, *outcome, *duration, None)
            .unwrap();
    }
    store.finalize_run(run_id).unwrap();
    run_id
}

#[test]
fn two_runs_one_flaky_test() -> anyhow::Result<()> {
    let store = Store::memory()?;
    let r1 = record_run(
        &store,
        0,
        &[("A", Outcome::Passed, 0.1), ("B", Outcome::Failed, 0.2)],
    );
    let r2 = record_run(
        &store,
        1,
        &[("A", Outcome::Passed, 0.1), ("B", Outcome::Passed, 0.1)],
    );

    let analytics = Analytics::new(&store);
    // Window and limit equal to the number of stored runs.
    let flaky = analytics.detect_flaky(1, 2)?;
    assert_eq!(flaky.runs_considered, 2);
    assert_eq!(flaky.tests.len(), 1);
    assert_eq!(flaky.tests[0].test_id, "B");
    assert_eq!(flaky.tests[0].fail_rate, 0.5);

    let trend = analytics.pass_rate_trend(2)?;
    assert_eq!(trend.pairs(), vec![(r1, 0.5), (r2, 1.0)]);
    assert_eq!((r1, r2), (1, 2));

    let slow = analytics.slowest(r1, 1)?;
    assert_eq!(slow.len(), 1);
    assert_eq!(slow[0].test_id, "B");
    Ok(())
}

#[test]
fn always_failing_test_is_not_flaky() -> anyhow::Result<()> {
    let store = Store::memory()?;
    for i in 0..3 {
        record_run(&store, i, &[("broken", Outcome::Failed, 0.1)]);
    }
    let flaky = Analytics::new(&store).detect_flaky(1, 10)?;
    assert!(flaky.tests.is_empty());
    assert!(flaky.empty_reason.is_none());
    Ok(())
}

#[test]
fn flaky_window_only_sees_recent_runs() -> anyhow::Result<()> {
    let store = Store::memory()?;
    record_run(&store, 0, &[("t", Outcome::Failed, 0.1)]);
    record_run(&store, 1, &[("t", Outcome::Passed, 0.1)]);
    record_run(&store, 2, &[("t", Outcome::Passed, 0.1)]);

    let analytics = Analytics::new(&store);
    assert!(analytics.detect_flaky(1, 2)?.tests.is_empty());
    assert_eq!(analytics.detect_flaky(1, 3)?.tests.len(), 1);
    Ok(())
}

#[test]
fn flaky_ranking_is_total() -> anyhow::Result<()> {
    let store = Store::memory()?;
    // x: 2/4 fails, y: 1/2 fails, z: 1/2 fails, w: 1/4 fails.
    record_run(
        &store,
        0,
        &[
            ("x", Outcome::Failed, 0.1),
            ("y", Outcome::Failed, 0.1),
            ("z", Outcome::Failed, 0.1),
            ("w", Outcome::Failed, 0.1),
        ],
    );
    record_run(
        &store,
        1,
        &[
            ("x", Outcome::Failed, 0.1),
            ("y", Outcome::Passed, 0.1),
            ("z", Outcome::Passed, 0.1),
            ("w", Outcome::Passed, 0.1),
        ],
    );
    record_run(&store, 2, &[("x", Outcome::Passed, 0.1), ("w", Outcome::Passed, 0.1)]);
    record_run(&store, 3, &[("x", Outcome::Passed, 0.1), ("w", Outcome::Skipped, 0.0)]);

    let flaky = Analytics::new(&store).detect_flaky(1, 10)?;
    let order: Vec<_> = flaky.tests.iter().map(|t| t.test_id.as_str()).collect();
    assert_eq!(order, vec!["x", "y", "z", "w"]);
    Ok(())
}

#[test]
fn slowest_breaks_ties_by_test_id() -> anyhow::Result<()> {
    let store = Store::memory()?;
    let run = record_run(
        &store,
        0,
        &[
            ("c", Outcome::Passed, 1.0),
            ("a", Outcome::Passed, 2.0),
            ("b", Outcome::Passed, 2.0),
            ("d", Outcome::Skipped, 0.0),
        ],
    );
    let analytics = Analytics::new(&store);
    let slow: Vec<_> = analytics
        .slowest(run, 10)?
        .into_iter()
        .map(|s| s.test_id)
        .collect();
    assert_eq!(slow, vec!["a", "b", "c", "d"]);
    assert_eq!(analytics.slowest(run, 2)?.len(), 2);
    Ok(())
}

#[test]
fn slowest_error_cases() -> anyhow::Result<()> {
    let store = Store::memory()?;
    let analytics = Analytics::new(&store);
    assert_eq!(analytics.slowest(99, 5).unwrap_err().kind(), ErrorKind::NotFound);

    let empty = record_run(&store, 0, &[]);
    assert_eq!(analytics.slowest(empty, 5).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(analytics.slowest(empty, 0).unwrap_err().kind(), ErrorKind::Validation);
    Ok(())
}

#[test]
fn empty_store_reports_reason() -> anyhow::Result<()> {
    let store = Store::memory()?;
    let analytics = Analytics::new(&store);

    let flaky = analytics.detect_flaky(2, 20)?;
    assert!(flaky.tests.is_empty());
    assert_eq!(flaky.empty_reason, Some(EmptyReason::NoFinalizedRuns));

    let trend = analytics.pass_rate_trend(10)?;
    assert!(trend.points.is_empty());
    assert_eq!(trend.empty_reason, Some(EmptyReason::NoFinalizedRuns));
    Ok(())
}

#[test]
fn open_runs_are_invisible_to_analytics() -> anyhow::Result<()> {
    let store = Store::memory()?;
    record_run(&store, 0, &[("t", Outcome::Passed, 0.1)]);
    let open = store.begin_run(Utc::now())?;
    store.record_result(open, "t", Outcome::Failed, 0.1, None)?;

    let analytics = Analytics::new(&store);
    assert!(analytics.detect_flaky(1, 10)?.tests.is_empty());
    assert_eq!(analytics.pass_rate_trend(10)?.points.len(), 1);

    // Finalizing makes it visible on the very next query.
    store.finalize_run(open)?;
    assert_eq!(analytics.detect_flaky(1, 10)?.tests.len(), 1);
    assert_eq!(analytics.pass_rate_trend(10)?.points.len(), 2);
    Ok(())
}

#[test]
fn analytics_is_repeatable() -> anyhow::Result<()> {
    let store = Store::memory()?;
    record_run(&store, 0, &[("a", Outcome::Failed, 0.1), ("b", Outcome::Passed, 0.4)]);
    record_run(&store, 1, &[("a", Outcome::Passed, 0.1), ("b", Outcome::Failed, 0.4)]);

    let analytics = Analytics::new(&store);
    assert_eq!(analytics.detect_flaky(1, 5)?, analytics.detect_flaky(1, 5)?);
    assert_eq!(analytics.pass_rate_trend(5)?, analytics.pass_rate_trend(5)?);
    Ok(())
}

#[test]
fn zero_parameters_are_rejected() -> anyhow::Result<()> {
    let store = Store::memory()?;
    let analytics = Analytics::new(&store);
    assert_eq!(
        analytics.detect_flaky(1, 0).unwrap_err().kind(),
        ErrorKind::Validation
    );
    assert_eq!(
        analytics.pass_rate_trend(0).unwrap_err().kind(),
        ErrorKind::Validation
    );
    Ok(())
}
