use chrono::{Duration, TimeZone, Utc};
use testpulse_core::errors::ErrorKind;
use testpulse_core::model::{Outcome, RunOrder, RunScope};
use testpulse_core::storage::Store;
use tempfile::tempdir;

#[test]
fn test_storage_smoke_lifecycle() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("nested").join("results.db");

    let store = Store::open(&db_path)?;
    let started = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let run_id = store.begin_run(started)?;

    store.record_result(run_id, "tests/test_a.py::test_ok", Outcome::Passed, 0.2, None)?;
    store.record_result(
        run_id,
        "tests/test_a.py::test_bad",
        Outcome::Failed,
        1.5,
        Some("AssertionError: 1 != 2"),
    )?;
    store.record_result(
        run_id,
        "tests/test_a.py::test_skip",
        Outcome::Skipped,
        0.0,
        Some("needs network"),
    )?;

    // Open runs stay out of default listings.
    assert!(store
        .list_runs(10, RunOrder::NewestFirst, RunScope::Finalized)?
        .is_empty());

    let run = store.finalize_run(run_id)?;
    assert_eq!(run.started_at, started);
    assert!(run.finished_at.is_some());
    assert_eq!((run.totals.passed, run.totals.failed, run.totals.skipped), (1, 1, 1));

    // Reopen from disk and check everything survived.
    drop(store);
    let store = Store::open(&db_path)?;
    let results = store.get_results(run_id)?;
    assert_eq!(results.len(), 3);
    assert_eq!(results[1].test_id, "tests/test_a.py::test_bad");
    assert_eq!(results[1].message.as_deref(), Some("AssertionError: 1 != 2"));
    assert_eq!(store.get_run(run_id)?, run);

    let stats = store.stats()?;
    assert_eq!(stats.runs, 1);
    assert_eq!(stats.finalized_runs, 1);
    assert_eq!(stats.results, 3);
    assert_eq!(stats.last_run_id, Some(run_id));
    Ok(())
}

#[test]
fn finalize_is_idempotent() -> anyhow::Result<()> {
    let store = Store::memory()?;
    let run_id = store.begin_run(Utc::now())?;
    store.record_result(run_id, "a", Outcome::Passed, 0.1, None)?;
    let first = store.finalize_run(run_id)?;
    let second = store.finalize_run(run_id)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn writes_after_finalize_are_rejected() -> anyhow::Result<()> {
    let store = Store::memory()?;
    let run_id = store.begin_run(Utc::now())?;
    store.finalize_run(run_id)?;
    let err = store
        .record_result(run_id, "late", Outcome::Passed, 0.1, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert!(store.get_results(run_id)?.is_empty());
    Ok(())
}

#[test]
fn unknown_run_is_not_found() -> anyhow::Result<()> {
    let store = Store::memory()?;
    assert_eq!(store.get_run(42).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.finalize_run(42).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        store
            .record_result(42, "a", Outcome::Passed, 0.1, None)
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
    Ok(())
}

#[test]
fn duplicate_result_leaves_store_unchanged() -> anyhow::Result<()> {
    let store = Store::memory()?;
    let run_id = store.begin_run(Utc::now())?;
    store.record_result(run_id, "a", Outcome::Passed, 0.1, None)?;
    let err = store
        .record_result(run_id, "a", Outcome::Failed, 9.0, Some("boom"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let results = store.get_results(run_id)?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcome, Outcome::Passed);
    assert_eq!(results[0].duration, 0.1);
    Ok(())
}

#[test]
fn history_returns_latest_appearances_oldest_first() -> anyhow::Result<()> {
    let store = Store::memory()?;
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let outcomes = [Outcome::Passed, Outcome::Failed, Outcome::Skipped, Outcome::Passed];
    let mut ids = Vec::new();
    for (i, o) in outcomes.iter().enumerate() {
        let id = store.begin_run(base + Duration::hours(i as i64))?;
        store.record_result(id, "t", *o, i as f64, None)?;
        store.finalize_run(id)?;
        ids.push(id);
    }
    // An open run is not history yet.
    let open = store.begin_run(base + Duration::hours(10))?;
    store.record_result(open, "t", Outcome::Failed, 1.0, None)?;

    let h = store.get_history("t", 2)?;
    assert_eq!(h.len(), 2);
    assert_eq!(h[0].run_id, ids[2]);
    assert_eq!(h[0].outcome, Outcome::Skipped);
    assert_eq!(h[1].run_id, ids[3]);

    assert_eq!(
        store.get_history("missing", 5).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    Ok(())
}

#[test]
fn prune_keeps_most_recent_runs() -> anyhow::Result<()> {
    let store = Store::memory()?;
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut ids = Vec::new();
    for i in 0..5 {
        let id = store.begin_run(base + Duration::minutes(i))?;
        store.record_result(id, "a", Outcome::Passed, 0.1, None)?;
        store.record_result(id, "b", Outcome::Failed, 0.1, None)?;
        store.finalize_run(id)?;
        ids.push(id);
    }

    let pruned = store.prune(2)?;
    assert_eq!(pruned.runs_deleted, 3);
    assert_eq!(pruned.results_deleted, 6);

    let left: Vec<_> = store
        .list_runs(10, RunOrder::OldestFirst, RunScope::Finalized)?
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(left, vec![ids[3], ids[4]]);
    assert_eq!(store.prune(0).unwrap_err().kind(), ErrorKind::Validation);
    Ok(())
}

#[test]
fn export_rows_cover_recent_runs() -> anyhow::Result<()> {
    let store = Store::memory()?;
    let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    for i in 0..3 {
        let id = store.begin_run(base + Duration::minutes(i))?;
        store.record_result(id, "a", Outcome::Passed, 0.1, None)?;
        store.finalize_run(id)?;
    }
    let rows = store.export_rows(2)?;
    assert_eq!(rows.len(), 2);
    assert!(rows[0].run_id > rows[1].run_id);
    Ok(())
}
