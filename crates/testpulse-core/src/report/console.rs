use crate::analytics::{FlakyReport, PassRateTrend, SlowTest};
use crate::model::{HistoryEntry, Outcome, Run};
use crate::storage::{PruneStats, StoreStats};
use std::fmt::Write;

use super::SessionReport;

pub fn format_duration(seconds: f64) -> String {
    format!("{:.2}s", seconds)
}

fn pct(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

fn icon(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Passed => "✅",
        Outcome::Failed => "❌",
        Outcome::Skipped => "⏭️ ",
    }
}

/// Terminal summary of the latest session, printed after ingestion and by
/// `testpulse report`.
pub fn render_report(report: &SessionReport) -> String {
    let mut out = String::new();
    let run = &report.run;
    let _ = writeln!(
        out,
        "\nRun #{} @ {}",
        run.id,
        run.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(
        out,
        "Summary: {} passed, {} failed, {} skipped (total {}, pass rate {})",
        run.totals.passed,
        run.totals.failed,
        run.totals.skipped,
        run.totals.total(),
        pct(report.pass_rate)
    );

    if !report.slowest.is_empty() {
        out.push('\n');
        out.push_str(&render_slowest(&report.slowest));
    }
    out.push('\n');
    out.push_str(&render_flaky(&report.flaky));
    out.push('\n');
    out.push_str(&render_trend(&report.trend));
    out
}

pub fn render_slowest(tests: &[SlowTest]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Slowest tests:");
    for (i, t) in tests.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {:>2}. {:<50} {:>10}",
            i + 1,
            t.test_id,
            format_duration(t.duration)
        );
    }
    out
}

pub fn render_flaky(report: &FlakyReport) -> String {
    let mut out = String::new();
    if let Some(reason) = report.empty_reason {
        let _ = writeln!(out, "Flaky tests: none ({})", reason.describe());
        return out;
    }
    if report.tests.is_empty() {
        let _ = writeln!(
            out,
            "Flaky tests: none in the last {} runs",
            report.runs_considered
        );
        return out;
    }
    let _ = writeln!(
        out,
        "⚠️  Flaky tests (last {} runs, min fails {}):",
        report.runs_considered, report.min_fails
    );
    for t in &report.tests {
        let _ = writeln!(
            out,
            "  {:<50} {} fails / {} passes / {} runs ({})",
            t.test_id,
            t.fails,
            t.passes,
            t.total,
            pct(t.fail_rate)
        );
    }
    out
}

pub fn render_trend(trend: &PassRateTrend) -> String {
    let mut out = String::new();
    if let Some(reason) = trend.empty_reason {
        let _ = writeln!(out, "Pass rate trend: no data ({})", reason.describe());
        return out;
    }
    let _ = writeln!(out, "Pass rate trend (oldest first):");
    for p in &trend.points {
        let bar = "█".repeat((p.pass_rate * 20.0).round() as usize);
        let _ = writeln!(
            out,
            "  #{:<6} {}  {:>6}  {}",
            p.run_id,
            p.started_at.format("%Y-%m-%d %H:%M"),
            pct(p.pass_rate),
            bar
        );
    }
    out
}

pub fn render_runs(runs: &[Run]) -> String {
    let mut out = String::new();
    if runs.is_empty() {
        let _ = writeln!(out, "No runs recorded.");
        return out;
    }
    let _ = writeln!(
        out,
        "{:<8} {:<20} {:>7} {:>7} {:>7} {:>8}",
        "RUN", "STARTED", "PASSED", "FAILED", "SKIPPED", "RATE"
    );
    for r in runs {
        let rate = if r.is_finalized() {
            pct(r.totals.pass_rate())
        } else {
            "open".to_string()
        };
        let _ = writeln!(
            out,
            "{:<8} {:<20} {:>7} {:>7} {:>7} {:>8}",
            r.id,
            r.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            r.totals.passed,
            r.totals.failed,
            r.totals.skipped,
            rate
        );
    }
    out
}

pub fn render_history(test_id: &str, history: &[HistoryEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "History for {}:", test_id);
    for h in history {
        let _ = writeln!(
            out,
            "  run #{:<6} {} {:<8} {:>10}",
            h.run_id,
            icon(h.outcome),
            h.outcome,
            format_duration(h.duration)
        );
    }
    out
}

pub fn render_stats(stats: &StoreStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Schema version: {}", stats.schema_version);
    let _ = writeln!(
        out,
        "Runs:           {} ({} finalized)",
        stats.runs, stats.finalized_runs
    );
    let _ = writeln!(out, "Results:        {}", stats.results);
    match (stats.last_run_id, stats.last_run_at) {
        (Some(id), Some(at)) => {
            let _ = writeln!(
                out,
                "Last run:       #{} @ {}",
                id,
                at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        _ => {
            let _ = writeln!(out, "Last run:       (none)");
        }
    }
    out
}

pub fn render_prune(stats: &PruneStats) -> String {
    format!(
        "Pruned {} runs ({} results).\n",
        stats.runs_deleted, stats.results_deleted
    )
}
