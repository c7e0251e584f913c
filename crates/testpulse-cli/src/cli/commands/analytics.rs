use super::{exit_codes, Ctx};
use crate::cli::args::{FlakyArgs, SlowArgs, TrendArgs};
use testpulse_core::analytics::Analytics;
use testpulse_core::errors::CoreError;
use testpulse_core::model::{RunOrder, RunScope};
use testpulse_core::report::{build_report, console};

pub fn cmd_report(ctx: &Ctx) -> anyhow::Result<i32> {
    let Some(report) = build_report(&ctx.store, &ctx.cfg.analytics)? else {
        eprintln!("No finalized runs in {}.", ctx.cfg.store.path.display());
        return Ok(exit_codes::NO_DATA);
    };
    ctx.emit(&report, console::render_report)?;
    Ok(exit_codes::OK)
}

pub fn cmd_flaky(ctx: &Ctx, args: FlakyArgs) -> anyhow::Result<i32> {
    let window = args.window.unwrap_or(ctx.cfg.analytics.window);
    let min_fails = args.min_fails.unwrap_or(ctx.cfg.analytics.min_fails);

    let report = Analytics::new(&ctx.store).detect_flaky(min_fails, window as usize)?;
    ctx.emit(&report, console::render_flaky)?;

    if args.fail_on_flaky && !report.tests.is_empty() {
        eprintln!("❌ {} flaky test(s) found", report.tests.len());
        return Ok(exit_codes::TEST_FAILED);
    }
    Ok(exit_codes::OK)
}

pub fn cmd_slow(ctx: &Ctx, args: SlowArgs) -> anyhow::Result<i32> {
    let run_id = match args.run {
        Some(id) => id,
        None => ctx
            .store
            .list_runs(1, RunOrder::NewestFirst, RunScope::Finalized)?
            .first()
            .map(|r| r.id)
            .ok_or_else(|| CoreError::not_found("no finalized runs in the store"))?,
    };
    let top = args.top.unwrap_or(ctx.cfg.analytics.top_n);

    let slowest = Analytics::new(&ctx.store).slowest(run_id, top as usize)?;
    ctx.emit(&slowest, |s| console::render_slowest(s))?;
    Ok(exit_codes::OK)
}

pub fn cmd_trend(ctx: &Ctx, args: TrendArgs) -> anyhow::Result<i32> {
    let limit = args.limit.unwrap_or(ctx.cfg.analytics.trend_limit);
    let trend = Analytics::new(&ctx.store).pass_rate_trend(limit as usize)?;
    ctx.emit(&trend, console::render_trend)?;
    Ok(exit_codes::OK)
}
