use super::{exit_codes, Ctx};
use crate::cli::args::{HistoryArgs, RunsArgs};
use testpulse_core::model::{RunOrder, RunScope};
use testpulse_core::report::console;

pub fn cmd_runs(ctx: &Ctx, args: RunsArgs) -> anyhow::Result<i32> {
    let scope = if args.all {
        RunScope::IncludeInProgress
    } else {
        RunScope::Finalized
    };
    let runs = ctx
        .store
        .list_runs(args.limit as usize, RunOrder::NewestFirst, scope)?;
    ctx.emit(&runs, |r| console::render_runs(r))?;
    Ok(exit_codes::OK)
}

pub fn cmd_history(ctx: &Ctx, args: HistoryArgs) -> anyhow::Result<i32> {
    let limit = args.limit.unwrap_or(ctx.cfg.analytics.window);
    let history = ctx.store.get_history(&args.test_id, limit as usize)?;
    ctx.emit(&history, |h| console::render_history(&args.test_id, h))?;
    Ok(exit_codes::OK)
}
