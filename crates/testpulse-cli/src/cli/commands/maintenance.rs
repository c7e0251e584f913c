use super::{exit_codes, Ctx};
use crate::cli::args::PruneArgs;
use testpulse_core::report::console;

pub fn cmd_prune(ctx: &Ctx, args: PruneArgs) -> anyhow::Result<i32> {
    let stats = ctx.store.prune(args.keep as usize)?;
    ctx.emit(&stats, console::render_prune)?;
    Ok(exit_codes::OK)
}

pub fn cmd_stats(ctx: &Ctx) -> anyhow::Result<i32> {
    let stats = ctx.store.stats()?;
    ctx.emit(&stats, console::render_stats)?;
    Ok(exit_codes::OK)
}
