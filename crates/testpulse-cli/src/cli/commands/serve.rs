use super::{exit_codes, Ctx};
use crate::cli::args::ServeArgs;
use crate::cli::server::{self, ApiState};

pub fn cmd_serve(ctx: &Ctx, args: ServeArgs) -> anyhow::Result<i32> {
    let state = ApiState {
        store: ctx.store.clone(),
        analytics: ctx.cfg.analytics,
    };
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(server::serve(state, &args.host, args.port))?;
    Ok(exit_codes::OK)
}
