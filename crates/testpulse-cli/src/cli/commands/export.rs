use super::{exit_codes, Ctx};
use crate::cli::args::ExportArgs;
use std::io::Write;
use testpulse_core::report::export::{self, ExportFormat};

pub fn cmd_export(ctx: &Ctx, args: ExportArgs) -> anyhow::Result<i32> {
    let format: ExportFormat = args.format.parse()?;
    let rows = ctx.store.export_rows(args.limit as usize)?;

    match &args.output {
        Some(path) => {
            let n = export::export_to_path(path, &rows, format)?;
            eprintln!("exported {} rows to {}", n, path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            export::write_rows(&mut out, &rows, format)?;
            out.flush()?;
        }
    }
    Ok(exit_codes::OK)
}
