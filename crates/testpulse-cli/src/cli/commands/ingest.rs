use super::{exit_codes, Ctx};
use crate::cli::args::IngestArgs;
use testpulse_core::ingest::{ingest_path, ingest_reader, IngestSummary};
use testpulse_core::report::{build_report, console};

pub fn cmd_ingest(ctx: &Ctx, args: IngestArgs) -> anyhow::Result<i32> {
    let summary = if args.input.as_os_str() == "-" {
        let stdin = std::io::stdin();
        ingest_reader(&ctx.store, stdin.lock())?
    } else {
        ingest_path(&ctx.store, &args.input)?
    };

    if let Some(run_id) = summary.unfinalized {
        eprintln!(
            "⚠️  run #{} left open: stream ended before session_end",
            run_id
        );
    }

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(exit_codes::OK);
    }

    print!("{}", render_ingest(&summary));
    if !summary.runs.is_empty() {
        if let Some(report) = build_report(&ctx.store, &ctx.cfg.analytics)? {
            print!("{}", console::render_report(&report));
        }
    }
    Ok(exit_codes::OK)
}

fn render_ingest(summary: &IngestSummary) -> String {
    let mut out = String::new();
    for run in &summary.runs {
        out.push_str(&format!(
            "Recorded run #{}: {} passed, {} failed, {} skipped\n",
            run.id, run.totals.passed, run.totals.failed, run.totals.skipped
        ));
    }
    if summary.runs.is_empty() && summary.unfinalized.is_none() {
        out.push_str("No sessions in input.\n");
    }
    out
}
