use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "testpulse",
    version,
    about = "Test-run history with flaky, slowest and pass-rate analytics"
)]
pub struct Cli {
    /// Config file (defaults to ./testpulse.yaml when present)
    #[arg(long, global = true, env = "TESTPULSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Reject unknown keys in the config file
    #[arg(long, global = true)]
    pub strict_config: bool,

    /// Results database; overrides config and TESTPULSE_DB
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Record a JSONL session event stream
    Ingest(IngestArgs),
    /// Summary of the latest finalized run
    Report,
    Flaky(FlakyArgs),
    Slow(SlowArgs),
    Trend(TrendArgs),
    Runs(RunsArgs),
    History(HistoryArgs),
    Export(ExportArgs),
    /// Delete old finalized runs
    Prune(PruneArgs),
    Stats,
    /// Serve the read-only JSON API
    Serve(ServeArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct IngestArgs {
    /// Event stream file, `-` for stdin
    #[arg(long, default_value = "-")]
    pub input: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct FlakyArgs {
    /// Number of most recent finalized runs to inspect
    #[arg(long)]
    pub window: Option<u32>,

    #[arg(long)]
    pub min_fails: Option<u32>,

    /// Exit with 1 when any flaky test is found
    #[arg(long)]
    pub fail_on_flaky: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SlowArgs {
    /// Run id (defaults to the latest finalized run)
    #[arg(long)]
    pub run: Option<i64>,

    #[arg(long)]
    pub top: Option<u32>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct TrendArgs {
    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunsArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Include runs that were never finalized
    #[arg(long)]
    pub all: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct HistoryArgs {
    pub test_id: String,

    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ExportArgs {
    /// csv | json
    #[arg(long, default_value = "csv")]
    pub format: String,

    /// Output file (stdout when omitted)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Number of most recent runs to export
    #[arg(long, default_value_t = 50)]
    pub limit: u32,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PruneArgs {
    /// Finalized runs to keep
    #[arg(long)]
    pub keep: u32,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8000)]
    pub port: u16,
}
