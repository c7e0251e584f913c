pub mod analytics;
pub mod export;
pub mod history;
pub mod ingest;
pub mod maintenance;
pub mod serve;

use crate::cli::args::{Cli, Command};
use serde::Serialize;
use testpulse_core::config::{self, Config};
use testpulse_core::storage::Store;

pub mod exit_codes {
    pub const OK: i32 = 0;
    /// A gate such as `flaky --fail-on-flaky` tripped.
    pub const TEST_FAILED: i32 = 1;
    /// Nothing to report yet.
    pub const NO_DATA: i32 = 1;
    pub const ERROR: i32 = 2;
}

/// Resolved settings and an open store shared by every command.
pub struct Ctx {
    pub cfg: Config,
    pub store: Store,
    pub json: bool,
}

impl Ctx {
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            print!("{}", text(value));
        }
        Ok(())
    }
}

/// Defaults, then the YAML file, then the environment, then CLI flags.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = config::load_or_default(cli.config.as_deref(), cli.strict_config)?;
    cfg.apply_env();
    if let Some(db) = &cli.db {
        cfg.store.path = db.clone();
    }
    cfg.validate()?;
    tracing::debug!(
        event = "config_resolved",
        db = %cfg.store.path.display(),
        busy_timeout_ms = cfg.store.busy_timeout_ms
    );
    Ok(cfg)
}

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    if let Command::Version = cli.cmd {
        println!("testpulse {}", env!("CARGO_PKG_VERSION"));
        return Ok(exit_codes::OK);
    }

    let cfg = resolve_config(&cli)?;
    let store = Store::from_config(&cfg.store)?;
    let ctx = Ctx {
        cfg,
        store,
        json: cli.json,
    };

    match cli.cmd {
        Command::Ingest(args) => ingest::cmd_ingest(&ctx, args),
        Command::Report => analytics::cmd_report(&ctx),
        Command::Flaky(args) => analytics::cmd_flaky(&ctx, args),
        Command::Slow(args) => analytics::cmd_slow(&ctx, args),
        Command::Trend(args) => analytics::cmd_trend(&ctx, args),
        Command::Runs(args) => history::cmd_runs(&ctx, args),
        Command::History(args) => history::cmd_history(&ctx, args),
        Command::Export(args) => export::cmd_export(&ctx, args),
        Command::Prune(args) => maintenance::cmd_prune(&ctx, args),
        Command::Stats => maintenance::cmd_stats(&ctx),
        Command::Serve(args) => serve::cmd_serve(&ctx, args),
        Command::Version => Ok(exit_codes::OK),
    }
}
