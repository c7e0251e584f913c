use clap::Parser;
use testpulse_core::errors::{ConfigError, CoreError};
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::args::Cli;
use cli::commands::{dispatch, exit_codes};

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_env("TESTPULSE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_target(true)
            .with_current_span(false)
            .with_span_list(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// `error[<kind>]: <message>`, kind taken from the core error when there is one.
fn error_line(e: &anyhow::Error) -> String {
    let kind = if let Some(core) = e.downcast_ref::<CoreError>() {
        core.kind().as_str()
    } else if e.downcast_ref::<ConfigError>().is_some() {
        "config"
    } else {
        "internal"
    };
    format!("error[{}]: {:#}", kind, e)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let code = match dispatch(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(event = "command_failed", error = ?e);
            eprintln!("{}", error_line(&e));
            exit_codes::ERROR
        }
    };
    std::process::exit(code);
}
