//! BMSC command-line binary.

use std::{
    io::{self, Write},
    process::ExitCode,
};

use bmsc_cli::{Cli, EXIT_OK};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match bmsc_cli::run(&cli, &mut out) {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            let mut stderr = io::stderr().lock();
            let _ = writeln!(stderr, "error: {err}");
            if let Some(hint) = err.hint() {
                let _ = writeln!(stderr, "hint: {hint}");
            }
            ExitCode::from(err.exit_code())
        },
    }
}
