#![warn(clippy::all)]

use std::{io::IsTerminal, process::ExitCode};

use clap::Parser;
use nosleep::{session, signal::Shutdown, Result, SleepInhibitor};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod cli;

// Single threaded: Windows ties the execution state to the thread that set it.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
  let cli = cli::Cli::parse();
  init_tracing(cli.log_level());

  match run(&cli).await {
    Ok(outcome) => {
      debug!(?outcome, "session finished");
      ExitCode::from(outcome.exit_code())
    }
    Err(e) => {
      eprintln!("nosleep: {e}");
      ExitCode::from(e.exit_code())
    }
  }
}

async fn run(cli: &cli::Cli) -> Result<session::Outcome> {
  let config = cli.config()?;
  let mut shutdown = Shutdown::install()?;
  let mut inhibitor = SleepInhibitor::new();
  session::run(&mut inhibitor, &config, cli.command_line(), shutdown.recv()).await
}

fn init_tracing(level: &str) {
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(format!("nosleep={level}")));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_ansi(std::io::stderr().is_terminal())
    .with_target(false)
    .init();
}
