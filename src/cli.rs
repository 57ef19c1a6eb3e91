use std::ffi::OsString;

use clap::Parser;
use nosleep::{parse_timeout, Config, Result, DEFAULT_REASON};

#[derive(Debug, Parser)]
#[command(
  name = "nosleep",
  version,
  about = "Keep the system awake until interrupted, a timeout elapses, or a command exits.",
  after_help = "With a COMMAND, the system stays awake while it runs and nosleep exits with its code."
)]
pub struct Cli {
  /// Release after this long, e.g. `90`, `45s`, `1h 30m`.
  #[arg(short, long, value_name = "DURATION")]
  pub timeout: Option<String>,

  /// Only prevent system sleep; the display may still turn off.
  #[arg(short = 'd', long)]
  pub allow_display_sleep: bool,

  /// Reason recorded in the OS power logs.
  #[arg(short, long, value_name = "TEXT", default_value = DEFAULT_REASON)]
  pub reason: String,

  /// Log each step of acquiring and releasing.
  #[arg(short, long, conflicts_with = "quiet")]
  pub verbose: bool,

  /// Only log warnings and errors.
  #[arg(short, long)]
  pub quiet: bool,

  /// Command to run while the system is kept awake.
  #[arg(value_name = "COMMAND", trailing_var_arg = true)]
  pub command: Vec<OsString>,
}

impl Cli {
  pub fn config(&self) -> Result<Config> {
    let mut config = Config::default()
      .with_reason(self.reason.clone())
      .with_display_sleep_allowed(self.allow_display_sleep);
    if let Some(timeout) = &self.timeout {
      config = config.with_timeout(parse_timeout(timeout)?);
    }
    config.validate()?;
    Ok(config)
  }

  pub fn command_line(&self) -> Option<&[OsString]> {
    (!self.command.is_empty()).then_some(self.command.as_slice())
  }

  pub fn log_level(&self) -> &'static str {
    if self.verbose {
      "debug"
    } else if self.quiet {
      "warn"
    } else {
      "info"
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;
  use clap::CommandFactory;
  use nosleep::Error;

  fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("nosleep").chain(args.iter().copied())).unwrap()
  }

  #[test]
  fn cli_definition_is_valid() {
    Cli::command().debug_assert();
  }

  #[test]
  fn defaults() {
    let cli = parse(&[]);
    let config = cli.config().unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(cli.command_line(), None);
    assert_eq!(cli.log_level(), "info");
  }

  #[test]
  fn all_flags() {
    let cli = parse(&["--timeout", "2s", "--allow-display-sleep", "--reason", "render", "-v"]);
    let config = cli.config().unwrap();
    assert_eq!(config.timeout, Some(Duration::from_secs(2)));
    assert!(config.allow_display_sleep);
    assert_eq!(config.reason, "render");
    assert_eq!(cli.log_level(), "debug");
  }

  #[test]
  fn trailing_command_keeps_its_own_flags() {
    let cli = parse(&["-d", "make", "-j8", "--keep-going"]);
    let command: Vec<_> = cli
      .command_line()
      .unwrap()
      .iter()
      .map(|a| a.to_string_lossy().into_owned())
      .collect();
    assert_eq!(command, ["make", "-j8", "--keep-going"]);
    assert!(cli.allow_display_sleep);
  }

  #[test]
  fn bad_timeout_is_invalid_config() {
    let cli = parse(&["--timeout", "whenever"]);
    assert!(matches!(cli.config(), Err(Error::InvalidConfig(_))));
  }

  #[test]
  fn blank_reason_is_invalid_config() {
    let cli = parse(&["--reason", " "]);
    assert!(matches!(cli.config(), Err(Error::InvalidConfig(_))));
  }

  #[test]
  fn verbose_conflicts_with_quiet() {
    assert!(Cli::try_parse_from(["nosleep", "-v", "-q"]).is_err());
  }
}
