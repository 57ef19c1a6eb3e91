//! One keep-awake session: acquire, wait for whatever ends it, release.

use std::{ffi::OsString, future::Future, process::ExitStatus, time::Duration};

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::{Backend, Config, Error, Result, SleepInhibitor};

/// Why a session ended.
#[derive(Debug)]
pub enum Outcome {
  /// A termination signal arrived. Carries the signal name.
  Signaled(&'static str),
  TimedOut,
  CommandExited(ExitStatus),
}

impl Outcome {
  /// Process exit code for a session that ended this way.
  pub fn exit_code(&self) -> u8 {
    match self {
      Outcome::Signaled(_) | Outcome::TimedOut => 0,
      // killed by a signal, or a code that doesn't fit (Windows codes are 32 bit), reads as failure
      Outcome::CommandExited(status) => status
        .code()
        .and_then(|code| u8::try_from(code).ok())
        .unwrap_or(1),
    }
  }
}

/// Holds an assertion until `shutdown` resolves, the configured timeout elapses, or `command`
/// (when given) exits. The assertion is released before this returns, on every path.
///
/// A command still running when the session ends early is killed.
pub async fn run<B, S>(
  inhibitor: &mut SleepInhibitor<B>,
  config: &Config,
  command: Option<&[OsString]>,
  shutdown: S,
) -> Result<Outcome>
where
  B: Backend,
  S: Future<Output = &'static str>,
{
  let assertion = inhibitor.acquire(config)?;
  let outcome = wait(config.timeout, command, shutdown).await;
  inhibitor.release(&assertion);
  outcome
}

enum Woke {
  Signal(&'static str),
  Expired,
  Exited(std::io::Result<ExitStatus>),
}

async fn wait<S>(
  timeout: Option<Duration>,
  command: Option<&[OsString]>,
  shutdown: S,
) -> Result<Outcome>
where
  S: Future<Output = &'static str>,
{
  let mut child = command.map(spawn).transpose()?;

  let woke = {
    let exited = async {
      match child.as_mut() {
        Some(child) => child.wait().await,
        None => std::future::pending().await,
      }
    };
    let expired = async {
      match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
      }
    };

    tokio::select! {
      signal = shutdown => Woke::Signal(signal),
      _ = expired => Woke::Expired,
      status = exited => Woke::Exited(status),
    }
  };

  match woke {
    Woke::Signal(signal) => {
      info!("received {signal}, shutting down");
      if let Some(child) = child.as_mut() {
        kill(child).await;
      }
      Ok(Outcome::Signaled(signal))
    }
    Woke::Expired => {
      info!("timeout elapsed");
      if let Some(child) = child.as_mut() {
        kill(child).await;
      }
      Ok(Outcome::TimedOut)
    }
    Woke::Exited(status) => {
      let status = status.map_err(|e| Error::Platform(format!("failed to wait for command: {e}")))?;
      info!(%status, "command exited");
      Ok(Outcome::CommandExited(status))
    }
  }
}

fn spawn(argv: &[OsString]) -> Result<Child> {
  let Some((program, args)) = argv.split_first() else {
    return Err(Error::InvalidConfig("command must not be empty".into()));
  };

  let child = Command::new(program)
    .args(args)
    .kill_on_drop(true)
    .spawn()
    .map_err(|source| Error::Spawn {
      program: program.to_string_lossy().into_owned(),
      source,
    })?;
  debug!(pid = child.id(), "started {}", program.to_string_lossy());
  Ok(child)
}

async fn kill(child: &mut Child) {
  if let Err(e) = child.kill().await {
    warn!("failed to stop command: {e}");
  }
}
