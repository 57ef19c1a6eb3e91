use std::{
  ffi::OsString,
  io::{BufRead, BufReader, Read},
  process::{Child, ChildStdin, Command, Stdio},
};

use tracing::{debug, trace};

use crate::{Backend, Error, Request, Result};

const SYSTEMD_INHIBIT: &str = "systemd-inhibit";
const READY: &str = "ready";

// Runs under the inhibitor lock. It reports once the lock is held, then blocks on stdin until
// our end of the pipe closes, which happens on release or when this process dies for any reason.
const HOLDER_SCRIPT: &str = "echo ready && exec cat >/dev/null";

/// Holds a logind `block` inhibitor through `systemd-inhibit`.
///
/// `sleep` is always inhibited. `idle` is added unless display sleep is allowed, which keeps
/// desktop sessions from blanking the screen and from idle-suspending.
pub struct SystemdInhibit {
  program: OsString,
  held: Option<Held>,
}

struct Held {
  child: Child,
  stdin: Option<ChildStdin>,
}

impl Default for SystemdInhibit {
  fn default() -> Self {
    Self::with_program(SYSTEMD_INHIBIT)
  }
}

impl SystemdInhibit {
  fn with_program(program: impl Into<OsString>) -> Self {
    Self {
      program: program.into(),
      held: None,
    }
  }

  fn command(&self, request: &Request<'_>) -> Command {
    let what = if request.allow_display_sleep {
      "sleep"
    } else {
      "sleep:idle"
    };

    let mut command = Command::new(&self.program);
    command
      .arg(format!("--what={what}"))
      .arg(format!("--who={}", env!("CARGO_PKG_NAME")))
      .arg(format!("--why={}", request.reason))
      .arg("--mode=block")
      .args(["sh", "-c", HOLDER_SCRIPT])
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());
    command
  }
}

impl Backend for SystemdInhibit {
  fn name(&self) -> &'static str {
    SYSTEMD_INHIBIT
  }

  fn acquire(&mut self, request: &Request<'_>) -> Result<()> {
    if self.held.is_some() {
      return Ok(());
    }

    let program = self.program.to_string_lossy().into_owned();
    let mut child = self
      .command(request)
      .spawn()
      .map_err(|e| Error::Platform(format!("failed to start {program}: {e}")))?;
    trace!(pid = child.id(), "spawned {program}");

    let stdin = child.stdin.take();
    let mut line = String::new();
    if let Some(stdout) = child.stdout.take() {
      // EOF or a read error both mean the holder never ran, handled below
      let _ = BufReader::new(stdout).read_line(&mut line);
    }

    if line.trim_end() == READY {
      debug!(pid = child.id(), "inhibitor lock held");
      self.held = Some(Held { child, stdin });
      return Ok(());
    }

    // nothing may be left holding the lock when we report failure
    drop(stdin);
    let _ = child.kill();
    let mut stderr = String::new();
    if let Some(mut err) = child.stderr.take() {
      let _ = err.read_to_string(&mut stderr);
    }
    let status = child
      .wait()
      .map_err(|e| Error::Platform(format!("failed to wait for {program}: {e}")))?;

    let stderr = stderr.trim();
    Err(Error::Platform(if stderr.is_empty() {
      format!("{program} exited with {status}")
    } else {
      format!("{program} exited with {status}: {stderr}")
    }))
  }

  fn release(&mut self) -> Result<()> {
    let Some(mut held) = self.held.take() else {
      return Ok(());
    };

    // closing stdin ends the holder, and with it systemd-inhibit and the lock
    drop(held.stdin.take());
    let status = held
      .child
      .wait()
      .map_err(|e| Error::Platform(format!("failed to wait for {SYSTEMD_INHIBIT}: {e}")))?;
    debug!(%status, "inhibitor lock released");
    Ok(())
  }
}

impl Drop for SystemdInhibit {
  fn drop(&mut self) {
    let _ = self.release();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request() -> Request<'static> {
    Request {
      reason: "testing",
      allow_display_sleep: false,
    }
  }

  #[test]
  fn builds_block_inhibitor_command() {
    let backend = SystemdInhibit::default();
    let command = backend.command(&request());
    let args: Vec<_> = command
      .get_args()
      .map(|a| a.to_string_lossy().into_owned())
      .collect();

    assert_eq!(command.get_program(), SYSTEMD_INHIBIT);
    assert_eq!(
      args,
      [
        "--what=sleep:idle",
        "--who=nosleep",
        "--why=testing",
        "--mode=block",
        "sh",
        "-c",
        HOLDER_SCRIPT,
      ]
    );
  }

  #[test]
  fn display_sleep_only_inhibits_sleep() {
    let backend = SystemdInhibit::default();
    let request = Request {
      allow_display_sleep: true,
      ..request()
    };
    let command = backend.command(&request);
    let first = command.get_args().next().map(|a| a.to_owned());
    assert_eq!(first, Some(OsString::from("--what=sleep")));
  }

  #[test]
  fn missing_program_is_a_platform_error() {
    let mut backend = SystemdInhibit::with_program("/nonexistent/systemd-inhibit");
    let err = backend.acquire(&request()).unwrap_err();
    assert!(matches!(err, Error::Platform(_)));
    assert!(backend.held.is_none());
  }

  #[test]
  fn refused_lock_is_a_platform_error() {
    // `false` ignores its arguments and exits without reporting ready
    let mut backend = SystemdInhibit::with_program("false");
    let err = backend.acquire(&request()).unwrap_err();
    assert!(matches!(err, Error::Platform(ref msg) if msg.contains("exited with")));
    assert!(backend.held.is_none());
    assert!(backend.release().is_ok());
  }

  #[test]
  #[ignore = "needs systemd-inhibit and a logind session"]
  fn holds_and_releases_a_real_lock() {
    let mut backend = SystemdInhibit::default();
    backend.acquire(&request()).unwrap();
    assert!(backend.held.is_some());
    backend.release().unwrap();
    assert!(backend.held.is_none());
  }
}
