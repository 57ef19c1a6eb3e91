//! Termination signals, turned into an ordinary return so the assertion is released on the
//! normal exit path rather than from inside a signal handler.

use crate::{Error, Result};

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Listeners for the signals that end a session.
///
/// Install before acquiring: once installed, these signals no longer kill the process outright.
pub struct Shutdown {
  #[cfg(unix)]
  interrupt: Signal,
  #[cfg(unix)]
  terminate: Signal,
  #[cfg(unix)]
  hangup: Signal,
  #[cfg(windows)]
  ctrl_c: tokio::signal::windows::CtrlC,
  #[cfg(windows)]
  ctrl_break: tokio::signal::windows::CtrlBreak,
}

impl Shutdown {
  #[cfg(unix)]
  pub fn install() -> Result<Self> {
    let listen = |name: &str, kind: SignalKind| {
      signal(kind).map_err(|e| Error::Platform(format!("failed to listen for {name}: {e}")))
    };
    Ok(Self {
      interrupt: listen("SIGINT", SignalKind::interrupt())?,
      terminate: listen("SIGTERM", SignalKind::terminate())?,
      hangup: listen("SIGHUP", SignalKind::hangup())?,
    })
  }

  #[cfg(windows)]
  pub fn install() -> Result<Self> {
    use tokio::signal::windows;

    let ctrl_c = windows::ctrl_c()
      .map_err(|e| Error::Platform(format!("failed to listen for Ctrl-C: {e}")))?;
    let ctrl_break = windows::ctrl_break()
      .map_err(|e| Error::Platform(format!("failed to listen for Ctrl-Break: {e}")))?;
    Ok(Self { ctrl_c, ctrl_break })
  }

  /// Waits for the first termination signal and returns its name.
  #[cfg(unix)]
  pub async fn recv(&mut self) -> &'static str {
    tokio::select! {
      _ = self.interrupt.recv() => "SIGINT",
      _ = self.terminate.recv() => "SIGTERM",
      _ = self.hangup.recv() => "SIGHUP",
    }
  }

  #[cfg(windows)]
  pub async fn recv(&mut self) -> &'static str {
    tokio::select! {
      _ = self.ctrl_c.recv() => "Ctrl-C",
      _ = self.ctrl_break.recv() => "Ctrl-Break",
    }
  }

  #[cfg(not(any(unix, windows)))]
  pub fn install() -> Result<Self> {
    Ok(Self {})
  }

  #[cfg(not(any(unix, windows)))]
  pub async fn recv(&mut self) -> &'static str {
    std::future::pending().await
  }
}
