#![warn(clippy::all)]

//! Keep the system awake for as long as a [`SleepInhibitor`] holds an [`Assertion`].
//!
//! Each supported OS gets its own [`Backend`]; [`PlatformBackend`] names the one picked for the
//! current target.

mod config;
mod inhibitor;
pub mod session;
pub mod signal;

#[cfg(test)]
mod mock;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
mod unsupported;
#[cfg(windows)]
mod windows;

#[cfg(target_os = "linux")]
pub use linux::SystemdInhibit as PlatformBackend;
#[cfg(target_os = "macos")]
pub use macos::PowerAssertions as PlatformBackend;
#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
pub use unsupported::Unsupported as PlatformBackend;
#[cfg(windows)]
pub use windows::ExecutionState as PlatformBackend;

pub use config::{parse_timeout, Config, DEFAULT_REASON, MAX_REASON_LEN};
pub use inhibitor::{Assertion, AssertionId, Backend, Request, SleepInhibitor};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The OS refused the request, or the platform has no way to make it.
  #[error("unable to inhibit sleep: {0}")]
  Platform(String),

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  /// Releasing a handle that is not (or no longer) the active assertion.
  #[error("assertion already released")]
  AlreadyReleased,

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },
}

impl Error {
  /// Process exit code for a session that ended with this error.
  pub fn exit_code(&self) -> u8 {
    match self {
      Error::Platform(_) | Error::AlreadyReleased => 1,
      Error::InvalidConfig(_) => 2,
      Error::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound => 127,
      Error::Spawn { .. } => 126,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exit_codes() {
    assert_eq!(Error::Platform("denied".into()).exit_code(), 1);
    assert_eq!(Error::InvalidConfig("bad".into()).exit_code(), 2);

    let missing = Error::Spawn {
      program: "nope".into(),
      source: std::io::Error::from(std::io::ErrorKind::NotFound),
    };
    assert_eq!(missing.exit_code(), 127);

    let denied = Error::Spawn {
      program: "nope".into(),
      source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
    };
    assert_eq!(denied.exit_code(), 126);
  }
}
