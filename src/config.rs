use std::time::Duration;

use crate::{Error, Result};

pub const DEFAULT_REASON: &str = "nosleep is keeping the system awake";

/// Longest reason accepted. macOS truncates assertion names past this.
pub const MAX_REASON_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  /// Release the assertion after this long. `None` holds it until interrupted.
  pub timeout: Option<Duration>,
  /// Only keep the system awake; let the display power down.
  pub allow_display_sleep: bool,
  /// Shown in the OS power logs (`pmset -g assertions`, `systemd-inhibit --list`).
  pub reason: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      timeout: None,
      allow_display_sleep: false,
      reason: DEFAULT_REASON.to_string(),
    }
  }
}

impl Config {
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn with_display_sleep_allowed(mut self, allowed: bool) -> Self {
    self.allow_display_sleep = allowed;
    self
  }

  pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
    self.reason = reason.into();
    self
  }

  pub fn validate(&self) -> Result<()> {
    if self.timeout == Some(Duration::ZERO) {
      return Err(Error::InvalidConfig("timeout must be greater than zero".into()));
    }
    if self.reason.trim().is_empty() {
      return Err(Error::InvalidConfig("reason must not be empty".into()));
    }
    if self.reason.contains('\0') {
      return Err(Error::InvalidConfig("reason must not contain NUL characters".into()));
    }
    if self.reason.chars().count() > MAX_REASON_LEN {
      return Err(Error::InvalidConfig(format!(
        "reason is longer than {MAX_REASON_LEN} characters"
      )));
    }
    Ok(())
  }
}

/// Parses a timeout such as `2s`, `1h 30m`, or a bare number of seconds.
pub fn parse_timeout(value: &str) -> Result<Duration> {
  let value = value.trim();
  let timeout = match value.parse::<u64>() {
    Ok(secs) => Duration::from_secs(secs),
    Err(_) => humantime::parse_duration(value)
      .map_err(|e| Error::InvalidConfig(format!("invalid timeout {value:?}: {e}")))?,
  };
  if timeout.is_zero() {
    return Err(Error::InvalidConfig("timeout must be greater than zero".into()));
  }
  Ok(timeout)
}
