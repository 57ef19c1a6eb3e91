use std::{
  sync::atomic::{AtomicU64, Ordering},
  time::{Duration, Instant, SystemTime},
};

use tracing::{debug, info, trace, warn};

use crate::{Config, Error, PlatformBackend, Result};

/// What a backend is asked to keep awake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
  pub reason: &'a str,
  pub allow_display_sleep: bool,
}

/// An OS facility able to hold off idle sleep.
///
/// A backend holds at most one request at a time. `acquire` must either take the whole request
/// or leave nothing behind, and `release` must be harmless when nothing is held.
pub trait Backend {
  fn name(&self) -> &'static str;
  fn acquire(&mut self, request: &Request<'_>) -> Result<()>;
  fn release(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssertionId(u64);

impl std::fmt::Display for AssertionId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "#{}", self.0)
  }
}

// Shared across inhibitors so a handle from one never matches another.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to an active "prevent sleep" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
  id: AssertionId,
  created_at: SystemTime,
  started: Instant,
  reason: String,
  allow_display_sleep: bool,
  timeout: Option<Duration>,
}

impl Assertion {
  fn new(config: &Config) -> Self {
    Self {
      id: AssertionId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
      created_at: SystemTime::now(),
      started: Instant::now(),
      reason: config.reason.clone(),
      allow_display_sleep: config.allow_display_sleep,
      timeout: config.timeout,
    }
  }

  pub fn id(&self) -> AssertionId {
    self.id
  }

  pub fn created_at(&self) -> SystemTime {
    self.created_at
  }

  pub fn reason(&self) -> &str {
    &self.reason
  }

  pub fn allows_display_sleep(&self) -> bool {
    self.allow_display_sleep
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout
  }

  pub fn held_for(&self) -> Duration {
    self.started.elapsed()
  }
}

/// Owns the process' sleep assertion. Dropping the inhibitor releases whatever it still holds.
pub struct SleepInhibitor<B: Backend = PlatformBackend> {
  backend: B,
  active: Option<Assertion>,
}

impl SleepInhibitor<PlatformBackend> {
  pub fn new() -> Self {
    Self::with_backend(PlatformBackend::default())
  }
}

impl Default for SleepInhibitor<PlatformBackend> {
  fn default() -> Self {
    Self::new()
  }
}

impl<B: Backend> SleepInhibitor<B> {
  pub fn with_backend(backend: B) -> Self {
    Self {
      backend,
      active: None,
    }
  }

  /// Keeps the system awake until the returned assertion is released or the inhibitor dropped.
  ///
  /// While an assertion is active this hands back the same handle without asking the OS again,
  /// even if `config` differs from the one it was created with.
  pub fn acquire(&mut self, config: &Config) -> Result<Assertion> {
    config.validate()?;

    if let Some(active) = &self.active {
      debug!(id = %active.id, "assertion already active, reusing it");
      return Ok(active.clone());
    }

    let request = Request {
      reason: &config.reason,
      allow_display_sleep: config.allow_display_sleep,
    };
    self.backend.acquire(&request)?;

    let assertion = Assertion::new(config);
    info!(
      id = %assertion.id,
      backend = self.backend.name(),
      reason = %assertion.reason,
      allow_display_sleep = assertion.allow_display_sleep,
      timeout = ?assertion.timeout,
      created_at = %humantime::format_rfc3339_seconds(assertion.created_at),
      "preventing sleep"
    );
    self.active = Some(assertion.clone());
    Ok(assertion)
  }

  /// Releases `assertion`, reporting [`Error::AlreadyReleased`] when it is not the active one.
  ///
  /// The inhibitor is idle afterwards even if the backend fails to let go.
  pub fn try_release(&mut self, assertion: &Assertion) -> Result<()> {
    match self.active.take() {
      Some(active) if active.id == assertion.id => {
        let result = self.backend.release();
        info!(
          id = %active.id,
          held_for = %humantime::format_duration(round_to_millis(active.held_for())),
          "allowing sleep"
        );
        result
      }
      other => {
        self.active = other;
        Err(Error::AlreadyReleased)
      }
    }
  }

  /// Releases `assertion`. Safe to call any number of times; failures are only logged.
  pub fn release(&mut self, assertion: &Assertion) {
    match self.try_release(assertion) {
      Ok(()) => {}
      Err(Error::AlreadyReleased) => trace!(id = %assertion.id, "assertion already released"),
      Err(e) => warn!(id = %assertion.id, "failed to release assertion: {e}"),
    }
  }

  pub fn is_active(&self) -> bool {
    self.active.is_some()
  }

  pub fn active(&self) -> Option<&Assertion> {
    self.active.as_ref()
  }

  pub fn backend(&self) -> &B {
    &self.backend
  }
}

impl<B: Backend> Drop for SleepInhibitor<B> {
  fn drop(&mut self) {
    if let Some(assertion) = self.active.clone() {
      self.release(&assertion);
    }
  }
}

fn round_to_millis(d: Duration) -> Duration {
  Duration::from_millis(d.as_millis() as u64)
}
