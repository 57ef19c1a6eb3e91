use tracing::{debug, warn};
use windows_sys::Win32::System::Power::{
  SetThreadExecutionState, ES_CONTINUOUS, ES_DISPLAY_REQUIRED, ES_SYSTEM_REQUIRED,
  EXECUTION_STATE,
};

use crate::{Backend, Error, Request, Result};

/// Thread execution state flags set through `SetThreadExecutionState`.
///
/// The state belongs to the calling thread and ends with it, so acquire and release must run on
/// the same thread. Windows has no place for the reason here; it is only logged.
#[derive(Default)]
pub struct ExecutionState {
  held: bool,
}

impl Backend for ExecutionState {
  fn name(&self) -> &'static str {
    "SetThreadExecutionState"
  }

  fn acquire(&mut self, request: &Request<'_>) -> Result<()> {
    if self.held {
      return Ok(());
    }

    let flags = execution_flags(request);
    // SAFETY: plain flag call with no pointers
    let previous = unsafe { SetThreadExecutionState(flags) };
    if previous == 0 {
      return Err(Error::Platform(format!(
        "SetThreadExecutionState({flags:#010x}) failed"
      )));
    }
    debug!(reason = request.reason, "execution state set to {flags:#010x}");
    self.held = true;
    Ok(())
  }

  fn release(&mut self) -> Result<()> {
    if !self.held {
      return Ok(());
    }
    self.held = false;

    // SAFETY: plain flag call with no pointers
    let previous = unsafe { SetThreadExecutionState(ES_CONTINUOUS) };
    if previous == 0 {
      warn!("SetThreadExecutionState reset failed");
      return Err(Error::Platform("SetThreadExecutionState reset failed".into()));
    }
    Ok(())
  }
}

fn execution_flags(request: &Request<'_>) -> EXECUTION_STATE {
  let mut flags = ES_CONTINUOUS | ES_SYSTEM_REQUIRED;
  if !request.allow_display_sleep {
    flags |= ES_DISPLAY_REQUIRED;
  }
  flags
}

impl Drop for ExecutionState {
  fn drop(&mut self) {
    let _ = self.release();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_required_unless_allowed() {
    let mut request = Request {
      reason: "nosleep test",
      allow_display_sleep: false,
    };
    assert_eq!(
      execution_flags(&request),
      ES_CONTINUOUS | ES_SYSTEM_REQUIRED | ES_DISPLAY_REQUIRED
    );

    request.allow_display_sleep = true;
    assert_eq!(execution_flags(&request), ES_CONTINUOUS | ES_SYSTEM_REQUIRED);
  }

  #[test]
  fn acquire_and_release() {
    let mut backend = ExecutionState::default();
    backend
      .acquire(&Request {
        reason: "nosleep test",
        allow_display_sleep: true,
      })
      .unwrap();
    assert!(backend.held);
    backend.release().unwrap();
    assert!(!backend.held);
    backend.release().unwrap();
  }
}
