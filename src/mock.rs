use std::{cell::RefCell, rc::Rc};

use crate::{Backend, Error, Request, Result};

#[derive(Debug, Default)]
struct State {
  held: Option<(String, bool)>,
  acquired: usize,
  released: usize,
  fail_acquire: bool,
  fail_release: bool,
}

/// Backend that records what it was asked to do. Clones share state.
#[derive(Debug, Default, Clone)]
pub(crate) struct Recording {
  state: Rc<RefCell<State>>,
}

impl Recording {
  pub fn held(&self) -> Option<(String, bool)> {
    self.state.borrow().held.clone()
  }

  pub fn acquired(&self) -> usize {
    self.state.borrow().acquired
  }

  pub fn released(&self) -> usize {
    self.state.borrow().released
  }

  pub fn fail_acquire(&self, fail: bool) {
    self.state.borrow_mut().fail_acquire = fail;
  }

  pub fn fail_release(&self, fail: bool) {
    self.state.borrow_mut().fail_release = fail;
  }
}

impl Backend for Recording {
  fn name(&self) -> &'static str {
    "recording"
  }

  fn acquire(&mut self, request: &Request<'_>) -> Result<()> {
    let mut state = self.state.borrow_mut();
    if state.fail_acquire {
      return Err(Error::Platform("acquire denied".into()));
    }
    state.acquired += 1;
    state.held = Some((request.reason.to_string(), request.allow_display_sleep));
    Ok(())
  }

  fn release(&mut self) -> Result<()> {
    let mut state = self.state.borrow_mut();
    state.released += 1;
    state.held = None;
    if state.fail_release {
      return Err(Error::Platform("release failed".into()));
    }
    Ok(())
  }
}
