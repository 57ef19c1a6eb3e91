use crate::{Backend, Error, Request, Result};

/// Targets without a known sleep inhibition facility. Every acquire fails.
#[derive(Default)]
pub struct Unsupported;

impl Backend for Unsupported {
  fn name(&self) -> &'static str {
    "unsupported"
  }

  fn acquire(&mut self, _request: &Request<'_>) -> Result<()> {
    Err(Error::Platform(format!(
      "sleep inhibition is not supported on {}",
      std::env::consts::OS
    )))
  }

  fn release(&mut self) -> Result<()> {
    Ok(())
  }
}
