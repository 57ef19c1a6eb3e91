#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(non_upper_case_globals)]

use std::{
  ffi::{c_char, c_int, c_void, CString},
  marker::{PhantomData, PhantomPinned},
  ptr::null,
};

use tracing::{trace, warn};

use crate::{Backend, Error, Request, Result};

/// IOKit power assertions, the same ones `caffeinate -i -d` takes.
///
/// `PreventUserIdleSystemSleep` is always held. `PreventUserIdleDisplaySleep` is added unless
/// display sleep is allowed. The reason becomes the assertion name listed by
/// `pmset -g assertions`. The kernel drops assertions owned by a process when it exits.
#[derive(Default)]
pub struct PowerAssertions {
  held: Vec<IOPMAssertionID>,
}

const PREVENT_IDLE_SYSTEM_SLEEP: &str = "PreventUserIdleSystemSleep";
const PREVENT_IDLE_DISPLAY_SLEEP: &str = "PreventUserIdleDisplaySleep";

impl Backend for PowerAssertions {
  fn name(&self) -> &'static str {
    "iokit"
  }

  fn acquire(&mut self, request: &Request<'_>) -> Result<()> {
    if !self.held.is_empty() {
      return Ok(());
    }

    let mut kinds = vec![PREVENT_IDLE_SYSTEM_SLEEP];
    if !request.allow_display_sleep {
      kinds.push(PREVENT_IDLE_DISPLAY_SLEEP);
    }

    let name = CfString::new(request.reason)?;
    for kind in kinds {
      match create_assertion(kind, &name) {
        Ok(id) => {
          trace!(id, kind, "created power assertion");
          self.held.push(id);
        }
        Err(e) => {
          // don't leave the first assertion behind when the second one is refused
          let _ = self.release();
          return Err(e);
        }
      }
    }
    Ok(())
  }

  fn release(&mut self) -> Result<()> {
    let mut failed = Vec::new();
    for id in self.held.drain(..) {
      // SAFETY: id came from a successful IOPMAssertionCreateWithName and is released once
      let ret = unsafe { IOPMAssertionRelease(id) };
      if ret == kIOReturnSuccess {
        trace!(id, "released power assertion");
      } else {
        warn!("IOPMAssertionRelease failed. id={id} ret={:08x}", ret);
        failed.push(id);
      }
    }

    if failed.is_empty() {
      Ok(())
    } else {
      Err(Error::Platform(format!(
        "IOPMAssertionRelease failed for assertions {failed:?}"
      )))
    }
  }
}

impl Drop for PowerAssertions {
  fn drop(&mut self) {
    let _ = self.release();
  }
}

fn create_assertion(kind: &str, name: &CfString) -> Result<IOPMAssertionID> {
  let kind_str = CfString::new(kind)?;
  let mut id: IOPMAssertionID = 0;
  // SAFETY: both strings stay alive for the duration of the call and id is a valid out pointer
  let ret = unsafe {
    IOPMAssertionCreateWithName(kind_str.0, kIOPMAssertionLevelOn, name.0, &mut id)
  };
  if ret != kIOReturnSuccess {
    return Err(Error::Platform(format!(
      "IOPMAssertionCreateWithName({kind}) failed. ret={:08x}",
      ret
    )));
  }
  Ok(id)
}

// Owned CFString, released on drop.
struct CfString(CFStringRef);

impl CfString {
  fn new(s: &str) -> Result<Self> {
    let c = CString::new(s)
      .map_err(|_| Error::InvalidConfig(format!("{s:?} contains a NUL character")))?;
    // SAFETY: c is a valid NUL terminated UTF-8 string; CoreFoundation copies it
    let cf = unsafe { CFStringCreateWithCString(null(), c.as_ptr(), kCFStringEncodingUTF8) };
    if cf.is_null() {
      return Err(Error::Platform(format!("CFStringCreateWithCString failed for {s:?}")));
    }
    Ok(Self(cf))
  }
}

impl Drop for CfString {
  fn drop(&mut self) {
    // SAFETY: we own the only reference, created above
    unsafe { CFRelease(self.0 as CFTypeRef) };
  }
}

type kern_return_t = c_int;

//
// Core Foundation
//

type CFTypeRef = *const c_void;
type CFAllocatorRef = *const c_void;
type CFStringEncoding = u32;

#[repr(C)]
struct __CFString {
  _data: [u8; 0],
  _marker: PhantomData<(*mut u8, PhantomPinned)>,
}
type CFStringRef = *const __CFString;

const kCFStringEncodingUTF8: CFStringEncoding = 0x0800_0100;

#[cfg_attr(target_os = "macos", link(name = "CoreFoundation", kind = "framework"))]
extern "C" {
  fn CFStringCreateWithCString(
    alloc: CFAllocatorRef,
    cStr: *const c_char,
    encoding: CFStringEncoding,
  ) -> CFStringRef;

  fn CFRelease(cf: CFTypeRef);
}

//
// IOKit
//

type IOReturn = kern_return_t;
type IOPMAssertionID = u32;
type IOPMAssertionLevel = u32;

const kIOReturnSuccess: IOReturn = 0;
const kIOPMAssertionLevelOn: IOPMAssertionLevel = 255;

#[cfg_attr(target_os = "macos", link(name = "IOKit", kind = "framework"))]
extern "C" {
  fn IOPMAssertionCreateWithName(
    assertionType: CFStringRef,
    assertionLevel: IOPMAssertionLevel,
    assertionName: CFStringRef,
    assertionID: *mut IOPMAssertionID,
  ) -> IOReturn;

  fn IOPMAssertionRelease(assertionID: IOPMAssertionID) -> IOReturn;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn holds_one_assertion_per_kind() {
    let mut backend = PowerAssertions::default();
    backend
      .acquire(&Request {
        reason: "nosleep test",
        allow_display_sleep: false,
      })
      .unwrap();
    assert_eq!(backend.held.len(), 2);

    // a second acquire must not stack more assertions
    backend
      .acquire(&Request {
        reason: "nosleep test",
        allow_display_sleep: false,
      })
      .unwrap();
    assert_eq!(backend.held.len(), 2);

    backend.release().unwrap();
    assert!(backend.held.is_empty());
    backend.release().unwrap();
  }

  #[test]
  fn display_sleep_allowed_holds_system_assertion_only() {
    let mut backend = PowerAssertions::default();
    backend
      .acquire(&Request {
        reason: "nosleep test",
        allow_display_sleep: true,
      })
      .unwrap();
    assert_eq!(backend.held.len(), 1);
    backend.release().unwrap();
  }
}
