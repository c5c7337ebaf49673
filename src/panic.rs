//! Utilities for working with panic payloads.
//!
//! Case bodies and configuration producers run under `catch_unwind`; these
//! helpers turn the captured payload into something worth reporting.

use std::{any::Any, fmt};

/// Wrapper that formats a panic payload when logged or displayed.
///
/// The payload is downcast to `String` or `&'static str` if possible and falls
/// back to `Debug` formatting otherwise.
///
/// ```
/// use testbed::panic::format_panic;
/// assert_eq!(format_panic(&(Box::new("boom") as Box<dyn std::any::Any + Send>)).to_string(), "boom");
/// ```
#[must_use]
pub struct PanicMessage<'a>(&'a (dyn Any + Send));

impl fmt::Display for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            f.write_str("Box<dyn Any>")
        }
    }
}

/// Create a [`PanicMessage`] for the given payload.
#[expect(
    clippy::borrowed_box,
    reason = "taking the box prevents unsizing the box itself into `dyn Any`"
)]
pub fn format_panic(panic: &Box<dyn Any + Send>) -> PanicMessage<'_> { PanicMessage(&**panic) }
