//! Panic isolation for code entered from native callbacks.
//!
//! Unwinding out of an `extern "C"` function aborts the process, so every
//! trampoline runs its Rust body through [`isolate`]. A panic is logged and
//! the call is abandoned.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// Run `f`, returning `None` if it panicked.
pub(crate) fn isolate<R>(site: &str, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(r) => Some(r),
        Err(payload) => {
            error!(
                target: "glib_bridge::callback",
                site,
                "callback panicked: {}", panic_message(payload.as_ref())
            );
            None
        }
    }
}
