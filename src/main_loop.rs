//! Idle and timeout sources on the default main context.
//!
//! Source callbacks go through the closure bridge like signal handlers. A
//! source stays attached while its callback returns `true`; any other
//! return value, `()` included, removes it after the call.

use glib_bridge_sys as ffi;
use tracing::trace;

use crate::closure::{Closure, IntoCallable};
use crate::error::{BridgeError, BridgeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u32);

impl SourceId {
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

fn attach(source: ffi::GSourcePtr, closure: Closure) -> BridgeResult<SourceId> {
    if source.is_null() {
        return Err(BridgeError::AllocationFailed {
            what: "main loop source".to_string(),
        });
    }
    ffi::g_source_set_closure(source, closure.as_ptr());
    let id = ffi::g_source_attach(source);
    ffi::g_source_unref(source);
    if id == 0 {
        return Err(BridgeError::AllocationFailed {
            what: "main loop source id".to_string(),
        });
    }
    trace!(target: "glib_bridge::closure", id, "attached source");
    Ok(SourceId(id))
}

/// Run `f` whenever the main context is idle.
pub fn idle_add<F, Args>(f: F) -> BridgeResult<SourceId>
where
    F: IntoCallable<Args>,
{
    attach(ffi::g_idle_source_new(), Closure::new(f)?)
}

/// Like [`idle_add`], with `data` passed as the callback's argument.
pub fn idle_add_with_data<F, Args, D>(f: F, data: D) -> BridgeResult<SourceId>
where
    F: IntoCallable<Args>,
    D: Clone + Send + Sync + 'static,
{
    attach(ffi::g_idle_source_new(), Closure::with_data(f, data)?)
}

/// Run `f` every `interval_ms` milliseconds.
pub fn timeout_add<F, Args>(interval_ms: u32, f: F) -> BridgeResult<SourceId>
where
    F: IntoCallable<Args>,
{
    attach(ffi::g_timeout_source_new(interval_ms), Closure::new(f)?)
}

pub fn source_remove(id: SourceId) -> BridgeResult<()> {
    if ffi::g_source_remove(id.0) {
        Ok(())
    } else {
        Err(BridgeError::HandlerNotFound {
            id: u64::from(id.0),
        })
    }
}

/// The process-wide default context.
#[derive(Debug, Clone, Copy, Default)]
pub struct MainContext;

impl MainContext {
    pub fn pending(&self) -> bool {
        ffi::g_main_context_pending()
    }

    /// Dispatch every ready source once. Returns whether anything ran.
    pub fn iteration(&self, may_block: bool) -> bool {
        ffi::g_main_context_iteration(may_block)
    }
}
