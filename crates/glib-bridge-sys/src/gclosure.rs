//! Reference-counted native closures.
//!
//! A closure is a marshal function plus one word of user data. Finalize
//! notifiers run once, when the last reference is dropped.

use tracing::warn;

use crate::callbacks::{GClosureMarshal, GClosureNotify, GSignalInvocationHint};
use crate::gvalue::GValue;
use crate::ptr::GClosurePtr;
use crate::state::with_state;

pub(crate) struct ClosureNode {
    pub(crate) ref_count: u32,
    pub(crate) floating: bool,
    pub(crate) marshal: GClosureMarshal,
    pub(crate) data: usize,
    pub(crate) notifiers: Vec<(usize, GClosureNotify)>,
}

/// Create a floating closure holding one reference.
pub fn g_closure_new(marshal: GClosureMarshal, data: usize) -> GClosurePtr {
    let closure = GClosurePtr::allocate();
    with_state(|s| {
        s.closures.insert(
            closure,
            ClosureNode {
                ref_count: 1,
                floating: true,
                marshal,
                data,
                notifiers: Vec::new(),
            },
        );
        s.probes.closures.entry(closure).or_default();
    });
    closure
}

/// The user data word the closure was created with.
pub fn g_closure_get_data(closure: GClosurePtr) -> Option<usize> {
    with_state(|s| s.closures.get(&closure).map(|c| c.data))
}

pub fn g_closure_add_finalize_notifier(closure: GClosurePtr, data: usize, notify: GClosureNotify) {
    with_state(|s| match s.closures.get_mut(&closure) {
        Some(node) => node.notifiers.push((data, notify)),
        None => warn!(target: "glib", "g_closure_add_finalize_notifier: invalid closure"),
    });
}

pub fn g_closure_ref(closure: GClosurePtr) -> GClosurePtr {
    let ok = with_state(|s| match s.closures.get_mut(&closure) {
        Some(node) => {
            node.ref_count += 1;
            true
        }
        None => false,
    });
    if !ok {
        warn!(target: "glib", "g_closure_ref: assertion 'closure != NULL' failed");
        return GClosurePtr::NULL;
    }
    closure
}

/// Drop one reference; the last one runs the finalize notifiers.
pub fn g_closure_unref(closure: GClosurePtr) {
    let finalized = with_state(|s| {
        let node = s.closures.get_mut(&closure)?;
        node.ref_count = node.ref_count.saturating_sub(1);
        if node.ref_count > 0 {
            return Some(Vec::new());
        }
        let node = s.closures.remove(&closure)?;
        s.probes.closures.entry(closure).or_default().finalized = true;
        Some(node.notifiers)
    });
    let Some(notifiers) = finalized else {
        warn!(target: "glib", "g_closure_unref: assertion 'closure->ref_count > 0' failed");
        return;
    };
    for (data, notify) in notifiers {
        unsafe { notify(data, closure) };
    }
}

/// Take over the floating reference. A no-op on non-floating closures.
pub fn g_closure_sink(closure: GClosurePtr) {
    let was_floating = with_state(|s| match s.closures.get_mut(&closure) {
        Some(node) if node.floating => {
            node.floating = false;
            true
        }
        _ => false,
    });
    if was_floating {
        g_closure_unref(closure);
    }
}

pub fn g_closure_is_floating(closure: GClosurePtr) -> bool {
    with_state(|s| s.closures.get(&closure).is_some_and(|c| c.floating))
}

pub fn g_closure_ref_count(closure: GClosurePtr) -> u32 {
    with_state(|s| s.closures.get(&closure).map_or(0, |c| c.ref_count))
}

/// Call the closure's marshal. The closure is kept alive for the call.
pub fn g_closure_invoke(
    closure: GClosurePtr,
    return_value: Option<&mut GValue>,
    params: &[GValue],
    hint: Option<&GSignalInvocationHint>,
) {
    let target = with_state(|s| {
        let node = s.closures.get_mut(&closure)?;
        node.ref_count += 1;
        let target = (node.marshal, node.data);
        s.probes.closures.entry(closure).or_default().invocations += 1;
        Some(target)
    });
    let Some((marshal, data)) = target else {
        warn!(target: "glib", "g_closure_invoke: invalid closure");
        return;
    };
    let ret = return_value.map_or(std::ptr::null_mut(), |v| v as *mut GValue);
    let hint = hint.map_or(std::ptr::null(), |h| h as *const GSignalInvocationHint);
    unsafe {
        marshal(
            closure,
            ret,
            params.len() as u32,
            params.as_ptr(),
            hint,
            data,
        )
    };
    g_closure_unref(closure);
}
