//! The default main context: idle and timeout sources.
//!
//! A source's closure returns a boolean. `true` keeps the source attached,
//! `false` removes it.

use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::gclosure::{g_closure_invoke, g_closure_ref, g_closure_sink, g_closure_unref};
use crate::gtype::G_TYPE_BOOLEAN;
use crate::gvalue::{GValue, g_value_init, g_value_unset};
use crate::ptr::{GClosurePtr, GSourcePtr};
use crate::state::with_state;

#[derive(Clone, Copy, Debug)]
pub(crate) enum SourceKind {
    Idle,
    Timeout { interval: Duration, due: Instant },
}

pub(crate) struct SourceNode {
    pub(crate) kind: SourceKind,
    pub(crate) closure: GClosurePtr,
    pub(crate) id: u32,
    pub(crate) destroyed: bool,
    /// Set while the callback runs; a source is never dispatched recursively.
    pub(crate) blocked: bool,
    pub(crate) ref_count: u32,
}

fn new_source(kind: SourceKind) -> GSourcePtr {
    let source = GSourcePtr::allocate();
    with_state(|s| {
        s.sources.insert(
            source,
            SourceNode {
                kind,
                closure: GClosurePtr::NULL,
                id: 0,
                destroyed: false,
                blocked: false,
                ref_count: 1,
            },
        )
    });
    source
}

pub fn g_idle_source_new() -> GSourcePtr {
    new_source(SourceKind::Idle)
}

pub fn g_timeout_source_new(interval_ms: u32) -> GSourcePtr {
    let interval = Duration::from_millis(u64::from(interval_ms));
    new_source(SourceKind::Timeout {
        interval,
        due: Instant::now() + interval,
    })
}

/// Set the callback closure, taking ownership of a floating one.
pub fn g_source_set_closure(source: GSourcePtr, closure: GClosurePtr) {
    g_closure_ref(closure);
    g_closure_sink(closure);
    let old = with_state(|s| {
        s.sources
            .get_mut(&source)
            .map(|n| std::mem::replace(&mut n.closure, closure))
    });
    match old {
        Some(old) if !old.is_null() => g_closure_unref(old),
        Some(_) => {}
        None => {
            warn!(target: "glib", "g_source_set_closure: invalid source");
            g_closure_unref(closure);
        }
    }
}

/// Attach `source` to the default context. Returns its id, or 0.
pub fn g_source_attach(source: GSourcePtr) -> u32 {
    let id = with_state(|s| {
        let next = s.next_source_id;
        let Some(node) = s.sources.get_mut(&source) else {
            return 0;
        };
        if node.destroyed || node.id != 0 {
            return 0;
        }
        node.id = next;
        node.ref_count += 1;
        s.next_source_id += 1;
        s.source_ids.insert(next, source);
        next
    });
    if id == 0 {
        warn!(target: "glib", "g_source_attach: source is destroyed or already attached");
    }
    id
}

pub fn g_source_get_id(source: GSourcePtr) -> u32 {
    with_state(|s| s.sources.get(&source).map_or(0, |n| n.id))
}

pub fn g_source_is_destroyed(source: GSourcePtr) -> bool {
    with_state(|s| s.sources.get(&source).is_none_or(|n| n.destroyed))
}

pub fn g_source_ref(source: GSourcePtr) -> GSourcePtr {
    with_state(|s| match s.sources.get_mut(&source) {
        Some(node) => {
            node.ref_count += 1;
            source
        }
        None => GSourcePtr::NULL,
    })
}

pub fn g_source_unref(source: GSourcePtr) {
    let closure = with_state(|s| {
        let node = s.sources.get_mut(&source)?;
        node.ref_count = node.ref_count.saturating_sub(1);
        if node.ref_count > 0 {
            return None;
        }
        s.sources.remove(&source).map(|n| n.closure)
    });
    if let Some(closure) = closure
        && !closure.is_null()
    {
        g_closure_unref(closure);
    }
}

/// Detach `source` from the context and drop its closure.
pub fn g_source_destroy(source: GSourcePtr) {
    let detached = with_state(|s| {
        let node = s.sources.get_mut(&source)?;
        if node.destroyed {
            return None;
        }
        node.destroyed = true;
        let closure = std::mem::replace(&mut node.closure, GClosurePtr::NULL);
        let attached = node.id != 0;
        if attached {
            let id = node.id;
            s.source_ids.remove(&id);
        }
        Some((closure, attached))
    });
    let Some((closure, attached)) = detached else {
        return;
    };
    if !closure.is_null() {
        g_closure_unref(closure);
    }
    if attached {
        g_source_unref(source);
    }
}

/// Remove the attached source with `id`. Returns `false` if none exists.
pub fn g_source_remove(id: u32) -> bool {
    let source = with_state(|s| s.source_ids.get(&id).copied());
    match source {
        Some(source) => {
            g_source_destroy(source);
            true
        }
        None => {
            warn!(target: "glib", "Source ID {} was not found when attempting to remove it", id);
            false
        }
    }
}

fn ready_sources(now: Instant) -> (Vec<GSourcePtr>, Option<Instant>) {
    with_state(|s| {
        let mut ready = Vec::new();
        let mut next_due: Option<Instant> = None;
        let mut ids: Vec<_> = s.source_ids.iter().map(|(id, src)| (*id, *src)).collect();
        ids.sort_unstable_by_key(|(id, _)| *id);
        for (_, source) in ids {
            let Some(node) = s.sources.get(&source) else {
                continue;
            };
            if node.blocked {
                continue;
            }
            match node.kind {
                SourceKind::Idle => ready.push(source),
                SourceKind::Timeout { due, .. } if due <= now => ready.push(source),
                SourceKind::Timeout { due, .. } => {
                    next_due = Some(next_due.map_or(due, |d| d.min(due)));
                }
            }
        }
        (ready, next_due)
    })
}

/// Whether any attached source is ready to dispatch.
pub fn g_main_context_pending() -> bool {
    !ready_sources(Instant::now()).0.is_empty()
}

fn dispatch(source: GSourcePtr) -> bool {
    let closure = with_state(|s| {
        let node = s.sources.get_mut(&source)?;
        if node.destroyed || node.blocked || node.closure.is_null() {
            return None;
        }
        node.blocked = true;
        Some(node.closure)
    });
    let Some(closure) = closure else {
        return false;
    };

    g_source_ref(source);
    let mut ret = GValue::new();
    g_value_init(&mut ret, G_TYPE_BOOLEAN);
    g_closure_invoke(closure, Some(&mut ret), &[], None);
    let keep = ret.get_boolean() == Some(true);
    g_value_unset(&mut ret);

    with_state(|s| {
        if let Some(node) = s.sources.get_mut(&source) {
            node.blocked = false;
            if keep && let SourceKind::Timeout { interval, .. } = node.kind {
                node.kind = SourceKind::Timeout {
                    interval,
                    due: Instant::now() + interval,
                };
            }
        }
    });
    if !keep {
        g_source_destroy(source);
    }
    g_source_unref(source);
    true
}

/// Run one iteration of the default context.
///
/// Dispatches every ready source. With `may_block`, waits for the nearest
/// timeout when nothing is ready. Returns whether anything was dispatched.
pub fn g_main_context_iteration(may_block: bool) -> bool {
    let (mut ready, next_due) = ready_sources(Instant::now());
    if ready.is_empty() && may_block {
        let Some(due) = next_due else {
            return false;
        };
        std::thread::sleep(due.saturating_duration_since(Instant::now()));
        ready = ready_sources(Instant::now()).0;
    }
    trace!(target: "glib", "main context iteration: {} ready sources", ready.len());
    let mut dispatched = false;
    for source in ready {
        dispatched |= dispatch(source);
    }
    dispatched
}
