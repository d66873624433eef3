//! Process-wide runtime state.
//!
//! All tables live behind one mutex. Functions take the lock, copy out what
//! they need, and drop it before calling any callback, so callbacks are free
//! to re-enter the runtime.

use std::sync::{Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};

use rustc_hash::FxHashMap;

use crate::gclosure::ClosureNode;
use crate::gmain::SourceNode;
use crate::gobject::InstanceNode;
use crate::gparam::ParamSpecNode;
use crate::gsignal::SignalNode;
use crate::gtype::{ClassNode, GType, InterfaceNode, TypeNode};
use crate::probe::Probes;
use crate::ptr::{GClassPtr, GClosurePtr, GInterfacePtr, GObjectPtr, GParamSpecPtr, GSourcePtr};

pub(crate) struct State {
    pub(crate) types: FxHashMap<GType, TypeNode>,
    pub(crate) type_names: FxHashMap<String, GType>,
    pub(crate) next_type: usize,
    pub(crate) classes: FxHashMap<GClassPtr, ClassNode>,
    pub(crate) interfaces: FxHashMap<GInterfacePtr, InterfaceNode>,
    pub(crate) instances: FxHashMap<GObjectPtr, InstanceNode>,
    pub(crate) pspecs: FxHashMap<GParamSpecPtr, ParamSpecNode>,
    pub(crate) signals: Vec<SignalNode>,
    pub(crate) closures: FxHashMap<GClosurePtr, ClosureNode>,
    pub(crate) sources: FxHashMap<GSourcePtr, SourceNode>,
    pub(crate) source_ids: FxHashMap<u32, GSourcePtr>,
    pub(crate) next_source_id: u32,
    pub(crate) quarks: Vec<String>,
    pub(crate) quark_ids: FxHashMap<String, u32>,
    pub(crate) probes: Probes,
}

impl State {
    fn empty() -> Self {
        Self {
            types: FxHashMap::default(),
            type_names: FxHashMap::default(),
            next_type: crate::gtype::FIRST_DERIVED_TYPE,
            classes: FxHashMap::default(),
            interfaces: FxHashMap::default(),
            instances: FxHashMap::default(),
            pspecs: FxHashMap::default(),
            signals: Vec::new(),
            closures: FxHashMap::default(),
            sources: FxHashMap::default(),
            source_ids: FxHashMap::default(),
            next_source_id: 1,
            quarks: Vec::new(),
            quark_ids: FxHashMap::default(),
            probes: Probes::default(),
        }
    }

    /// Intern `name`, returning its quark.
    pub(crate) fn intern(&mut self, name: &str) -> u32 {
        if let Some(&quark) = self.quark_ids.get(name) {
            return quark;
        }
        self.quarks.push(name.to_string());
        let quark = self.quarks.len() as u32;
        self.quark_ids.insert(name.to_string(), quark);
        quark
    }
}

static STATE: OnceLock<Mutex<State>> = OnceLock::new();

fn global() -> &'static Mutex<State> {
    STATE.get_or_init(|| {
        let mut state = State::empty();
        crate::gtype::boot(&mut state);
        crate::gsignal::boot(&mut state);
        Mutex::new(state)
    })
}

/// Run `f` with the runtime state locked.
///
/// Never call back into user code from inside `f`.
pub(crate) fn with_state<R>(f: impl FnOnce(&mut State) -> R) -> R {
    let mut guard = global().lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

// ========== CLASS INITIALIZATION LOCK ==========

/// Re-entrant lock serializing class initialization.
///
/// A class-init hook may itself reference other classes, so the owning
/// thread can take the lock again.
pub(crate) struct ClassInitLock {
    owner: Mutex<(Option<ThreadId>, usize)>,
    released: Condvar,
}

pub(crate) struct ClassInitGuard<'a> {
    lock: &'a ClassInitLock,
}

impl ClassInitLock {
    const fn new() -> Self {
        Self {
            owner: Mutex::new((None, 0)),
            released: Condvar::new(),
        }
    }

    pub(crate) fn lock(&self) -> ClassInitGuard<'_> {
        let me = thread::current().id();
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match owner.0 {
                None => {
                    *owner = (Some(me), 1);
                    break;
                }
                Some(current) if current == me => {
                    owner.1 += 1;
                    break;
                }
                Some(_) => {
                    owner = self
                        .released
                        .wait(owner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        ClassInitGuard { lock: self }
    }

    fn unlock(&self) {
        let mut owner: MutexGuard<'_, _> =
            self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        owner.1 = owner.1.saturating_sub(1);
        if owner.1 == 0 {
            owner.0 = None;
            self.released.notify_all();
        }
    }
}

impl Drop for ClassInitGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

static CLASS_INIT_LOCK: ClassInitLock = ClassInitLock::new();

pub(crate) fn class_init_lock() -> &'static ClassInitLock {
    &CLASS_INIT_LOCK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarks_are_stable_and_start_at_one() {
        let a = with_state(|s| s.intern("state-test-quark"));
        let b = with_state(|s| s.intern("state-test-quark"));
        assert_eq!(a, b);
        assert!(a >= 1);
    }

    #[test]
    fn class_init_lock_is_reentrant() {
        let outer = class_init_lock().lock();
        let inner = class_init_lock().lock();
        drop(inner);
        drop(outer);
        let again = class_init_lock().lock();
        drop(again);
    }
}
