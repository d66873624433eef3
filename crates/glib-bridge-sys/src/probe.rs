//! Test probes.
//!
//! Counters the runtime keeps so tests can observe reference traffic,
//! registrations and emissions without instrumenting callers.

use rustc_hash::FxHashMap;

use crate::ptr::{GClosurePtr, GObjectPtr};
use crate::state::with_state;

type FreeHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub(crate) struct Probes {
    pub(crate) type_registrations: FxHashMap<String, usize>,
    pub(crate) signal_emissions: FxHashMap<u32, usize>,
    pub(crate) instances: FxHashMap<GObjectPtr, InstanceProbe>,
    pub(crate) free_hooks: FxHashMap<GObjectPtr, Vec<FreeHook>>,
    pub(crate) closures: FxHashMap<GClosurePtr, ClosureProbe>,
}

/// Reference traffic observed on one instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InstanceProbe {
    pub refs: usize,
    pub unrefs: usize,
    pub sinks: usize,
    pub freed: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClosureProbe {
    pub invocations: usize,
    pub finalized: bool,
}

/// How many times `g_type_register_static` (or the boxed variant) was
/// called with `name`, successful or not.
pub fn type_registrations(name: &str) -> usize {
    with_state(|s| s.probes.type_registrations.get(name).copied().unwrap_or(0))
}

pub fn signal_emissions(signal_id: u32) -> usize {
    with_state(|s| s.probes.signal_emissions.get(&signal_id).copied().unwrap_or(0))
}

pub fn instance(object: GObjectPtr) -> InstanceProbe {
    with_state(|s| s.probes.instances.get(&object).copied().unwrap_or_default())
}

pub fn closure(closure: GClosurePtr) -> ClosureProbe {
    with_state(|s| s.probes.closures.get(&closure).copied().unwrap_or_default())
}

/// Run `hook` once the instance memory is released.
pub fn on_instance_free(object: GObjectPtr, hook: impl FnOnce() + Send + 'static) {
    with_state(|s| {
        s.probes
            .free_hooks
            .entry(object)
            .or_default()
            .push(Box::new(hook))
    });
}

pub(crate) fn run_free_hooks(object: GObjectPtr) {
    let hooks = with_state(|s| s.probes.free_hooks.remove(&object).unwrap_or_default());
    for hook in hooks {
        hook();
    }
}
