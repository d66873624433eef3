//! Signals: definition, handler bookkeeping and emission.
//!
//! Emission runs in stages. The class closure runs in whichever of the
//! `RUN_FIRST`, `RUN_LAST` and `RUN_CLEANUP` stages the signal's flags select.
//! Regular handlers run after the `RUN_FIRST` stage and "after" handlers run
//! after the `RUN_LAST` stage.

use tracing::{trace, warn};

use crate::callbacks::*;
use crate::gclosure::{g_closure_invoke, g_closure_ref, g_closure_sink, g_closure_unref};
use crate::gobject::{g_object_ref, g_object_unref, instance_type};
use crate::gparam::g_param_spec_get_name;
use crate::gtype::*;
use crate::gvalue::{
    GValue, g_value_copy, g_value_init, g_value_set_object, g_value_set_param, g_value_unset,
};
use crate::ptr::{GClosurePtr, GObjectPtr, GParamSpecPtr};
use crate::state::{State, with_state};

pub(crate) struct SignalNode {
    pub(crate) id: u32,
    pub(crate) name: String,
    pub(crate) itype: GType,
    pub(crate) flags: u32,
    pub(crate) class_closure: GClosurePtr,
    pub(crate) accumulator: Option<(GSignalAccumulator, usize)>,
    pub(crate) return_type: GType,
    pub(crate) param_types: Vec<GType>,
}

pub(crate) struct HandlerNode {
    pub(crate) id: u64,
    pub(crate) signal_id: u32,
    pub(crate) detail: GQuark,
    pub(crate) closure: GClosurePtr,
    pub(crate) after: bool,
    pub(crate) block_count: u32,
}

/// Id of the built-in `notify` signal.
pub const NOTIFY_SIGNAL_ID: u32 = 1;

pub(crate) fn boot(s: &mut State) {
    s.signals.push(SignalNode {
        id: NOTIFY_SIGNAL_ID,
        name: "notify".to_string(),
        itype: G_TYPE_OBJECT,
        flags: G_SIGNAL_RUN_FIRST
            | G_SIGNAL_NO_RECURSE
            | G_SIGNAL_DETAILED
            | G_SIGNAL_ACTION
            | G_SIGNAL_NO_HOOKS,
        class_closure: GClosurePtr::NULL,
        accumulator: None,
        return_type: G_TYPE_NONE,
        param_types: vec![G_TYPE_PARAM],
    });
}

fn canonical(name: &str) -> String {
    name.replace('_', "-")
}

fn valid_signal_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn lookup(s: &State, name: &str, itype: GType) -> u32 {
    let chain = ancestry_with_interfaces(s, itype);
    s.signals
        .iter()
        .find(|n| n.name == name && chain.contains(&n.itype))
        .map_or(0, |n| n.id)
}

fn node(s: &State, signal_id: u32) -> Option<&SignalNode> {
    signal_id
        .checked_sub(1)
        .and_then(|i| s.signals.get(i as usize))
}

// ========== DEFINITION ==========

/// Define a signal on `itype`. Returns its id, or 0 on failure.
///
/// The signal takes ownership of a floating `class_closure`.
#[allow(clippy::too_many_arguments)]
pub fn g_signal_newv(
    name: &str,
    itype: GType,
    flags: u32,
    class_closure: GClosurePtr,
    accumulator: Option<GSignalAccumulator>,
    accu_data: usize,
    return_type: GType,
    param_types: &[GType],
) -> u32 {
    let name = canonical(name);
    if !valid_signal_name(&name) {
        warn!(target: "glib", "g_signal_newv: signal name '{}' is invalid", name);
        return 0;
    }
    let id = with_state(|s| {
        let instantiable = matches!(fundamental(s, itype), G_TYPE_OBJECT | G_TYPE_INTERFACE);
        if !instantiable {
            warn!(target: "glib", "g_signal_newv: cannot define '{}' on non-instantiatable {:?}", name, itype);
            return 0;
        }
        if lookup(s, &name, itype) != 0 {
            warn!(target: "glib", "g_signal_newv: signal '{}' already exists on {:?}", name, itype);
            return 0;
        }
        if accumulator.is_some() && return_type == G_TYPE_NONE {
            warn!(target: "glib", "g_signal_newv: signal '{}' has an accumulator but returns void", name);
            return 0;
        }
        let known = |t: &GType| *t == G_TYPE_NONE || s.types.contains_key(t);
        if !known(&return_type) || !param_types.iter().filter(|t| **t != G_TYPE_NONE).all(known) {
            warn!(target: "glib", "g_signal_newv: signal '{}' uses an unregistered type", name);
            return 0;
        }
        let id = s.signals.len() as u32 + 1;
        s.signals.push(SignalNode {
            id,
            name: name.clone(),
            itype,
            flags,
            class_closure,
            accumulator: accumulator.map(|a| (a, accu_data)),
            return_type,
            param_types: param_types.to_vec(),
        });
        id
    });
    if id != 0 && !class_closure.is_null() {
        g_closure_ref(class_closure);
        g_closure_sink(class_closure);
    }
    trace!(target: "glib", "defined signal '{}' ({}) on {:?}", name, id, itype);
    id
}

pub fn g_signal_lookup(name: &str, itype: GType) -> u32 {
    let name = canonical(name);
    with_state(|s| lookup(s, &name, itype))
}

pub fn g_signal_name(signal_id: u32) -> Option<String> {
    with_state(|s| node(s, signal_id).map(|n| n.name.clone()))
}

pub fn g_signal_query(signal_id: u32) -> Option<GSignalQuery> {
    with_state(|s| {
        node(s, signal_id).map(|n| GSignalQuery {
            signal_id: n.id,
            signal_name: n.name.clone(),
            itype: n.itype,
            signal_flags: n.flags,
            return_type: n.return_type,
            param_types: n.param_types.clone(),
        })
    })
}

/// Signals defined directly on `itype`.
pub fn g_signal_list_ids(itype: GType) -> Vec<u32> {
    with_state(|s| {
        s.signals
            .iter()
            .filter(|n| n.itype == itype)
            .map(|n| n.id)
            .collect()
    })
}

/// Split `"name::detail"` into a signal id and detail quark.
pub fn g_signal_parse_name(detailed_signal: &str, itype: GType) -> Option<(u32, GQuark)> {
    let (name, detail) = match detailed_signal.split_once("::") {
        Some((name, detail)) => (name, Some(detail)),
        None => (detailed_signal, None),
    };
    let name = canonical(name);
    with_state(|s| {
        let id = lookup(s, &name, itype);
        let signal = node(s, id)?;
        match detail {
            None => Some((id, 0)),
            Some(d) if !d.is_empty() && signal.flags & G_SIGNAL_DETAILED != 0 => {
                Some((id, s.intern(d)))
            }
            Some(_) => None,
        }
    })
}

// ========== HANDLERS ==========

/// Connect `closure` to `detailed_signal` on `instance`. Returns the handler
/// id, or 0 on failure. Ids are unique per instance and start at 1.
pub fn g_signal_connect_closure(
    instance: GObjectPtr,
    detailed_signal: &str,
    closure: GClosurePtr,
    after: bool,
) -> u64 {
    let itype = instance_type(instance);
    if itype == G_TYPE_INVALID {
        warn!(target: "glib", "g_signal_connect_closure: assertion 'G_TYPE_CHECK_INSTANCE (instance)' failed");
        return 0;
    }
    let Some((signal_id, detail)) = g_signal_parse_name(detailed_signal, itype) else {
        warn!(
            target: "glib",
            "g_signal_connect_closure: invalid signal spec '{}' for instance {:?}", detailed_signal, instance
        );
        return 0;
    };
    g_signal_connect_closure_by_id(instance, signal_id, detail, closure, after)
}

pub fn g_signal_connect_closure_by_id(
    instance: GObjectPtr,
    signal_id: u32,
    detail: GQuark,
    closure: GClosurePtr,
    after: bool,
) -> u64 {
    if g_closure_ref(closure).is_null() {
        return 0;
    }
    g_closure_sink(closure);
    let id = with_state(|s| {
        let signal_ok = node(s, signal_id).is_some_and(|n| {
            let t = s.instances.get(&instance).map_or(G_TYPE_INVALID, |i| i.g_type);
            is_a(s, t, n.itype)
        });
        if !signal_ok {
            return 0;
        }
        let Some(inst) = s.instances.get_mut(&instance) else {
            return 0;
        };
        let id = inst.next_handler;
        inst.next_handler += 1;
        inst.handlers.push(HandlerNode {
            id,
            signal_id,
            detail,
            closure,
            after,
            block_count: 0,
        });
        id
    });
    if id == 0 {
        warn!(target: "glib", "g_signal_connect_closure_by_id: signal {} is invalid for {:?}", signal_id, instance);
        g_closure_unref(closure);
    }
    id
}

fn with_handler<R>(instance: GObjectPtr, handler_id: u64, f: impl FnOnce(&mut HandlerNode) -> R) -> Option<R> {
    with_state(|s| {
        s.instances
            .get_mut(&instance)?
            .handlers
            .iter_mut()
            .find(|h| h.id == handler_id)
            .map(f)
    })
}

pub fn g_signal_handler_block(instance: GObjectPtr, handler_id: u64) -> bool {
    let found = with_handler(instance, handler_id, |h| h.block_count += 1);
    if found.is_none() {
        warn!(target: "glib", "{:?}: instance has no handler with id '{}'", instance, handler_id);
    }
    found.is_some()
}

pub fn g_signal_handler_unblock(instance: GObjectPtr, handler_id: u64) -> bool {
    let found = with_handler(instance, handler_id, |h| {
        if h.block_count == 0 {
            return false;
        }
        h.block_count -= 1;
        true
    });
    match found {
        Some(true) => true,
        Some(false) => {
            warn!(target: "glib", "{:?}: handler '{}' of instance is not blocked", instance, handler_id);
            false
        }
        None => {
            warn!(target: "glib", "{:?}: instance has no handler with id '{}'", instance, handler_id);
            false
        }
    }
}

pub fn g_signal_handler_disconnect(instance: GObjectPtr, handler_id: u64) -> bool {
    let removed = with_state(|s| {
        let handlers = &mut s.instances.get_mut(&instance)?.handlers;
        let index = handlers.iter().position(|h| h.id == handler_id)?;
        Some(handlers.remove(index).closure)
    });
    match removed {
        Some(closure) => {
            g_closure_unref(closure);
            true
        }
        None => {
            warn!(target: "glib", "{:?}: instance has no handler with id '{}'", instance, handler_id);
            false
        }
    }
}

pub fn g_signal_handler_is_connected(instance: GObjectPtr, handler_id: u64) -> bool {
    with_handler(instance, handler_id, |_| ()).is_some()
}

pub fn g_signal_handler_block_count(instance: GObjectPtr, handler_id: u64) -> u32 {
    with_handler(instance, handler_id, |h| h.block_count).unwrap_or(0)
}

// ========== EMISSION ==========

/// Stop the current emission of `detailed_signal` on `instance`.
pub fn g_signal_stop_emission_by_name(instance: GObjectPtr, detailed_signal: &str) {
    let itype = instance_type(instance);
    let Some((signal_id, _)) = g_signal_parse_name(detailed_signal, itype) else {
        warn!(target: "glib", "g_signal_stop_emission_by_name: invalid signal spec '{}'", detailed_signal);
        return;
    };
    let stopped = with_state(|s| {
        let Some(inst) = s.instances.get_mut(&instance) else {
            return false;
        };
        if !inst.active_emissions.contains(&signal_id) {
            return false;
        }
        if !inst.stopped_emissions.contains(&signal_id) {
            inst.stopped_emissions.push(signal_id);
        }
        true
    });
    if !stopped {
        warn!(target: "glib", "{:?}: no emission of signal '{}' to stop", instance, detailed_signal);
    }
}

struct Emission {
    instance: GObjectPtr,
    signal_id: u32,
    detail: GQuark,
    return_type: GType,
    accumulator: Option<(GSignalAccumulator, usize)>,
    accu: GValue,
    first_run: bool,
}

impl Emission {
    /// Invoke one closure. Returns `false` when the emission must stop.
    fn call(&mut self, closure: GClosurePtr, params: &[GValue], run_type: u32) -> bool {
        let first = if self.accumulator.is_some() && self.first_run {
            G_SIGNAL_ACCUMULATOR_FIRST_RUN
        } else {
            0
        };
        let hint = GSignalInvocationHint {
            signal_id: self.signal_id,
            detail: self.detail,
            run_type: run_type | first,
        };

        let proceed = if self.return_type == G_TYPE_NONE || run_type == G_SIGNAL_RUN_CLEANUP {
            g_closure_invoke(closure, None, params, Some(&hint));
            true
        } else {
            let mut handler_return = GValue::new();
            g_value_init(&mut handler_return, self.return_type);
            g_closure_invoke(closure, Some(&mut handler_return), params, Some(&hint));
            let proceed = match self.accumulator {
                Some((accumulate, data)) => unsafe {
                    accumulate(&hint, &mut self.accu, &handler_return, data)
                },
                None => {
                    g_value_copy(&handler_return, &mut self.accu);
                    true
                }
            };
            g_value_unset(&mut handler_return);
            self.first_run = false;
            proceed
        };

        proceed && !self.take_stop()
    }

    fn take_stop(&self) -> bool {
        with_state(|s| {
            let Some(inst) = s.instances.get_mut(&self.instance) else {
                return false;
            };
            match inst.stopped_emissions.iter().position(|id| *id == self.signal_id) {
                Some(i) => {
                    inst.stopped_emissions.remove(i);
                    true
                }
                None => false,
            }
        })
    }

    fn handler_live(&self, handler_id: u64) -> bool {
        with_handler(self.instance, handler_id, |h| h.block_count == 0).unwrap_or(false)
    }
}

fn validate_params(s: &State, signal: &SignalNode, params: &[GValue]) -> Result<GObjectPtr, String> {
    let Some(first) = params.first() else {
        return Err("missing instance parameter".to_string());
    };
    let instance = first.get_object();
    let itype = s.instances.get(&instance).map_or(G_TYPE_INVALID, |i| i.g_type);
    if !is_a(s, itype, signal.itype) {
        return Err(format!("instance {:?} does not have signal '{}'", instance, signal.name));
    }
    if params.len() != signal.param_types.len() + 1 {
        return Err(format!(
            "signal '{}' expects {} parameters, got {}",
            signal.name,
            signal.param_types.len(),
            params.len() - 1
        ));
    }
    for (i, (value, expected)) in params[1..].iter().zip(&signal.param_types).enumerate() {
        if !is_a(s, value.value_type(), *expected) {
            return Err(format!(
                "parameter {} of signal '{}' has type {:?}, expected {:?}",
                i, signal.name, value.value_type(), expected
            ));
        }
    }
    Ok(instance)
}

/// Emit `signal_id` with `params[0]` as the instance.
///
/// When `return_value` is given and the signal returns a value, the
/// (accumulated) result is copied into it, initializing it if needed.
/// Returns `false` if the emission was rejected.
pub fn g_signal_emitv(
    params: &[GValue],
    signal_id: u32,
    detail: GQuark,
    return_value: Option<&mut GValue>,
) -> bool {
    let prepared = with_state(|s| {
        *s.probes.signal_emissions.entry(signal_id).or_default() += 1;
        let Some(signal) = node(s, signal_id) else {
            return Err(format!("invalid signal id {}", signal_id));
        };
        if detail != 0 && signal.flags & G_SIGNAL_DETAILED == 0 {
            return Err(format!("signal '{}' does not support details", signal.name));
        }
        let instance = validate_params(s, signal, params)?;
        let class_closure = signal.class_closure;
        let flags = signal.flags;
        let return_type = signal.return_type;
        let accumulator = signal.accumulator;

        let Some(inst) = s.instances.get_mut(&instance) else {
            return Err(format!("instance {:?} is gone", instance));
        };
        inst.active_emissions.push(signal_id);
        let matching = |h: &&HandlerNode| {
            h.signal_id == signal_id && h.block_count == 0 && (h.detail == 0 || h.detail == detail)
        };
        let before: Vec<(u64, GClosurePtr)> = inst
            .handlers
            .iter()
            .filter(|h| !h.after)
            .filter(matching)
            .map(|h| (h.id, h.closure))
            .collect();
        let after: Vec<(u64, GClosurePtr)> = inst
            .handlers
            .iter()
            .filter(|h| h.after)
            .filter(matching)
            .map(|h| (h.id, h.closure))
            .collect();
        Ok((instance, class_closure, flags, return_type, accumulator, before, after))
    });
    let (instance, class_closure, flags, return_type, accumulator, before, after) = match prepared {
        Ok(p) => p,
        Err(message) => {
            warn!(target: "glib", "g_signal_emitv: {}", message);
            return false;
        }
    };

    g_object_ref(instance);
    for (_, closure) in before.iter().chain(&after) {
        g_closure_ref(*closure);
    }
    if !class_closure.is_null() {
        g_closure_ref(class_closure);
    }

    let mut emission = Emission {
        instance,
        signal_id,
        detail,
        return_type,
        accumulator,
        accu: GValue::new(),
        first_run: true,
    };
    if return_type != G_TYPE_NONE {
        g_value_init(&mut emission.accu, return_type);
    }

    let run = |emission: &mut Emission| -> bool {
        if flags & G_SIGNAL_RUN_FIRST != 0
            && !class_closure.is_null()
            && !emission.call(class_closure, params, G_SIGNAL_RUN_FIRST)
        {
            return false;
        }
        for (id, closure) in &before {
            if emission.handler_live(*id) && !emission.call(*closure, params, G_SIGNAL_RUN_FIRST) {
                return false;
            }
        }
        if flags & G_SIGNAL_RUN_LAST != 0
            && !class_closure.is_null()
            && !emission.call(class_closure, params, G_SIGNAL_RUN_LAST)
        {
            return false;
        }
        for (id, closure) in &after {
            if emission.handler_live(*id) && !emission.call(*closure, params, G_SIGNAL_RUN_LAST) {
                return false;
            }
        }
        true
    };
    run(&mut emission);

    if flags & G_SIGNAL_RUN_CLEANUP != 0 && !class_closure.is_null() {
        emission.call(class_closure, params, G_SIGNAL_RUN_CLEANUP);
    }

    with_state(|s| {
        if let Some(inst) = s.instances.get_mut(&instance) {
            if let Some(i) = inst.active_emissions.iter().rposition(|id| *id == signal_id) {
                inst.active_emissions.remove(i);
            }
            if !inst.active_emissions.contains(&signal_id) {
                inst.stopped_emissions.retain(|id| *id != signal_id);
            }
        }
    });

    if let Some(ret) = return_value
        && return_type != G_TYPE_NONE
    {
        if ret.is_initialized() || g_value_init(ret, return_type) {
            g_value_copy(&emission.accu, ret);
        }
    }
    g_value_unset(&mut emission.accu);

    for (_, closure) in before.iter().chain(&after) {
        g_closure_unref(*closure);
    }
    if !class_closure.is_null() {
        g_closure_unref(class_closure);
    }
    g_object_unref(instance);
    true
}

/// Emit `notify::<pspec name>` on `object`.
pub(crate) fn emit_notify(object: GObjectPtr, pspec: GParamSpecPtr) {
    let Some(name) = g_param_spec_get_name(pspec) else {
        return;
    };
    let detail = with_state(|s| s.intern(&name));
    let mut params = [GValue::new(), GValue::new()];
    g_value_init(&mut params[0], G_TYPE_OBJECT);
    g_value_set_object(&mut params[0], object);
    g_value_init(&mut params[1], G_TYPE_PARAM);
    g_value_set_param(&mut params[1], pspec);
    g_signal_emitv(&params, NOTIFY_SIGNAL_ID, detail, None);
    for value in &mut params {
        g_value_unset(value);
    }
}
