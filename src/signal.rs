//! Signals: connecting closures, emitting, and defining new signals.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use glib_bridge_sys as ffi;
use tracing::{debug, warn};

use crate::closure::{Closure, IntoCallable};
use crate::error::{BridgeError, BridgeResult};
use crate::handle::{self, OpaqueHandle};
use crate::internal::guard::isolate;
use crate::object::Object;
use crate::types::{Fundamental, Type};
use crate::value::{ToValue, Value, ValueMut, ValueRef};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SignalFlags: u32 {
        const RUN_FIRST = ffi::G_SIGNAL_RUN_FIRST;
        const RUN_LAST = ffi::G_SIGNAL_RUN_LAST;
        const RUN_CLEANUP = ffi::G_SIGNAL_RUN_CLEANUP;
        const NO_RECURSE = ffi::G_SIGNAL_NO_RECURSE;
        const DETAILED = ffi::G_SIGNAL_DETAILED;
        const ACTION = ffi::G_SIGNAL_ACTION;
        const NO_HOOKS = ffi::G_SIGNAL_NO_HOOKS;
        const MUST_COLLECT = ffi::G_SIGNAL_MUST_COLLECT;
        const DEPRECATED = ffi::G_SIGNAL_DEPRECATED;
        const ACCUMULATOR_FIRST_RUN = ffi::G_SIGNAL_ACCUMULATOR_FIRST_RUN;
    }
}

/// Identifies one connected handler. Unique per instance only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalHandlerId(u64);

impl SignalHandlerId {
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(u32);

impl SignalId {
    pub fn lookup(name: &str, owner: Type) -> Option<SignalId> {
        match ffi::g_signal_lookup(name, owner.into_glib()) {
            0 => None,
            id => Some(SignalId(id)),
        }
    }

    pub fn as_raw(self) -> u32 {
        self.0
    }

    pub fn name(self) -> Option<String> {
        ffi::g_signal_name(self.0)
    }

    pub fn param_types(self) -> Vec<Type> {
        ffi::g_signal_query(self.0)
            .map(|q| q.param_types.into_iter().map(Type::from_glib).collect())
            .unwrap_or_default()
    }

    pub fn return_type(self) -> Type {
        ffi::g_signal_query(self.0).map_or(Type::INVALID, |q| Type::from_glib(q.return_type))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalInvocationHint {
    pub signal_id: u32,
    pub detail: ffi::GQuark,
    pub run_type: SignalFlags,
}

impl SignalInvocationHint {
    fn from_glib(hint: &ffi::GSignalInvocationHint) -> Self {
        Self {
            signal_id: hint.signal_id,
            detail: hint.detail,
            run_type: SignalFlags::from_bits_truncate(hint.run_type),
        }
    }

    pub fn detail_name(&self) -> Option<String> {
        ffi::g_quark_to_string(self.detail)
    }
}

// ========== ACCUMULATORS ==========

type AccumulatorFn = dyn Fn(&SignalInvocationHint, ValueMut<'_>, ValueRef<'_>) -> bool + Send + Sync;

/// Folds handler results into the emission's return value. Returning
/// `false` stops the emission.
#[derive(Clone)]
pub struct Accumulator(Arc<AccumulatorFn>);

impl Accumulator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&SignalInvocationHint, ValueMut<'_>, ValueRef<'_>) -> bool + Send + Sync + 'static,
    {
        Accumulator(Arc::new(f))
    }

    /// Keep the latest boolean result and stop at the first `true`.
    pub fn true_handled() -> Self {
        Accumulator::new(|_, mut accu, handler_return| {
            let handled = handler_return.get::<bool>().unwrap_or(false);
            let _ = accu.set(&handled);
            !handled
        })
    }

    /// Keep the first handler's result and stop.
    pub fn first_wins() -> Self {
        Accumulator::new(|_, mut accu, handler_return| {
            if let Ok(v) = handler_return.duplicate() {
                let _ = accu.set_value(&v);
            }
            false
        })
    }
}

impl fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Accumulator").finish_non_exhaustive()
    }
}

unsafe extern "C" fn accumulator_trampoline(
    ihint: *const ffi::GSignalInvocationHint,
    return_accu: *mut ffi::GValue,
    handler_return: *const ffi::GValue,
    data: usize,
) -> bool {
    let proceed = isolate("signal accumulator", || {
        let hint = unsafe { ihint.as_ref() }?;
        let accu = unsafe { ValueMut::from_ptr(return_accu) }?;
        let handler_return = unsafe { ValueRef::from_ptr(handler_return) }?;
        let accumulator = handle::get_as::<Accumulator>(OpaqueHandle::from_usize(data)).ok()?;
        Some((accumulator.0)(
            &SignalInvocationHint::from_glib(hint),
            accu,
            handler_return,
        ))
    });
    match proceed.flatten() {
        Some(proceed) => proceed,
        None => {
            warn!(target: "glib_bridge::signal", "accumulator failed; stopping emission");
            false
        }
    }
}

// ========== DEFINITION ==========

/// Defines a new signal on a type.
pub struct SignalBuilder {
    name: String,
    flags: SignalFlags,
    param_types: Vec<Type>,
    return_type: Type,
    class_handler: Option<Closure>,
    accumulator: Option<Accumulator>,
}

impl SignalBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            flags: SignalFlags::RUN_LAST,
            param_types: Vec::new(),
            return_type: Type::NONE,
            class_handler: None,
            accumulator: None,
        }
    }

    pub fn flags(mut self, flags: SignalFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn param_types(mut self, types: &[Type]) -> Self {
        self.param_types = types.to_vec();
        self
    }

    pub fn return_type(mut self, t: Type) -> Self {
        self.return_type = t;
        self
    }

    /// The handler run at the stages selected by the flags. It receives the
    /// instance followed by the signal's parameters.
    pub fn class_handler<F, Args>(mut self, f: F) -> BridgeResult<Self>
    where
        F: IntoCallable<Args>,
    {
        self.class_handler = Some(Closure::new(f)?);
        Ok(self)
    }

    pub fn class_closure(mut self, closure: Closure) -> Self {
        self.class_handler = Some(closure);
        self
    }

    pub fn accumulator(mut self, accumulator: Accumulator) -> Self {
        self.accumulator = Some(accumulator);
        self
    }

    /// Register the signal on `owner`.
    pub fn build(self, owner: Type) -> BridgeResult<SignalId> {
        if !owner.is_a(Type::OBJECT) && !owner.is_a(Type::INTERFACE) {
            return Err(BridgeError::registration(
                &self.name,
                format!("{} cannot carry signals", owner),
            ));
        }
        if self.accumulator.is_some() && self.return_type == Type::NONE {
            return Err(BridgeError::registration(
                &self.name,
                "an accumulator needs a return type",
            ));
        }

        let accu_data = match &self.accumulator {
            Some(a) => Some(handle::insert(a.clone())?),
            None => None,
        };
        let closure = self
            .class_handler
            .as_ref()
            .map_or(ffi::GClosurePtr::NULL, Closure::as_ptr);
        let params: Vec<ffi::GType> = self.param_types.iter().map(|t| t.into_glib()).collect();

        let id = ffi::g_signal_newv(
            &self.name,
            owner.into_glib(),
            self.flags.bits(),
            closure,
            accu_data.map(|_| accumulator_trampoline as ffi::GSignalAccumulator),
            accu_data.map_or(0, OpaqueHandle::as_usize),
            self.return_type.into_glib(),
            &params,
        );
        if id == 0 {
            if let Some(h) = accu_data {
                let _ = handle::release(h);
            }
            return Err(BridgeError::registration(
                &self.name,
                "rejected by the type system",
            ));
        }
        debug!(target: "glib_bridge::signal", name = %self.name, id, %owner, "defined signal");
        Ok(SignalId(id))
    }
}

// ========== CONNECTING AND EMITTING ==========

/// Coerce an argument to a parameter's declared type: a null pointer stands
/// for a null object, string, boxed or variant.
fn coerce_argument(value: Value, expected: Type, index: usize, signal: &str) -> BridgeResult<Value> {
    let actual = value.value_type();
    if actual.is_a(expected) {
        return Ok(value);
    }
    let is_null = actual == Type::POINTER && value.get::<crate::value::Pointer>().is_ok_and(|p| p.0 == 0);
    if is_null && expected.kind().is_some_and(Fundamental::is_nullable) {
        return Value::new(expected);
    }
    Err(BridgeError::argument_type(signal, index, expected, actual))
}

impl Object {
    fn parse_signal(&self, detailed: &str) -> BridgeResult<(u32, ffi::GQuark)> {
        ffi::g_signal_parse_name(detailed, self.type_().into_glib()).ok_or_else(|| {
            BridgeError::EventNotFound {
                name: detailed.to_string(),
            }
        })
    }

    /// Connect `f` to `detailed_signal`. The handler receives the instance
    /// followed by the signal's parameters; trailing ones it does not
    /// declare are dropped.
    pub fn connect<F, Args>(&self, detailed_signal: &str, f: F) -> BridgeResult<SignalHandlerId>
    where
        F: IntoCallable<Args>,
    {
        self.connect_closure(detailed_signal, &Closure::new(f)?, false)
    }

    /// Like [`connect`](Object::connect), running after the class handler.
    pub fn connect_after<F, Args>(&self, detailed_signal: &str, f: F) -> BridgeResult<SignalHandlerId>
    where
        F: IntoCallable<Args>,
    {
        self.connect_closure(detailed_signal, &Closure::new(f)?, true)
    }

    pub fn connect_closure(
        &self,
        detailed_signal: &str,
        closure: &Closure,
        after: bool,
    ) -> BridgeResult<SignalHandlerId> {
        let (signal_id, detail) = self.parse_signal(detailed_signal)?;
        let id = ffi::g_signal_connect_closure_by_id(self.as_ptr(), signal_id, detail, closure.as_ptr(), after);
        if id == 0 {
            return Err(BridgeError::EventNotFound {
                name: detailed_signal.to_string(),
            });
        }
        Ok(SignalHandlerId(id))
    }

    pub fn disconnect(&self, handler: SignalHandlerId) -> BridgeResult<()> {
        if ffi::g_signal_handler_disconnect(self.as_ptr(), handler.0) {
            Ok(())
        } else {
            Err(BridgeError::HandlerNotFound { id: handler.0 })
        }
    }

    pub fn block_signal(&self, handler: SignalHandlerId) -> BridgeResult<()> {
        if ffi::g_signal_handler_block(self.as_ptr(), handler.0) {
            Ok(())
        } else {
            Err(BridgeError::HandlerNotFound { id: handler.0 })
        }
    }

    pub fn unblock_signal(&self, handler: SignalHandlerId) -> BridgeResult<()> {
        if ffi::g_signal_handler_unblock(self.as_ptr(), handler.0) {
            Ok(())
        } else {
            Err(BridgeError::HandlerNotFound { id: handler.0 })
        }
    }

    pub fn is_connected(&self, handler: SignalHandlerId) -> bool {
        ffi::g_signal_handler_is_connected(self.as_ptr(), handler.0)
    }

    /// Emit `detailed_signal` with `args`.
    ///
    /// Argument count and types are checked against the signal's declaration
    /// before anything reaches the native side. Returns the emission's
    /// result for signals with a return type.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn emit(&self, detailed_signal: &str, args: &[&dyn ToValue]) -> BridgeResult<Option<Value>> {
        let (signal_id, detail) = self.parse_signal(detailed_signal)?;
        let query = ffi::g_signal_query(signal_id).ok_or_else(|| BridgeError::EventNotFound {
            name: detailed_signal.to_string(),
        })?;
        if args.len() != query.n_params() {
            return Err(BridgeError::argument_count(
                detailed_signal,
                query.n_params(),
                args.len(),
            ));
        }

        let mut params = Vec::with_capacity(args.len() + 1);
        params.push(self.to_value()?);
        for (i, (arg, expected)) in args.iter().zip(&query.param_types).enumerate() {
            let value = arg.to_value()?;
            params.push(coerce_argument(value, Type::from_glib(*expected), i, detailed_signal)?);
        }
        let mut raw: Vec<ffi::GValue> = params.into_iter().map(Value::into_raw).collect();

        let return_type = Type::from_glib(query.return_type);
        let mut ret = ffi::GValue::new();
        let emitted = if return_type == Type::NONE {
            ffi::g_signal_emitv(&raw, signal_id, detail, None)
        } else {
            ffi::g_signal_emitv(&raw, signal_id, detail, Some(&mut ret))
        };
        for v in &mut raw {
            ffi::g_value_unset(v);
        }
        if !emitted {
            ffi::g_value_unset(&mut ret);
            return Err(BridgeError::ArgumentMismatch {
                message: format!("emission of '{}' was rejected", detailed_signal),
            });
        }
        Ok(ret.is_initialized().then(|| Value::from_raw(ret)))
    }

    /// Stop the emission of `detailed_signal` currently running on this
    /// object.
    pub fn stop_emission_by_name(&self, detailed_signal: &str) -> BridgeResult<()> {
        self.parse_signal(detailed_signal)?;
        ffi::g_signal_stop_emission_by_name(self.as_ptr(), detailed_signal);
        Ok(())
    }
}
