//! The closure bridge: Rust callables invoked by native code.
//!
//! A [`Closure`] wraps a [`Callable`] and optional bound data in a native
//! closure. The Rust side lives in the handle registry; the native closure
//! carries only the handle and releases it from its finalize notifier.
//!
//! On invocation with `K` native arguments, a callable of arity `N` is
//! called with the first `min(N, K)` arguments decoded through the
//! marshaler registry. Bound data fills the last slot when one is left. If
//! `N` exceeds `K` plus the bound slot, the call is skipped. Failures on
//! this path are logged; native code never sees them.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use glib_bridge_sys as ffi;
use tracing::{trace, warn};

use crate::error::{BridgeError, BridgeResult};
use crate::handle::{self, OpaqueHandle};
use crate::internal::guard::isolate;
use crate::object::Object;
use crate::param_spec::ParamSpec;
use crate::value::{AnyValue, Pointer, ToValue, Value, ValueMut, Variant, marshal};

/// A Rust function with a declared parameter list.
pub trait Callable: Send + Sync + 'static {
    fn arity(&self) -> usize;

    /// The `TypeId` of each declared parameter.
    fn param_types(&self) -> Vec<TypeId>;

    fn param_type_names(&self) -> Vec<&'static str>;

    fn return_type_name(&self) -> &'static str;

    /// Call with exactly `arity()` arguments. `Ok(None)` means the callable
    /// returned `()`.
    fn call(&self, args: Vec<AnyValue>) -> BridgeResult<Option<AnyValue>>;
}

/// Conversion of a plain `Fn` into a [`Callable`]. `Args` is the parameter
/// tuple and only serves to select the impl.
pub trait IntoCallable<Args> {
    fn into_callable(self) -> Arc<dyn Callable>;
}

/// Produces a fresh copy of the bound data for every call.
pub type BoundData = Box<dyn Fn() -> AnyValue + Send + Sync>;

struct FnCallable<F, Args> {
    f: F,
    _args: PhantomData<fn(Args)>,
}

// ========== ARGUMENT EXTRACTION ==========

fn coerce<A: Any>(candidate: Box<dyn Any>) -> Option<A> {
    candidate.downcast::<A>().ok().map(|b| *b)
}

/// Whether a decoded argument is the absence value: `()` or a null pointer.
fn is_absent(arg: &AnyValue) -> bool {
    arg.is::<()>() || arg.downcast_ref::<Pointer>().is_some_and(|p| p.0 == 0)
}

/// `None` of whichever nullable parameter type `A` is.
fn absent<A: Any>() -> Option<A> {
    coerce::<A>(Box::new(Option::<Object>::None))
        .or_else(|| coerce::<A>(Box::new(Option::<String>::None)))
        .or_else(|| coerce::<A>(Box::new(Option::<ParamSpec>::None)))
        .or_else(|| coerce::<A>(Box::new(Option::<Variant>::None)))
}

/// Take an `A` out of a decoded argument. Besides an exact match this
/// accepts `T` for `Option<T>`, the absence value for `None`, and anything
/// for `AnyValue`.
fn extract<A: Any>(arg: AnyValue, index: usize) -> BridgeResult<A> {
    let arg = match arg.downcast::<A>() {
        Ok(a) => return Ok(*a),
        Err(arg) => arg,
    };
    if TypeId::of::<A>() == TypeId::of::<AnyValue>() {
        return coerce::<A>(Box::new(arg)).ok_or_else(|| mismatch::<A>(index, "AnyValue"));
    }
    if is_absent(&arg) {
        return absent::<A>().ok_or_else(|| mismatch::<A>(index, "a null value"));
    }
    let arg = match arg.downcast::<Variant>() {
        Ok(v) => match coerce::<A>(Box::new(Some(*v))) {
            Some(a) => return Ok(a),
            None => return Err(mismatch::<A>(index, "Variant")),
        },
        Err(arg) => arg,
    };
    let arg = match arg.downcast::<Object>() {
        Ok(obj) => match coerce::<A>(Box::new(Some(*obj))) {
            Some(a) => return Ok(a),
            None => return Err(mismatch::<A>(index, "Object")),
        },
        Err(arg) => arg,
    };
    let arg = match arg.downcast::<String>() {
        Ok(s) => match coerce::<A>(Box::new(Some(*s))) {
            Some(a) => return Ok(a),
            None => return Err(mismatch::<A>(index, "String")),
        },
        Err(arg) => arg,
    };
    match arg.downcast::<ParamSpec>() {
        Ok(p) => coerce::<A>(Box::new(Some(*p))).ok_or_else(|| mismatch::<A>(index, "ParamSpec")),
        Err(_) => Err(mismatch::<A>(index, "another type")),
    }
}

fn mismatch<A>(index: usize, got: &str) -> BridgeError {
    BridgeError::ArgumentMismatch {
        message: format!("argument {}: expected {}, got {}", index, type_name::<A>(), got),
    }
}

fn into_return<R: Any + Send>(r: R) -> Option<AnyValue> {
    let boxed: AnyValue = Box::new(r);
    if boxed.is::<()>() { None } else { Some(boxed) }
}

macro_rules! impl_callable {
    ($n:expr; $($arg:ident),*) => {
        impl<F, R, $($arg,)*> Callable for FnCallable<F, ($($arg,)*)>
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: Any + Send,
            $($arg: Any,)*
        {
            fn arity(&self) -> usize {
                $n
            }

            fn param_types(&self) -> Vec<TypeId> {
                vec![$(TypeId::of::<$arg>()),*]
            }

            fn param_type_names(&self) -> Vec<&'static str> {
                vec![$(type_name::<$arg>()),*]
            }

            fn return_type_name(&self) -> &'static str {
                type_name::<R>()
            }

            #[allow(non_snake_case, unused_variables, unused_mut)]
            fn call(&self, args: Vec<AnyValue>) -> BridgeResult<Option<AnyValue>> {
                if args.len() != $n {
                    return Err(BridgeError::argument_count("callable", $n, args.len()));
                }
                let mut args = args.into_iter().enumerate();
                $(
                    let $arg = match args.next() {
                        Some((i, a)) => extract::<$arg>(a, i)?,
                        None => return Err(BridgeError::argument_count("callable", $n, 0)),
                    };
                )*
                Ok(into_return((self.f)($($arg),*)))
            }
        }

        impl<F, R, $($arg,)*> IntoCallable<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: Any + Send,
            $($arg: Any,)*
        {
            fn into_callable(self) -> Arc<dyn Callable> {
                Arc::new(FnCallable::<F, ($($arg,)*)> {
                    f: self,
                    _args: PhantomData,
                })
            }
        }
    };
}

impl_callable!(0;);
impl_callable!(1; A1);
impl_callable!(2; A1, A2);
impl_callable!(3; A1, A2, A3);
impl_callable!(4; A1, A2, A3, A4);
impl_callable!(5; A1, A2, A3, A4, A5);
impl_callable!(6; A1, A2, A3, A4, A5, A6);
impl_callable!(7; A1, A2, A3, A4, A5, A6, A7);
impl_callable!(8; A1, A2, A3, A4, A5, A6, A7, A8);

// ========== INVOCATION ==========

struct ClosureContext {
    callable: Arc<dyn Callable>,
    bound: Option<BoundData>,
}

impl ClosureContext {
    /// Decode one argument. An object handed to a parameter that is not an
    /// object type is replaced by its natural value.
    fn convert_arg(&self, raw: &ffi::GValue, param: TypeId) -> BridgeResult<AnyValue> {
        let value = marshal::from_value(raw)?;
        let wants_object = param == TypeId::of::<Object>()
            || param == TypeId::of::<Option<Object>>()
            || param == TypeId::of::<AnyValue>();
        if wants_object {
            return Ok(value);
        }
        match value.downcast::<Object>() {
            Ok(obj) => match obj.natural_value() {
                Ok(natural) => Ok(natural),
                Err(_) => Ok(obj),
            },
            Err(value) => Ok(value),
        }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn invoke(&self, params: &[ffi::GValue], return_slot: Option<ValueMut<'_>>) {
        let arity = self.callable.arity();
        let available = params.len() + usize::from(self.bound.is_some());
        if arity > available {
            warn!(
                target: "glib_bridge::closure",
                expected = arity,
                available,
                "closure needs more arguments than the caller provides; skipping call"
            );
            return;
        }

        let param_types = self.callable.param_types();
        let mut args = Vec::with_capacity(arity);
        for (i, (raw, param)) in params.iter().zip(param_types).take(arity).enumerate() {
            match self.convert_arg(raw, param) {
                Ok(arg) => args.push(arg),
                Err(e) => {
                    warn!(target: "glib_bridge::closure", "cannot convert argument {}: {}; skipping call", i, e);
                    return;
                }
            }
        }
        if let Some(bound) = &self.bound
            && args.len() < arity
        {
            args.push(bound());
        }

        let result = match self.callable.call(args) {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "glib_bridge::closure", "closure call failed: {}", e);
                return;
            }
        };
        let (Some(ret), Some(mut slot)) = (result, return_slot) else {
            return;
        };
        let written =
            marshal::to_value_named(&*ret, self.callable.return_type_name()).and_then(|v| slot.set_value(&v));
        if let Err(e) = written {
            warn!(target: "glib_bridge::closure", "cannot store closure return value: {}", e);
        }
    }
}

unsafe extern "C" fn marshal_trampoline(
    closure: ffi::GClosurePtr,
    return_value: *mut ffi::GValue,
    n_param_values: u32,
    param_values: *const ffi::GValue,
    _invocation_hint: *const ffi::GSignalInvocationHint,
    _marshal_data: usize,
) {
    isolate("closure marshal", || {
        let Some(data) = ffi::g_closure_get_data(closure) else {
            warn!(target: "glib_bridge::closure", "invoked unknown closure {:?}", closure);
            return;
        };
        let context = match handle::get_as::<ClosureContext>(OpaqueHandle::from_usize(data)) {
            Ok(c) => c,
            Err(e) => {
                warn!(target: "glib_bridge::closure", "closure {:?} lost its context: {}", closure, e);
                return;
            }
        };
        let params = if param_values.is_null() || n_param_values == 0 {
            &[][..]
        } else {
            unsafe { std::slice::from_raw_parts(param_values, n_param_values as usize) }
        };
        let slot = unsafe { ValueMut::from_ptr(return_value) };
        trace!(target: "glib_bridge::closure", ?closure, n_params = params.len(), "invoking closure");
        context.invoke(params, slot);
    });
}

unsafe extern "C" fn finalize_trampoline(data: usize, _closure: ffi::GClosurePtr) {
    isolate("closure finalize", || {
        let _ = handle::release(OpaqueHandle::from_usize(data));
    });
}

// ========== CLOSURE ==========

/// A native closure holding one reference.
pub struct Closure {
    ptr: ffi::GClosurePtr,
}

impl Closure {
    pub fn new<F, Args>(f: F) -> BridgeResult<Closure>
    where
        F: IntoCallable<Args>,
    {
        Closure::from_callable(f.into_callable(), None)
    }

    /// A closure whose last parameter is filled with a clone of `data` when
    /// the caller does not provide it.
    pub fn with_data<F, Args, D>(f: F, data: D) -> BridgeResult<Closure>
    where
        F: IntoCallable<Args>,
        D: Clone + Send + Sync + 'static,
    {
        let bound: BoundData = Box::new(move || Box::new(data.clone()));
        Closure::from_callable(f.into_callable(), Some(bound))
    }

    pub fn from_callable(callable: Arc<dyn Callable>, bound: Option<BoundData>) -> BridgeResult<Closure> {
        let context = handle::insert(ClosureContext { callable, bound })?;
        let ptr = ffi::g_closure_new(marshal_trampoline, context.as_usize());
        if ptr.is_null() {
            let _ = handle::release(context);
            return Err(BridgeError::AllocationFailed {
                what: "closure".to_string(),
            });
        }
        ffi::g_closure_add_finalize_notifier(ptr, context.as_usize(), finalize_trampoline);
        ffi::g_closure_ref(ptr);
        ffi::g_closure_sink(ptr);
        Ok(Closure { ptr })
    }

    pub fn as_ptr(&self) -> ffi::GClosurePtr {
        self.ptr
    }

    /// Call the closure directly, as native code would. Returns the value
    /// written to the return slot, if any.
    pub fn invoke(&self, args: &[&dyn ToValue]) -> BridgeResult<Option<Value>> {
        let values = args
            .iter()
            .map(|a| a.to_value())
            .collect::<BridgeResult<Vec<Value>>>()?;
        let mut params: Vec<ffi::GValue> = values.into_iter().map(Value::into_raw).collect();
        let mut ret = ffi::GValue::new();
        ffi::g_closure_invoke(self.ptr, Some(&mut ret), &params, None);
        for p in &mut params {
            ffi::g_value_unset(p);
        }
        Ok(ret.is_initialized().then(|| Value::from_raw(ret)))
    }
}

impl Clone for Closure {
    fn clone(&self) -> Self {
        ffi::g_closure_ref(self.ptr);
        Closure { ptr: self.ptr }
    }
}

impl Drop for Closure {
    fn drop(&mut self) {
        ffi::g_closure_unref(self.ptr);
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Closure").field(&self.ptr).finish()
    }
}
