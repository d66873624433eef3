//! The dynamic value container.
//!
//! [`Value`] owns one native tagged value and releases it deterministically:
//! [`Value::unset`] is the single-shot release, and `Drop` runs it as a
//! backstop. Values owned by native code are accessed through the borrowed
//! views [`ValueRef`] and [`ValueMut`].

mod convert;
pub mod marshal;

pub use convert::{EnumValue, FlagsValue, FromValue, Pointer, ToValue, Variant};
pub use marshal::AnyValue;

use std::fmt;

use glib_bridge_sys as ffi;

use crate::error::{BridgeError, BridgeResult};
use crate::object::Object;
use crate::param_spec::ParamSpec;
use crate::types::Type;

pub struct Value {
    inner: ffi::GValue,
}

macro_rules! typed_setters {
    ($( $(#[$meta:meta])* $name:ident($ty:ty) => $raw:ident; )*) => {
        $(
            $(#[$meta])*
            pub fn $name(&mut self, v: $ty) -> BridgeResult<()> {
                if self.inner.$raw(v) {
                    Ok(())
                } else {
                    Err(self.kind_mismatch(stringify!($ty)))
                }
            }
        )*
    };
}

impl Value {
    /// A zeroed value of type `t`. Fails for types that cannot be stored in
    /// a value (`INVALID`, `NONE`, unregistered ids).
    pub fn new(t: Type) -> BridgeResult<Value> {
        let mut inner = ffi::GValue::new();
        if !ffi::g_value_init(&mut inner, t.into_glib()) {
            return Err(BridgeError::unsupported(t.name()));
        }
        Ok(Value { inner })
    }

    /// A null `POINTER` value, the encoding of an absent value.
    pub fn null() -> Value {
        let mut inner = ffi::GValue::new();
        ffi::g_value_init(&mut inner, ffi::G_TYPE_POINTER);
        Value { inner }
    }

    /// Take ownership of a native value.
    pub fn from_raw(inner: ffi::GValue) -> Value {
        Value { inner }
    }

    /// Hand the native value, and the references it holds, to the caller.
    pub fn into_raw(mut self) -> ffi::GValue {
        std::mem::take(&mut self.inner)
    }

    pub fn as_raw(&self) -> &ffi::GValue {
        &self.inner
    }

    pub fn as_raw_mut(&mut self) -> &mut ffi::GValue {
        &mut self.inner
    }

    pub fn value_type(&self) -> Type {
        Type::from_glib(self.inner.value_type())
    }

    pub fn fundamental(&self) -> Type {
        self.value_type().fundamental()
    }

    pub fn type_name(&self) -> String {
        self.value_type().name()
    }

    /// `false` once the value was released.
    pub fn is_valid(&self) -> bool {
        ffi::g_is_value(&self.inner)
    }

    /// Release the payload. Further calls are no-ops.
    pub fn unset(&mut self) {
        ffi::g_value_unset(&mut self.inner);
    }

    /// A copy holding its own references.
    pub fn duplicate(&self) -> BridgeResult<Value> {
        ValueRef::new(&self.inner).duplicate()
    }

    /// Exact-width typed extraction.
    pub fn get<T: FromValue>(&self) -> BridgeResult<T> {
        T::from_value(&self.inner)
    }

    /// Convert through the marshaler registry.
    pub fn to_managed(&self) -> BridgeResult<AnyValue> {
        marshal::from_value(&self.inner)
    }

    fn kind_mismatch(&self, wanted: &str) -> BridgeError {
        BridgeError::type_mismatch(wanted, self.type_name())
    }

    typed_setters! {
        set_bool(bool) => set_boolean;
        set_i8(i8) => set_schar;
        set_u8(u8) => set_uchar;
        set_i32(i32) => set_int;
        set_u32(u32) => set_uint;
        /// Store into a `LONG` value.
        set_long(i64) => set_long;
        /// Store into a `ULONG` value.
        set_ulong(u64) => set_ulong;
        set_i64(i64) => set_int64;
        set_u64(u64) => set_uint64;
        set_f32(f32) => set_float;
        set_f64(f64) => set_double;
        set_enum(i32) => set_enum;
        set_flags(u32) => set_flags;
        set_pointer(usize) => set_pointer;
    }

    pub fn set_string(&mut self, v: Option<&str>) -> BridgeResult<()> {
        if self.inner.set_string(v) {
            Ok(())
        } else {
            Err(self.kind_mismatch("string"))
        }
    }

    pub fn set_variant(&mut self, v: Option<&str>) -> BridgeResult<()> {
        if self.inner.set_variant(v) {
            Ok(())
        } else {
            Err(self.kind_mismatch("variant"))
        }
    }

    /// Store `object`, taking a new reference. `None` clears the slot.
    pub fn set_object(&mut self, object: Option<&Object>) -> BridgeResult<()> {
        let ptr = object.map_or(ffi::GObjectPtr::NULL, Object::as_ptr);
        if ffi::g_value_set_object(&mut self.inner, ptr) {
            Ok(())
        } else {
            Err(self.kind_mismatch("object"))
        }
    }

    pub fn set_param(&mut self, pspec: &ParamSpec) -> BridgeResult<()> {
        if ffi::g_value_set_param(&mut self.inner, pspec.as_ptr()) {
            Ok(())
        } else {
            Err(self.kind_mismatch("param spec"))
        }
    }

    /// Store a copy of the boxed payload at `boxed`.
    pub fn set_boxed(&mut self, boxed: usize) -> BridgeResult<()> {
        if ffi::g_value_set_boxed(&mut self.inner, boxed) {
            Ok(())
        } else {
            Err(self.kind_mismatch("boxed"))
        }
    }

    /// Store the boxed payload at `boxed`, taking ownership of it.
    pub fn take_boxed(&mut self, boxed: usize) -> BridgeResult<()> {
        if ffi::g_value_take_boxed(&mut self.inner, boxed) {
            Ok(())
        } else {
            Err(self.kind_mismatch("boxed"))
        }
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        self.unset();
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.value_type())
            .field("data", self.inner.data())
            .finish()
    }
}

// ========== BORROWED VIEWS ==========

/// A read-only view of a value owned by native code.
#[derive(Clone, Copy)]
pub struct ValueRef<'a> {
    raw: &'a ffi::GValue,
}

impl<'a> ValueRef<'a> {
    pub fn new(raw: &'a ffi::GValue) -> Self {
        Self { raw }
    }

    /// # Safety
    /// `ptr` must be null or point to a value that outlives `'a`.
    pub unsafe fn from_ptr(ptr: *const ffi::GValue) -> Option<Self> {
        unsafe { ptr.as_ref() }.map(Self::new)
    }

    pub fn as_raw(&self) -> &'a ffi::GValue {
        self.raw
    }

    pub fn value_type(&self) -> Type {
        Type::from_glib(self.raw.value_type())
    }

    pub fn get<T: FromValue>(&self) -> BridgeResult<T> {
        T::from_value(self.raw)
    }

    pub fn to_managed(&self) -> BridgeResult<AnyValue> {
        marshal::from_value(self.raw)
    }

    /// An owned copy holding its own references.
    pub fn duplicate(&self) -> BridgeResult<Value> {
        let mut copy = Value::new(self.value_type())?;
        if !ffi::g_value_copy(self.raw, &mut copy.inner) {
            return Err(BridgeError::type_mismatch(
                copy.type_name(),
                self.value_type().name(),
            ));
        }
        Ok(copy)
    }
}

impl fmt::Debug for ValueRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueRef").field(self.raw.data()).finish()
    }
}

/// A writable view of a value owned by native code, such as a return slot.
pub struct ValueMut<'a> {
    raw: &'a mut ffi::GValue,
}

impl<'a> ValueMut<'a> {
    pub fn new(raw: &'a mut ffi::GValue) -> Self {
        Self { raw }
    }

    /// # Safety
    /// `ptr` must be null or point to a value that outlives `'a` and is not
    /// aliased for that lifetime.
    pub unsafe fn from_ptr(ptr: *mut ffi::GValue) -> Option<Self> {
        unsafe { ptr.as_mut() }.map(Self::new)
    }

    pub fn value_type(&self) -> Type {
        Type::from_glib(self.raw.value_type())
    }

    pub fn get<T: FromValue>(&self) -> BridgeResult<T> {
        T::from_value(self.raw)
    }

    pub fn as_value_ref(&self) -> ValueRef<'_> {
        ValueRef::new(self.raw)
    }

    /// Copy `value` into the slot. An uninitialized slot takes `value`'s
    /// type; an initialized one must be compatible.
    pub fn set_value(&mut self, value: &Value) -> BridgeResult<()> {
        if !self.raw.is_initialized() && !ffi::g_value_init(self.raw, value.inner.value_type()) {
            return Err(BridgeError::unsupported(value.type_name()));
        }
        if ffi::g_value_copy(&value.inner, self.raw) {
            Ok(())
        } else {
            Err(BridgeError::type_mismatch(
                self.value_type().name(),
                value.type_name(),
            ))
        }
    }

    /// Convert `v` and copy it into the slot.
    pub fn set<T: ToValue + ?Sized>(&mut self, v: &T) -> BridgeResult<()> {
        let value = v.to_value()?;
        self.set_value(&value)
    }
}

impl fmt::Debug for ValueMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueMut").field(self.raw.data()).finish()
    }
}
