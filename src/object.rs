//! Native object references and the ownership bridge.
//!
//! An [`Object`] owns exactly one strong reference to a native instance and
//! releases it on drop. How that reference was obtained decides the
//! constructor:
//!
//! - [`Object::adopt`]: the pointer came with no ownership (transfer-none).
//!   A floating reference is sunk, otherwise a new reference is taken.
//! - [`Object::adopt_transfer_full`]: the caller already owns a reference
//!   and hands it over.
//!
//! The drop path checks the instance is still alive before releasing, so an
//! `Object` outliving a force-finalized instance never double-releases.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use glib_bridge_sys as ffi;
use tracing::warn;

use crate::error::{BridgeError, BridgeResult};
use crate::param_spec::{ParamFlags, ParamSpec};
use crate::subclass::{ObjectClass, ObjectSubclass};
use crate::types::Type;
use crate::value::{AnyValue, FromValue, ToValue, Value, marshal};

pub struct Object {
    ptr: ffi::GObjectPtr,
    owned: bool,
}

thread_local! {
    static ORIGINAL_OWNERSHIP: RefCell<Vec<ffi::GObjectPtr>> = const { RefCell::new(Vec::new()) };
}

/// Puts back the floating or owned state of an instance and ends its
/// [`Object::with_original_ownership`] scope, also when the body unwinds.
struct OwnershipRestore {
    ptr: ffi::GObjectPtr,
    was_floating: bool,
}

impl Drop for OwnershipRestore {
    fn drop(&mut self) {
        if self.was_floating {
            ffi::g_object_force_floating(self.ptr);
        } else {
            ffi::g_object_unref(self.ptr);
        }
        let _ = ORIGINAL_OWNERSHIP.try_with(|active| active.borrow_mut().retain(|p| *p != self.ptr));
    }
}

fn check_instance(ptr: ffi::GObjectPtr) -> BridgeResult<()> {
    if ptr.is_null() {
        return Err(BridgeError::NullPointer);
    }
    if !ffi::g_is_object(ptr) {
        return Err(BridgeError::InvalidInstance);
    }
    Ok(())
}

impl Object {
    /// Create an instance of `t` with construct properties.
    ///
    /// A floating result (a `GInitiallyUnowned` subtype) is sunk, so the
    /// returned object always holds a normal reference.
    pub fn new(t: Type, properties: &[(&str, &dyn ToValue)]) -> BridgeResult<Object> {
        if !t.is_a(Type::OBJECT) {
            return Err(BridgeError::type_mismatch("GObject", t.name()));
        }
        let class = ffi::g_type_class_ref(t.into_glib());
        if class.is_null() {
            return Err(BridgeError::InvalidInstance);
        }

        let mut names = Vec::with_capacity(properties.len());
        let mut values = Vec::with_capacity(properties.len());
        for (name, value) in properties {
            let pspec = ffi::g_object_class_find_property(class, name);
            if pspec.is_null() {
                return Err(BridgeError::PropertyNotFound {
                    name: name.to_string(),
                });
            }
            let expected = Type::from_glib(ffi::g_param_spec_value_type(pspec));
            let value = value.to_value()?;
            if !value.value_type().is_a(expected) {
                return Err(BridgeError::type_mismatch(expected.name(), value.type_name()));
            }
            names.push(*name);
            values.push(value);
        }

        let mut values: Vec<ffi::GValue> = values.into_iter().map(Value::into_raw).collect();
        let ptr = ffi::g_object_new_with_properties(t.into_glib(), &names, &values);
        for value in &mut values {
            ffi::g_value_unset(value);
        }
        if ptr.is_null() {
            return Err(BridgeError::AllocationFailed {
                what: format!("instance of {}", t),
            });
        }
        if ffi::g_object_is_floating(ptr) {
            ffi::g_object_ref_sink(ptr);
        }
        Ok(Object { ptr, owned: true })
    }

    /// Take ownership of a transfer-none pointer: sink a floating reference,
    /// or take a new one.
    pub fn adopt(ptr: ffi::GObjectPtr) -> BridgeResult<Object> {
        check_instance(ptr)?;
        if ffi::g_object_is_floating(ptr) {
            ffi::g_object_ref_sink(ptr);
        } else {
            ffi::g_object_ref(ptr);
        }
        Ok(Object { ptr, owned: true })
    }

    /// Take over a reference the caller already owns.
    pub fn adopt_transfer_full(ptr: ffi::GObjectPtr) -> BridgeResult<Object> {
        check_instance(ptr)?;
        Ok(Object { ptr, owned: true })
    }

    pub(crate) fn from_glib_none(ptr: ffi::GObjectPtr) -> BridgeResult<Object> {
        Object::adopt(ptr)
    }

    /// A view that takes and releases no reference. Used on instances whose
    /// lifetime is managed by the caller, such as one being finalized.
    pub(crate) fn borrowed(ptr: ffi::GObjectPtr) -> Object {
        Object { ptr, owned: false }
    }

    pub fn as_ptr(&self) -> ffi::GObjectPtr {
        self.ptr
    }

    /// Run `f` holding a strong reference, then restore the floating or
    /// owned state the instance had before.
    ///
    /// Not safe against other threads changing the reference state while
    /// `f` runs. Nested calls for the same instance on one thread run `f`
    /// directly.
    pub fn with_original_ownership<R>(&self, f: impl FnOnce() -> R) -> R {
        let nested = ORIGINAL_OWNERSHIP.with(|active| {
            let mut active = active.borrow_mut();
            if active.contains(&self.ptr) {
                return true;
            }
            active.push(self.ptr);
            false
        });
        if nested {
            return f();
        }

        let _restore = OwnershipRestore {
            ptr: self.ptr,
            was_floating: ffi::g_object_is_floating(self.ptr),
        };
        ffi::g_object_ref_sink(self.ptr);
        f()
    }

    // ========== INTROSPECTION ==========

    pub fn type_(&self) -> Type {
        Type::from_glib(ffi::g_type_from_instance(self.ptr))
    }

    pub fn is_a(&self, t: Type) -> bool {
        self.type_().is_a(t)
    }

    pub fn class(&self) -> ObjectClass {
        ObjectClass::from_glib(ffi::g_object_get_class(self.ptr))
    }

    pub fn ref_count(&self) -> u32 {
        ffi::g_object_ref_count(self.ptr)
    }

    pub fn is_floating(&self) -> bool {
        ffi::g_object_is_floating(self.ptr)
    }

    /// Whether the native instance is still alive.
    pub fn is_valid(&self) -> bool {
        ffi::g_is_object(self.ptr)
    }

    pub fn interfaces(&self) -> Vec<Type> {
        self.type_().interfaces()
    }

    /// The Rust instance of subclass `T` attached to this object, if the
    /// object is (or derives from) a registered `T`.
    pub fn instance<T: ObjectSubclass>(&self) -> Option<Arc<T>> {
        crate::subclass::instance_of::<T>(self.ptr)
    }

    /// Decode this object with the most specific marshaler registered for
    /// its type or one of its ancestors.
    pub fn natural_value(&self) -> BridgeResult<AnyValue> {
        let own = self.type_();
        let mut t = Some(own);
        while let Some(current) = t {
            if let Ok(marshal) = marshal::lookup_exact(current) {
                let value = self.to_value()?;
                return marshal(value.as_raw());
            }
            t = current.parent();
        }
        Err(BridgeError::NoMarshaler(own))
    }

    // ========== PROPERTIES ==========

    pub fn find_property(&self, name: &str) -> Option<ParamSpec> {
        self.class().find_property(name)
    }

    pub fn list_properties(&self) -> Vec<ParamSpec> {
        self.class().list_properties()
    }

    fn writable_property(&self, name: &str) -> BridgeResult<ParamSpec> {
        let pspec = self.find_property(name).ok_or_else(|| BridgeError::PropertyNotFound {
            name: name.to_string(),
        })?;
        if !pspec.flags().contains(ParamFlags::WRITABLE) {
            return Err(BridgeError::ArgumentMismatch {
                message: format!("property '{}' is not writable", pspec.name()),
            });
        }
        Ok(pspec)
    }

    pub fn property_type(&self, name: &str) -> BridgeResult<Type> {
        self.find_property(name)
            .map(|p| p.value_type())
            .ok_or_else(|| BridgeError::PropertyNotFound {
                name: name.to_string(),
            })
    }

    pub fn set_property(&self, name: &str, value: &dyn ToValue) -> BridgeResult<()> {
        let value = value.to_value()?;
        self.set_property_value(name, &value)
    }

    pub fn set_property_value(&self, name: &str, value: &Value) -> BridgeResult<()> {
        let pspec = self.writable_property(name)?;
        if !value.value_type().is_a(pspec.value_type()) {
            return Err(BridgeError::type_mismatch(
                pspec.value_type().name(),
                value.type_name(),
            ));
        }
        if !ffi::g_object_set_property(self.ptr, name, value.as_raw()) {
            return Err(BridgeError::ArgumentMismatch {
                message: format!("property '{}' rejected the value", pspec.name()),
            });
        }
        Ok(())
    }

    pub fn property(&self, name: &str) -> BridgeResult<Value> {
        let pspec = self.find_property(name).ok_or_else(|| BridgeError::PropertyNotFound {
            name: name.to_string(),
        })?;
        if !pspec.flags().contains(ParamFlags::READABLE) {
            return Err(BridgeError::ArgumentMismatch {
                message: format!("property '{}' is not readable", pspec.name()),
            });
        }
        let mut value = Value::new(pspec.value_type())?;
        if !ffi::g_object_get_property(self.ptr, name, value.as_raw_mut()) {
            return Err(BridgeError::InvalidInstance);
        }
        Ok(value)
    }

    /// Read a property as a typed Rust value.
    pub fn property_as<T: FromValue>(&self, name: &str) -> BridgeResult<T> {
        self.property(name)?.get::<T>()
    }

    /// Read a property through the marshaler registry.
    pub fn property_managed(&self, name: &str) -> BridgeResult<AnyValue> {
        self.property(name)?.to_managed()
    }

    pub fn notify(&self, name: &str) -> BridgeResult<()> {
        let pspec = self.find_property(name).ok_or_else(|| BridgeError::PropertyNotFound {
            name: name.to_string(),
        })?;
        ffi::g_object_notify_by_pspec(self.ptr, pspec.as_ptr());
        Ok(())
    }
}

// ========== POINTER-SCOPED OWNERSHIP ==========

/// Run `f` on a pointer whose reference state must be left as found.
pub fn with_pointer_transfer_original<R>(
    ptr: ffi::GObjectPtr,
    f: impl FnOnce(&Object) -> R,
) -> BridgeResult<R> {
    check_instance(ptr)?;
    let object = Object::borrowed(ptr);
    Ok(object.with_original_ownership(|| f(&object)))
}

/// Run `f` on a transfer-none pointer, holding a reference for the call.
pub fn with_pointer_transfer_none<R>(
    ptr: ffi::GObjectPtr,
    f: impl FnOnce(&Object) -> R,
) -> BridgeResult<R> {
    let object = Object::adopt(ptr)?;
    Ok(f(&object))
}

/// Run `f` on a transfer-full pointer, releasing that reference afterwards.
pub fn with_pointer_transfer_full<R>(
    ptr: ffi::GObjectPtr,
    f: impl FnOnce(&Object) -> R,
) -> BridgeResult<R> {
    let object = Object::adopt_transfer_full(ptr)?;
    Ok(f(&object))
}

impl Clone for Object {
    fn clone(&self) -> Self {
        ffi::g_object_ref(self.ptr);
        Object {
            ptr: self.ptr,
            owned: true,
        }
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        if !self.owned {
            return;
        }
        if ffi::g_is_object(self.ptr) {
            ffi::g_object_unref(self.ptr);
        } else {
            warn!(
                target: "glib_bridge::handle",
                "object {:?} was finalized before its owner released it", self.ptr
            );
        }
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("ptr", &self.ptr)
            .field("type", &self.type_())
            .finish()
    }
}

impl ToValue for Object {
    fn value_type(&self) -> Type {
        self.type_()
    }

    fn to_value(&self) -> BridgeResult<Value> {
        let mut value = Value::new(self.type_())?;
        value.set_object(Some(self))?;
        Ok(value)
    }
}

impl FromValue for Object {
    fn from_value(value: &ffi::GValue) -> BridgeResult<Self> {
        if !matches!(value.data(), ffi::GValueData::Object(_)) {
            return Err(BridgeError::type_mismatch(
                "object",
                Type::from_glib(value.value_type()).name(),
            ));
        }
        Object::adopt(value.get_object())
    }
}

impl FromValue for Option<Object> {
    fn from_value(value: &ffi::GValue) -> BridgeResult<Self> {
        match value.data() {
            ffi::GValueData::Object(p) if p.is_null() => Ok(None),
            ffi::GValueData::Pointer(0) => Ok(None),
            _ => Object::from_value(value).map(Some),
        }
    }
}
