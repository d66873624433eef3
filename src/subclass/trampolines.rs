//! The native entry points of a registered subclass, one set per Rust type.

use std::sync::Arc;

use glib_bridge_sys as ffi;
use tracing::{debug, trace, warn};

use super::class::{ClassSlots, ObjectClass};
use super::registry::{self, instance_handle, managed_chain, set_instance_handle};
use super::ObjectSubclass;
use crate::handle::{self, OpaqueHandle};
use crate::internal::guard::isolate;
use crate::object::Object;
use crate::param_spec::ParamSpec;
use crate::types::Type;
use crate::value::{ValueMut, ValueRef};

const HANDLE_SIZE: usize = std::mem::size_of::<u64>();

fn slots<T: ObjectSubclass>() -> ClassSlots {
    let hooks = T::hooks();
    ClassSlots {
        set_property: hooks
            .set_property
            .map(|_| set_property::<T> as ffi::GObjectSetPropertyFunc),
        get_property: hooks
            .property
            .map(|_| get_property::<T> as ffi::GObjectGetPropertyFunc),
        constructed: hooks.constructed.map(|_| constructed::<T> as ffi::GObjectFunc),
        finalize: finalize::<T>,
    }
}

/// The instance of `T` attached to `object` at `T`'s own level.
fn this<T: ObjectSubclass>(object: ffi::GObjectPtr) -> Option<Arc<T>> {
    let found = registry::instance_of::<T>(object);
    if found.is_none() {
        warn!(
            target: "glib_bridge::subclass",
            "{:?} has no {} instance attached", object, std::any::type_name::<T>()
        );
    }
    found
}

pub(crate) unsafe extern "C" fn class_init<T: ObjectSubclass>(class: ffi::GClassPtr, _data: usize) {
    isolate("class init", || {
        let mut class = ObjectClass::from_glib(class);
        let t = class.type_();
        let Some(entry) = registry::entry(t) else {
            warn!(target: "glib_bridge::subclass", "class init for unregistered type {}", t);
            return;
        };
        ffi::g_type_class_add_private(class.as_ptr(), HANDLE_SIZE);
        if let Err(e) = entry.extends.init_class(&class, &slots::<T>()) {
            warn!(target: "glib_bridge::subclass", "cannot patch class of {}: {}", t, e);
            return;
        }
        T::class_init(&mut class);
        debug!(target: "glib_bridge::subclass", type_ = %t, "class initialized");
    });
}

pub(crate) unsafe extern "C" fn instance_init<T: ObjectSubclass>(instance: ffi::GObjectPtr, class: ffi::GClassPtr) {
    isolate("instance init", || {
        let t = Type::from_glib(ffi::g_type_from_class(class));
        let handle = match handle::insert(T::new()) {
            Ok(h) => h,
            Err(e) => {
                warn!(target: "glib_bridge::subclass", "cannot attach instance to {:?}: {}", instance, e);
                return;
            }
        };
        if !set_instance_handle(instance, t, handle) {
            warn!(target: "glib_bridge::subclass", "{:?} has no private block for {}", instance, t);
            let _ = handle::release(handle);
            return;
        }
        if let Some(hook) = T::hooks().instance_init
            && let Ok(this) = handle::get_as::<T>(handle)
        {
            hook(&this, &Object::borrowed(instance));
        }
    });
}

unsafe extern "C" fn set_property<T: ObjectSubclass>(
    object: ffi::GObjectPtr,
    property_id: u32,
    value: *const ffi::GValue,
    pspec: ffi::GParamSpecPtr,
) {
    isolate("set_property", || {
        let (Some(hook), Some(raw)) = (T::hooks().set_property, unsafe { value.as_ref() }) else {
            return;
        };
        let Some(this) = this::<T>(object) else {
            return;
        };
        let Ok(pspec) = ParamSpec::from_glib_none(pspec) else {
            return;
        };
        let Some(index) = property_index(property_id, object) else {
            return;
        };
        hook(&this, &Object::borrowed(object), index, ValueRef::new(raw), &pspec);
    });
}

unsafe extern "C" fn get_property<T: ObjectSubclass>(
    object: ffi::GObjectPtr,
    property_id: u32,
    value: *mut ffi::GValue,
    pspec: ffi::GParamSpecPtr,
) {
    isolate("get_property", || {
        let (Some(hook), Some(mut slot)) = (T::hooks().property, unsafe { ValueMut::from_ptr(value) }) else {
            return;
        };
        let Some(this) = this::<T>(object) else {
            return;
        };
        let Ok(pspec) = ParamSpec::from_glib_none(pspec) else {
            return;
        };
        let Some(index) = property_index(property_id, object) else {
            return;
        };
        let result = hook(&this, &Object::borrowed(object), index, &pspec).and_then(|v| slot.set_value(&v));
        if let Err(e) = result {
            warn!(
                target: "glib_bridge::subclass",
                "reading property '{}' of {:?} failed: {}", pspec.name(), object, e
            );
        }
    });
}

/// Run `T`'s own constructed hook.
pub(crate) fn run_constructed_hook<T: ObjectSubclass>(object: ffi::GObjectPtr) {
    if let Some(hook) = T::hooks().constructed
        && let Some(this) = this::<T>(object)
    {
        hook(&this, &Object::borrowed(object));
    }
}

/// Run `T`'s finalize hook, then detach and release its instance.
pub(crate) fn finalize_level<T: ObjectSubclass>(object: ffi::GObjectPtr) {
    let Some(t) = registry::registered_type::<T>() else {
        return;
    };
    let Some(handle) = instance_handle(object, t) else {
        return;
    };
    if let Some(hook) = T::hooks().finalize
        && let Ok(this) = handle::get_as::<T>(handle)
    {
        isolate("finalize", || hook(&this, &Object::borrowed(object)));
    }
    set_instance_handle(object, t, OpaqueHandle::NULL);
    if let Err(e) = handle::release(handle) {
        warn!(target: "glib_bridge::subclass", "releasing instance of {:?} failed: {}", object, e);
    }
}

fn native_vtable(native: Option<Type>) -> Option<ffi::GObjectClassVTable> {
    let class = ObjectClass::of(native?)?;
    ffi::g_object_class_get_vtable(class.as_ptr())
}

unsafe extern "C" fn constructed<T: ObjectSubclass>(object: ffi::GObjectPtr) {
    let parent = isolate("constructed", || {
        let t = registry::registered_type::<T>()?;
        let (levels, native) = managed_chain(t);
        for level in levels.iter().rev() {
            isolate("constructed", || (level.constructed)(object));
        }
        native_vtable(native).and_then(|v| v.constructed)
    })
    .flatten();
    if let Some(parent) = parent {
        unsafe { parent(object) };
    }
}

unsafe extern "C" fn finalize<T: ObjectSubclass>(object: ffi::GObjectPtr) {
    let parent = isolate("finalize", || {
        let t = registry::registered_type::<T>()?;
        let (levels, native) = managed_chain(t);
        for level in &levels {
            trace!(target: "glib_bridge::subclass", ?object, type_ = %level.type_, "finalizing level");
            isolate("finalize", || (level.finalize)(object));
        }
        let parent = native_vtable(native).and_then(|v| v.finalize);
        if parent.is_none() {
            warn!(target: "glib_bridge::subclass", "{:?} has no native finalize to chain to", object);
        }
        parent
    })
    .flatten();
    if let Some(parent) = parent {
        unsafe { parent(object) };
    }
}

/// The managed property slot for a native property id. Ids start at 1.
fn property_index(property_id: u32, object: ffi::GObjectPtr) -> Option<usize> {
    if property_id == 0 {
        warn!(target: "glib_bridge::subclass", "{:?}: ignoring access to property id 0", object);
        return None;
    }
    Some(property_id as usize - 1)
}
