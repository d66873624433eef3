//! The process-wide table of registered subclasses.
//!
//! Lookups go through the read lock; native registration is serialized by a
//! separate mutex so the table lock is never held while the type system runs
//! class or interface initializers.

use std::any::TypeId;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use glib_bridge_sys as ffi;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::class::{Extends, Interface, ObjectClass, TypeInstance};
use super::trampolines;
use super::ObjectSubclass;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::{self, OpaqueHandle};
use crate::internal::guard::isolate;
use crate::types::Type;

/// Per-level entry points used when walking a managed hierarchy.
pub(crate) struct SubclassEntry {
    pub(crate) type_: Type,
    pub(crate) extends: Arc<dyn Extends>,
    /// Runs this level's `constructed` hook only.
    pub(crate) constructed: fn(ffi::GObjectPtr),
    /// Runs this level's `finalize` hook and releases its instance.
    pub(crate) finalize: fn(ffi::GObjectPtr),
}

#[derive(Default)]
struct SubclassRegistry {
    by_rust_type: FxHashMap<TypeId, Type>,
    by_type: FxHashMap<Type, Arc<SubclassEntry>>,
}

static REGISTRY: OnceLock<RwLock<SubclassRegistry>> = OnceLock::new();
static REGISTRATION: Mutex<()> = Mutex::new(());

fn global() -> &'static RwLock<SubclassRegistry> {
    REGISTRY.get_or_init(|| RwLock::new(SubclassRegistry::default()))
}

/// The type registered for `T`, if any.
pub fn registered_type<T: ObjectSubclass>() -> Option<Type> {
    global()
        .read()
        .ok()?
        .by_rust_type
        .get(&TypeId::of::<T>())
        .copied()
}

pub(crate) fn entry(t: Type) -> Option<Arc<SubclassEntry>> {
    global().read().ok()?.by_type.get(&t).cloned()
}

/// The managed levels of `t`'s hierarchy, most derived first, and the
/// nearest native ancestor.
pub(crate) fn managed_chain(t: Type) -> (Vec<Arc<SubclassEntry>>, Option<Type>) {
    let mut levels = Vec::new();
    let mut current = Some(t);
    while let Some(level) = current {
        match entry(level) {
            Some(e) => levels.push(e),
            None => return (levels, Some(level)),
        }
        current = level.parent();
    }
    (levels, None)
}

/// The handle a level's private block holds.
pub(crate) fn instance_handle(object: ffi::GObjectPtr, t: Type) -> Option<OpaqueHandle> {
    let mut buf = [0u8; 8];
    if !ffi::g_type_instance_private_read(object, t.into_glib(), &mut buf) {
        return None;
    }
    let handle = OpaqueHandle::from_raw(u64::from_ne_bytes(buf));
    (!handle.is_null()).then_some(handle)
}

pub(crate) fn set_instance_handle(object: ffi::GObjectPtr, t: Type, handle: OpaqueHandle) -> bool {
    ffi::g_type_instance_private_write(object, t.into_glib(), &handle.as_raw().to_ne_bytes())
}

/// The Rust instance of `T` attached to `object`.
pub(crate) fn instance_of<T: ObjectSubclass>(object: ffi::GObjectPtr) -> Option<Arc<T>> {
    let t = registered_type::<T>()?;
    let handle = instance_handle(object, t)?;
    handle::get_as::<T>(handle).ok()
}

struct InterfaceBinding {
    interface: Arc<dyn Interface>,
}

unsafe extern "C" fn interface_init_trampoline(iface: ffi::GInterfacePtr, data: usize) {
    isolate("interface init", || {
        let Ok(binding) = handle::get_as::<InterfaceBinding>(OpaqueHandle::from_usize(data)) else {
            return;
        };
        let owner = Type::from_glib(ffi::g_type_interface_instance_type(iface));
        let class = ObjectClass::from_glib(ffi::g_type_class_peek(owner.into_glib()));
        binding.interface.init(&TypeInstance {
            type_: owner,
            interface: iface,
            class,
        });
    });
}

/// Register `T` as a subtype of `extends`' parent, implementing
/// `interfaces`.
///
/// Registering the same Rust type again returns the existing type without
/// touching the type system.
pub fn register_type<T: ObjectSubclass>(
    name: &str,
    extends: impl Extends,
    interfaces: Vec<Arc<dyn Interface>>,
) -> BridgeResult<Type> {
    if let Some(t) = registered_type::<T>() {
        return Ok(t);
    }
    let _serial = REGISTRATION.lock()?;
    if let Some(t) = registered_type::<T>() {
        return Ok(t);
    }

    let parent = extends.parent_type();
    if !parent.is_a(Type::OBJECT) {
        return Err(BridgeError::registration(
            name,
            format!("parent {} is not an object type", parent),
        ));
    }
    let info = ffi::GTypeInfo {
        class_size: extends.class_size(),
        class_init: Some(trampolines::class_init::<T>),
        class_data: 0,
        instance_size: extends.instance_size(),
        instance_init: Some(trampolines::instance_init::<T>),
    };
    let t = Type::from_glib(ffi::g_type_register_static(parent.into_glib(), name, &info, 0));
    if !t.is_valid() {
        return Err(BridgeError::registration(name, "rejected by the type system"));
    }

    let entry = SubclassEntry {
        type_: t,
        extends: Arc::new(extends),
        constructed: trampolines::run_constructed_hook::<T>,
        finalize: trampolines::finalize_level::<T>,
    };
    {
        let mut registry = global().write()?;
        registry.by_rust_type.insert(TypeId::of::<T>(), t);
        registry.by_type.insert(t, Arc::new(entry));
    }

    for interface in interfaces {
        let iface_type = interface.type_();
        let binding = handle::insert(InterfaceBinding { interface })?;
        ffi::g_type_add_interface_static(
            t.into_glib(),
            iface_type.into_glib(),
            &ffi::GInterfaceInfo {
                interface_init: Some(interface_init_trampoline),
                interface_data: binding.as_usize(),
            },
        );
    }

    debug!(target: "glib_bridge::subclass", name, %parent, type_id = ?t, "registered subclass");
    Ok(t)
}

/// Register a new interface type.
pub fn register_interface_type(name: &str) -> BridgeResult<Type> {
    let t = Type::from_glib(ffi::g_type_register_static(
        ffi::G_TYPE_INTERFACE,
        name,
        &ffi::GTypeInfo::default(),
        0,
    ));
    if t.is_valid() {
        Ok(t)
    } else {
        Err(BridgeError::registration(name, "rejected by the type system"))
    }
}
