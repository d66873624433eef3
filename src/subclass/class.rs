use glib_bridge_sys as ffi;

use crate::error::{BridgeError, BridgeResult};
use crate::param_spec::ParamSpec;
use crate::types::Type;

/// An initialized object class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectClass {
    ptr: ffi::GClassPtr,
}

impl ObjectClass {
    pub(crate) fn from_glib(ptr: ffi::GClassPtr) -> Self {
        Self { ptr }
    }

    /// The class of `t`, initializing it on first use.
    pub fn of(t: Type) -> Option<ObjectClass> {
        let ptr = ffi::g_type_class_ref(t.into_glib());
        (!ptr.is_null()).then_some(ObjectClass { ptr })
    }

    pub fn as_ptr(&self) -> ffi::GClassPtr {
        self.ptr
    }

    pub fn type_(&self) -> Type {
        Type::from_glib(ffi::g_type_from_class(self.ptr))
    }

    pub fn parent(&self) -> Option<ObjectClass> {
        let ptr = ffi::g_type_class_peek_parent(self.ptr);
        (!ptr.is_null()).then_some(ObjectClass { ptr })
    }

    /// Install `pspecs` with ids `1..=n` in list order. Property hooks
    /// receive the 0-based position.
    pub fn install_properties(&mut self, pspecs: &[ParamSpec]) -> BridgeResult<()> {
        for (idx, pspec) in pspecs.iter().enumerate() {
            self.install_property(idx as u32 + 1, pspec)?;
        }
        Ok(())
    }

    pub fn install_property(&mut self, property_id: u32, pspec: &ParamSpec) -> BridgeResult<()> {
        if ffi::g_object_class_install_property(self.ptr, property_id, pspec.as_ptr()) {
            Ok(())
        } else {
            Err(BridgeError::registration(
                &pspec.name(),
                format!("cannot install property {} on {}", property_id, self.type_()),
            ))
        }
    }

    /// Find a property on this class or an ancestor.
    pub fn find_property(&self, name: &str) -> Option<ParamSpec> {
        let ptr = ffi::g_object_class_find_property(self.ptr, name);
        ParamSpec::from_glib_none(ptr).ok()
    }

    pub fn list_properties(&self) -> Vec<ParamSpec> {
        ffi::g_object_class_list_properties(self.ptr)
            .into_iter()
            .filter_map(|p| ParamSpec::from_glib_none(p).ok())
            .collect()
    }
}

/// The trampolines selected for a subclass. Finalize is always present.
#[derive(Clone, Copy)]
pub struct ClassSlots {
    pub set_property: Option<ffi::GObjectSetPropertyFunc>,
    pub get_property: Option<ffi::GObjectGetPropertyFunc>,
    pub constructed: Option<ffi::GObjectFunc>,
    pub finalize: ffi::GObjectFunc,
}

impl ClassSlots {
    /// Overwrite the selected slots of `class`'s vtable.
    pub fn patch(&self, class: &ObjectClass) -> BridgeResult<()> {
        let mut vtable = ffi::g_object_class_get_vtable(class.as_ptr()).ok_or(BridgeError::InvalidInstance)?;
        if let Some(set) = self.set_property {
            vtable.set_property = Some(set);
        }
        if let Some(get) = self.get_property {
            vtable.get_property = Some(get);
        }
        if let Some(constructed) = self.constructed {
            vtable.constructed = Some(constructed);
        }
        vtable.finalize = Some(self.finalize);
        if ffi::g_object_class_set_vtable(class.as_ptr(), vtable) {
            Ok(())
        } else {
            Err(BridgeError::InvalidInstance)
        }
    }
}

/// The native base a subclass derives from.
pub trait Extends: Send + Sync + 'static {
    fn parent_type(&self) -> Type;

    fn class_size(&self) -> u16 {
        0
    }

    fn instance_size(&self) -> u16 {
        0
    }

    /// Route the class's vtable into the subclass.
    fn init_class(&self, class: &ObjectClass, slots: &ClassSlots) -> BridgeResult<()> {
        slots.patch(class)
    }
}

/// Derive from `GObject`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendsObject;

impl Extends for ExtendsObject {
    fn parent_type(&self) -> Type {
        Type::OBJECT
    }

    fn class_size(&self) -> u16 {
        136
    }

    fn instance_size(&self) -> u16 {
        24
    }
}

/// Derive from `GInitiallyUnowned`: new instances start floating.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtendsInitiallyUnowned;

impl Extends for ExtendsInitiallyUnowned {
    fn parent_type(&self) -> Type {
        Type::INITIALLY_UNOWNED
    }

    fn class_size(&self) -> u16 {
        136
    }

    fn instance_size(&self) -> u16 {
        24
    }
}

/// Derive from another registered or native object type.
impl Extends for Type {
    fn parent_type(&self) -> Type {
        *self
    }
}

/// What an interface initializer gets to work with.
#[derive(Debug, Clone, Copy)]
pub struct TypeInstance {
    /// The type implementing the interface.
    pub type_: Type,
    pub interface: ffi::GInterfacePtr,
    pub class: ObjectClass,
}

/// An interface a subclass implements.
pub trait Interface: Send + Sync + 'static {
    fn type_(&self) -> Type;

    fn init(&self, instance: &TypeInstance);
}
