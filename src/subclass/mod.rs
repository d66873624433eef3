//! Implementing native object types in Rust.
//!
//! A type implementing [`ObjectSubclass`] is registered with
//! [`register_type`]. Every native instance of the registered type then owns
//! one Rust instance, created by [`ObjectSubclass::new`] during instance
//! initialization and parked in the handle registry. The handle lives in the
//! instance's private block and is released when the instance is finalized.
//!
//! The class vtable is patched only for the hooks the type provides through
//! [`ObjectSubclass::hooks`]; finalize is always patched so the handle is
//! released.
//!
//! ```ignore
//! struct Counter {
//!     count: AtomicI32,
//! }
//!
//! impl ObjectSubclass for Counter {
//!     fn new() -> Self {
//!         Counter { count: AtomicI32::new(0) }
//!     }
//!
//!     fn class_init(class: &mut ObjectClass) {
//!         let count = ParamSpec::int("count", "Count", "", 0, 100, 0, ParamFlags::READWRITE).unwrap();
//!         class.install_properties(&[count]).unwrap();
//!     }
//!
//!     fn hooks() -> Hooks<Self> {
//!         Hooks {
//!             set_property: Some(|this, _, _, value, _| {
//!                 this.count.store(value.get::<i32>().unwrap_or(0), Ordering::SeqCst);
//!             }),
//!             property: Some(|this, _, _, _| this.count.load(Ordering::SeqCst).to_value()),
//!             ..Hooks::default()
//!         }
//!     }
//! }
//!
//! let t = register_type::<Counter>("Counter", ExtendsObject, Vec::new())?;
//! ```

mod class;
mod registry;
mod trampolines;

pub use class::{ClassSlots, Extends, ExtendsInitiallyUnowned, ExtendsObject, Interface, ObjectClass, TypeInstance};
pub use registry::{register_interface_type, register_type, registered_type};

pub(crate) use registry::instance_of;

use std::fmt;

use crate::error::BridgeResult;
use crate::object::Object;
use crate::param_spec::ParamSpec;
use crate::value::{Value, ValueRef};

/// Stores a property. The index is the property's position in the list
/// given to [`ObjectClass::install_properties`].
pub type SetPropertyFn<T> = fn(&T, &Object, usize, ValueRef<'_>, &ParamSpec);

/// Reads a property. An error leaves the caller's value untouched.
pub type GetPropertyFn<T> = fn(&T, &Object, usize, &ParamSpec) -> BridgeResult<Value>;

pub type ObjectHookFn<T> = fn(&T, &Object);

/// The optional behaviors of a subclass. A `None` slot keeps the parent
/// class's implementation.
pub struct Hooks<T> {
    pub set_property: Option<SetPropertyFn<T>>,
    pub property: Option<GetPropertyFn<T>>,
    /// Runs right after [`ObjectSubclass::new`], before construct properties
    /// are set.
    pub instance_init: Option<ObjectHookFn<T>>,
    pub constructed: Option<ObjectHookFn<T>>,
    /// Runs before the Rust instance is released and before the parent
    /// type's finalize.
    pub finalize: Option<ObjectHookFn<T>>,
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self {
            set_property: None,
            property: None,
            instance_init: None,
            constructed: None,
            finalize: None,
        }
    }
}

impl<T> Clone for Hooks<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Hooks<T> {}

impl<T> fmt::Debug for Hooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("set_property", &self.set_property.is_some())
            .field("property", &self.property.is_some())
            .field("instance_init", &self.instance_init.is_some())
            .field("constructed", &self.constructed.is_some())
            .field("finalize", &self.finalize.is_some())
            .finish()
    }
}

/// A Rust type backing a native object type.
///
/// Instances are shared between threads through the handle registry, so
/// state that hooks mutate needs interior mutability.
pub trait ObjectSubclass: Send + Sync + Sized + 'static {
    fn new() -> Self;

    /// Install properties and signals. Runs once, when the class is first
    /// used.
    fn class_init(_class: &mut ObjectClass) {}

    fn hooks() -> Hooks<Self> {
        Hooks::default()
    }
}
